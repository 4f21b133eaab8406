//! Serialization of trees to the text format.

use std::io::Write as IoWrite;

use super::{
    color_to_int, crease_kind_to_int, fold_to_int, net_flag_to_int, CREASE_TAG, EDGE_TAG,
    FACET_TAG, NODE_TAG, PATH_TAG, POLY_TAG, TREE_TAG, VERTEX_TAG,
};
use crate::error::Result;
use crate::geom::Vec2;
use crate::tree::conditions::{Condition, ConditionKind};
use crate::tree::parts::{CreaseOwner, NodeOwner, PathOwner, PolyOwner, VertexOwner};
use crate::tree::{
    ConditionId, CreaseId, EdgeId, FacetId, NodeId, PartId, PathId, PolyId, Tree, VertexId,
};

/// Line-oriented emitter. The line ending and float precision vary by
/// document version.
struct Emitter {
    buf: String,
    eol: char,
    precision: usize,
}

impl Emitter {
    fn new(eol: char, precision: usize) -> Self {
        Self {
            buf: String::new(),
            eol,
            precision,
        }
    }

    fn raw_line(&mut self, s: &str) {
        self.buf.push_str(s);
        self.buf.push(self.eol);
    }

    fn put_size(&mut self, v: usize) {
        self.raw_line(&v.to_string());
    }

    fn put_int(&mut self, v: i64) {
        self.raw_line(&v.to_string());
    }

    fn put_float(&mut self, v: f64) {
        self.raw_line(&format!("{:.*}", self.precision, v));
    }

    fn put_bool(&mut self, v: bool) {
        self.raw_line(if v { "true" } else { "false" });
    }

    fn put_point(&mut self, p: Vec2) {
        self.put_float(p.x);
        self.put_float(p.y);
    }

    /// Strings carry their line breaks and backslashes escaped; the empty
    /// string is a blank line.
    fn put_string(&mut self, s: &str) {
        let mut escaped = String::with_capacity(s.len());
        for ch in s.chars() {
            match ch {
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\\' => escaped.push_str("\\\\"),
                _ => escaped.push(ch),
            }
        }
        self.raw_line(&escaped);
    }

    fn put_tag(&mut self, tag: &str) {
        debug_assert_eq!(tag.len(), 4);
        self.raw_line(tag);
    }
}

/// Sorted-by-index live ids of an arena; file order is index order.
fn ordered<I: PartId, T>(
    arena: &crate::tree::Arena<I, T>,
    index: impl Fn(&T) -> usize,
) -> Vec<I> {
    let mut ids: Vec<(I, usize)> = arena.iter().map(|(id, t)| (id, index(t))).collect();
    ids.sort_by_key(|&(id, ix)| (ix, id.raw()));
    ids.into_iter().map(|(id, _)| id).collect()
}

struct TreeWriter<'a> {
    tree: &'a Tree,
    e: Emitter,
}

impl<'a> TreeWriter<'a> {
    // ---- reference emission ----------------------------------------------

    fn put_node_ref(&mut self, id: Option<NodeId>) {
        let ix = id.map_or(0, |n| self.tree.node(n).index);
        self.e.put_size(ix);
    }

    fn put_edge_ref(&mut self, id: Option<EdgeId>) {
        let ix = id.map_or(0, |n| self.tree.edge(n).index);
        self.e.put_size(ix);
    }

    fn put_path_ref(&mut self, id: Option<PathId>) {
        let ix = id.map_or(0, |n| self.tree.path(n).index);
        self.e.put_size(ix);
    }

    fn put_poly_ref(&mut self, id: Option<PolyId>) {
        let ix = id.map_or(0, |n| self.tree.poly(n).index);
        self.e.put_size(ix);
    }

    fn put_vertex_ref(&mut self, id: Option<VertexId>) {
        let ix = id.map_or(0, |n| self.tree.vertex(n).index);
        self.e.put_size(ix);
    }

    fn put_crease_ref(&mut self, id: Option<CreaseId>) {
        let ix = id.map_or(0, |n| self.tree.crease(n).index);
        self.e.put_size(ix);
    }

    fn put_facet_ref(&mut self, id: Option<FacetId>) {
        let ix = id.map_or(0, |n| self.tree.facet(n).index);
        self.e.put_size(ix);
    }

    fn put_node_array(&mut self, ids: &[NodeId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_node_ref(Some(id));
        }
    }

    fn put_edge_array(&mut self, ids: &[EdgeId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_edge_ref(Some(id));
        }
    }

    fn put_path_array(&mut self, ids: &[PathId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_path_ref(Some(id));
        }
    }

    fn put_poly_array(&mut self, ids: &[PolyId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_poly_ref(Some(id));
        }
    }

    fn put_vertex_array(&mut self, ids: &[VertexId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_vertex_ref(Some(id));
        }
    }

    fn put_crease_array(&mut self, ids: &[CreaseId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_crease_ref(Some(id));
        }
    }

    fn put_facet_array(&mut self, ids: &[FacetId]) {
        self.e.put_size(ids.len());
        for &id in ids {
            self.put_facet_ref(Some(id));
        }
    }

    fn put_point_array(&mut self, pts: &[Vec2]) {
        self.e.put_size(pts.len());
        for &p in pts {
            self.e.put_point(p);
        }
    }

    fn put_node_owner(&mut self, owner: NodeOwner) {
        match owner {
            NodeOwner::Poly(p) => {
                self.e.put_size(1);
                self.put_poly_ref(Some(p));
            }
            NodeOwner::Tree => self.e.put_size(0),
        }
    }

    fn put_path_owner(&mut self, owner: PathOwner) {
        match owner {
            PathOwner::Poly(p) => {
                self.e.put_size(1);
                self.put_poly_ref(Some(p));
            }
            PathOwner::Tree => self.e.put_size(0),
        }
    }

    fn put_poly_owner(&mut self, owner: PolyOwner) {
        match owner {
            PolyOwner::Poly(p) => {
                self.e.put_size(1);
                self.put_poly_ref(Some(p));
            }
            PolyOwner::Tree => self.e.put_size(0),
        }
    }

    fn put_vertex_owner(&mut self, owner: VertexOwner) {
        match owner {
            VertexOwner::Node(n) => {
                self.e.put_size(1);
                self.put_node_ref(Some(n));
            }
            VertexOwner::Path(p) => {
                self.e.put_size(0);
                self.put_path_ref(Some(p));
            }
        }
    }

    fn put_crease_owner(&mut self, owner: CreaseOwner) {
        match owner {
            CreaseOwner::Poly(p) => {
                self.e.put_size(1);
                self.put_poly_ref(Some(p));
            }
            CreaseOwner::Path(p) => {
                self.e.put_size(0);
                self.put_path_ref(Some(p));
            }
        }
    }

    // ---- part records -----------------------------------------------------

    fn put_node_v5(&mut self, id: NodeId) {
        let n = self.tree.node(id).clone();
        self.e.put_tag(NODE_TAG);
        self.e.put_size(n.index);
        self.e.put_string(&n.label);
        self.e.put_point(n.loc);
        self.e.put_float(n.depth);
        self.e.put_float(n.elevation);
        self.e.put_bool(n.is_leaf_node);
        self.e.put_bool(n.is_sub_node);
        self.e.put_bool(n.is_border_node);
        self.e.put_bool(n.is_pinned_node);
        self.e.put_bool(n.is_polygon_node);
        self.e.put_bool(n.is_junction_node);
        self.e.put_bool(n.is_conditioned_node);
        self.put_edge_array(&n.edges);
        self.put_path_array(&n.leaf_paths);
        self.put_vertex_array(&n.owned_vertices);
        self.put_node_owner(n.owner);
    }

    fn put_edge_v5(&mut self, id: EdgeId) {
        let e = self.tree.edge(id).clone();
        self.e.put_tag(EDGE_TAG);
        self.e.put_size(e.index);
        self.e.put_string(&e.label);
        self.e.put_float(e.length);
        self.e.put_float(e.strain);
        self.e.put_float(e.stiffness);
        self.e.put_bool(e.is_pinned_edge);
        self.e.put_bool(e.is_conditioned_edge);
        self.put_node_array(&e.nodes);
        // Edge owner is always the tree; nothing to record.
    }

    fn put_path_v5(&mut self, id: PathId) {
        let p = self.tree.path(id).clone();
        self.e.put_tag(PATH_TAG);
        self.e.put_size(p.index);
        self.e.put_float(p.min_tree_length);
        self.e.put_float(p.min_paper_length);
        self.e.put_float(p.act_tree_length);
        self.e.put_float(p.act_paper_length);
        self.e.put_bool(p.is_leaf_path);
        self.e.put_bool(p.is_sub_path);
        self.e.put_bool(p.is_feasible_path);
        self.e.put_bool(p.is_active_path);
        self.e.put_bool(p.is_border_path);
        self.e.put_bool(p.is_polygon_path);
        self.e.put_bool(p.is_conditioned_path);
        self.put_poly_ref(p.fwd_poly);
        self.put_poly_ref(p.bkd_poly);
        self.put_node_array(&p.nodes);
        self.put_edge_array(&p.edges);
        self.put_path_ref(p.outset_path);
        self.e.put_float(p.front_reduction);
        self.e.put_float(p.back_reduction);
        self.e.put_float(p.min_depth);
        self.e.put_float(p.min_depth_dist);
        self.put_vertex_array(&p.owned_vertices);
        self.put_crease_array(&p.owned_creases);
        self.put_path_owner(p.owner);
    }

    fn put_poly_v5(&mut self, id: PolyId) {
        let p = self.tree.poly(id).clone();
        self.e.put_tag(POLY_TAG);
        self.e.put_size(p.index);
        self.e.put_point(p.centroid);
        self.e.put_bool(p.is_sub_poly);
        self.put_node_array(&p.ring_nodes);
        self.put_path_array(&p.ring_paths);
        self.put_path_array(&p.cross_paths);
        self.put_node_array(&p.inset_nodes);
        self.put_path_array(&p.spoke_paths);
        self.put_path_ref(p.ridge_path);
        self.put_point_array(&p.node_locs);
        self.put_vertex_array(&p.local_root_vertices);
        self.put_crease_array(&p.local_root_creases);
        self.put_node_array(&p.owned_nodes);
        self.put_path_array(&p.owned_paths);
        self.put_poly_array(&p.owned_polys);
        self.put_crease_array(&p.owned_creases);
        self.put_facet_array(&p.owned_facets);
        self.put_poly_owner(p.owner);
    }

    fn put_vertex_v5(&mut self, id: VertexId) {
        let v = self.tree.vertex(id).clone();
        self.e.put_tag(VERTEX_TAG);
        self.e.put_size(v.index);
        self.e.put_point(v.loc);
        self.e.put_float(v.elevation);
        self.e.put_bool(v.is_border_vertex);
        self.put_node_ref(v.tree_node);
        self.put_vertex_ref(v.left_pseudohinge_mate);
        self.put_vertex_ref(v.right_pseudohinge_mate);
        self.put_crease_array(&v.creases);
        self.e.put_float(v.depth);
        self.e.put_size(v.discrete_depth);
        self.e.put_int(net_flag_to_int(v.cc_flag));
        self.e.put_int(net_flag_to_int(v.st_flag));
        self.put_vertex_owner(v.owner);
    }

    fn put_crease_v5(&mut self, id: CreaseId) {
        let c = self.tree.crease(id).clone();
        self.e.put_tag(CREASE_TAG);
        self.e.put_size(c.index);
        self.e.put_int(crease_kind_to_int(c.kind));
        self.put_vertex_array(&c.vertices);
        self.put_facet_ref(c.fwd_facet);
        self.put_facet_ref(c.bkd_facet);
        self.e.put_int(fold_to_int(c.fold));
        self.e.put_int(net_flag_to_int(c.cc_flag));
        self.e.put_int(net_flag_to_int(c.st_flag));
        self.put_crease_owner(c.owner);
    }

    fn put_facet_v5(&mut self, id: FacetId) {
        let f = self.tree.facet(id).clone();
        self.e.put_tag(FACET_TAG);
        self.e.put_size(f.index);
        self.e.put_point(f.centroid);
        self.e.put_bool(f.is_well_formed);
        self.put_vertex_array(&f.vertices);
        self.put_crease_array(&f.creases);
        self.put_edge_ref(f.corridor_edge);
        self.put_facet_array(&f.head_facets);
        self.put_facet_array(&f.tail_facets);
        self.e.put_size(f.order);
        self.e.put_int(color_to_int(f.color));
        self.put_poly_ref(Some(f.owner));
    }

    /// The body lines of a condition, shared between the v4 and v5 record
    /// shapes.
    fn put_condition_rest(&mut self, c: &Condition) {
        match &c.kind {
            ConditionKind::NodeCombo {
                node,
                to_symmetry_line,
                to_paper_edge,
                to_paper_corner,
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
            } => {
                self.put_node_ref(Some(*node));
                self.e.put_bool(*to_symmetry_line);
                self.e.put_bool(*to_paper_edge);
                self.e.put_bool(*to_paper_corner);
                self.e.put_bool(*x_fixed);
                self.e.put_float(*x_fix_value);
                self.e.put_bool(*y_fixed);
                self.e.put_float(*y_fix_value);
            }
            ConditionKind::NodeFixed {
                node,
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
            } => {
                self.put_node_ref(Some(*node));
                self.e.put_bool(*x_fixed);
                self.e.put_float(*x_fix_value);
                self.e.put_bool(*y_fixed);
                self.e.put_float(*y_fix_value);
            }
            ConditionKind::NodeSymmetric { node }
            | ConditionKind::NodeOnEdge { node }
            | ConditionKind::NodeOnCorner { node } => {
                self.put_node_ref(Some(*node));
            }
            ConditionKind::NodesPaired { node1, node2 } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
            }
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
                self.put_node_ref(Some(*node3));
            }
            ConditionKind::EdgeLengthFixed { edge } => {
                self.put_edge_ref(Some(*edge));
            }
            ConditionKind::EdgesSameStrain { edge1, edge2 } => {
                self.put_edge_ref(Some(*edge1));
                self.put_edge_ref(Some(*edge2));
            }
            ConditionKind::PathCombo {
                node1,
                node2,
                is_angle_fixed,
                angle,
                is_angle_quant,
                quant,
                quant_offset,
                ..
            } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
                self.e.put_bool(*is_angle_fixed);
                self.e.put_float(*angle);
                self.e.put_bool(*is_angle_quant);
                self.e.put_size(*quant);
                self.e.put_float(*quant_offset);
            }
            ConditionKind::PathActive { node1, node2, .. } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
            }
            ConditionKind::PathAngleFixed {
                node1,
                node2,
                angle,
                ..
            } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
                self.e.put_float(*angle);
            }
            ConditionKind::PathAngleQuant {
                node1,
                node2,
                quant,
                quant_offset,
                ..
            } => {
                self.put_node_ref(Some(*node1));
                self.put_node_ref(Some(*node2));
                self.e.put_size(*quant);
                self.e.put_float(*quant_offset);
            }
        }
    }

    fn put_condition_v5(&mut self, id: ConditionId) {
        let c = self.tree.condition(id).clone();
        self.e.put_tag(c.tag());
        self.e.put_size(c.index);
        self.e.put_bool(c.is_feasible);
        self.e.put_size(c.num_lines_rest());
        self.put_condition_rest(&c);
    }

    fn put_condition_v4(&mut self, id: ConditionId) {
        let c = self.tree.condition(id).clone();
        self.e.put_tag(c.tag());
        self.e.put_size(c.num_lines_rest());
        self.put_condition_rest(&c);
    }

    // ---- documents --------------------------------------------------------

    fn put_tree_v5(&mut self) {
        let tree = self.tree;
        self.e.put_tag(TREE_TAG);
        self.e.put_string("5.0");

        self.e.put_float(tree.paper_width());
        self.e.put_float(tree.paper_height());
        self.e.put_float(tree.scale());
        self.e.put_bool(tree.has_symmetry());
        self.e.put_point(tree.sym_loc());
        self.e.put_float(tree.sym_angle());

        self.e.put_bool(tree.is_feasible());
        self.e.put_bool(tree.is_polygon_valid());
        self.e.put_bool(tree.is_polygon_filled());
        self.e.put_bool(tree.is_vertex_depth_valid());
        self.e.put_bool(tree.is_facet_data_valid());
        self.e.put_bool(tree.is_local_root_connectable());
        self.e.put_bool(tree.needs_cleanup);

        let nodes = ordered(&tree.nodes, |n| n.index);
        let edges = ordered(&tree.edges, |e| e.index);
        let paths = ordered(&tree.paths, |p| p.index);
        let polys = ordered(&tree.polys, |p| p.index);
        let vertices = ordered(&tree.vertices, |v| v.index);
        let creases = ordered(&tree.creases, |c| c.index);
        let facets = ordered(&tree.facets, |f| f.index);
        let conditions = ordered(&tree.conditions, |c| c.index);

        self.e.put_size(nodes.len());
        self.e.put_size(edges.len());
        self.e.put_size(paths.len());
        self.e.put_size(polys.len());
        self.e.put_size(vertices.len());
        self.e.put_size(creases.len());
        self.e.put_size(facets.len());
        self.e.put_size(conditions.len());

        for id in nodes {
            self.put_node_v5(id);
        }
        for id in edges {
            self.put_edge_v5(id);
        }
        for id in paths {
            self.put_path_v5(id);
        }
        for id in polys {
            self.put_poly_v5(id);
        }
        for id in vertices {
            self.put_vertex_v5(id);
        }
        for id in creases {
            self.put_crease_v5(id);
        }
        for id in facets {
            self.put_facet_v5(id);
        }
        for id in conditions {
            self.put_condition_v5(id);
        }

        self.put_node_array(&tree.owned_nodes);
        self.put_edge_array(&tree.owned_edges);
        self.put_path_array(&tree.owned_paths);
        self.put_poly_array(&tree.owned_polys);
    }

    fn put_node_v4(&mut self, id: NodeId) {
        let n = self.tree.node(id).clone();
        self.e.put_tag(NODE_TAG);
        self.e.put_size(n.index);
        self.e.put_string(&n.label);
        self.e.put_point(n.loc);
        self.e.put_bool(n.is_leaf_node);
        self.e.put_bool(n.is_sub_node);
        self.e.put_bool(n.is_border_node);
        self.e.put_bool(n.is_pinned_node);
        self.e.put_bool(n.is_polygon_node);
        self.e.put_bool(n.is_conditioned_node);
        self.e.put_size(0); // no owned vertices in a v4 document
        self.put_edge_array(&n.edges);
        self.put_path_array(&n.leaf_paths);
        self.put_node_owner(n.owner);
    }

    fn put_path_v4(&mut self, id: PathId) {
        let p = self.tree.path(id).clone();
        self.e.put_tag(PATH_TAG);
        self.e.put_size(p.index);
        self.e.put_float(p.min_tree_length);
        self.e.put_float(p.min_paper_length);
        self.e.put_bool(p.is_leaf_path);
        self.e.put_bool(p.is_sub_path);
        self.e.put_bool(p.is_active_path);
        self.e.put_bool(p.is_border_path);
        self.e.put_bool(p.is_polygon_path);
        self.e.put_bool(p.is_conditioned_path);
        self.e.put_size(0); // no owned vertices
        self.e.put_size(0); // no forward poly
        self.e.put_size(0); // no backward poly
        self.put_node_array(&p.nodes);
        self.put_edge_array(&p.edges);
        self.put_path_owner(p.owner);
    }

    fn put_tree_v4(&mut self) {
        let tree = self.tree;
        self.e.put_tag(TREE_TAG);
        self.e.put_string("4.0");

        self.e.put_float(tree.paper_width());
        self.e.put_float(tree.paper_height());
        self.e.put_float(tree.scale());
        self.e.put_bool(tree.has_symmetry());
        self.e.put_point(tree.sym_loc());
        self.e.put_float(tree.sym_angle());

        let nodes = ordered(&tree.nodes, |n| n.index);
        let edges = ordered(&tree.edges, |e| e.index);
        let paths = ordered(&tree.paths, |p| p.index);
        let conditions = ordered(&tree.conditions, |c| c.index);

        self.e.put_size(nodes.len());
        self.e.put_size(edges.len());
        self.e.put_size(paths.len());
        self.e.put_size(0); // no polys
        self.e.put_size(0); // no vertices
        self.e.put_size(0); // no creases
        self.e.put_size(conditions.len());

        for id in nodes {
            self.put_node_v4(id);
        }
        for id in edges {
            self.put_edge_v5(id); // the edge record is unchanged since v4
        }
        for id in paths {
            self.put_path_v4(id);
        }
        for id in conditions {
            self.put_condition_v4(id);
        }

        self.put_node_array(&tree.owned_nodes);
        self.put_edge_array(&tree.owned_edges);
        self.put_path_array(&tree.owned_paths);
        self.e.put_size(0); // no owned polys
    }
}

/// Serialize a tree to the current (5.0) document format.
pub fn write_to_string(tree: &Tree) -> String {
    let mut writer = TreeWriter {
        tree,
        e: Emitter::new('\n', 10),
    };
    writer.put_tree_v5();
    writer.e.buf
}

/// Write a tree in the current format to a stream.
pub fn write<W: IoWrite>(tree: &Tree, out: &mut W) -> Result<()> {
    out.write_all(write_to_string(tree).as_bytes())
        .map_err(crate::error::IoError::Stream)?;
    Ok(())
}

/// Export in the legacy 4.0 format: classic `\r` line endings, 6-digit
/// floats, and no poly or crease-pattern records. The tree itself is
/// untouched; a stripped copy is serialized.
pub fn export_v4<W: IoWrite>(tree: &Tree, out: &mut W) -> Result<()> {
    let mut copy = tree.clone_via_serialization()?;
    copy.kill_polys_and_crease_pattern();
    let mut writer = TreeWriter {
        tree: &copy,
        e: Emitter::new('\r', 6),
    };
    writer.put_tree_v4();
    out.write_all(writer.e.buf.as_bytes())
        .map_err(crate::error::IoError::Stream)?;
    Ok(())
}
