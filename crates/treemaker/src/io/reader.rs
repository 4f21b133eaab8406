//! Parsing of tree documents.
//!
//! The reader is token-oriented: numeric and boolean values are
//! whitespace-delimited tokens, labels are whole (escape-carrying) lines.
//! Any of `\n`, `\r\n`, `\r` terminates a line on input. A failed read
//! leaves the destination tree blank; the one exception is a document whose
//! only defect is unknown condition tags, which loads completely and then
//! reports how many conditions were skipped.

use std::io::{BufRead, Read};

use super::{
    color_from_int, crease_kind_from_int, fold_from_int, net_flag_from_int, CONDITION_TAGS,
    PART_TAGS, TREE_TAG,
};
use crate::error::{Error, IoError, Result};
use crate::geom::Vec2;
use crate::tree::conditions::{Condition, ConditionKind};
use crate::tree::parts::{
    Crease, CreaseKind, CreaseOwner, Edge, Facet, Fold, NetFlag, Node, NodeOwner, Path, PathOwner,
    Poly, PolyOwner, Vertex, VertexOwner, MAX_LABEL_LEN,
};
use crate::tree::{
    CreaseId, EdgeId, FacetId, NodeId, PathId, PolyId, Tree, VertexId,
};

type IoResult<T> = std::result::Result<T, IoError>;

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Skip spaces and tabs, then consume at most one line break (any of
    /// the three conventions).
    fn consume_trailing_space(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'\n') => {
                self.pos += 1;
            }
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            _ => {}
        }
    }

    /// Next whitespace-delimited token.
    fn token(&mut self) -> IoResult<String> {
        while matches!(
            self.peek(),
            Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
        ) {
            self.pos += 1;
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(IoError::BadToken("<end of input>".into()));
        }
        let tok = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        self.consume_trailing_space();
        Ok(tok)
    }

    fn size(&mut self) -> IoResult<usize> {
        let tok = self.token()?;
        tok.parse().map_err(|_| IoError::BadToken(tok))
    }

    fn int(&mut self) -> IoResult<i64> {
        let tok = self.token()?;
        tok.parse().map_err(|_| IoError::BadToken(tok))
    }

    /// Floats tolerate the legacy `NAN(017)` token, which reads as zero.
    fn float(&mut self) -> IoResult<f64> {
        let tok = self.token()?;
        if tok.starts_with('N') {
            return Ok(0.0);
        }
        tok.parse().map_err(|_| IoError::BadToken(tok))
    }

    fn boolean(&mut self) -> IoResult<bool> {
        let tok = self.token()?;
        match tok.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(IoError::BadToken(tok)),
        }
    }

    fn point(&mut self) -> IoResult<Vec2> {
        let x = self.float()?;
        let y = self.float()?;
        Ok(Vec2::new(x, y))
    }

    /// A whole line with escapes resolved; a line break at the current
    /// position reads as the empty string.
    fn line_string(&mut self) -> IoResult<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => break,
                Some(b'\n') => break,
                Some(b'\r') => {
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    break;
                }
                Some(b'\\') => {
                    let escaped = match self.bump() {
                        Some(b'n') => '\n',
                        Some(b'r') => '\r',
                        Some(b'\\') => '\\',
                        other => {
                            let shown = other
                                .map(|b| (b as char).to_string())
                                .unwrap_or_default();
                            return Err(IoError::BadEscape(format!("\\{shown}")));
                        }
                    };
                    if out.len() >= MAX_LABEL_LEN {
                        return Err(IoError::TooLongString(out));
                    }
                    out.push(escaped);
                }
                Some(b) => {
                    if out.len() >= MAX_LABEL_LEN {
                        return Err(IoError::TooLongString(out));
                    }
                    out.push(b as char);
                }
            }
        }
        Ok(out)
    }

    /// A part tag: a token of exactly four characters.
    fn tag(&mut self) -> IoResult<String> {
        let tok = self.token()?;
        if tok.len() != 4 {
            return Err(IoError::BadTag(tok));
        }
        Ok(tok)
    }

    fn expect_tag(&mut self, expected: &str) -> IoResult<()> {
        let tok = self.tag()?;
        if tok != expected {
            return Err(IoError::BadTag(tok));
        }
        Ok(())
    }
}

/// Part counts of the document, for validating reference indices.
#[derive(Clone, Copy, Default)]
struct Counts {
    nodes: usize,
    edges: usize,
    paths: usize,
    polys: usize,
    vertices: usize,
    creases: usize,
    facets: usize,
}

/// Resolve a serialized 1-based index against a part count; 0 is none.
fn resolve(ix: usize, count: usize) -> IoResult<Option<usize>> {
    if ix == 0 {
        Ok(None)
    } else if ix <= count {
        Ok(Some(ix - 1))
    } else {
        Err(IoError::BadToken(format!("part index {ix}")))
    }
}

struct Parser<'a> {
    s: Scanner<'a>,
    counts: Counts,
}

impl<'a> Parser<'a> {
    fn node_ref(&mut self) -> IoResult<Option<NodeId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.nodes)?.map(NodeId))
    }

    fn edge_ref(&mut self) -> IoResult<Option<EdgeId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.edges)?.map(EdgeId))
    }

    fn path_ref(&mut self) -> IoResult<Option<PathId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.paths)?.map(PathId))
    }

    fn poly_ref(&mut self) -> IoResult<Option<PolyId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.polys)?.map(PolyId))
    }

    fn vertex_ref(&mut self) -> IoResult<Option<VertexId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.vertices)?.map(VertexId))
    }

    fn crease_ref(&mut self) -> IoResult<Option<CreaseId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.creases)?.map(CreaseId))
    }

    fn facet_ref(&mut self) -> IoResult<Option<FacetId>> {
        let ix = self.s.size()?;
        Ok(resolve(ix, self.counts.facets)?.map(FacetId))
    }

    fn require<T>(&mut self, v: Option<T>) -> IoResult<T> {
        v.ok_or_else(|| IoError::BadToken("unexpected null reference".into()))
    }

    fn node_array(&mut self) -> IoResult<Vec<NodeId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.node_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn edge_array(&mut self) -> IoResult<Vec<EdgeId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.edge_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn path_array(&mut self) -> IoResult<Vec<PathId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.path_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn poly_array(&mut self) -> IoResult<Vec<PolyId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.poly_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn vertex_array(&mut self) -> IoResult<Vec<VertexId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.vertex_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn crease_array(&mut self) -> IoResult<Vec<CreaseId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.crease_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn facet_array(&mut self) -> IoResult<Vec<FacetId>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let r = self.facet_ref()?;
            out.push(self.require(r)?);
        }
        Ok(out)
    }

    fn point_array(&mut self) -> IoResult<Vec<Vec2>> {
        let n = self.s.size()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.s.point()?);
        }
        Ok(out)
    }

    fn node_owner(&mut self) -> IoResult<NodeOwner> {
        let is_poly = self.s.size()?;
        if is_poly != 0 {
            let p = self.poly_ref()?;
            Ok(NodeOwner::Poly(self.require(p)?))
        } else {
            Ok(NodeOwner::Tree)
        }
    }

    fn path_owner(&mut self) -> IoResult<PathOwner> {
        let is_poly = self.s.size()?;
        if is_poly != 0 {
            let p = self.poly_ref()?;
            Ok(PathOwner::Poly(self.require(p)?))
        } else {
            Ok(PathOwner::Tree)
        }
    }

    fn poly_owner(&mut self) -> IoResult<PolyOwner> {
        let is_poly = self.s.size()?;
        if is_poly != 0 {
            let p = self.poly_ref()?;
            Ok(PolyOwner::Poly(self.require(p)?))
        } else {
            Ok(PolyOwner::Tree)
        }
    }

    fn vertex_owner(&mut self) -> IoResult<VertexOwner> {
        let is_node = self.s.size()?;
        if is_node != 0 {
            let n = self.node_ref()?;
            Ok(VertexOwner::Node(self.require(n)?))
        } else {
            let p = self.path_ref()?;
            Ok(VertexOwner::Path(self.require(p)?))
        }
    }

    fn crease_owner(&mut self) -> IoResult<CreaseOwner> {
        let is_poly = self.s.size()?;
        if is_poly != 0 {
            let p = self.poly_ref()?;
            Ok(CreaseOwner::Poly(self.require(p)?))
        } else {
            let p = self.path_ref()?;
            Ok(CreaseOwner::Path(self.require(p)?))
        }
    }

    fn net_flag(&mut self) -> IoResult<NetFlag> {
        let v = self.s.int()?;
        net_flag_from_int(v)
    }

    // ---- v5 part records --------------------------------------------------

    fn read_node_v5(&mut self, tree: &mut Tree, id: NodeId) -> IoResult<()> {
        self.s.expect_tag(super::NODE_TAG)?;
        let index = self.s.size()?;
        let label = self.s.line_string()?;
        let loc = self.s.point()?;
        let depth = self.s.float()?;
        let elevation = self.s.float()?;
        let is_leaf = self.s.boolean()?;
        let is_sub = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_pinned = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let is_junction = self.s.boolean()?;
        let is_conditioned = self.s.boolean()?;
        let edges = self.edge_array()?;
        let leaf_paths = self.path_array()?;
        let owned_vertices = self.vertex_array()?;
        let owner = self.node_owner()?;

        let n = tree.node_mut(id);
        n.index = index;
        n.label = label;
        n.loc = loc;
        n.depth = depth;
        n.elevation = elevation;
        n.is_leaf_node = is_leaf;
        n.is_sub_node = is_sub;
        n.is_border_node = is_border;
        n.is_pinned_node = is_pinned;
        n.is_polygon_node = is_polygon;
        n.is_junction_node = is_junction;
        n.is_conditioned_node = is_conditioned;
        n.edges = edges;
        n.leaf_paths = leaf_paths;
        n.owned_vertices = owned_vertices;
        n.owner = owner;
        Ok(())
    }

    fn read_edge_v5(
        &mut self,
        tree: &mut Tree,
        id: EdgeId,
        fix_zero_stiffness: bool,
    ) -> IoResult<()> {
        self.s.expect_tag(super::EDGE_TAG)?;
        let index = self.s.size()?;
        let label = self.s.line_string()?;
        let length = self.s.float()?;
        let strain = self.s.float()?;
        let mut stiffness = self.s.float()?;
        if fix_zero_stiffness && stiffness == 0.0 {
            stiffness = 1.0;
        }
        let is_pinned = self.s.boolean()?;
        let is_conditioned = self.s.boolean()?;
        let nodes = self.node_array()?;

        let e = tree.edge_mut(id);
        e.index = index;
        e.label = label;
        e.length = length;
        e.strain = strain;
        e.stiffness = stiffness;
        e.is_pinned_edge = is_pinned;
        e.is_conditioned_edge = is_conditioned;
        e.nodes = nodes;
        Ok(())
    }

    fn read_path_v5(&mut self, tree: &mut Tree, id: PathId) -> IoResult<()> {
        self.s.expect_tag(super::PATH_TAG)?;
        let index = self.s.size()?;
        let min_tree_length = self.s.float()?;
        let min_paper_length = self.s.float()?;
        let act_tree_length = self.s.float()?;
        let act_paper_length = self.s.float()?;
        let is_leaf = self.s.boolean()?;
        let is_sub = self.s.boolean()?;
        let is_feasible = self.s.boolean()?;
        let is_active = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let is_conditioned = self.s.boolean()?;
        let fwd_poly = self.poly_ref()?;
        let bkd_poly = self.poly_ref()?;
        let nodes = self.node_array()?;
        let edges = self.edge_array()?;
        let outset_path = self.path_ref()?;
        let front_reduction = self.s.float()?;
        let back_reduction = self.s.float()?;
        let min_depth = self.s.float()?;
        let min_depth_dist = self.s.float()?;
        let owned_vertices = self.vertex_array()?;
        let owned_creases = self.crease_array()?;
        let owner = self.path_owner()?;

        let p = tree.path_mut(id);
        p.index = index;
        p.min_tree_length = min_tree_length;
        p.min_paper_length = min_paper_length;
        p.act_tree_length = act_tree_length;
        p.act_paper_length = act_paper_length;
        p.is_leaf_path = is_leaf;
        p.is_sub_path = is_sub;
        p.is_feasible_path = is_feasible;
        p.is_active_path = is_active;
        p.is_border_path = is_border;
        p.is_polygon_path = is_polygon;
        p.is_conditioned_path = is_conditioned;
        p.fwd_poly = fwd_poly;
        p.bkd_poly = bkd_poly;
        p.nodes = nodes;
        p.edges = edges;
        p.outset_path = outset_path;
        p.front_reduction = front_reduction;
        p.back_reduction = back_reduction;
        p.min_depth = min_depth;
        p.min_depth_dist = min_depth_dist;
        p.owned_vertices = owned_vertices;
        p.owned_creases = owned_creases;
        p.owner = owner;
        Ok(())
    }

    fn read_poly_v5(&mut self, tree: &mut Tree, id: PolyId) -> IoResult<()> {
        self.s.expect_tag(super::POLY_TAG)?;
        let index = self.s.size()?;
        let centroid = self.s.point()?;
        let is_sub = self.s.boolean()?;
        let ring_nodes = self.node_array()?;
        let ring_paths = self.path_array()?;
        let cross_paths = self.path_array()?;
        let inset_nodes = self.node_array()?;
        let spoke_paths = self.path_array()?;
        let ridge_path = self.path_ref()?;
        let node_locs = self.point_array()?;
        let local_root_vertices = self.vertex_array()?;
        let local_root_creases = self.crease_array()?;
        let owned_nodes = self.node_array()?;
        let owned_paths = self.path_array()?;
        let owned_polys = self.poly_array()?;
        let owned_creases = self.crease_array()?;
        let owned_facets = self.facet_array()?;
        let owner = self.poly_owner()?;

        let p = tree.poly_mut(id);
        p.index = index;
        p.centroid = centroid;
        p.is_sub_poly = is_sub;
        p.ring_nodes = ring_nodes;
        p.ring_paths = ring_paths;
        p.cross_paths = cross_paths;
        p.inset_nodes = inset_nodes;
        p.spoke_paths = spoke_paths;
        p.ridge_path = ridge_path;
        p.node_locs = node_locs;
        p.local_root_vertices = local_root_vertices;
        p.local_root_creases = local_root_creases;
        p.owned_nodes = owned_nodes;
        p.owned_paths = owned_paths;
        p.owned_polys = owned_polys;
        p.owned_creases = owned_creases;
        p.owned_facets = owned_facets;
        p.owner = owner;
        Ok(())
    }

    fn read_vertex_v5(&mut self, tree: &mut Tree, id: VertexId) -> IoResult<()> {
        self.s.expect_tag(super::VERTEX_TAG)?;
        let index = self.s.size()?;
        let loc = self.s.point()?;
        let elevation = self.s.float()?;
        let is_border = self.s.boolean()?;
        let tree_node = self.node_ref()?;
        let left_mate = self.vertex_ref()?;
        let right_mate = self.vertex_ref()?;
        let creases = self.crease_array()?;
        let depth = self.s.float()?;
        let discrete_depth = self.s.size()?;
        let cc_flag = self.net_flag()?;
        let st_flag = self.net_flag()?;
        let owner = self.vertex_owner()?;

        let v = tree.vertex_mut(id);
        v.index = index;
        v.loc = loc;
        v.elevation = elevation;
        v.is_border_vertex = is_border;
        v.tree_node = tree_node;
        v.left_pseudohinge_mate = left_mate;
        v.right_pseudohinge_mate = right_mate;
        v.creases = creases;
        v.depth = depth;
        v.discrete_depth = discrete_depth;
        v.cc_flag = cc_flag;
        v.st_flag = st_flag;
        v.owner = owner;
        Ok(())
    }

    fn read_crease_v5(&mut self, tree: &mut Tree, id: CreaseId) -> IoResult<()> {
        self.s.expect_tag(super::CREASE_TAG)?;
        let index = self.s.size()?;
        let kind = crease_kind_from_int(self.s.int()?)?;
        let vertices = self.vertex_array()?;
        let fwd_facet = self.facet_ref()?;
        let bkd_facet = self.facet_ref()?;
        let fold = fold_from_int(self.s.int()?)?;
        let cc_flag = self.net_flag()?;
        let st_flag = self.net_flag()?;
        let owner = self.crease_owner()?;

        let c = tree.crease_mut(id);
        c.index = index;
        c.kind = kind;
        c.vertices = vertices;
        c.fwd_facet = fwd_facet;
        c.bkd_facet = bkd_facet;
        c.fold = fold;
        c.cc_flag = cc_flag;
        c.st_flag = st_flag;
        c.owner = owner;
        Ok(())
    }

    fn read_facet_v5(&mut self, tree: &mut Tree, id: FacetId) -> IoResult<()> {
        self.s.expect_tag(super::FACET_TAG)?;
        let index = self.s.size()?;
        let centroid = self.s.point()?;
        let is_well_formed = self.s.boolean()?;
        let vertices = self.vertex_array()?;
        let creases = self.crease_array()?;
        let corridor_edge = self.edge_ref()?;
        let head_facets = self.facet_array()?;
        let tail_facets = self.facet_array()?;
        let order = self.s.size()?;
        let color = color_from_int(self.s.int()?)?;
        let owner = self.poly_ref()?;
        let owner = self.require(owner)?;

        let f = tree.facet_mut(id);
        f.index = index;
        f.centroid = centroid;
        f.is_well_formed = is_well_formed;
        f.vertices = vertices;
        f.creases = creases;
        f.corridor_edge = corridor_edge;
        f.head_facets = head_facets;
        f.tail_facets = tail_facets;
        f.order = order;
        f.color = color;
        f.owner = owner;
        Ok(())
    }

    /// Parse the body of a condition with a known tag; the path-condition
    /// bodies resolve their path through the leaf-path caches, which are
    /// loaded by then.
    fn read_condition_body(&mut self, tree: &Tree, tag: &str) -> IoResult<ConditionKind> {
        let missing_path =
            || IoError::BadToken("path condition joins unconnected nodes".to_string());
        Ok(match tag {
            "CNxn" => {
                let node = self.node_ref()?;
                let node = self.require(node)?;
                ConditionKind::NodeCombo {
                    node,
                    to_symmetry_line: self.s.boolean()?,
                    to_paper_edge: self.s.boolean()?,
                    to_paper_corner: self.s.boolean()?,
                    x_fixed: self.s.boolean()?,
                    x_fix_value: self.s.float()?,
                    y_fixed: self.s.boolean()?,
                    y_fix_value: self.s.float()?,
                }
            }
            "CNfn" => {
                let node = self.node_ref()?;
                let node = self.require(node)?;
                ConditionKind::NodeFixed {
                    node,
                    x_fixed: self.s.boolean()?,
                    x_fix_value: self.s.float()?,
                    y_fixed: self.s.boolean()?,
                    y_fix_value: self.s.float()?,
                }
            }
            "CNsn" => {
                let node = self.node_ref()?;
                ConditionKind::NodeSymmetric {
                    node: self.require(node)?,
                }
            }
            "CNoe" => {
                let node = self.node_ref()?;
                ConditionKind::NodeOnEdge {
                    node: self.require(node)?,
                }
            }
            "CNoc" => {
                let node = self.node_ref()?;
                ConditionKind::NodeOnCorner {
                    node: self.require(node)?,
                }
            }
            "CNpn" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                ConditionKind::NodesPaired { node1, node2 }
            }
            "CNcn" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                let node3 = self.node_ref()?;
                let node3 = self.require(node3)?;
                ConditionKind::NodesCollinear {
                    node1,
                    node2,
                    node3,
                }
            }
            "CNfe" => {
                let edge = self.edge_ref()?;
                ConditionKind::EdgeLengthFixed {
                    edge: self.require(edge)?,
                }
            }
            "CNes" => {
                let edge1 = self.edge_ref()?;
                let edge1 = self.require(edge1)?;
                let edge2 = self.edge_ref()?;
                let edge2 = self.require(edge2)?;
                ConditionKind::EdgesSameStrain { edge1, edge2 }
            }
            "CNxp" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                let path = tree.find_leaf_path(node1, node2).ok_or_else(missing_path)?;
                ConditionKind::PathCombo {
                    path,
                    node1,
                    node2,
                    is_angle_fixed: self.s.boolean()?,
                    angle: self.s.float()?,
                    is_angle_quant: self.s.boolean()?,
                    quant: self.s.size()?,
                    quant_offset: self.s.float()?,
                }
            }
            "CNap" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                let path = tree.find_leaf_path(node1, node2).ok_or_else(missing_path)?;
                ConditionKind::PathActive { path, node1, node2 }
            }
            "CNfp" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                let path = tree.find_leaf_path(node1, node2).ok_or_else(missing_path)?;
                ConditionKind::PathAngleFixed {
                    path,
                    node1,
                    node2,
                    angle: self.s.float()?,
                }
            }
            "CNqp" => {
                let node1 = self.node_ref()?;
                let node1 = self.require(node1)?;
                let node2 = self.node_ref()?;
                let node2 = self.require(node2)?;
                let path = tree.find_leaf_path(node1, node2).ok_or_else(missing_path)?;
                ConditionKind::PathAngleQuant {
                    path,
                    node1,
                    node2,
                    quant: self.s.size()?,
                    quant_offset: self.s.float()?,
                }
            }
            _ => unreachable!("tag checked against the condition table"),
        })
    }

    // ---- documents --------------------------------------------------------

    /// Shared header fields: paper, scale, symmetry.
    fn read_header(&mut self, tree: &mut Tree) -> IoResult<()> {
        tree.paper_width = self.s.float()?;
        tree.paper_height = self.s.float()?;
        tree.scale = self.s.float()?;
        tree.has_symmetry = self.s.boolean()?;
        tree.sym_loc = self.s.point()?;
        tree.sym_angle = self.s.float()?;
        Ok(())
    }

    fn make_blanks(&mut self, tree: &mut Tree) {
        for _ in 0..self.counts.nodes {
            tree.nodes.insert(Node::new(NodeOwner::Tree, Vec2::zeros()));
        }
        for _ in 0..self.counts.edges {
            tree.edges.insert(blank_edge());
        }
        for _ in 0..self.counts.paths {
            tree.paths.insert(Path::new(PathOwner::Tree));
        }
        for _ in 0..self.counts.polys {
            tree.polys.insert(Poly::new(PolyOwner::Tree));
        }
        for _ in 0..self.counts.vertices {
            tree.vertices.insert(blank_vertex());
        }
        for _ in 0..self.counts.creases {
            tree.creases.insert(blank_crease());
        }
        for _ in 0..self.counts.facets {
            tree.facets.insert(Facet::new(PolyId(0)));
        }
    }

    fn read_v5(&mut self, tree: &mut Tree) -> IoResult<usize> {
        self.read_header(tree)?;

        tree.is_feasible = self.s.boolean()?;
        tree.is_polygon_valid = self.s.boolean()?;
        tree.is_polygon_filled = self.s.boolean()?;
        tree.is_vertex_depth_valid = self.s.boolean()?;
        tree.is_facet_data_valid = self.s.boolean()?;
        tree.is_local_root_connectable = self.s.boolean()?;
        let _needs_cleanup = self.s.boolean()?;

        self.counts = Counts {
            nodes: self.s.size()?,
            edges: self.s.size()?,
            paths: self.s.size()?,
            polys: self.s.size()?,
            vertices: self.s.size()?,
            creases: self.s.size()?,
            facets: self.s.size()?,
        };
        let num_conditions = self.s.size()?;
        self.make_blanks(tree);

        for i in 0..self.counts.nodes {
            self.read_node_v5(tree, NodeId(i))?;
        }
        for i in 0..self.counts.edges {
            self.read_edge_v5(tree, EdgeId(i), false)?;
        }
        for i in 0..self.counts.paths {
            self.read_path_v5(tree, PathId(i))?;
        }
        for i in 0..self.counts.polys {
            self.read_poly_v5(tree, PolyId(i))?;
        }
        for i in 0..self.counts.vertices {
            self.read_vertex_v5(tree, VertexId(i))?;
        }
        for i in 0..self.counts.creases {
            self.read_crease_v5(tree, CreaseId(i))?;
        }
        for i in 0..self.counts.facets {
            self.read_facet_v5(tree, FacetId(i))?;
        }

        let mut skipped = 0;
        for _ in 0..num_conditions {
            let tag = self.s.tag()?;
            if CONDITION_TAGS.contains(&tag.as_str()) {
                let index = self.s.size()?;
                let is_feasible = self.s.boolean()?;
                let _num_lines = self.s.size()?;
                let kind = self.read_condition_body(tree, &tag)?;
                let mut c = Condition::new(kind);
                c.index = index;
                c.is_feasible = is_feasible;
                tree.conditions.insert(c);
            } else if PART_TAGS.contains(&tag.as_str()) {
                return Err(IoError::BadTag(tag));
            } else {
                // An unknown condition type: eat its declared body.
                let _index = self.s.token()?;
                let _feasible = self.s.token()?;
                let num_lines = self.s.size()?;
                for _ in 0..num_lines {
                    self.s.token()?;
                }
                skipped += 1;
            }
        }

        tree.owned_nodes = self.node_array()?;
        tree.owned_edges = self.edge_array()?;
        tree.owned_paths = self.path_array()?;
        tree.owned_polys = self.poly_array()?;
        Ok(skipped)
    }

    fn read_node_v4(&mut self, tree: &mut Tree, id: NodeId) -> IoResult<()> {
        self.s.expect_tag(super::NODE_TAG)?;
        let index = self.s.size()?;
        let label = self.s.line_string()?;
        let loc = self.s.point()?;
        let is_leaf = self.s.boolean()?;
        let is_sub = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_pinned = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let is_conditioned = self.s.boolean()?;
        let _owned_vertices = self.vertex_array()?;
        let edges = self.edge_array()?;
        let leaf_paths = self.path_array()?;
        let owner = self.node_owner()?;

        let n = tree.node_mut(id);
        n.index = index;
        n.label = label;
        n.loc = loc;
        n.is_leaf_node = is_leaf;
        n.is_sub_node = is_sub;
        n.is_border_node = is_border;
        n.is_pinned_node = is_pinned;
        n.is_polygon_node = is_polygon;
        n.is_conditioned_node = is_conditioned;
        n.edges = edges;
        n.leaf_paths = leaf_paths;
        n.owner = owner;
        Ok(())
    }

    fn read_path_v4(&mut self, tree: &mut Tree, id: PathId) -> IoResult<()> {
        self.s.expect_tag(super::PATH_TAG)?;
        let index = self.s.size()?;
        let min_tree_length = self.s.float()?;
        let min_paper_length = self.s.float()?;
        let is_leaf = self.s.boolean()?;
        let is_sub = self.s.boolean()?;
        let is_active = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let is_conditioned = self.s.boolean()?;
        let _owned_vertices = self.vertex_array()?;
        let _fwd = self.poly_ref()?;
        let _bkd = self.poly_ref()?;
        let nodes = self.node_array()?;
        let edges = self.edge_array()?;
        let owner = self.path_owner()?;

        let p = tree.path_mut(id);
        p.index = index;
        p.min_tree_length = min_tree_length;
        p.min_paper_length = min_paper_length;
        p.is_leaf_path = is_leaf;
        p.is_sub_path = is_sub;
        p.is_active_path = is_active;
        p.is_border_path = is_border;
        p.is_polygon_path = is_polygon;
        p.is_conditioned_path = is_conditioned;
        p.nodes = nodes;
        p.edges = edges;
        p.owner = owner;
        Ok(())
    }

    fn read_poly_v4(&mut self, tree: &mut Tree, id: PolyId) -> IoResult<()> {
        self.s.expect_tag(super::POLY_TAG)?;
        let index = self.s.size()?;
        let centroid = self.s.point()?;
        let node_locs = self.point_array()?;
        let is_sub = self.s.boolean()?;
        let owned_nodes = self.node_array()?;
        let owned_paths = self.path_array()?;
        let owned_polys = self.poly_array()?;
        let owned_creases = self.crease_array()?;
        let ring_nodes = self.node_array()?;
        let ring_paths = self.path_array()?;
        let cross_paths = self.path_array()?;
        let inset_nodes = self.node_array()?;
        let spoke_paths = self.path_array()?;
        let ridge_path = self.path_ref()?;
        let owner = self.poly_owner()?;

        let p = tree.poly_mut(id);
        p.index = index;
        p.centroid = centroid;
        p.node_locs = node_locs;
        p.is_sub_poly = is_sub;
        p.owned_nodes = owned_nodes;
        p.owned_paths = owned_paths;
        p.owned_polys = owned_polys;
        p.owned_creases = owned_creases;
        p.ring_nodes = ring_nodes;
        p.ring_paths = ring_paths;
        p.cross_paths = cross_paths;
        p.inset_nodes = inset_nodes;
        p.spoke_paths = spoke_paths;
        p.ridge_path = ridge_path;
        p.owner = owner;
        Ok(())
    }

    fn read_vertex_v4(&mut self, tree: &mut Tree, id: VertexId) -> IoResult<()> {
        self.s.expect_tag(super::VERTEX_TAG)?;
        let loc = self.s.point()?;
        let creases = self.crease_array()?;
        let owner = self.vertex_owner()?;
        let v = tree.vertex_mut(id);
        v.loc = loc;
        v.creases = creases;
        v.owner = owner;
        Ok(())
    }

    fn read_crease_v4(&mut self, tree: &mut Tree, id: CreaseId) -> IoResult<()> {
        self.s.expect_tag(super::CREASE_TAG)?;
        let kind = crease_kind_from_int(self.s.int()?)?;
        let vertices = self.vertex_array()?;
        let owner = self.crease_owner()?;
        let c = tree.crease_mut(id);
        c.kind = kind;
        c.vertices = vertices;
        c.owner = owner;
        Ok(())
    }

    fn read_v4(&mut self, tree: &mut Tree) -> IoResult<usize> {
        self.read_header(tree)?;

        self.counts = Counts {
            nodes: self.s.size()?,
            edges: self.s.size()?,
            paths: self.s.size()?,
            polys: self.s.size()?,
            vertices: self.s.size()?,
            creases: self.s.size()?,
            facets: 0,
        };
        let num_conditions = self.s.size()?;
        self.make_blanks(tree);

        for i in 0..self.counts.nodes {
            self.read_node_v4(tree, NodeId(i))?;
        }
        for i in 0..self.counts.edges {
            self.read_edge_v5(tree, EdgeId(i), true)?;
        }
        for i in 0..self.counts.paths {
            self.read_path_v4(tree, PathId(i))?;
        }
        for i in 0..self.counts.polys {
            self.read_poly_v4(tree, PolyId(i))?;
        }
        for i in 0..self.counts.vertices {
            self.read_vertex_v4(tree, VertexId(i))?;
        }
        for i in 0..self.counts.creases {
            self.read_crease_v4(tree, CreaseId(i))?;
        }

        let mut skipped = 0;
        for i in 0..num_conditions {
            let tag = self.s.tag()?;
            if CONDITION_TAGS.contains(&tag.as_str()) {
                let _num_lines = self.s.size()?;
                let kind = self.read_condition_body(tree, &tag)?;
                let mut c = Condition::new(kind);
                c.index = i + 1;
                tree.conditions.insert(c);
            } else if PART_TAGS.contains(&tag.as_str()) {
                return Err(IoError::BadTag(tag));
            } else {
                let num_lines = self.s.size()?;
                for _ in 0..num_lines {
                    self.s.token()?;
                }
                skipped += 1;
            }
        }

        tree.owned_nodes = self.node_array()?;
        tree.owned_edges = self.edge_array()?;
        tree.owned_paths = self.path_array()?;
        tree.owned_polys = self.poly_array()?;
        Ok(skipped)
    }

    fn read_node_v3(&mut self, tree: &mut Tree, id: NodeId) -> IoResult<()> {
        self.s.expect_tag(super::NODE_TAG)?;
        let index = self.s.size()?;
        let label = self.s.line_string()?;
        let loc = self.s.point()?;

        // The inline constraint fields of a v3 node become conditions.
        let is_symmetric = self.s.boolean()?;
        if is_symmetric {
            tree.conditions
                .insert(Condition::new(ConditionKind::NodeSymmetric { node: id }));
        }

        let is_paired = self.s.boolean()?;
        let pair_index = self.s.size()?;
        // Create the pair condition once, from the higher-indexed node, by
        // which time the partner has been read in.
        if is_paired && index > pair_index {
            let partner = resolve(pair_index, self.counts.nodes)?
                .map(NodeId)
                .ok_or_else(|| IoError::BadToken("paired with node 0".into()))?;
            tree.conditions.insert(Condition::new(ConditionKind::NodesPaired {
                node1: id,
                node2: partner,
            }));
        }

        let x_fixed = self.s.boolean()?;
        let y_fixed = self.s.boolean()?;
        let x_fix_value = self.s.float()?;
        let y_fix_value = self.s.float()?;
        if x_fixed || y_fixed {
            tree.conditions.insert(Condition::new(ConditionKind::NodeFixed {
                node: id,
                x_fixed,
                x_fix_value: if x_fixed { x_fix_value } else { 0.0 },
                y_fixed,
                y_fix_value: if y_fixed { y_fix_value } else { 0.0 },
            }));
        }

        let stick_to_edge = self.s.boolean()?;
        if stick_to_edge {
            tree.conditions
                .insert(Condition::new(ConditionKind::NodeOnEdge { node: id }));
        }

        let is_collinear = self.s.boolean()?;
        let collinear1 = self.s.size()?;
        let collinear2 = self.s.size()?;
        if is_collinear && index > collinear1 && index > collinear2 {
            let n2 = resolve(collinear1, self.counts.nodes)?
                .map(NodeId)
                .ok_or_else(|| IoError::BadToken("collinear with node 0".into()))?;
            let n3 = resolve(collinear2, self.counts.nodes)?
                .map(NodeId)
                .ok_or_else(|| IoError::BadToken("collinear with node 0".into()))?;
            tree.conditions
                .insert(Condition::new(ConditionKind::NodesCollinear {
                    node1: id,
                    node2: n2,
                    node3: n3,
                }));
        }

        let is_leaf = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_pinned = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let edges = self.edge_array()?;
        let leaf_paths = self.path_array()?;

        let n = tree.node_mut(id);
        n.index = index;
        n.label = label;
        n.loc = loc;
        n.is_leaf_node = is_leaf;
        n.is_border_node = is_border;
        n.is_pinned_node = is_pinned;
        n.is_polygon_node = is_polygon;
        n.edges = edges;
        n.leaf_paths = leaf_paths;
        n.owner = NodeOwner::Tree;
        Ok(())
    }

    fn read_edge_v3(&mut self, tree: &mut Tree, id: EdgeId) -> IoResult<()> {
        self.s.expect_tag(super::EDGE_TAG)?;
        let index = self.s.size()?;
        let label = self.s.line_string()?;
        let length = self.s.float()?;
        let is_pinned = self.s.boolean()?;
        let nodes = self.node_array()?;

        let e = tree.edge_mut(id);
        e.index = index;
        e.label = label;
        e.length = length;
        e.strain = 0.0;
        e.stiffness = 1.0;
        e.is_pinned_edge = is_pinned;
        e.nodes = nodes;
        Ok(())
    }

    fn read_path_v3(&mut self, tree: &mut Tree, id: PathId) -> IoResult<()> {
        self.s.expect_tag(super::PATH_TAG)?;
        let index = self.s.size()?;
        let min_tree_length = self.s.float()?;

        let fixed_length = self.s.boolean()?;
        let fixed_length_value = self.s.float()?;
        let fixed_angle = self.s.boolean()?;
        let fixed_angle_value = self.s.float()?;

        let is_leaf = self.s.boolean()?;
        let is_active = self.s.boolean()?;
        let is_border = self.s.boolean()?;
        let is_polygon = self.s.boolean()?;
        let _fwd = self.s.size()?;
        let _bkd = self.s.size()?;
        let nodes = self.node_array()?;
        let edges = self.edge_array()?;

        // A fixed length equal to the minimum length is an active-path
        // constraint; a fixed angle becomes an angle condition.
        if fixed_length && min_tree_length == fixed_length_value {
            tree.conditions.insert(Condition::new(ConditionKind::PathActive {
                path: id,
                node1: nodes[0],
                node2: *nodes.last().unwrap(),
            }));
        }
        if fixed_angle {
            tree.conditions
                .insert(Condition::new(ConditionKind::PathAngleFixed {
                    path: id,
                    node1: nodes[0],
                    node2: *nodes.last().unwrap(),
                    angle: fixed_angle_value,
                }));
        }

        let p = tree.path_mut(id);
        p.index = index;
        p.min_tree_length = min_tree_length;
        p.is_leaf_path = is_leaf;
        p.is_active_path = is_active;
        p.is_border_path = is_border;
        p.is_polygon_path = is_polygon;
        p.nodes = nodes;
        p.edges = edges;
        p.owner = PathOwner::Tree;
        Ok(())
    }

    fn read_v3(&mut self, tree: &mut Tree) -> IoResult<usize> {
        self.read_header(tree)?;

        self.counts.nodes = self.s.size()?;
        for _ in 0..self.counts.nodes {
            tree.nodes.insert(Node::new(NodeOwner::Tree, Vec2::zeros()));
        }
        self.counts.edges = self.s.size()?;
        for _ in 0..self.counts.edges {
            tree.edges.insert(blank_edge());
        }
        self.counts.paths = self.s.size()?;
        for _ in 0..self.counts.paths {
            tree.paths.insert(Path::new(PathOwner::Tree));
        }
        // The poly records of a v3 document are obsolete; only the count is
        // part of the surviving format.
        let _num_polys = self.s.size()?;

        for i in 0..self.counts.nodes {
            self.read_node_v3(tree, NodeId(i))?;
        }
        for i in 0..self.counts.edges {
            self.read_edge_v3(tree, EdgeId(i))?;
        }
        for i in 0..self.counts.paths {
            self.read_path_v3(tree, PathId(i))?;
        }

        tree.owned_nodes = tree.nodes.ids();
        tree.owned_edges = tree.edges.ids();
        tree.owned_paths = tree.paths.ids();
        Ok(0)
    }
}

fn blank_edge() -> Edge {
    Edge {
        index: 0,
        label: String::new(),
        length: 0.0,
        strain: 0.0,
        stiffness: 1.0,
        is_pinned_edge: false,
        is_conditioned_edge: false,
        nodes: Vec::new(),
    }
}

fn blank_vertex() -> Vertex {
    Vertex::new(VertexOwner::Node(NodeId(0)), Vec2::zeros(), 0.0, false, None)
}

fn blank_crease() -> Crease {
    Crease {
        index: 0,
        kind: CreaseKind::Axial,
        vertices: Vec::new(),
        fwd_facet: None,
        bkd_facet: None,
        fold: Fold::Flat,
        cc_flag: NetFlag::Ineligible,
        st_flag: NetFlag::Ineligible,
        owner: CreaseOwner::Path(PathId(0)),
    }
}

fn read_impl(text: &str) -> IoResult<(Tree, usize)> {
    let mut parser = Parser {
        s: Scanner::new(text),
        counts: Counts::default(),
    };

    let tag = parser.s.token().map_err(|_| {
        IoError::BadTreeTag("<end of input>".into())
    })?;
    if tag != TREE_TAG {
        return Err(IoError::BadTreeTag(tag));
    }
    let version = parser.s.token()?;

    let mut tree = Tree::new();
    let skipped = match version.as_str() {
        "5.0" => parser.read_v5(&mut tree)?,
        "4.0" => {
            let skipped = parser.read_v4(&mut tree)?;
            // The v5 molecule carries fields a v4 document never stored;
            // drop its polys and crease pattern and recompute the rest.
            tree.with_cleanup(|t| t.kill_polys_and_crease_pattern_inner());
            skipped
        }
        "3.0" => {
            let skipped = parser.read_v3(&mut tree)?;
            tree.with_cleanup(|_| ());
            skipped
        }
        _ => return Err(IoError::BadTreeVersion(version)),
    };
    Ok((tree, skipped))
}

/// Parse a document, replacing `tree`'s contents. On failure the tree is
/// left blank — except for unknown condition tags, which load everything
/// else and then report the skipped count.
pub fn read_from_string(tree: &mut Tree, text: &str) -> Result<()> {
    match read_impl(text) {
        Ok((new_tree, 0)) => {
            *tree = new_tree;
            Ok(())
        }
        Ok((new_tree, skipped)) => {
            *tree = new_tree;
            Err(Error::Io(IoError::UnrecognizedConditions(skipped)))
        }
        Err(e) => {
            *tree = Tree::new();
            Err(Error::Io(e))
        }
    }
}

/// Read a document from a stream.
pub fn read<R: BufRead>(tree: &mut Tree, mut input: R) -> Result<()> {
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .map_err(IoError::Stream)?;
    read_from_string(tree, &text)
}
