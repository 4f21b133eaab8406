//! The tree model: nodes, edges, paths, polygons, and the crease pattern
//! derived from them.
//!
//! [`Tree`] owns one arena per part kind and is the only way to create or
//! destroy parts. Editing goes through the methods in [`edit`]; every public
//! mutation runs under the cleanup guard so that
//! [`Tree::cleanup_after_edit`] executes exactly once per outermost edit.

pub mod arena;
pub mod cleanup;
pub mod conditions;
pub mod cp;
pub mod edit;
pub mod facet_order;
pub mod molecule;
pub mod parts;
pub mod status;
pub mod test_trees;

#[cfg(test)]
mod tests;

use crate::geom::{self, Vec2};
pub use arena::{
    Arena, ConditionId, CreaseId, EdgeId, FacetId, NodeId, PartId, PathId, PolyId, VertexId,
};
use conditions::Condition;
pub use parts::{
    Crease, CreaseKind, CreaseOwner, Edge, Facet, FacetColor, Fold, Node, NodeOwner, Path,
    PathOwner, Poly, PolyOwner, Vertex, VertexOwner,
};

/// Owner handle for parts that can belong to either the tree or a poly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeOrPoly {
    Tree,
    Poly(PolyId),
}

/// The complete mathematical model: the metric tree, its embedding in the
/// paper, and (when valid) the crease pattern built over it.
pub struct Tree {
    pub(crate) paper_width: f64,
    pub(crate) paper_height: f64,
    pub(crate) scale: f64,
    pub(crate) has_symmetry: bool,
    pub(crate) sym_loc: Vec2,
    /// Symmetry line angle in degrees.
    pub(crate) sym_angle: f64,

    pub(crate) is_feasible: bool,
    pub(crate) is_polygon_valid: bool,
    pub(crate) is_polygon_filled: bool,
    pub(crate) is_vertex_depth_valid: bool,
    pub(crate) is_facet_data_valid: bool,
    pub(crate) is_local_root_connectable: bool,
    pub(crate) needs_cleanup: bool,

    pub(crate) nodes: Arena<NodeId, Node>,
    pub(crate) edges: Arena<EdgeId, Edge>,
    pub(crate) paths: Arena<PathId, Path>,
    pub(crate) polys: Arena<PolyId, Poly>,
    pub(crate) vertices: Arena<VertexId, Vertex>,
    pub(crate) creases: Arena<CreaseId, Crease>,
    pub(crate) facets: Arena<FacetId, Facet>,
    pub(crate) conditions: Arena<ConditionId, Condition>,

    // Tree-owned parts in creation order; poly-owned parts live in the
    // polys' own lists.
    pub(crate) owned_nodes: Vec<NodeId>,
    pub(crate) owned_edges: Vec<EdgeId>,
    pub(crate) owned_paths: Vec<PathId>,
    pub(crate) owned_polys: Vec<PolyId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            paper_width: 1.0,
            paper_height: 1.0,
            scale: 0.2,
            has_symmetry: false,
            sym_loc: Vec2::new(0.5, 0.5),
            sym_angle: 90.0,
            is_feasible: false,
            is_polygon_valid: false,
            is_polygon_filled: false,
            is_vertex_depth_valid: false,
            is_facet_data_valid: false,
            is_local_root_connectable: false,
            needs_cleanup: false,
            nodes: Arena::new(),
            edges: Arena::new(),
            paths: Arena::new(),
            polys: Arena::new(),
            vertices: Arena::new(),
            creases: Arena::new(),
            facets: Arena::new(),
            conditions: Arena::new(),
            owned_nodes: Vec::new(),
            owned_edges: Vec::new(),
            owned_paths: Vec::new(),
            owned_polys: Vec::new(),
        }
    }

    // ---- dimensions, symmetry, flags -------------------------------------

    pub fn paper_width(&self) -> f64 {
        self.paper_width
    }

    pub fn paper_height(&self) -> f64 {
        self.paper_height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn has_symmetry(&self) -> bool {
        self.has_symmetry
    }

    pub fn sym_loc(&self) -> Vec2 {
        self.sym_loc
    }

    pub fn sym_angle(&self) -> f64 {
        self.sym_angle
    }

    /// Unit direction of the symmetry line.
    pub fn sym_dir(&self) -> Vec2 {
        let a = self.sym_angle.to_radians();
        Vec2::new(a.cos(), a.sin())
    }

    pub fn set_paper_width(&mut self, width: f64) {
        if self.paper_width == width {
            return;
        }
        self.with_cleanup(|t| t.paper_width = width);
    }

    pub fn set_paper_height(&mut self, height: f64) {
        if self.paper_height == height {
            return;
        }
        self.with_cleanup(|t| t.paper_height = height);
    }

    pub fn set_scale(&mut self, scale: f64) {
        if self.scale == scale {
            return;
        }
        self.with_cleanup(|t| t.scale = scale);
    }

    pub fn set_has_symmetry(&mut self, has_symmetry: bool) {
        if self.has_symmetry == has_symmetry {
            return;
        }
        self.with_cleanup(|t| t.has_symmetry = has_symmetry);
    }

    pub fn set_symmetry(&mut self, loc: Vec2, angle_deg: f64) {
        if self.has_symmetry && self.sym_loc == loc && self.sym_angle == angle_deg {
            return;
        }
        self.with_cleanup(|t| {
            t.has_symmetry = true;
            t.sym_loc = loc;
            t.sym_angle = angle_deg;
        });
    }

    pub fn is_feasible(&self) -> bool {
        self.is_feasible
    }

    pub fn is_polygon_valid(&self) -> bool {
        self.is_polygon_valid
    }

    pub fn is_polygon_filled(&self) -> bool {
        self.is_polygon_filled
    }

    pub fn is_vertex_depth_valid(&self) -> bool {
        self.is_vertex_depth_valid
    }

    pub fn is_facet_data_valid(&self) -> bool {
        self.is_facet_data_valid
    }

    pub fn is_local_root_connectable(&self) -> bool {
        self.is_local_root_connectable
    }

    // ---- part access -----------------------------------------------------

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id).expect("stale node id")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id).expect("stale node id")
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        self.edges.get(id).expect("stale edge id")
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.edges.get_mut(id).expect("stale edge id")
    }

    pub fn path(&self, id: PathId) -> &Path {
        self.paths.get(id).expect("stale path id")
    }

    pub fn path_mut(&mut self, id: PathId) -> &mut Path {
        self.paths.get_mut(id).expect("stale path id")
    }

    pub fn poly(&self, id: PolyId) -> &Poly {
        self.polys.get(id).expect("stale poly id")
    }

    pub fn poly_mut(&mut self, id: PolyId) -> &mut Poly {
        self.polys.get_mut(id).expect("stale poly id")
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        self.vertices.get(id).expect("stale vertex id")
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        self.vertices.get_mut(id).expect("stale vertex id")
    }

    pub fn crease(&self, id: CreaseId) -> &Crease {
        self.creases.get(id).expect("stale crease id")
    }

    pub fn crease_mut(&mut self, id: CreaseId) -> &mut Crease {
        self.creases.get_mut(id).expect("stale crease id")
    }

    pub fn facet(&self, id: FacetId) -> &Facet {
        self.facets.get(id).expect("stale facet id")
    }

    pub fn facet_mut(&mut self, id: FacetId) -> &mut Facet {
        self.facets.get_mut(id).expect("stale facet id")
    }

    pub fn condition(&self, id: ConditionId) -> &Condition {
        self.conditions.get(id).expect("stale condition id")
    }

    pub fn condition_mut(&mut self, id: ConditionId) -> &mut Condition {
        self.conditions.get_mut(id).expect("stale condition id")
    }

    pub fn owned_nodes(&self) -> &[NodeId] {
        &self.owned_nodes
    }

    pub fn owned_edges(&self) -> &[EdgeId] {
        &self.owned_edges
    }

    pub fn owned_paths(&self) -> &[PathId] {
        &self.owned_paths
    }

    pub fn owned_polys(&self) -> &[PolyId] {
        &self.owned_polys
    }

    pub fn num_all_parts(&self) -> usize {
        self.nodes.len()
            + self.edges.len()
            + self.paths.len()
            + self.polys.len()
            + self.vertices.len()
            + self.creases.len()
            + self.facets.len()
            + self.conditions.len()
    }

    // ---- the cleanup guard ----------------------------------------------

    /// Run `f` with cleanup deferred to the end of the outermost guarded
    /// scope. Nested calls run their closure directly; only the outermost
    /// call triggers [`Tree::cleanup_after_edit`].
    pub(crate) fn with_cleanup<R>(&mut self, f: impl FnOnce(&mut Tree) -> R) -> R {
        if self.needs_cleanup {
            return f(self);
        }
        self.needs_cleanup = true;
        let result = f(self);
        self.cleanup_after_edit();
        self.needs_cleanup = false;
        result
    }

    // ---- part creation ---------------------------------------------------

    pub(crate) fn make_node(&mut self, owner: NodeOwner, loc: Vec2) -> NodeId {
        let id = self.nodes.insert(Node::new(owner, loc));
        self.node_mut(id).index = self.nodes.len();
        match owner {
            NodeOwner::Tree => self.owned_nodes.push(id),
            NodeOwner::Poly(p) => self.poly_mut(p).owned_nodes.push(id),
        }
        id
    }

    pub(crate) fn make_edge(&mut self, node1: NodeId, node2: NodeId, length: f64) -> EdgeId {
        let id = self.edges.insert(Edge::new(node1, node2, length));
        self.edge_mut(id).index = self.edges.len();
        self.owned_edges.push(id);
        self.node_mut(node1).edges.push(id);
        self.node_mut(node2).edges.push(id);
        id
    }

    /// Register a fully-initialized path with the tree and its owner.
    pub(crate) fn make_path(&mut self, path: Path) -> PathId {
        let owner = path.owner;
        let id = self.paths.insert(path);
        self.path_mut(id).index = self.paths.len();
        match owner {
            PathOwner::Tree => self.owned_paths.push(id),
            PathOwner::Poly(p) => self.poly_mut(p).owned_paths.push(id),
        }
        id
    }

    /// A sub-path between two nodes, owned by a poly; used for spokes,
    /// ridges, and inset paths.
    pub(crate) fn make_sub_path(&mut self, owner: PolyId, n1: NodeId, n2: NodeId) -> PathId {
        let mut path = Path::new(PathOwner::Poly(owner));
        path.is_sub_path = true;
        path.nodes = vec![n1, n2];
        self.make_path(path)
    }

    pub(crate) fn make_poly(&mut self, owner: PolyOwner) -> PolyId {
        let id = self.polys.insert(Poly::new(owner));
        self.poly_mut(id).index = self.polys.len();
        match owner {
            PolyOwner::Tree => self.owned_polys.push(id),
            PolyOwner::Poly(p) => self.poly_mut(p).owned_polys.push(id),
        }
        id
    }

    pub(crate) fn make_vertex(
        &mut self,
        owner: VertexOwner,
        loc: Vec2,
        elevation: f64,
        is_border: bool,
        tree_node: Option<NodeId>,
    ) -> VertexId {
        let id = self
            .vertices
            .insert(Vertex::new(owner, loc, elevation, is_border, tree_node));
        self.vertex_mut(id).index = self.vertices.len();
        match owner {
            VertexOwner::Node(n) => self.node_mut(n).owned_vertices.push(id),
            VertexOwner::Path(p) => self.path_mut(p).owned_vertices.push(id),
        }
        id
    }

    pub(crate) fn make_crease(
        &mut self,
        owner: CreaseOwner,
        v1: VertexId,
        v2: VertexId,
        kind: CreaseKind,
    ) -> CreaseId {
        let id = self.creases.insert(Crease::new(owner, v1, v2, kind));
        self.crease_mut(id).index = self.creases.len();
        match owner {
            CreaseOwner::Path(p) => self.path_mut(p).owned_creases.push(id),
            CreaseOwner::Poly(p) => self.poly_mut(p).owned_creases.push(id),
        }
        self.vertex_mut(v1).creases.push(id);
        self.vertex_mut(v2).creases.push(id);
        id
    }

    pub(crate) fn make_facet(&mut self, owner: PolyId) -> FacetId {
        let id = self.facets.insert(Facet::new(owner));
        self.facet_mut(id).index = self.facets.len();
        self.poly_mut(owner).owned_facets.push(id);
        id
    }

    pub(crate) fn add_condition(&mut self, condition: Condition) -> ConditionId {
        let id = self.conditions.insert(condition);
        self.condition_mut(id).index = self.conditions.len();
        id
    }

    // ---- part deletion ---------------------------------------------------
    //
    // Deleting a part tombstones its arena slot and scrubs every reference
    // held elsewhere in the model, so no pass ever observes a dangling id.

    pub(crate) fn delete_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        for v in node.owned_vertices.clone() {
            self.delete_vertex(v);
        }
        match node.owner {
            NodeOwner::Tree => self.owned_nodes.retain(|&n| n != id),
            NodeOwner::Poly(p) => {
                if let Some(poly) = self.polys.get_mut(p) {
                    poly.owned_nodes.retain(|&n| n != id);
                }
            }
        }
        for (_, e) in self.edges.iter_mut() {
            e.nodes.retain(|&n| n != id);
        }
        for (_, p) in self.paths.iter_mut() {
            p.nodes.retain(|&n| n != id);
        }
        for (_, p) in self.polys.iter_mut() {
            p.ring_nodes.retain(|&n| n != id);
            p.inset_nodes.retain(|&n| n != id);
        }
        for (_, v) in self.vertices.iter_mut() {
            if v.tree_node == Some(id) {
                v.tree_node = None;
            }
        }
    }

    pub(crate) fn delete_edge(&mut self, id: EdgeId) {
        if self.edges.remove(id).is_none() {
            return;
        }
        self.owned_edges.retain(|&e| e != id);
        for (_, n) in self.nodes.iter_mut() {
            n.edges.retain(|&e| e != id);
        }
        for (_, p) in self.paths.iter_mut() {
            p.edges.retain(|&e| e != id);
        }
        for (_, f) in self.facets.iter_mut() {
            if f.corridor_edge == Some(id) {
                f.corridor_edge = None;
            }
        }
    }

    pub(crate) fn delete_path(&mut self, id: PathId) {
        let Some(path) = self.paths.remove(id) else {
            return;
        };
        // A dying path takes its attached polys down with it; much of the
        // model relies on this cascade.
        if let Some(p) = path.fwd_poly {
            self.delete_poly(p);
        }
        if let Some(p) = path.bkd_poly {
            self.delete_poly(p);
        }
        for v in path.owned_vertices.clone() {
            self.delete_vertex(v);
        }
        for c in path.owned_creases.clone() {
            self.delete_crease(c);
        }
        match path.owner {
            PathOwner::Tree => self.owned_paths.retain(|&p| p != id),
            PathOwner::Poly(p) => {
                if let Some(poly) = self.polys.get_mut(p) {
                    poly.owned_paths.retain(|&x| x != id);
                }
            }
        }
        for (_, n) in self.nodes.iter_mut() {
            n.leaf_paths.retain(|&p| p != id);
        }
        for (_, p) in self.polys.iter_mut() {
            p.ring_paths.retain(|&x| x != id);
            p.cross_paths.retain(|&x| x != id);
            p.spoke_paths.retain(|&x| x != id);
            if p.ridge_path == Some(id) {
                p.ridge_path = None;
            }
        }
        for (_, p) in self.paths.iter_mut() {
            if p.outset_path == Some(id) {
                p.outset_path = None;
            }
        }
    }

    pub(crate) fn delete_poly(&mut self, id: PolyId) {
        let Some(poly) = self.polys.remove(id) else {
            return;
        };
        // Sub-polys first: their deletion scrubs references into the lists
        // we are about to drain.
        for p in poly.owned_polys.clone() {
            self.delete_poly(p);
        }
        for f in poly.owned_facets.clone() {
            self.delete_facet(f);
        }
        for c in poly.owned_creases.clone() {
            self.delete_crease(c);
        }
        for p in poly.owned_paths.clone() {
            self.delete_path(p);
        }
        for n in poly.owned_nodes.clone() {
            self.delete_node(n);
        }
        match poly.owner {
            PolyOwner::Tree => self.owned_polys.retain(|&p| p != id),
            PolyOwner::Poly(p) => {
                if let Some(parent) = self.polys.get_mut(p) {
                    parent.owned_polys.retain(|&x| x != id);
                }
            }
        }
        for (_, p) in self.paths.iter_mut() {
            if p.fwd_poly == Some(id) {
                p.fwd_poly = None;
            }
            if p.bkd_poly == Some(id) {
                p.bkd_poly = None;
            }
        }
    }

    pub(crate) fn delete_vertex(&mut self, id: VertexId) {
        let Some(vertex) = self.vertices.remove(id) else {
            return;
        };
        match vertex.owner {
            VertexOwner::Node(n) => {
                if let Some(node) = self.nodes.get_mut(n) {
                    node.owned_vertices.retain(|&v| v != id);
                }
            }
            VertexOwner::Path(p) => {
                if let Some(path) = self.paths.get_mut(p) {
                    path.owned_vertices.retain(|&v| v != id);
                }
            }
        }
        for (_, c) in self.creases.iter_mut() {
            c.vertices.retain(|&v| v != id);
        }
        for (_, v) in self.vertices.iter_mut() {
            if v.left_pseudohinge_mate == Some(id) {
                v.left_pseudohinge_mate = None;
            }
            if v.right_pseudohinge_mate == Some(id) {
                v.right_pseudohinge_mate = None;
            }
        }
        for (_, p) in self.polys.iter_mut() {
            p.local_root_vertices.retain(|&v| v != id);
        }
        for (_, f) in self.facets.iter_mut() {
            f.vertices.retain(|&v| v != id);
        }
    }

    pub(crate) fn delete_crease(&mut self, id: CreaseId) {
        let Some(crease) = self.creases.remove(id) else {
            return;
        };
        match crease.owner {
            CreaseOwner::Path(p) => {
                if let Some(path) = self.paths.get_mut(p) {
                    path.owned_creases.retain(|&c| c != id);
                }
            }
            CreaseOwner::Poly(p) => {
                if let Some(poly) = self.polys.get_mut(p) {
                    poly.owned_creases.retain(|&c| c != id);
                }
            }
        }
        for (_, v) in self.vertices.iter_mut() {
            v.creases.retain(|&c| c != id);
        }
        for (_, p) in self.polys.iter_mut() {
            p.local_root_creases.retain(|&c| c != id);
        }
        for (_, f) in self.facets.iter_mut() {
            f.creases.retain(|&c| c != id);
        }
    }

    pub(crate) fn delete_facet(&mut self, id: FacetId) {
        let Some(facet) = self.facets.remove(id) else {
            return;
        };
        if let Some(poly) = self.polys.get_mut(facet.owner) {
            poly.owned_facets.retain(|&f| f != id);
        }
        for (_, c) in self.creases.iter_mut() {
            if c.fwd_facet == Some(id) {
                c.fwd_facet = None;
            }
            if c.bkd_facet == Some(id) {
                c.bkd_facet = None;
            }
        }
        for (_, f) in self.facets.iter_mut() {
            f.head_facets.retain(|&x| x != id);
            f.tail_facets.retain(|&x| x != id);
        }
    }

    pub(crate) fn delete_condition(&mut self, id: ConditionId) {
        self.conditions.remove(id);
    }

    // ---- queries ---------------------------------------------------------

    /// The root node: the tree node with index 1.
    pub fn root_node(&self) -> NodeId {
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_tree_node())
            .min_by_key(|(_, n)| n.index)
            .map(|(id, _)| id)
            .expect("tree has no nodes")
    }

    /// The tree edge joining two nodes, if one exists.
    pub fn get_edge(&self, node1: NodeId, node2: NodeId) -> Option<EdgeId> {
        for &e in &self.node(node1).edges {
            let edge = self.edge(e);
            if edge.nodes.contains(&node2) {
                return Some(e);
            }
        }
        None
    }

    /// The path joining two tree nodes (leaf or branch). Searches every
    /// path, so prefer [`Tree::get_leaf_path`] when both ends are leaves.
    pub fn get_path(&self, node1: NodeId, node2: NodeId) -> PathId {
        for (id, p) in self.paths.iter() {
            if (p.front_node() == node1 && p.back_node() == node2)
                || (p.front_node() == node2 && p.back_node() == node1)
            {
                return id;
            }
        }
        panic!("no path between the two nodes");
    }

    /// The leaf path joining two leaf nodes, via the per-node cache.
    pub fn get_leaf_path(&self, leaf1: NodeId, leaf2: NodeId) -> PathId {
        self.find_leaf_path(leaf1, leaf2)
            .expect("no leaf path between the two nodes")
    }

    /// Like [`Tree::get_leaf_path`] but tolerant of absence. Also used with
    /// inset sub-nodes, whose inset paths live in the same cache.
    pub fn find_leaf_path(&self, node1: NodeId, node2: NodeId) -> Option<PathId> {
        for &p in &self.node(node1).leaf_paths {
            if self.path(p).other_node(node1) == node2 {
                return Some(p);
            }
        }
        None
    }

    /// The path owned by `owner` joining the two nodes, in either direction.
    pub(crate) fn find_any_path(
        &self,
        owner: TreeOrPoly,
        node1: NodeId,
        node2: NodeId,
    ) -> Option<PathId> {
        let list = match owner {
            TreeOrPoly::Tree => &self.owned_paths,
            TreeOrPoly::Poly(p) => &self.poly(p).owned_paths,
        };
        list.iter()
            .copied()
            .find(|&p| {
                let path = self.path(p);
                (path.front_node() == node1 && path.back_node() == node2)
                    || (path.front_node() == node2 && path.back_node() == node1)
            })
    }

    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.owned_nodes
            .iter()
            .copied()
            .filter(|&n| self.node(n).is_leaf_node)
            .collect()
    }

    pub fn border_nodes(&self) -> Vec<NodeId> {
        self.owned_nodes
            .iter()
            .copied()
            .filter(|&n| self.node(n).is_border_node)
            .collect()
    }

    pub fn leaf_paths(&self) -> Vec<PathId> {
        self.owned_paths
            .iter()
            .copied()
            .filter(|&p| self.path(p).is_leaf_path)
            .collect()
    }

    pub fn num_leaf_nodes(&self) -> usize {
        self.leaf_nodes().len()
    }

    /// Edges of the minimal subtree spanning the given nodes.
    pub fn spanning_edges(&self, node_list: &[NodeId]) -> Vec<EdgeId> {
        let mut edges = Vec::new();
        for (_, p) in self.paths.iter() {
            if node_list.contains(&p.front_node()) && node_list.contains(&p.back_node()) {
                for &e in &p.edges {
                    if !edges.contains(&e) {
                        edges.push(e);
                    }
                }
            }
        }
        edges
    }

    /// Paths spanned by the minimal subtree over the given nodes.
    pub fn spanning_paths(&self, node_list: &[NodeId]) -> Vec<PathId> {
        let mut paths = Vec::new();
        for (id, p) in self.paths.iter() {
            if node_list.contains(&p.front_node())
                && node_list.contains(&p.back_node())
                && !paths.contains(&id)
            {
                paths.push(id);
            }
        }
        paths
    }

    pub fn filter_leaf_nodes(&self, nodes: &mut Vec<NodeId>) {
        nodes.retain(|&n| self.node(n).is_leaf_node);
    }

    /// Keep only the parts allowed to move in an edge or strain
    /// optimization: unpinned leaf nodes, and unpinned edges without a
    /// length-fixing condition.
    pub fn filter_movable_parts(&self, nodes: &mut Vec<NodeId>, edges: &mut Vec<EdgeId>) {
        nodes.retain(|&n| {
            let node = self.node(n);
            node.is_leaf_node && !node.is_pinned_node
        });
        edges.retain(|&e| {
            !self.edge(e).is_pinned_edge && !self.has_edge_length_fixed_condition(e)
        });
    }

    /// Count movable nodes and edges.
    pub fn num_movable_parts(&self) -> (usize, usize) {
        let num_nodes = self
            .owned_nodes
            .iter()
            .filter(|&&n| {
                let node = self.node(n);
                node.is_leaf_node && !node.is_pinned_node
            })
            .count();
        let num_edges = self
            .owned_edges
            .iter()
            .filter(|&&e| !self.edge(e).is_pinned_edge && !self.has_edge_length_fixed_condition(e))
            .count();
        (num_nodes, num_edges)
    }

    pub fn has_redundant_nodes(&self) -> bool {
        self.owned_nodes.iter().any(|&n| self.node(n).is_redundant())
    }

    pub fn has_strained_edges(&self) -> bool {
        self.owned_edges.iter().any(|&e| self.edge(e).strain != 0.0)
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn has_node_conditions(&self) -> bool {
        self.conditions.iter().any(|(_, c)| c.is_node_condition())
    }

    pub fn has_edge_conditions(&self) -> bool {
        self.conditions.iter().any(|(_, c)| c.is_edge_condition())
    }

    pub fn has_path_conditions(&self) -> bool {
        self.conditions.iter().any(|(_, c)| c.is_path_condition())
    }

    /// True if any top-level poly has four or more sides.
    pub fn has_non_triangle_poly(&self) -> bool {
        self.owned_polys.iter().any(|&p| self.poly(p).size() >= 4)
    }

    /// The crease shared by two facets, if any. Checks the creases around
    /// the first facet only.
    pub fn get_crease(&self, facet1: FacetId, facet2: FacetId) -> Option<CreaseId> {
        self.facet(facet1)
            .creases
            .iter()
            .copied()
            .find(|&c| self.facet(facet2).creases.contains(&c))
    }

    /// True once corridor information is available for facet queries.
    pub fn can_get_corridor_facets(&self) -> bool {
        self.is_facet_data_valid
    }

    /// Facets whose corridor belongs to one of the given edges.
    pub fn corridor_facets(&self, edge_list: &[EdgeId]) -> Vec<FacetId> {
        debug_assert!(self.can_get_corridor_facets());
        self.facets
            .iter()
            .filter(|(_, f)| f.corridor_edge.map_or(false, |e| edge_list.contains(&e)))
            .map(|(id, _)| id)
            .collect()
    }

    pub(crate) fn has_edge_length_fixed_condition(&self, edge: EdgeId) -> bool {
        self.conditions
            .iter()
            .any(|(_, c)| c.fixes_edge_length(edge))
    }

    pub(crate) fn has_active_path_condition(&self, path: PathId) -> bool {
        self.conditions
            .iter()
            .any(|(_, c)| c.makes_path_active(path))
    }

    // ---- geometric helpers on parts --------------------------------------

    /// Paper-plane vector of a path, front to back.
    pub fn path_vector(&self, path: PathId) -> Vec2 {
        let p = self.path(path);
        self.node(p.back_node()).loc - self.node(p.front_node()).loc
    }

    /// Angle of a path in degrees, in [-180, 180].
    pub fn path_angle(&self, path: PathId) -> f64 {
        geom::angle(self.path_vector(path)).to_degrees()
    }

    /// Angle of a path folded into [0, 180).
    pub fn path_positive_angle(&self, path: PathId) -> f64 {
        let a = self.path_angle(path);
        if a >= 0.0 {
            a
        } else {
            a + 180.0
        }
    }

    /// Hop count from the root to a tree node.
    pub fn discrete_depth(&self, node: NodeId) -> usize {
        debug_assert!(self.node(node).is_tree_node());
        let root = self.root_node();
        if root == node {
            return 0;
        }
        self.path(self.get_path(root, node)).edges.len()
    }
}
