//! The part structs that make up a tree: nodes, edges, paths, polys,
//! vertices, creases, and facets.
//!
//! Parts hold data and cross-references only; the algorithms that operate on
//! them live on [`crate::tree::Tree`], which owns the arenas. Cross-
//! references are typed ids; an id whose referent has been deleted
//! dereferences to `None` at the arena.

use crate::geom::Vec2;
use crate::tree::arena::{CreaseId, EdgeId, FacetId, NodeId, PathId, PolyId, VertexId};

/// Sentinel for an axis depth that has not been computed. Depths are
/// distances from the root and therefore nonnegative.
pub const DEPTH_NOT_SET: f64 = -1.0;

/// Sentinel for an uncomputed discrete (hop-count) depth.
pub const DISCRETE_DEPTH_NOT_SET: usize = usize::MAX;

/// Sentinel for an unassigned facet order value.
pub const ORDER_NOT_SET: usize = usize::MAX;

/// Longest storable part label.
pub const MAX_LABEL_LEN: usize = 31;

/// Owner of a node: the tree itself (tree nodes) or the poly that inset it
/// into existence (sub-nodes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeOwner {
    Tree,
    Poly(PolyId),
}

/// Owner of a path: the tree (tree paths) or a poly (inset and spoke
/// sub-paths).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathOwner {
    Tree,
    Poly(PolyId),
}

/// Owner of a poly: the tree (top-level polys) or an enclosing poly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolyOwner {
    Tree,
    Poly(PolyId),
}

/// Owner of a vertex: the node it coincides with, or the path it sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexOwner {
    Node(NodeId),
    Path(PathId),
}

/// Owner of a crease: the path it runs along (axial and gusset creases) or
/// the poly it crosses (ridges, hinges, pseudohinges).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreaseOwner {
    Path(PathId),
    Poly(PolyId),
}

/// Membership flag used while building local-root networks and their
/// spanning trees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NetFlag {
    #[default]
    Ineligible,
    NotYet,
    Added,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub index: usize,
    pub label: String,
    pub loc: Vec2,
    pub depth: f64,
    pub elevation: f64,
    pub is_leaf_node: bool,
    pub is_sub_node: bool,
    pub is_border_node: bool,
    pub is_pinned_node: bool,
    pub is_polygon_node: bool,
    pub is_junction_node: bool,
    pub is_conditioned_node: bool,
    pub edges: Vec<EdgeId>,
    pub leaf_paths: Vec<PathId>,
    pub owned_vertices: Vec<VertexId>,
    pub owner: NodeOwner,
}

impl Node {
    pub fn new(owner: NodeOwner, loc: Vec2) -> Self {
        Self {
            index: 0,
            label: String::new(),
            loc,
            depth: DEPTH_NOT_SET,
            elevation: 0.0,
            is_leaf_node: false,
            is_sub_node: !matches!(owner, NodeOwner::Tree),
            is_border_node: false,
            is_pinned_node: false,
            is_polygon_node: false,
            is_junction_node: false,
            is_conditioned_node: false,
            edges: Vec::new(),
            leaf_paths: Vec::new(),
            owned_vertices: Vec::new(),
            owner,
        }
    }

    pub fn is_tree_node(&self) -> bool {
        !self.is_sub_node
    }

    pub fn is_branch_node(&self) -> bool {
        self.is_tree_node() && !self.is_leaf_node
    }

    /// A node joining exactly two edges contributes nothing to the tree
    /// metric and can be absorbed.
    pub fn is_redundant(&self) -> bool {
        self.edges.len() == 2
    }

    /// The vertex projected onto this node, if it has been built.
    pub fn vertex(&self) -> Option<VertexId> {
        self.owned_vertices.first().copied()
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub index: usize,
    pub label: String,
    pub length: f64,
    pub strain: f64,
    pub stiffness: f64,
    pub is_pinned_edge: bool,
    pub is_conditioned_edge: bool,
    pub nodes: Vec<NodeId>,
}

impl Edge {
    pub fn new(node1: NodeId, node2: NodeId, length: f64) -> Self {
        Self {
            index: 0,
            label: String::new(),
            length,
            strain: 0.0,
            stiffness: 1.0,
            is_pinned_edge: false,
            is_conditioned_edge: false,
            nodes: vec![node1, node2],
        }
    }

    /// Length including strain, in tree units.
    pub fn strained_length(&self) -> f64 {
        self.length * (1.0 + self.strain)
    }

    /// Length including strain, scaled to paper units.
    pub fn strained_scaled_length(&self, scale: f64) -> f64 {
        self.strained_length() * scale
    }

    pub fn other_node(&self, node: NodeId) -> NodeId {
        debug_assert!(self.nodes.contains(&node));
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }
}

#[derive(Clone, Debug)]
pub struct Path {
    pub index: usize,
    pub min_tree_length: f64,
    pub min_paper_length: f64,
    pub act_tree_length: f64,
    pub act_paper_length: f64,
    pub is_leaf_path: bool,
    pub is_sub_path: bool,
    pub is_feasible_path: bool,
    pub is_active_path: bool,
    pub is_border_path: bool,
    pub is_polygon_path: bool,
    pub is_conditioned_path: bool,
    pub fwd_poly: Option<PolyId>,
    pub bkd_poly: Option<PolyId>,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub outset_path: Option<PathId>,
    pub front_reduction: f64,
    pub back_reduction: f64,
    pub min_depth: f64,
    pub min_depth_dist: f64,
    pub owned_vertices: Vec<VertexId>,
    pub owned_creases: Vec<CreaseId>,
    pub owner: PathOwner,
}

impl Path {
    pub fn new(owner: PathOwner) -> Self {
        Self {
            index: 0,
            min_tree_length: 0.0,
            min_paper_length: 0.0,
            act_tree_length: 0.0,
            act_paper_length: 0.0,
            is_leaf_path: false,
            is_sub_path: false,
            is_feasible_path: false,
            is_active_path: false,
            is_border_path: false,
            is_polygon_path: false,
            is_conditioned_path: false,
            fwd_poly: None,
            bkd_poly: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            outset_path: None,
            front_reduction: 0.0,
            back_reduction: 0.0,
            min_depth: DEPTH_NOT_SET,
            min_depth_dist: 0.0,
            owned_vertices: Vec::new(),
            owned_creases: Vec::new(),
            owner,
        }
    }

    pub fn front_node(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn back_node(&self) -> NodeId {
        *self.nodes.last().unwrap()
    }

    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.front_node() == node {
            self.back_node()
        } else {
            debug_assert_eq!(self.back_node(), node);
            self.front_node()
        }
    }

    pub fn starts_or_ends_with(&self, node: NodeId) -> bool {
        self.front_node() == node || self.back_node() == node
    }

    /// A path belonging to the tree proper, i.e. one along the tree's
    /// projection onto the paper.
    pub fn is_axial_path(&self) -> bool {
        !self.is_sub_path
    }

    pub fn is_active_axial_path(&self) -> bool {
        self.is_axial_path() && self.is_active_path
    }

    /// An active inset path: active, sub, and carrying a record of the path
    /// it was inset from.
    pub fn is_gusset_path(&self) -> bool {
        self.is_sub_path && self.is_active_path && self.outset_path.is_some()
    }

    pub fn is_tree_path(&self) -> bool {
        !self.is_sub_path
    }
}

#[derive(Clone, Debug)]
pub struct Poly {
    pub index: usize,
    pub centroid: Vec2,
    pub is_sub_poly: bool,
    pub ring_nodes: Vec<NodeId>,
    pub ring_paths: Vec<PathId>,
    pub cross_paths: Vec<PathId>,
    /// Ring-index -> inset node. Several ring corners may map to the same
    /// inset node.
    pub inset_nodes: Vec<NodeId>,
    pub spoke_paths: Vec<PathId>,
    pub ridge_path: Option<PathId>,
    /// Corner locations at construction time, used to detect movement.
    pub node_locs: Vec<Vec2>,
    pub local_root_vertices: Vec<VertexId>,
    pub local_root_creases: Vec<CreaseId>,
    pub owned_nodes: Vec<NodeId>,
    pub owned_paths: Vec<PathId>,
    pub owned_polys: Vec<PolyId>,
    pub owned_creases: Vec<CreaseId>,
    pub owned_facets: Vec<FacetId>,
    pub owner: PolyOwner,
}

impl Poly {
    pub fn new(owner: PolyOwner) -> Self {
        Self {
            index: 0,
            centroid: Vec2::zeros(),
            is_sub_poly: !matches!(owner, PolyOwner::Tree),
            ring_nodes: Vec::new(),
            ring_paths: Vec::new(),
            cross_paths: Vec::new(),
            inset_nodes: Vec::new(),
            spoke_paths: Vec::new(),
            ridge_path: None,
            node_locs: Vec::new(),
            local_root_vertices: Vec::new(),
            local_root_creases: Vec::new(),
            owned_nodes: Vec::new(),
            owned_paths: Vec::new(),
            owned_polys: Vec::new(),
            owned_creases: Vec::new(),
            owned_facets: Vec::new(),
            owner,
        }
    }

    /// Number of ring corners.
    pub fn size(&self) -> usize {
        debug_assert_eq!(self.ring_nodes.len(), self.ring_paths.len());
        self.ring_nodes.len()
    }

    /// A poly counts as filled once insetting has produced its sub-nodes.
    pub fn has_contents(&self) -> bool {
        !self.owned_nodes.is_empty()
    }
}

/// The five crease kinds of the universal molecule, plus the folded/unfolded
/// distinction for hinges which is resolved during cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreaseKind {
    Axial,
    Gusset,
    Ridge,
    UnfoldedHinge,
    FoldedHinge,
    Pseudohinge,
}

impl CreaseKind {
    pub fn is_axial(self) -> bool {
        self == CreaseKind::Axial
    }

    pub fn is_gusset(self) -> bool {
        self == CreaseKind::Gusset
    }

    pub fn is_ridge(self) -> bool {
        self == CreaseKind::Ridge
    }

    pub fn is_axial_or_gusset(self) -> bool {
        matches!(self, CreaseKind::Axial | CreaseKind::Gusset)
    }

    pub fn is_hinge(self) -> bool {
        matches!(
            self,
            CreaseKind::UnfoldedHinge | CreaseKind::FoldedHinge | CreaseKind::Pseudohinge
        )
    }

    /// A hinge that is not a pseudohinge.
    pub fn is_regular_hinge(self) -> bool {
        matches!(self, CreaseKind::UnfoldedHinge | CreaseKind::FoldedHinge)
    }

    pub fn is_pseudohinge(self) -> bool {
        self == CreaseKind::Pseudohinge
    }

    /// Axial and ridge creases are the structural skeleton of a molecule.
    pub fn is_major(self) -> bool {
        matches!(self, CreaseKind::Axial | CreaseKind::Ridge)
    }
}

/// Final fold sense of a crease.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fold {
    #[default]
    Flat,
    Mountain,
    Valley,
    Border,
}

/// Which face of the paper shows upward over a facet in the folded form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacetColor {
    #[default]
    NotOriented,
    WhiteUp,
    ColorUp,
}

impl FacetColor {
    pub fn opposite(self) -> FacetColor {
        match self {
            FacetColor::WhiteUp => FacetColor::ColorUp,
            FacetColor::ColorUp => FacetColor::WhiteUp,
            FacetColor::NotOriented => unreachable!("color not yet assigned"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub index: usize,
    pub loc: Vec2,
    pub elevation: f64,
    pub is_border_vertex: bool,
    /// The tree node whose projection this vertex is, if any.
    pub tree_node: Option<NodeId>,
    pub left_pseudohinge_mate: Option<VertexId>,
    pub right_pseudohinge_mate: Option<VertexId>,
    pub creases: Vec<CreaseId>,
    pub depth: f64,
    pub discrete_depth: usize,
    pub cc_flag: NetFlag,
    pub st_flag: NetFlag,
    pub owner: VertexOwner,
}

impl Vertex {
    pub fn new(
        owner: VertexOwner,
        loc: Vec2,
        elevation: f64,
        is_border_vertex: bool,
        tree_node: Option<NodeId>,
    ) -> Self {
        Self {
            index: 0,
            loc,
            elevation,
            is_border_vertex,
            tree_node,
            left_pseudohinge_mate: None,
            right_pseudohinge_mate: None,
            creases: Vec::new(),
            depth: DEPTH_NOT_SET,
            discrete_depth: DISCRETE_DEPTH_NOT_SET,
            cc_flag: NetFlag::Ineligible,
            st_flag: NetFlag::Ineligible,
            owner,
        }
    }

    pub fn has_depth(&self) -> bool {
        self.depth != DEPTH_NOT_SET
    }

    pub fn clear_cleanup_data(&mut self) {
        self.depth = DEPTH_NOT_SET;
        self.discrete_depth = DISCRETE_DEPTH_NOT_SET;
    }
}

#[derive(Clone, Debug)]
pub struct Crease {
    pub index: usize,
    pub kind: CreaseKind,
    pub vertices: Vec<VertexId>,
    pub fwd_facet: Option<FacetId>,
    pub bkd_facet: Option<FacetId>,
    pub fold: Fold,
    pub cc_flag: NetFlag,
    pub st_flag: NetFlag,
    pub owner: CreaseOwner,
}

impl Crease {
    pub fn new(owner: CreaseOwner, v1: VertexId, v2: VertexId, kind: CreaseKind) -> Self {
        debug_assert_ne!(v1, v2);
        Self {
            index: 0,
            kind,
            vertices: vec![v1, v2],
            fwd_facet: None,
            bkd_facet: None,
            fold: Fold::Flat,
            cc_flag: NetFlag::Ineligible,
            st_flag: NetFlag::Ineligible,
            owner,
        }
    }

    pub fn front_vertex(&self) -> VertexId {
        self.vertices[0]
    }

    pub fn back_vertex(&self) -> VertexId {
        self.vertices[1]
    }

    pub fn other_vertex(&self, v: VertexId) -> VertexId {
        if self.vertices[0] == v {
            self.vertices[1]
        } else {
            debug_assert_eq!(self.vertices[1], v);
            self.vertices[0]
        }
    }

    pub fn other_facet(&self, f: FacetId) -> Option<FacetId> {
        if self.fwd_facet == Some(f) {
            self.bkd_facet
        } else {
            debug_assert_eq!(self.bkd_facet, Some(f));
            self.fwd_facet
        }
    }

    pub fn is_incident_to(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    /// A crease bordering a single facet lies on the boundary of the crease
    /// pattern. Meaningful only after facet construction.
    pub fn is_border_crease(&self) -> bool {
        self.fwd_facet.is_none() || self.bkd_facet.is_none()
    }

    pub fn clear_cleanup_data(&mut self) {
        self.fold = Fold::Flat;
    }
}

#[derive(Clone, Debug)]
pub struct Facet {
    pub index: usize,
    pub centroid: Vec2,
    pub is_well_formed: bool,
    pub vertices: Vec<VertexId>,
    pub creases: Vec<CreaseId>,
    pub corridor_edge: Option<EdgeId>,
    pub head_facets: Vec<FacetId>,
    pub tail_facets: Vec<FacetId>,
    pub order: usize,
    pub color: FacetColor,
    pub owner: PolyId,
}

impl Facet {
    pub fn new(owner: PolyId) -> Self {
        Self {
            index: 0,
            centroid: Vec2::zeros(),
            is_well_formed: false,
            vertices: Vec::new(),
            creases: Vec::new(),
            corridor_edge: None,
            head_facets: Vec::new(),
            tail_facets: Vec::new(),
            order: ORDER_NOT_SET,
            color: FacetColor::NotOriented,
            owner,
        }
    }

    /// The axial-or-gusset crease the facet sits on. Valid once the facet
    /// has been rotated into well-formed position.
    pub fn bottom_crease(&self) -> CreaseId {
        debug_assert!(self.is_well_formed);
        self.creases[0]
    }

    /// Right side crease (creases run CCW from the bottom).
    pub fn right_crease(&self) -> CreaseId {
        debug_assert!(self.is_well_formed);
        self.creases[1]
    }

    /// Left side crease.
    pub fn left_crease(&self) -> CreaseId {
        debug_assert!(self.is_well_formed);
        *self.creases.last().unwrap()
    }

    /// Source facet of the ordering graph: heads but no tails.
    pub fn is_source_facet(&self) -> bool {
        !self.head_facets.is_empty() && self.tail_facets.is_empty()
    }

    /// Sink facet of the ordering graph: tails but no heads.
    pub fn is_sink_facet(&self) -> bool {
        !self.tail_facets.is_empty() && self.head_facets.is_empty()
    }

    pub fn clear_cleanup_data(&mut self) {
        self.corridor_edge = None;
        self.head_facets.clear();
        self.tail_facets.clear();
        self.order = ORDER_NOT_SET;
        self.color = FacetColor::NotOriented;
    }

    pub fn clear_links(&mut self) {
        self.head_facets.clear();
        self.tail_facets.clear();
    }
}
