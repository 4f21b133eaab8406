//! Conditions: user-imposed constraints on nodes, edges, and paths.
//!
//! A condition is a high-level statement about the tree ("this node sits on
//! the symmetry line", "these edges strain together"). During optimization
//! each condition emits the low-level differentiable constraints appropriate
//! to the optimizer being run; during cleanup it reports whether its
//! referents still exist and whether it is currently satisfied.
//!
//! The combo variants are the current forms; the single-purpose variants
//! (NodeFixed, NodeSymmetric, NodeOnEdge, NodeOnCorner, NodesPaired,
//! PathActive, PathAngleFixed, PathAngleQuant) are kept because legacy
//! documents create them on load.

use crate::geom::Vec2;
use crate::nlco::fns::{
    CollinearFn1, CollinearFn2, CollinearFn3, CornerFn, MultiStrainPathFn1, MultiStrainPathFn2,
    MultiStrainPathFn3, OneVarFn, PairFn1A, PairFn1B, PairFn2A, PairFn2B, PathAngleFn1,
    PathAngleFn2, PathFn1, QuantizeAngleFn1, QuantizeAngleFn2, StickToEdgeFn, StickToLineFn,
    StrainPathFn1, StrainPathFn2, StrainPathFn3, TwoVarFn,
};
use crate::nlco::{DifferentiableFn, Nlco};
use crate::optim::{EdgeOptimizer, ScaleOptimizer, StrainOptimizer};
use crate::tol::is_tiny;
use crate::tree::{EdgeId, NodeId, PathId, Tree};

#[derive(Clone, Debug)]
pub struct Condition {
    pub index: usize,
    pub is_feasible: bool,
    pub kind: ConditionKind,
}

#[derive(Clone, Debug)]
pub enum ConditionKind {
    /// Combined positional constraints on one leaf node.
    NodeCombo {
        node: NodeId,
        to_symmetry_line: bool,
        to_paper_edge: bool,
        to_paper_corner: bool,
        x_fixed: bool,
        x_fix_value: f64,
        y_fixed: bool,
        y_fix_value: f64,
    },
    /// Legacy: one or both coordinates of a leaf node pinned to values.
    NodeFixed {
        node: NodeId,
        x_fixed: bool,
        x_fix_value: f64,
        y_fixed: bool,
        y_fix_value: f64,
    },
    /// Legacy: leaf node on the symmetry line.
    NodeSymmetric { node: NodeId },
    /// Legacy: leaf node on some edge of the paper.
    NodeOnEdge { node: NodeId },
    /// Legacy: leaf node on some corner of the paper.
    NodeOnCorner { node: NodeId },
    /// Two leaf nodes mirror each other about the symmetry line.
    NodesPaired { node1: NodeId, node2: NodeId },
    /// Three leaf nodes stay collinear.
    NodesCollinear {
        node1: NodeId,
        node2: NodeId,
        node3: NodeId,
    },
    /// An edge keeps its unstrained length.
    EdgeLengthFixed { edge: EdgeId },
    /// Two edges strain together.
    EdgesSameStrain { edge1: EdgeId, edge2: EdgeId },
    /// Combined path constraints: active, optionally with a fixed or
    /// quantized angle.
    PathCombo {
        path: PathId,
        node1: NodeId,
        node2: NodeId,
        is_angle_fixed: bool,
        angle: f64,
        is_angle_quant: bool,
        quant: usize,
        quant_offset: f64,
    },
    /// Legacy: path pinned active.
    PathActive {
        path: PathId,
        node1: NodeId,
        node2: NodeId,
    },
    /// Legacy: path angle pinned to a value (degrees).
    PathAngleFixed {
        path: PathId,
        node1: NodeId,
        node2: NodeId,
        angle: f64,
    },
    /// Legacy: path angle pinned to a quantized family of directions.
    PathAngleQuant {
        path: PathId,
        node1: NodeId,
        node2: NodeId,
        quant: usize,
        quant_offset: f64,
    },
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            index: 0,
            is_feasible: false,
            kind,
        }
    }

    /// The 4-character tag identifying this condition type in stream I/O.
    pub fn tag(&self) -> &'static str {
        match &self.kind {
            ConditionKind::NodeCombo { .. } => "CNxn",
            ConditionKind::NodeFixed { .. } => "CNfn",
            ConditionKind::NodeSymmetric { .. } => "CNsn",
            ConditionKind::NodeOnEdge { .. } => "CNoe",
            ConditionKind::NodeOnCorner { .. } => "CNoc",
            ConditionKind::NodesPaired { .. } => "CNpn",
            ConditionKind::NodesCollinear { .. } => "CNcn",
            ConditionKind::EdgeLengthFixed { .. } => "CNfe",
            ConditionKind::EdgesSameStrain { .. } => "CNes",
            ConditionKind::PathCombo { .. } => "CNxp",
            ConditionKind::PathActive { .. } => "CNap",
            ConditionKind::PathAngleFixed { .. } => "CNfp",
            ConditionKind::PathAngleQuant { .. } => "CNqp",
        }
    }

    /// Number of body lines this condition occupies in a document, recorded
    /// so readers can skip condition types they do not know.
    pub fn num_lines_rest(&self) -> usize {
        match &self.kind {
            ConditionKind::NodeCombo { .. } => 8,
            ConditionKind::NodeFixed { .. } => 5,
            ConditionKind::NodeSymmetric { .. } => 1,
            ConditionKind::NodeOnEdge { .. } => 1,
            ConditionKind::NodeOnCorner { .. } => 1,
            ConditionKind::NodesPaired { .. } => 2,
            ConditionKind::NodesCollinear { .. } => 3,
            ConditionKind::EdgeLengthFixed { .. } => 1,
            ConditionKind::EdgesSameStrain { .. } => 2,
            ConditionKind::PathCombo { .. } => 7,
            ConditionKind::PathActive { .. } => 2,
            ConditionKind::PathAngleFixed { .. } => 3,
            ConditionKind::PathAngleQuant { .. } => 4,
        }
    }

    pub fn is_node_condition(&self) -> bool {
        matches!(
            self.kind,
            ConditionKind::NodeCombo { .. }
                | ConditionKind::NodeFixed { .. }
                | ConditionKind::NodeSymmetric { .. }
                | ConditionKind::NodeOnEdge { .. }
                | ConditionKind::NodeOnCorner { .. }
                | ConditionKind::NodesPaired { .. }
                | ConditionKind::NodesCollinear { .. }
        )
    }

    pub fn is_edge_condition(&self) -> bool {
        matches!(
            self.kind,
            ConditionKind::EdgeLengthFixed { .. } | ConditionKind::EdgesSameStrain { .. }
        )
    }

    pub fn is_path_condition(&self) -> bool {
        matches!(
            self.kind,
            ConditionKind::PathCombo { .. }
                | ConditionKind::PathActive { .. }
                | ConditionKind::PathAngleFixed { .. }
                | ConditionKind::PathAngleQuant { .. }
        )
    }

    pub fn uses_node(&self, node: NodeId) -> bool {
        match &self.kind {
            ConditionKind::NodeCombo { node: n, .. }
            | ConditionKind::NodeFixed { node: n, .. }
            | ConditionKind::NodeSymmetric { node: n }
            | ConditionKind::NodeOnEdge { node: n }
            | ConditionKind::NodeOnCorner { node: n } => *n == node,
            ConditionKind::NodesPaired { node1, node2 } => *node1 == node || *node2 == node,
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => *node1 == node || *node2 == node || *node3 == node,
            ConditionKind::PathCombo { node1, node2, .. }
            | ConditionKind::PathActive { node1, node2, .. }
            | ConditionKind::PathAngleFixed { node1, node2, .. }
            | ConditionKind::PathAngleQuant { node1, node2, .. } => {
                *node1 == node || *node2 == node
            }
            _ => false,
        }
    }

    pub fn uses_edge(&self, edge: EdgeId) -> bool {
        match &self.kind {
            ConditionKind::EdgeLengthFixed { edge: e } => *e == edge,
            ConditionKind::EdgesSameStrain { edge1, edge2 } => *edge1 == edge || *edge2 == edge,
            _ => false,
        }
    }

    pub fn uses_path(&self, path: PathId) -> bool {
        match &self.kind {
            ConditionKind::PathCombo { path: p, .. }
            | ConditionKind::PathActive { path: p, .. }
            | ConditionKind::PathAngleFixed { path: p, .. }
            | ConditionKind::PathAngleQuant { path: p, .. } => *p == path,
            _ => false,
        }
    }

    /// True if this condition fixes the length of the given edge, which
    /// removes it from the stretchy set of the edge/strain optimizers.
    pub fn fixes_edge_length(&self, edge: EdgeId) -> bool {
        matches!(self.kind, ConditionKind::EdgeLengthFixed { edge: e } if e == edge)
    }

    /// True if this condition pins the given path active, which supersedes
    /// the standard feasibility inequality for that path.
    pub fn makes_path_active(&self, path: PathId) -> bool {
        matches!(
            self.kind,
            ConditionKind::PathCombo { path: p, .. } | ConditionKind::PathActive { path: p, .. }
            if p == path
        )
    }

    /// True while every part the condition references still exists and has
    /// the required character (leafness). Conditions that fail this are
    /// deleted during cleanup.
    pub fn is_valid(&self, tree: &Tree) -> bool {
        let leaf = |n: NodeId| tree.nodes.get(n).is_some_and(|node| node.is_leaf_node);
        match &self.kind {
            ConditionKind::NodeCombo { node, .. }
            | ConditionKind::NodeFixed { node, .. }
            | ConditionKind::NodeSymmetric { node }
            | ConditionKind::NodeOnEdge { node }
            | ConditionKind::NodeOnCorner { node } => leaf(*node),
            ConditionKind::NodesPaired { node1, node2 } => leaf(*node1) && leaf(*node2),
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => leaf(*node1) && leaf(*node2) && leaf(*node3),
            ConditionKind::EdgeLengthFixed { edge } => tree.edges.contains(*edge),
            ConditionKind::EdgesSameStrain { edge1, edge2 } => {
                tree.edges.contains(*edge1) && tree.edges.contains(*edge2)
            }
            ConditionKind::PathCombo {
                path, node1, node2, ..
            }
            | ConditionKind::PathActive { path, node1, node2 }
            | ConditionKind::PathAngleFixed {
                path, node1, node2, ..
            }
            | ConditionKind::PathAngleQuant {
                path, node1, node2, ..
            } => {
                leaf(*node1)
                    && leaf(*node2)
                    && tree.paths.get(*path).is_some_and(|p| p.is_leaf_path)
            }
        }
    }

    /// Whether the tree currently satisfies this condition.
    pub fn calc_feasibility(&self, tree: &Tree) -> bool {
        match &self.kind {
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
                let loc = tree.node(*node).loc;
                let vars = [loc.x, loc.y];
                if tree.has_symmetry && *to_symmetry_line {
                    let fn_ = StickToLineFn::new(0, 1, tree.sym_loc, tree.sym_angle);
                    if !is_tiny(fn_.value(&vars)) {
                        return false;
                    }
                }
                if *to_paper_edge {
                    let fn_ = StickToEdgeFn::new(0, 1, tree.paper_width, tree.paper_height);
                    if !is_tiny(fn_.value(&vars)) {
                        return false;
                    }
                }
                if *to_paper_corner {
                    if !is_tiny(CornerFn::new(0, tree.paper_width).value(&vars)) {
                        return false;
                    }
                    if !is_tiny(CornerFn::new(1, tree.paper_height).value(&vars)) {
                        return false;
                    }
                }
                if *x_fixed && !is_tiny(OneVarFn::new(0, -1.0, *x_fix_value).value(&vars)) {
                    return false;
                }
                if *y_fixed && !is_tiny(OneVarFn::new(1, -1.0, *y_fix_value).value(&vars)) {
                    return false;
                }
                true
            }
            ConditionKind::NodeFixed {
                node,
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
            } => {
                let loc = tree.node(*node).loc;
                (!*x_fixed || is_tiny(loc.x - *x_fix_value))
                    && (!*y_fixed || is_tiny(loc.y - *y_fix_value))
            }
            ConditionKind::NodeSymmetric { node } => {
                if !tree.has_symmetry {
                    return false;
                }
                let loc = tree.node(*node).loc;
                let fn_ = StickToLineFn::new(0, 1, tree.sym_loc, tree.sym_angle);
                is_tiny(fn_.value(&[loc.x, loc.y]))
            }
            ConditionKind::NodeOnEdge { node } => {
                let loc = tree.node(*node).loc;
                let fn_ = StickToEdgeFn::new(0, 1, tree.paper_width, tree.paper_height);
                is_tiny(fn_.value(&[loc.x, loc.y]))
            }
            ConditionKind::NodeOnCorner { node } => {
                let loc = tree.node(*node).loc;
                is_tiny(CornerFn::new(0, tree.paper_width).value(&[loc.x, loc.y]))
                    && is_tiny(CornerFn::new(1, tree.paper_height).value(&[loc.x, loc.y]))
            }
            ConditionKind::NodesPaired { node1, node2 } => {
                if !tree.has_symmetry {
                    return false;
                }
                let l1 = tree.node(*node1).loc;
                let l2 = tree.node(*node2).loc;
                let vars = [l1.x, l1.y, l2.x, l2.y];
                let fa = PairFn1A::new(0, 1, 2, 3, tree.sym_loc, tree.sym_angle);
                let fb = PairFn1B::new(0, 1, 2, 3, tree.sym_loc, tree.sym_angle);
                is_tiny(fa.value(&vars)) && is_tiny(fb.value(&vars))
            }
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => {
                let l1 = tree.node(*node1).loc;
                let l2 = tree.node(*node2).loc;
                let l3 = tree.node(*node3).loc;
                let vars = [l1.x, l1.y, l2.x, l2.y, l3.x, l3.y];
                is_tiny(CollinearFn1::new(0, 1, 2, 3, 4, 5).value(&vars))
            }
            ConditionKind::EdgeLengthFixed { edge } => is_tiny(tree.edge(*edge).strain),
            ConditionKind::EdgesSameStrain { edge1, edge2 } => {
                let vars = [tree.edge(*edge1).strain, tree.edge(*edge2).strain];
                is_tiny(TwoVarFn::new(0, 1.0, 1, -1.0, 0.0).value(&vars))
            }
            ConditionKind::PathCombo {
                path,
                node1,
                node2,
                is_angle_fixed,
                angle,
                is_angle_quant,
                quant,
                quant_offset,
            } => {
                if !tree.path(*path).is_active_path {
                    return false;
                }
                let l1 = tree.node(*node1).loc;
                let l2 = tree.node(*node2).loc;
                let vars = [l1.x, l1.y, l2.x, l2.y];
                if *is_angle_fixed
                    && !is_tiny(PathAngleFn1::new(0, 1, 2, 3, *angle).value(&vars))
                {
                    return false;
                }
                if *is_angle_quant
                    && !is_tiny(
                        QuantizeAngleFn1::new(0, 1, 2, 3, *quant, *quant_offset).value(&vars),
                    )
                {
                    return false;
                }
                true
            }
            ConditionKind::PathActive { path, .. } => tree.path(*path).is_active_path,
            ConditionKind::PathAngleFixed {
                node1,
                node2,
                angle,
                ..
            } => {
                let l1 = tree.node(*node1).loc;
                let l2 = tree.node(*node2).loc;
                let vars = [l1.x, l1.y, l2.x, l2.y];
                is_tiny(PathAngleFn1::new(0, 1, 2, 3, *angle).value(&vars))
            }
            ConditionKind::PathAngleQuant {
                node1,
                node2,
                quant,
                quant_offset,
                ..
            } => {
                let l1 = tree.node(*node1).loc;
                let l2 = tree.node(*node2).loc;
                let vars = [l1.x, l1.y, l2.x, l2.y];
                is_tiny(QuantizeAngleFn1::new(0, 1, 2, 3, *quant, *quant_offset).value(&vars))
            }
        }
    }

    // ---- constraint emission --------------------------------------------

    /// Emit this condition's constraints into a scale optimization.
    pub fn add_to_scale(&self, tree: &Tree, opt: &ScaleOptimizer, nlco: &mut Nlco) {
        match &self.kind {
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
                let Some(ix) = opt.base_offset(*node) else {
                    return;
                };
                emit_node_constraints(
                    tree,
                    nlco,
                    ix,
                    *to_symmetry_line,
                    *to_paper_edge,
                    *to_paper_corner,
                    *x_fixed,
                    *x_fix_value,
                    *y_fixed,
                    *y_fix_value,
                );
            }
            ConditionKind::NodeFixed {
                node,
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
            } => {
                let Some(ix) = opt.base_offset(*node) else {
                    return;
                };
                emit_node_constraints(
                    tree,
                    nlco,
                    ix,
                    false,
                    false,
                    false,
                    *x_fixed,
                    *x_fix_value,
                    *y_fixed,
                    *y_fix_value,
                );
            }
            ConditionKind::NodeSymmetric { node } => {
                if let Some(ix) = opt.base_offset(*node) {
                    emit_node_constraints(
                        tree, nlco, ix, true, false, false, false, 0.0, false, 0.0,
                    );
                }
            }
            ConditionKind::NodeOnEdge { node } => {
                if let Some(ix) = opt.base_offset(*node) {
                    emit_node_constraints(
                        tree, nlco, ix, false, true, false, false, 0.0, false, 0.0,
                    );
                }
            }
            ConditionKind::NodeOnCorner { node } => {
                if let Some(ix) = opt.base_offset(*node) {
                    emit_node_constraints(
                        tree, nlco, ix, false, false, true, false, 0.0, false, 0.0,
                    );
                }
            }
            ConditionKind::NodesPaired { node1, node2 } => {
                if !tree.has_symmetry {
                    return;
                }
                let (Some(ix), Some(jx)) = (opt.base_offset(*node1), opt.base_offset(*node2))
                else {
                    return;
                };
                nlco.add_linear_equality(Box::new(PairFn1A::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    tree.sym_loc,
                    tree.sym_angle,
                )));
                nlco.add_linear_equality(Box::new(PairFn1B::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    tree.sym_loc,
                    tree.sym_angle,
                )));
            }
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => {
                let (Some(ix), Some(jx), Some(kx)) = (
                    opt.base_offset(*node1),
                    opt.base_offset(*node2),
                    opt.base_offset(*node3),
                ) else {
                    return;
                };
                nlco.add_nonlinear_equality(Box::new(CollinearFn1::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    kx,
                    kx + 1,
                )));
            }
            ConditionKind::EdgeLengthFixed { .. } | ConditionKind::EdgesSameStrain { .. } => {
                // No edge variables exist in a scale optimization.
            }
            ConditionKind::PathCombo {
                path,
                node1,
                node2,
                is_angle_fixed,
                angle,
                is_angle_quant,
                quant,
                quant_offset,
            } => {
                let (Some(ix), Some(jx)) = (opt.base_offset(*node1), opt.base_offset(*node2))
                else {
                    return;
                };
                nlco.add_nonlinear_equality(Box::new(PathFn1::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    tree.path(*path).min_tree_length,
                )));
                debug_assert!(!(*is_angle_fixed && *is_angle_quant));
                if *is_angle_fixed {
                    nlco.add_linear_equality(Box::new(PathAngleFn1::new(
                        ix,
                        ix + 1,
                        jx,
                        jx + 1,
                        *angle,
                    )));
                }
                if *is_angle_quant {
                    nlco.add_nonlinear_equality(Box::new(QuantizeAngleFn1::new(
                        ix,
                        ix + 1,
                        jx,
                        jx + 1,
                        *quant,
                        *quant_offset,
                    )));
                }
            }
            ConditionKind::PathActive { path, node1, node2 } => {
                let (Some(ix), Some(jx)) = (opt.base_offset(*node1), opt.base_offset(*node2))
                else {
                    return;
                };
                nlco.add_nonlinear_equality(Box::new(PathFn1::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    tree.path(*path).min_tree_length,
                )));
            }
            ConditionKind::PathAngleFixed {
                node1, node2, angle, ..
            } => {
                let (Some(ix), Some(jx)) = (opt.base_offset(*node1), opt.base_offset(*node2))
                else {
                    return;
                };
                nlco.add_linear_equality(Box::new(PathAngleFn1::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    *angle,
                )));
            }
            ConditionKind::PathAngleQuant {
                node1,
                node2,
                quant,
                quant_offset,
                ..
            } => {
                let (Some(ix), Some(jx)) = (opt.base_offset(*node1), opt.base_offset(*node2))
                else {
                    return;
                };
                nlco.add_nonlinear_equality(Box::new(QuantizeAngleFn1::new(
                    ix,
                    ix + 1,
                    jx,
                    jx + 1,
                    *quant,
                    *quant_offset,
                )));
            }
        }
    }

    /// Emit this condition's constraints into an edge (common strain)
    /// optimization.
    pub fn add_to_edge(&self, tree: &Tree, opt: &EdgeOptimizer, nlco: &mut Nlco) {
        match &self.kind {
            ConditionKind::NodeCombo { node, .. }
            | ConditionKind::NodeFixed { node, .. }
            | ConditionKind::NodeSymmetric { node }
            | ConditionKind::NodeOnEdge { node }
            | ConditionKind::NodeOnCorner { node } => {
                if let Some(ix) = opt.base_offset(*node) {
                    self.emit_node_kind(tree, nlco, ix);
                }
            }
            ConditionKind::NodesPaired { node1, node2 } => {
                emit_paired(tree, nlco, opt.base_offset(*node1), opt.base_offset(*node2), {
                    let l1 = tree.node(*node1).loc;
                    let l2 = tree.node(*node2).loc;
                    (l1, l2)
                });
            }
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => {
                emit_collinear(
                    tree,
                    nlco,
                    [
                        (opt.base_offset(*node1), tree.node(*node1).loc),
                        (opt.base_offset(*node2), tree.node(*node2).loc),
                        (opt.base_offset(*node3), tree.node(*node3).loc),
                    ],
                );
            }
            ConditionKind::EdgeLengthFixed { .. } | ConditionKind::EdgesSameStrain { .. } => {
                // One shared strain variable: same-strain is automatic, and
                // length-fixed edges were filtered out of the stretchy set.
            }
            ConditionKind::PathCombo {
                path,
                node1,
                node2,
                is_angle_fixed,
                angle,
                is_angle_quant,
                quant,
                quant_offset,
            } => {
                let (lfix, lvar) = opt.fix_var_lengths(tree, *path);
                emit_strain_path_equality(tree, nlco, opt, *node1, *node2, lfix, lvar);
                debug_assert!(!(*is_angle_fixed && *is_angle_quant));
                if *is_angle_fixed {
                    emit_angle(tree, nlco, opt.base_offset(*node1), opt.base_offset(*node2), *node1, *node2, *angle);
                }
                if *is_angle_quant {
                    emit_quant_angle(
                        tree,
                        nlco,
                        opt.base_offset(*node1),
                        opt.base_offset(*node2),
                        *node1,
                        *node2,
                        *quant,
                        *quant_offset,
                    );
                }
            }
            ConditionKind::PathActive { path, node1, node2 } => {
                let (lfix, lvar) = opt.fix_var_lengths(tree, *path);
                emit_strain_path_equality(tree, nlco, opt, *node1, *node2, lfix, lvar);
            }
            ConditionKind::PathAngleFixed {
                node1, node2, angle, ..
            } => {
                emit_angle(tree, nlco, opt.base_offset(*node1), opt.base_offset(*node2), *node1, *node2, *angle);
            }
            ConditionKind::PathAngleQuant {
                node1,
                node2,
                quant,
                quant_offset,
                ..
            } => {
                emit_quant_angle(
                    tree,
                    nlco,
                    opt.base_offset(*node1),
                    opt.base_offset(*node2),
                    *node1,
                    *node2,
                    *quant,
                    *quant_offset,
                );
            }
        }
    }

    /// Emit this condition's constraints into a strain optimization.
    pub fn add_to_strain(&self, tree: &Tree, opt: &StrainOptimizer, nlco: &mut Nlco) {
        match &self.kind {
            ConditionKind::NodeCombo { node, .. }
            | ConditionKind::NodeFixed { node, .. }
            | ConditionKind::NodeSymmetric { node }
            | ConditionKind::NodeOnEdge { node }
            | ConditionKind::NodeOnCorner { node } => {
                if let Some(ix) = opt.node_base_offset(*node) {
                    self.emit_node_kind(tree, nlco, ix);
                }
            }
            ConditionKind::NodesPaired { node1, node2 } => {
                emit_paired(
                    tree,
                    nlco,
                    opt.node_base_offset(*node1),
                    opt.node_base_offset(*node2),
                    (tree.node(*node1).loc, tree.node(*node2).loc),
                );
            }
            ConditionKind::NodesCollinear {
                node1,
                node2,
                node3,
            } => {
                emit_collinear(
                    tree,
                    nlco,
                    [
                        (opt.node_base_offset(*node1), tree.node(*node1).loc),
                        (opt.node_base_offset(*node2), tree.node(*node2).loc),
                        (opt.node_base_offset(*node3), tree.node(*node3).loc),
                    ],
                );
            }
            ConditionKind::EdgeLengthFixed { .. } => {
                // Length-fixed edges were filtered out of the stretchy set.
            }
            ConditionKind::EdgesSameStrain { edge1, edge2 } => {
                let (Some(i1), Some(i2)) =
                    (opt.edge_base_offset(*edge1), opt.edge_base_offset(*edge2))
                else {
                    return;
                };
                nlco.add_linear_equality(Box::new(TwoVarFn::new(i1, 1.0, i2, -1.0, 0.0)));
            }
            ConditionKind::PathCombo {
                path,
                node1,
                node2,
                is_angle_fixed,
                angle,
                is_angle_quant,
                quant,
                quant_offset,
            } => {
                let (lfix, vi, vf) = opt.fix_var_lengths(tree, *path);
                emit_multi_strain_path_equality(tree, nlco, opt, *node1, *node2, lfix, vi, vf);
                debug_assert!(!(*is_angle_fixed && *is_angle_quant));
                if *is_angle_fixed {
                    emit_angle(
                        tree,
                        nlco,
                        opt.node_base_offset(*node1),
                        opt.node_base_offset(*node2),
                        *node1,
                        *node2,
                        *angle,
                    );
                }
                if *is_angle_quant {
                    emit_quant_angle(
                        tree,
                        nlco,
                        opt.node_base_offset(*node1),
                        opt.node_base_offset(*node2),
                        *node1,
                        *node2,
                        *quant,
                        *quant_offset,
                    );
                }
            }
            ConditionKind::PathActive { path, node1, node2 } => {
                let (lfix, vi, vf) = opt.fix_var_lengths(tree, *path);
                emit_multi_strain_path_equality(tree, nlco, opt, *node1, *node2, lfix, vi, vf);
            }
            ConditionKind::PathAngleFixed {
                node1, node2, angle, ..
            } => {
                emit_angle(
                    tree,
                    nlco,
                    opt.node_base_offset(*node1),
                    opt.node_base_offset(*node2),
                    *node1,
                    *node2,
                    *angle,
                );
            }
            ConditionKind::PathAngleQuant {
                node1,
                node2,
                quant,
                quant_offset,
                ..
            } => {
                emit_quant_angle(
                    tree,
                    nlco,
                    opt.node_base_offset(*node1),
                    opt.node_base_offset(*node2),
                    *node1,
                    *node2,
                    *quant,
                    *quant_offset,
                );
            }
        }
    }

    /// Shared emission for the single-node condition kinds, given the base
    /// offset of the node in the state vector.
    fn emit_node_kind(&self, tree: &Tree, nlco: &mut Nlco, ix: usize) {
        match &self.kind {
            ConditionKind::NodeCombo {
                to_symmetry_line,
                to_paper_edge,
                to_paper_corner,
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
                ..
            } => emit_node_constraints(
                tree,
                nlco,
                ix,
                *to_symmetry_line,
                *to_paper_edge,
                *to_paper_corner,
                *x_fixed,
                *x_fix_value,
                *y_fixed,
                *y_fix_value,
            ),
            ConditionKind::NodeFixed {
                x_fixed,
                x_fix_value,
                y_fixed,
                y_fix_value,
                ..
            } => emit_node_constraints(
                tree,
                nlco,
                ix,
                false,
                false,
                false,
                *x_fixed,
                *x_fix_value,
                *y_fixed,
                *y_fix_value,
            ),
            ConditionKind::NodeSymmetric { .. } => {
                emit_node_constraints(tree, nlco, ix, true, false, false, false, 0.0, false, 0.0)
            }
            ConditionKind::NodeOnEdge { .. } => {
                emit_node_constraints(tree, nlco, ix, false, true, false, false, 0.0, false, 0.0)
            }
            ConditionKind::NodeOnCorner { .. } => {
                emit_node_constraints(tree, nlco, ix, false, false, true, false, 0.0, false, 0.0)
            }
            _ => unreachable!("not a single-node condition"),
        }
    }
}

/// Emit the constraint set shared by the node condition kinds for the node
/// whose x coordinate lives at `ix`.
#[allow(clippy::too_many_arguments)]
fn emit_node_constraints(
    tree: &Tree,
    nlco: &mut Nlco,
    ix: usize,
    to_symmetry_line: bool,
    to_paper_edge: bool,
    to_paper_corner: bool,
    x_fixed: bool,
    x_fix_value: f64,
    y_fixed: bool,
    y_fix_value: f64,
) {
    let iy = ix + 1;
    if tree.has_symmetry && to_symmetry_line {
        nlco.add_linear_equality(Box::new(StickToLineFn::new(
            ix,
            iy,
            tree.sym_loc,
            tree.sym_angle,
        )));
    }
    if to_paper_edge {
        nlco.add_nonlinear_equality(Box::new(StickToEdgeFn::new(
            ix,
            iy,
            tree.paper_width,
            tree.paper_height,
        )));
    }
    if to_paper_corner {
        nlco.add_nonlinear_equality(Box::new(CornerFn::new(ix, tree.paper_width)));
        nlco.add_nonlinear_equality(Box::new(CornerFn::new(iy, tree.paper_height)));
    }
    if x_fixed {
        nlco.add_linear_equality(Box::new(OneVarFn::new(ix, -1.0, x_fix_value)));
    }
    if y_fixed {
        nlco.add_linear_equality(Box::new(OneVarFn::new(iy, -1.0, y_fix_value)));
    }
}

/// Mirror-pair constraints for optimizers where either node may be frozen.
fn emit_paired(
    tree: &Tree,
    nlco: &mut Nlco,
    off1: Option<usize>,
    off2: Option<usize>,
    locs: (Vec2, Vec2),
) {
    if !tree.has_symmetry {
        return;
    }
    match (off1, off2) {
        (Some(ix), Some(jx)) => {
            nlco.add_linear_equality(Box::new(PairFn1A::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                tree.sym_loc,
                tree.sym_angle,
            )));
            nlco.add_linear_equality(Box::new(PairFn1B::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                tree.sym_loc,
                tree.sym_angle,
            )));
        }
        (Some(ix), None) => {
            nlco.add_linear_equality(Box::new(PairFn2A::new(
                ix,
                ix + 1,
                locs.1.x,
                locs.1.y,
                tree.sym_loc,
                tree.sym_angle,
            )));
            nlco.add_linear_equality(Box::new(PairFn2B::new(
                ix,
                ix + 1,
                locs.1.x,
                locs.1.y,
                tree.sym_loc,
                tree.sym_angle,
            )));
        }
        (None, Some(jx)) => {
            nlco.add_linear_equality(Box::new(PairFn2A::new(
                jx,
                jx + 1,
                locs.0.x,
                locs.0.y,
                tree.sym_loc,
                tree.sym_angle,
            )));
            nlco.add_linear_equality(Box::new(PairFn2B::new(
                jx,
                jx + 1,
                locs.0.x,
                locs.0.y,
                tree.sym_loc,
                tree.sym_angle,
            )));
        }
        (None, None) => {}
    }
}

/// Collinearity across three nodes, any subset of which may be frozen.
fn emit_collinear(_tree: &Tree, nlco: &mut Nlco, nodes: [(Option<usize>, Vec2); 3]) {
    let [(o1, l1), (o2, l2), (o3, l3)] = nodes;
    match (o1, o2, o3) {
        (Some(i), Some(j), Some(k)) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn1::new(
                i,
                i + 1,
                j,
                j + 1,
                k,
                k + 1,
            )));
        }
        (Some(i), Some(j), None) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn2::new(
                i,
                i + 1,
                j,
                j + 1,
                l3.x,
                l3.y,
            )));
        }
        (Some(i), None, Some(k)) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn2::new(
                i,
                i + 1,
                k,
                k + 1,
                l2.x,
                l2.y,
            )));
        }
        (None, Some(j), Some(k)) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn2::new(
                j,
                j + 1,
                k,
                k + 1,
                l1.x,
                l1.y,
            )));
        }
        (Some(i), None, None) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn3::new(
                i,
                i + 1,
                l2.x,
                l2.y,
                l3.x,
                l3.y,
            )));
        }
        (None, Some(j), None) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn3::new(
                j,
                j + 1,
                l1.x,
                l1.y,
                l3.x,
                l3.y,
            )));
        }
        (None, None, Some(k)) => {
            nlco.add_nonlinear_equality(Box::new(CollinearFn3::new(
                k,
                k + 1,
                l1.x,
                l1.y,
                l2.x,
                l2.y,
            )));
        }
        (None, None, None) => {}
    }
}

/// Path-angle equality, tolerant of frozen endpoints.
fn emit_angle(
    tree: &Tree,
    nlco: &mut Nlco,
    off1: Option<usize>,
    off2: Option<usize>,
    node1: NodeId,
    node2: NodeId,
    angle: f64,
) {
    match (off1, off2) {
        (Some(ix), Some(jx)) => {
            nlco.add_nonlinear_equality(Box::new(PathAngleFn1::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                angle,
            )));
        }
        (Some(ix), None) => {
            let o = tree.node(node2).loc;
            nlco.add_nonlinear_equality(Box::new(PathAngleFn2::new(ix, ix + 1, o.x, o.y, angle)));
        }
        (None, Some(jx)) => {
            let o = tree.node(node1).loc;
            nlco.add_nonlinear_equality(Box::new(PathAngleFn2::new(jx, jx + 1, o.x, o.y, angle)));
        }
        (None, None) => {}
    }
}

/// Quantized path-angle equality, tolerant of frozen endpoints.
#[allow(clippy::too_many_arguments)]
fn emit_quant_angle(
    tree: &Tree,
    nlco: &mut Nlco,
    off1: Option<usize>,
    off2: Option<usize>,
    node1: NodeId,
    node2: NodeId,
    quant: usize,
    quant_offset: f64,
) {
    match (off1, off2) {
        (Some(ix), Some(jx)) => {
            nlco.add_nonlinear_equality(Box::new(QuantizeAngleFn1::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                quant,
                quant_offset,
            )));
        }
        (Some(ix), None) => {
            let o = tree.node(node2).loc;
            nlco.add_nonlinear_equality(Box::new(QuantizeAngleFn2::new(
                ix,
                ix + 1,
                o.x,
                o.y,
                quant,
                quant_offset,
            )));
        }
        (None, Some(jx)) => {
            let o = tree.node(node1).loc;
            nlco.add_nonlinear_equality(Box::new(QuantizeAngleFn2::new(
                jx,
                jx + 1,
                o.x,
                o.y,
                quant,
                quant_offset,
            )));
        }
        (None, None) => {}
    }
}

/// Active-path equality for the edge optimizer with the fixed/variable
/// length split already computed.
fn emit_strain_path_equality(
    tree: &Tree,
    nlco: &mut Nlco,
    opt: &EdgeOptimizer,
    node1: NodeId,
    node2: NodeId,
    lfix: f64,
    lvar: f64,
) {
    match (opt.base_offset(node1), opt.base_offset(node2)) {
        (Some(ix), Some(jx)) => {
            nlco.add_nonlinear_equality(Box::new(StrainPathFn1::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                lfix,
                lvar,
            )));
        }
        (Some(ix), None) => {
            let o = tree.node(node2).loc;
            nlco.add_nonlinear_equality(Box::new(StrainPathFn2::new(
                ix,
                ix + 1,
                o.x,
                o.y,
                lfix,
                lvar,
            )));
        }
        (None, Some(jx)) => {
            let o = tree.node(node1).loc;
            nlco.add_nonlinear_equality(Box::new(StrainPathFn2::new(
                jx,
                jx + 1,
                o.x,
                o.y,
                lfix,
                lvar,
            )));
        }
        (None, None) => {
            if lvar != 0.0 {
                let l1 = tree.node(node1).loc;
                let l2 = tree.node(node2).loc;
                nlco.add_nonlinear_equality(Box::new(StrainPathFn3::new(
                    l1.x, l1.y, l2.x, l2.y, lfix, lvar,
                )));
            }
        }
    }
}

/// Active-path equality for the strain optimizer with the per-edge variable
/// split already computed.
fn emit_multi_strain_path_equality(
    tree: &Tree,
    nlco: &mut Nlco,
    opt: &StrainOptimizer,
    node1: NodeId,
    node2: NodeId,
    lfix: f64,
    vi: Vec<usize>,
    vf: Vec<f64>,
) {
    match (opt.node_base_offset(node1), opt.node_base_offset(node2)) {
        (Some(ix), Some(jx)) => {
            nlco.add_nonlinear_equality(Box::new(MultiStrainPathFn1::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                lfix,
                vi,
                vf,
            )));
        }
        (Some(ix), None) => {
            let o = tree.node(node2).loc;
            nlco.add_nonlinear_equality(Box::new(MultiStrainPathFn2::new(
                ix,
                ix + 1,
                o.x,
                o.y,
                lfix,
                vi,
                vf,
            )));
        }
        (None, Some(jx)) => {
            let o = tree.node(node1).loc;
            nlco.add_nonlinear_equality(Box::new(MultiStrainPathFn2::new(
                jx,
                jx + 1,
                o.x,
                o.y,
                lfix,
                vi,
                vf,
            )));
        }
        (None, None) => {
            if vi.is_empty() {
                return;
            }
            let l1 = tree.node(node1).loc;
            let l2 = tree.node(node2).loc;
            nlco.add_nonlinear_equality(Box::new(MultiStrainPathFn3::new(
                l1.x, l1.y, l2.x, l2.y, lfix, vi, vf,
            )));
        }
    }
}
