//! Edge optimization: maximize a single strain applied to every stretchy
//! edge, moving the unpinned leaf nodes.
//!
//! Variables are `(strain, x_1, y_1, ..., x_n, y_n)` over the movable
//! nodes. Each leaf path decomposes into a fixed length (frozen edges at
//! their strained lengths, stretchy edges at rest) plus a variable part
//! proportional to the common strain.

use crate::error::{Error, Result};
use crate::nlco::fns::{OneVarFn, StrainPathFn1, StrainPathFn2, StrainPathFn3};
use crate::nlco::Nlco;
use crate::tree::conditions::Condition;
use crate::tree::{EdgeId, NodeId, PathId, Tree};

use super::{restore_tree, snapshot_tree};

const MIN_STRAIN: f64 = -0.999;
const MAX_STRAIN: f64 = 10.0;

pub struct EdgeOptimizer {
    moving_nodes: Vec<NodeId>,
    stretchy_edges: Vec<EdgeId>,
    num_vars: usize,
    state: Vec<f64>,
    snapshot: String,
    initialized: bool,
}

impl EdgeOptimizer {
    pub fn new(tree: &Tree) -> Self {
        Self {
            moving_nodes: Vec::new(),
            stretchy_edges: Vec::new(),
            num_vars: 0,
            state: Vec::new(),
            snapshot: snapshot_tree(tree),
            initialized: false,
        }
    }

    /// Build the problem over the movable subset of the given nodes and
    /// edges. Fails if filtering leaves nothing to move.
    pub fn initialize(
        &mut self,
        tree: &Tree,
        nlco: &mut Nlco,
        mut moving_nodes: Vec<NodeId>,
        mut stretchy_edges: Vec<EdgeId>,
    ) -> Result<()> {
        tree.filter_movable_parts(&mut moving_nodes, &mut stretchy_edges);
        if moving_nodes.is_empty() {
            return Err(Error::NoMovingNodes);
        }
        if stretchy_edges.is_empty() {
            return Err(Error::NoMovingEdges);
        }
        self.moving_nodes = moving_nodes;
        self.stretchy_edges = stretchy_edges;

        let n = self.moving_nodes.len();
        self.num_vars = 1 + 2 * n;
        nlco.set_size(self.num_vars);
        self.state = vec![0.0; self.num_vars];
        self.tree_to_data(tree);

        let mut bl = vec![0.0; self.num_vars];
        let mut bu = vec![0.0; self.num_vars];
        bl[0] = MIN_STRAIN;
        bu[0] = MAX_STRAIN;
        let w = tree.paper_width();
        let h = tree.paper_height();
        for i in 0..n {
            bu[2 * i + 1] = w;
            bu[2 * i + 2] = h;
        }
        nlco.set_bounds(bl, bu);

        nlco.set_objective(Box::new(OneVarFn::new(0, -1.0, 0.0)));

        // Feasibility inequality per leaf path; a path with no moving node
        // and no stretchy edge needs none.
        for p in tree.leaf_paths() {
            if tree.has_active_path_condition(p) {
                continue;
            }
            let (lfix, lvar) = self.fix_var_lengths(tree, p);
            let node1 = tree.path(p).front_node();
            let node2 = tree.path(p).back_node();
            match (self.base_offset(node1), self.base_offset(node2)) {
                (Some(ix), Some(jx)) => {
                    nlco.add_nonlinear_inequality(Box::new(StrainPathFn1::new(
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
                    nlco.add_nonlinear_inequality(Box::new(StrainPathFn2::new(
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
                    nlco.add_nonlinear_inequality(Box::new(StrainPathFn2::new(
                        jx,
                        jx + 1,
                        o.x,
                        o.y,
                        lfix,
                        lvar,
                    )));
                }
                (None, None) => {
                    if lvar == 0.0 {
                        continue;
                    }
                    let l1 = tree.node(node1).loc;
                    let l2 = tree.node(node2).loc;
                    nlco.add_nonlinear_inequality(Box::new(StrainPathFn3::new(
                        l1.x, l1.y, l2.x, l2.y, lfix, lvar,
                    )));
                }
            }
        }

        let conditions: Vec<Condition> =
            tree.conditions.iter().map(|(_, c)| c.clone()).collect();
        for c in &conditions {
            c.add_to_edge(tree, self, nlco);
        }

        self.initialized = true;
        Ok(())
    }

    /// Index of a moving node's x coordinate; `None` for frozen nodes.
    pub fn base_offset(&self, node: NodeId) -> Option<usize> {
        self.moving_nodes
            .iter()
            .position(|&n| n == node)
            .map(|i| 1 + 2 * i)
    }

    /// Split a path's scaled length into its fixed part and the part that
    /// scales with the common strain. A stretchy edge contributes its rest
    /// length to both (strained length = rest + strain * rest); a frozen
    /// edge contributes its strained length to the fixed part only.
    pub fn fix_var_lengths(&self, tree: &Tree, path: PathId) -> (f64, f64) {
        let mut lfix = 0.0;
        let mut lvar = 0.0;
        for &e in &tree.path(path).edges {
            let edge = tree.edge(e);
            let temp = edge.length * tree.scale();
            if self.stretchy_edges.contains(&e) {
                lfix += temp;
                lvar += temp;
            } else {
                lfix += (1.0 + edge.strain) * temp;
            }
        }
        (lfix, lvar)
    }

    pub fn tree_to_data(&mut self, tree: &Tree) {
        self.state[0] = 0.0;
        for (i, &n) in self.moving_nodes.iter().enumerate() {
            let loc = tree.node(n).loc;
            self.state[2 * i + 1] = loc.x;
            self.state[2 * i + 2] = loc.y;
        }
    }

    pub fn data_to_tree(&self, tree: &mut Tree) {
        tree.with_cleanup(|t| {
            for (i, &n) in self.moving_nodes.iter().enumerate() {
                t.node_mut(n).loc.x = self.state[2 * i + 1];
                t.node_mut(n).loc.y = self.state[2 * i + 2];
            }
            for &e in &self.stretchy_edges {
                t.edge_mut(e).strain = self.state[0];
            }
        });
    }

    pub fn optimize(&mut self, tree: &mut Tree, nlco: &mut Nlco) -> Result<()> {
        debug_assert!(self.initialized);
        let mut x = self.state.clone();
        let outcome = nlco.minimize(&mut x);
        self.state = x;
        outcome?;
        self.data_to_tree(tree);
        Ok(())
    }

    pub fn revert(&self, tree: &mut Tree) -> Result<()> {
        restore_tree(tree, &self.snapshot)
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }

    pub fn moving_nodes(&self) -> &[NodeId] {
        &self.moving_nodes
    }

    pub fn stretchy_edges(&self) -> &[EdgeId] {
        &self.stretchy_edges
    }
}
