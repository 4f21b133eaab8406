//! Scale optimization: grow the tree's scale as large as the paper allows.
//!
//! Variables are `(scale, x_1, y_1, ..., x_n, y_n)` over the leaf nodes.
//! The objective is `-scale`; every leaf path contributes the inequality
//! "strained length at this scale fits between its endpoints", and the
//! conditions contribute whatever constraints they stand for.

use crate::error::{Error, Result};
use crate::nlco::fns::{OneVarFn, PathFn1};
use crate::nlco::Nlco;
use crate::tol::DIST_TOL;
use crate::tree::conditions::Condition;
use crate::tree::{NodeId, Tree};

use super::{restore_tree, snapshot_tree};

pub struct ScaleOptimizer {
    leaf_nodes: Vec<NodeId>,
    num_vars: usize,
    state: Vec<f64>,
    snapshot: String,
    initial_scale: f64,
    initialized: bool,
}

impl ScaleOptimizer {
    pub fn new(tree: &Tree) -> Self {
        Self {
            leaf_nodes: Vec::new(),
            num_vars: 0,
            state: Vec::new(),
            snapshot: snapshot_tree(tree),
            initial_scale: tree.scale(),
            initialized: false,
        }
    }

    /// Build the NLCO problem: objective, bounds, per-path feasibility
    /// inequalities, and the conditions' constraints.
    pub fn initialize(&mut self, tree: &Tree, nlco: &mut Nlco) {
        self.leaf_nodes = tree.leaf_nodes();
        let n = self.leaf_nodes.len();
        self.num_vars = 1 + 2 * n;
        nlco.set_size(self.num_vars);
        self.state = vec![0.0; self.num_vars];
        self.tree_to_data(tree);

        let mut bl = vec![0.0; self.num_vars];
        let mut bu = vec![0.0; self.num_vars];
        bu[0] = 2.0;
        let w = tree.paper_width();
        let h = tree.paper_height();
        for i in 0..n {
            bu[2 * i + 1] = w;
            bu[2 * i + 2] = h;
        }
        bl[0] = 0.0;
        nlco.set_bounds(bl, bu);

        nlco.set_objective(Box::new(OneVarFn::new(0, -1.0, 0.0)));

        // Keep the scale from collapsing: it may not shrink below 10% of
        // its current value.
        nlco.add_linear_inequality(Box::new(OneVarFn::new(
            0,
            -1.0,
            0.1 * tree.scale(),
        )));

        // One feasibility inequality per leaf path, except where an
        // active-path condition will pin the path exactly.
        for p in tree.leaf_paths() {
            if tree.has_active_path_condition(p) {
                continue;
            }
            let path = tree.path(p);
            let ix = self
                .base_offset(path.front_node())
                .expect("leaf path endpoint is a leaf node");
            let jx = self
                .base_offset(path.back_node())
                .expect("leaf path endpoint is a leaf node");
            nlco.add_nonlinear_inequality(Box::new(PathFn1::new(
                ix,
                ix + 1,
                jx,
                jx + 1,
                path.min_tree_length,
            )));
        }

        let conditions: Vec<Condition> =
            tree.conditions.iter().map(|(_, c)| c.clone()).collect();
        for c in &conditions {
            c.add_to_scale(tree, self, nlco);
        }

        self.initialized = true;
    }

    /// Index of a node's x coordinate in the state vector (y is the next
    /// slot); `None` if the node is not a variable.
    pub fn base_offset(&self, node: NodeId) -> Option<usize> {
        self.leaf_nodes
            .iter()
            .position(|&n| n == node)
            .map(|i| 1 + 2 * i)
    }

    pub fn tree_to_data(&mut self, tree: &Tree) {
        self.state[0] = tree.scale();
        for (i, &n) in self.leaf_nodes.iter().enumerate() {
            let loc = tree.node(n).loc;
            self.state[2 * i + 1] = loc.x;
            self.state[2 * i + 2] = loc.y;
        }
    }

    pub fn data_to_tree(&self, tree: &mut Tree) {
        tree.with_cleanup(|t| {
            t.set_scale(self.state[0]);
            for (i, &n) in self.leaf_nodes.iter().enumerate() {
                t.node_mut(n).loc.x = self.state[2 * i + 1];
                t.node_mut(n).loc.y = self.state[2 * i + 2];
            }
        });
    }

    /// Run the solver and copy the result into the tree. The state vector
    /// keeps the solver's final point even on failure; the tree is only
    /// written on success.
    pub fn optimize(&mut self, tree: &mut Tree, nlco: &mut Nlco) -> Result<()> {
        debug_assert!(self.initialized);
        let mut x = self.state.clone();
        let outcome = nlco.minimize(&mut x);
        self.state = x;
        outcome?;
        // A scale pinned against its collapse floor is no solution.
        if self.state[0] <= 0.1 * self.initial_scale + DIST_TOL {
            return Err(Error::BadScale);
        }
        self.data_to_tree(tree);
        Ok(())
    }

    /// Reload the tree from the snapshot taken at construction.
    pub fn revert(&self, tree: &mut Tree) -> Result<()> {
        restore_tree(tree, &self.snapshot)
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }
}
