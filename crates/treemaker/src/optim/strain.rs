//! Strain optimization: minimize the stiffness-weighted strain energy over
//! per-edge strains, moving the unpinned leaf nodes.
//!
//! Variables are `(s_1, ..., s_m, x_1, y_1, ..., x_n, y_n)`: one strain per
//! stretchy edge, then the movable coordinates. The objective is the
//! stiffness-weighted sum of squared strains plus a small coordinate
//! regularizer to keep the Hessian positive along otherwise-unconstrained
//! directions.

use crate::error::{Error, Result};
use crate::nlco::fns::{MultiStrainPathFn1, MultiStrainPathFn2, MultiStrainPathFn3};
use crate::nlco::{CallCounter, DifferentiableFn, Nlco};
use crate::tree::conditions::Condition;
use crate::tree::{EdgeId, NodeId, PathId, Tree};

use super::{restore_tree, snapshot_tree};

const MIN_STRAIN: f64 = -0.999;
const MAX_STRAIN: f64 = 10.0;
const COORD_REGULARIZER: f64 = 1.0e-6;

/// Stiffness-weighted strain energy plus the coordinate regularizer.
struct StrainObjective {
    stiffness: Vec<f64>,
    num_vars: usize,
    calls: CallCounter,
}

impl DifferentiableFn for StrainObjective {
    fn value(&self, x: &[f64]) -> f64 {
        self.calls.count_value();
        let ns = self.stiffness.len();
        let mut sum = 0.0;
        for (k, &s) in self.stiffness.iter().enumerate() {
            sum += s * x[k] * x[k];
        }
        for &xi in x.iter().take(self.num_vars).skip(ns) {
            sum += COORD_REGULARIZER * xi * xi;
        }
        sum
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        self.calls.count_grad();
        grad.fill(0.0);
        let ns = self.stiffness.len();
        for (k, &s) in self.stiffness.iter().enumerate() {
            grad[k] = 2.0 * s * x[k];
        }
        for i in ns..self.num_vars {
            grad[i] = 2.0 * COORD_REGULARIZER * x[i];
        }
    }

    fn call_counts(&self) -> (usize, usize) {
        self.calls.counts()
    }
}

pub struct StrainOptimizer {
    moving_nodes: Vec<NodeId>,
    stretchy_edges: Vec<EdgeId>,
    num_vars: usize,
    state: Vec<f64>,
    snapshot: String,
    initialized: bool,
}

impl StrainOptimizer {
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
    /// edges.
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

        let ns = self.stretchy_edges.len();
        let n = self.moving_nodes.len();
        self.num_vars = ns + 2 * n;
        nlco.set_size(self.num_vars);
        self.state = vec![0.0; self.num_vars];
        self.tree_to_data(tree);

        let mut bl = vec![0.0; self.num_vars];
        let mut bu = vec![0.0; self.num_vars];
        let w = tree.paper_width();
        let h = tree.paper_height();
        for k in 0..ns {
            bl[k] = MIN_STRAIN;
            bu[k] = MAX_STRAIN;
        }
        for i in 0..n {
            bu[ns + 2 * i] = w;
            bu[ns + 2 * i + 1] = h;
        }
        nlco.set_bounds(bl, bu);

        let stiffness = self
            .stretchy_edges
            .iter()
            .map(|&e| tree.edge(e).stiffness)
            .collect();
        nlco.set_objective(Box::new(StrainObjective {
            stiffness,
            num_vars: self.num_vars,
            calls: CallCounter::new(),
        }));

        for p in tree.leaf_paths() {
            if tree.has_active_path_condition(p) {
                continue;
            }
            let (lfix, vi, vf) = self.fix_var_lengths(tree, p);
            let node1 = tree.path(p).front_node();
            let node2 = tree.path(p).back_node();
            match (self.node_base_offset(node1), self.node_base_offset(node2)) {
                (Some(ix), Some(jx)) => {
                    nlco.add_nonlinear_inequality(Box::new(MultiStrainPathFn1::new(
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
                    nlco.add_nonlinear_inequality(Box::new(MultiStrainPathFn2::new(
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
                    nlco.add_nonlinear_inequality(Box::new(MultiStrainPathFn2::new(
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
                        continue;
                    }
                    let l1 = tree.node(node1).loc;
                    let l2 = tree.node(node2).loc;
                    nlco.add_nonlinear_inequality(Box::new(MultiStrainPathFn3::new(
                        l1.x, l1.y, l2.x, l2.y, lfix, vi, vf,
                    )));
                }
            }
        }

        let conditions: Vec<Condition> =
            tree.conditions.iter().map(|(_, c)| c.clone()).collect();
        for c in &conditions {
            c.add_to_strain(tree, self, nlco);
        }

        self.initialized = true;
        Ok(())
    }

    /// Index of a moving node's x coordinate; `None` for frozen nodes.
    pub fn node_base_offset(&self, node: NodeId) -> Option<usize> {
        let ns = self.stretchy_edges.len();
        self.moving_nodes
            .iter()
            .position(|&n| n == node)
            .map(|i| ns + 2 * i)
    }

    /// Index of a stretchy edge's strain variable; `None` for frozen edges.
    pub fn edge_base_offset(&self, edge: EdgeId) -> Option<usize> {
        self.stretchy_edges.iter().position(|&e| e == edge)
    }

    /// Split a path's scaled length into a fixed part and per-strain
    /// variable contributions: stretchy edges give `rest + s_k * rest`,
    /// frozen edges their strained length.
    pub fn fix_var_lengths(&self, tree: &Tree, path: PathId) -> (f64, Vec<usize>, Vec<f64>) {
        let mut lfix = 0.0;
        let mut vi = Vec::new();
        let mut vf = Vec::new();
        for &e in &tree.path(path).edges {
            let edge = tree.edge(e);
            let temp = edge.length * tree.scale();
            if let Some(k) = self.edge_base_offset(e) {
                lfix += temp;
                vi.push(k);
                vf.push(temp);
            } else {
                lfix += (1.0 + edge.strain) * temp;
            }
        }
        (lfix, vi, vf)
    }

    pub fn tree_to_data(&mut self, tree: &Tree) {
        let ns = self.stretchy_edges.len();
        for (k, &e) in self.stretchy_edges.iter().enumerate() {
            self.state[k] = tree.edge(e).strain;
        }
        for (i, &n) in self.moving_nodes.iter().enumerate() {
            let loc = tree.node(n).loc;
            self.state[ns + 2 * i] = loc.x;
            self.state[ns + 2 * i + 1] = loc.y;
        }
    }

    pub fn data_to_tree(&self, tree: &mut Tree) {
        let ns = self.stretchy_edges.len();
        tree.with_cleanup(|t| {
            for (k, &e) in self.stretchy_edges.iter().enumerate() {
                t.edge_mut(e).strain = self.state[k];
            }
            for (i, &n) in self.moving_nodes.iter().enumerate() {
                t.node_mut(n).loc.x = self.state[ns + 2 * i];
                t.node_mut(n).loc.y = self.state[ns + 2 * i + 1];
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
