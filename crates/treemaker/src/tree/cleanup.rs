//! The cleanup pass that runs after every edit.
//!
//! `cleanup_after_edit` is a deterministic pipeline: recompute lengths and
//! dimensional flags, delete invalidated parts, renumber, then rebuild the
//! derived crease-pattern data (depth, bend, corridors, facet order, color,
//! fold). Later stages depend on the flags set by earlier ones; any stage
//! that finds the tree wanting records the failure in the validity flags and
//! stops the pipeline. Cleanup itself never fails.

use crate::geom::{self, Vec2};
use crate::tol::{is_tiny, CONVEXITY_TOL, DIST_TOL, MOVE_TOL};
use crate::tree::edit::union_push;
use crate::tree::parts::{CreaseKind, FacetColor, Fold, VertexOwner, DEPTH_NOT_SET,
    DISCRETE_DEPTH_NOT_SET};
use crate::tree::{CreaseId, EdgeId, FacetId, NodeId, PartId, PathId, PolyId, Tree, VertexId};

/// Uniform test of path feasibility: the span may fall short of the minimum
/// length by at most the distance tolerance. Lengths in paper units.
pub fn test_is_feasible(act_len: f64, min_len: f64) -> bool {
    act_len >= min_len - DIST_TOL
}

/// Uniform test of path activity: span equals minimum length to tolerance.
pub fn test_is_active(act_len: f64, min_len: f64) -> bool {
    is_tiny(act_len - min_len)
}

impl Tree {
    /// Recompute the length-like fields of a tree path, plus feasibility and
    /// activity. Only meaningful for tree paths; non-leaf paths get
    /// innocuous zero actual lengths.
    pub(crate) fn tree_path_calc_lengths(&mut self, path: PathId) {
        debug_assert!(self.path(path).is_tree_path());
        let mut min_tree = 0.0;
        for i in 0..self.path(path).edges.len() {
            let e = self.path(path).edges[i];
            min_tree += self.edge(e).strained_length();
        }
        let scale = self.scale;
        let (front, back, is_leaf) = {
            let p = self.path(path);
            (p.front_node(), p.back_node(), p.is_leaf_path)
        };
        let act_paper = if is_leaf {
            (self.node(front).loc - self.node(back).loc).norm()
        } else {
            0.0
        };
        let p = self.path_mut(path);
        p.min_tree_length = min_tree;
        p.min_paper_length = min_tree * scale;
        p.act_paper_length = act_paper;
        p.act_tree_length = act_paper / scale;
        if is_leaf {
            p.is_feasible_path = test_is_feasible(p.act_paper_length, p.min_paper_length);
            p.is_active_path = test_is_active(p.act_paper_length, p.min_paper_length);
        } else {
            p.is_feasible_path = false;
            p.is_active_path = false;
        }
    }

    /// The pipeline. See the module docs for the stage ordering contract.
    pub(crate) fn cleanup_after_edit(&mut self) {
        // Flags that later stages set; cleared up front in case we bail.
        self.is_feasible = false;
        self.is_polygon_valid = false;
        self.is_polygon_filled = false;
        self.is_vertex_depth_valid = false;
        self.is_facet_data_valid = false;

        // Conditions whose referents vanished go first.
        for id in self.conditions.ids() {
            let valid = self.condition(id).is_valid(self);
            if !valid {
                self.delete_condition(id);
            }
        }

        if self.owned_nodes.is_empty() {
            return;
        }

        let leaf_nodes = self.leaf_nodes();

        // Clamp node locations into the paper and clear dimensional flags.
        let w = self.paper_width;
        let h = self.paper_height;
        for &n in &self.owned_nodes.clone() {
            let node = self.node_mut(n);
            node.loc.x = node.loc.x.clamp(0.0, w);
            node.loc.y = node.loc.y.clamp(0.0, h);
            node.is_border_node = false;
            node.is_pinned_node = false;
            node.is_polygon_node = false;
            node.is_conditioned_node = false;
        }
        for &e in &self.owned_edges.clone() {
            let edge = self.edge_mut(e);
            edge.is_pinned_edge = false;
            edge.is_conditioned_edge = false;
        }

        let leaf_paths = self.leaf_paths();

        // Path lengths, feasibility, activity.
        for &p in &self.owned_paths.clone() {
            self.tree_path_calc_lengths(p);
            let path = self.path_mut(p);
            path.is_border_path = false;
            path.is_polygon_path = false;
            path.is_conditioned_path = false;
        }

        // Tree feasibility: every leaf path and every condition.
        self.is_feasible = leaf_paths.iter().all(|&p| self.path(p).is_feasible_path);
        for id in self.conditions.ids() {
            let feasible = self.condition(id).calc_feasibility(self);
            self.condition_mut(id).is_feasible = feasible;
            self.is_feasible &= feasible;
        }

        // Conditioned flags on the parts each condition touches.
        for id in self.conditions.ids() {
            for &n in &self.owned_nodes.clone() {
                if self.condition(id).uses_node(n) {
                    self.node_mut(n).is_conditioned_node = true;
                }
            }
            for &e in &self.owned_edges.clone() {
                if self.condition(id).uses_edge(e) {
                    self.edge_mut(e).is_conditioned_edge = true;
                }
            }
            for &p in &self.owned_paths.clone() {
                if self.condition(id).uses_path(p) {
                    self.path_mut(p).is_conditioned_path = true;
                }
            }
        }

        self.calc_border_nodes_and_paths(&leaf_nodes);
        self.calc_pinned_nodes_and_edges(&leaf_nodes, &leaf_paths);
        self.calc_polygon_network(&leaf_nodes, &leaf_paths);
        self.calc_polygon_validity(&leaf_nodes);
        self.kill_orphan_vertices_and_creases();

        // Depth needs the root to be a tree node with index 1: pull the
        // lowest-indexed tree node to the front before renumbering.
        if let Some((root, _)) = self
            .nodes
            .iter()
            .filter(|(_, n)| n.is_tree_node())
            .min_by_key(|(_, n)| n.index)
        {
            self.node_mut(root).index = 0;
        }
        self.calc_part_indices();

        // Clear derived crease-pattern data before the bail-out-able phase.
        for id in self.vertices.ids() {
            self.vertex_mut(id).clear_cleanup_data();
        }
        for id in self.creases.ids() {
            self.crease_mut(id).clear_cleanup_data();
        }
        for id in self.facets.ids() {
            self.facet_mut(id).clear_cleanup_data();
        }

        self.calc_polygon_filled();
        if !self.is_polygon_filled {
            return;
        }

        self.calc_depth_and_bend();

        self.calc_vertex_depth_validity();
        if !self.is_vertex_depth_valid {
            return;
        }

        self.calc_facet_data_validity();
        if !self.is_facet_data_valid {
            return;
        }

        self.calc_facet_corridor_edges();

        self.calc_facet_order();
        if !self.is_local_root_connectable {
            return;
        }

        self.calc_facet_color();
        self.calc_fold_directions();
    }

    // ---- border ----------------------------------------------------------

    /// Walk the convex hull of the leaf nodes, marking border nodes and the
    /// leaf paths between consecutive border nodes.
    fn calc_border_nodes_and_paths(&mut self, leaf_nodes: &[NodeId]) {
        if leaf_nodes.len() < 3 {
            return;
        }

        // Find a starting hull node: the one at minimum angle from a point
        // below and left of the paper.
        let start_pt = Vec2::new(-1.0, -1.0);
        let mut start_angle = std::f64::consts::TAU;
        let mut start_node = None;
        for &n in leaf_nodes {
            let a = geom::angle(self.node(n).loc - start_pt);
            if start_angle > a {
                start_angle = a;
                start_node = Some(n);
            }
        }
        let start_node = start_node.expect("leaf node search failed");
        let mut border_nodes = vec![start_node];

        // Accumulate hull nodes by smallest turn angle; near-ties (which
        // clamped nodes make common) break toward the closer node.
        let mut prev_pt = start_pt;
        let mut this_node = start_node;
        let mut this_pt = self.node(this_node).loc;
        let mut prev_node = start_node;
        loop {
            let mut best_node = None;
            let mut best_angle = std::f64::consts::TAU;
            let mut best_dist = f64::INFINITY;
            for &n in leaf_nodes {
                if n == prev_node || n == this_node {
                    continue;
                }
                let pt = self.node(n).loc;
                let a = geom::angle_change(prev_pt, this_pt, pt);
                // Slight concavity tolerance can wrap an angle just past pi
                // around to near -pi; those nodes are never hull members.
                if a < -std::f64::consts::FRAC_PI_2 {
                    continue;
                }
                let d = (pt - this_pt).norm();
                if a < best_angle - CONVEXITY_TOL
                    || ((a - best_angle).abs() < CONVEXITY_TOL && d < best_dist)
                {
                    best_node = Some(n);
                    best_angle = a;
                    best_dist = d;
                }
            }
            let best_node = best_node.expect("hull walk found no next node");
            if best_node == start_node {
                break;
            }
            border_nodes.push(best_node);
            prev_node = this_node;
            prev_pt = this_pt;
            this_node = best_node;
            this_pt = self.node(this_node).loc;
        }

        for &n in &border_nodes {
            self.node_mut(n).is_border_node = true;
        }
        for i in 1..border_nodes.len() {
            let p = self.get_leaf_path(border_nodes[i - 1], border_nodes[i]);
            self.path_mut(p).is_border_path = true;
        }
        let p = self.get_leaf_path(*border_nodes.last().unwrap(), border_nodes[0]);
        self.path_mut(p).is_border_path = true;
    }

    // ---- pinned ----------------------------------------------------------

    fn calc_pinned_nodes_and_edges(&mut self, leaf_nodes: &[NodeId], leaf_paths: &[PathId]) {
        for &n in leaf_nodes {
            self.calc_is_pinned_node(n);
        }
        // Edges on active paths between pinned nodes are pinned.
        for &p in leaf_paths {
            let path = self.path(p);
            if path.is_active_path
                && self.node(path.front_node()).is_pinned_node
                && self.node(path.back_node()).is_pinned_node
            {
                for e in self.path(p).edges.clone() {
                    self.edge_mut(e).is_pinned_edge = true;
                }
            }
        }
    }

    /// A leaf node is pinned when the angles of its incident active paths
    /// (plus fictitious angles for any paper edge it sits on) leave no gap
    /// wider than pi.
    fn calc_is_pinned_node(&mut self, node: NodeId) {
        use std::f64::consts::{FRAC_PI_2, PI};
        self.node_mut(node).is_pinned_node = false;

        let loc = self.node(node).loc;
        let mut angles: Vec<f64> = Vec::new();
        for &p in &self.node(node).leaf_paths {
            let path = self.path(p);
            if !path.is_active_path {
                continue;
            }
            let other = path.other_node(node);
            angles.push(geom::angle(self.node(other).loc - loc));
        }

        if is_tiny(loc.x) {
            angles.push(-PI); // left
        }
        if is_tiny(loc.x - self.paper_width) {
            angles.push(0.0); // right
        }
        if is_tiny(loc.y - self.paper_height) {
            angles.push(FRAC_PI_2); // top
        }
        if is_tiny(loc.y) {
            angles.push(-FRAC_PI_2); // bottom
        }

        if angles.len() < 2 {
            return;
        }
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for i in 0..angles.len() - 1 {
            if angles[i + 1] - angles[i] > PI + CONVEXITY_TOL {
                return;
            }
        }
        // Wrap-around gap check; the angles are sorted in (-pi, pi].
        if angles.first().unwrap() - angles.last().unwrap() + PI > CONVEXITY_TOL {
            return;
        }

        self.node_mut(node).is_pinned_node = true;
    }

    // ---- polygon network --------------------------------------------------

    fn calc_polygon_network(&mut self, leaf_nodes: &[NodeId], leaf_paths: &[PathId]) {
        // Seed: interior paths must be active; border paths need only be
        // feasible. Nodes must be pinned or on the border.
        for &p in leaf_paths {
            let path = self.path(p);
            let is_poly =
                path.is_active_path || (path.is_border_path && path.is_feasible_path);
            self.path_mut(p).is_polygon_path = is_poly;
        }
        for &n in leaf_nodes {
            let node = self.node(n);
            if node.is_pinned_node || node.is_border_node {
                self.node_mut(n).is_polygon_node = true;
            }
        }
        // Nodes touching an infeasible path cannot anchor polygons (nor
        // count as pinned).
        for &p in leaf_paths {
            if !self.path(p).is_feasible_path {
                let front = self.path(p).front_node();
                let back = self.path(p).back_node();
                for n in [front, back] {
                    let node = self.node_mut(n);
                    node.is_polygon_node = false;
                    node.is_pinned_node = false;
                }
            }
        }

        // Prune to a fixpoint: polygon paths join two polygon nodes; polygon
        // nodes carry at least two polygon paths.
        loop {
            let mut changed = false;
            for &p in leaf_paths {
                if !self.path(p).is_polygon_path {
                    continue;
                }
                let front = self.path(p).front_node();
                let back = self.path(p).back_node();
                if !(self.node(front).is_polygon_node && self.node(back).is_polygon_node) {
                    self.path_mut(p).is_polygon_path = false;
                    changed = true;
                }
            }
            for &n in leaf_nodes {
                if !self.node(n).is_polygon_node {
                    continue;
                }
                let count = self
                    .node(n)
                    .leaf_paths
                    .iter()
                    .filter(|&&p| self.path(p).is_polygon_path)
                    .count();
                if count < 2 {
                    self.node_mut(n).is_polygon_node = false;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // Polys invalidated by the edit (moved corners, lost paths,
        // convexity, swallowed nodes) die with all their substructure.
        let doomed: Vec<PolyId> = self
            .polys
            .iter()
            .filter(|(id, _)| !self.calc_poly_is_valid(*id))
            .map(|(id, _)| id)
            .collect();
        for p in doomed {
            if self.polys.contains(p) {
                self.delete_poly(p);
            }
        }
    }

    /// Validity of an existing poly against the current tree state.
    pub(crate) fn calc_poly_is_valid(&self, poly: PolyId) -> bool {
        let p = self.poly(poly);
        // Sub-polys live and die with their owners.
        if p.is_sub_poly {
            return true;
        }
        if p.node_locs.len() != p.ring_nodes.len() {
            return false;
        }
        for (i, &n) in p.ring_nodes.iter().enumerate() {
            if (p.node_locs[i] - self.node(n).loc).norm() > MOVE_TOL {
                return false;
            }
        }
        if p.ring_paths.iter().any(|&rp| !self.path(rp).is_polygon_path) {
            return false;
        }
        if !self.calc_poly_is_convex(poly) {
            return false;
        }
        let leaf_nodes = self.leaf_nodes();
        if self.calc_poly_encloses_node(poly, &leaf_nodes) {
            return false;
        }
        true
    }

    /// Convexity of the ring taken CCW; a CW ring reports nonconvex.
    pub(crate) fn calc_poly_is_convex(&self, poly: PolyId) -> bool {
        let ring = &self.poly(poly).ring_nodes;
        let n = ring.len();
        debug_assert!(n >= 3);
        for i in 0..n - 2 {
            let a = geom::angle_change(
                self.node(ring[i]).loc,
                self.node(ring[(i + 1) % n]).loc,
                self.node(ring[(i + 2) % n]).loc,
            );
            if a < -CONVEXITY_TOL {
                return false;
            }
        }
        true
    }

    /// Point-in-poly test against the ring. Convex polys only.
    pub(crate) fn poly_convex_encloses(&self, poly: PolyId, pt: Vec2) -> bool {
        let p = self.poly(poly);
        let centroid = p.centroid;
        for &rp in &p.ring_paths {
            let path = self.path(rp);
            let p1 = self.node(path.front_node()).loc;
            let p2 = self.node(path.back_node()).loc;
            let mut q = geom::rotate_ccw_90(p2 - p1);
            if geom::inner(centroid - p1, q) < 0.0 {
                q = -q;
            }
            if geom::inner(pt - p1, q) < 0.0 {
                return false;
            }
        }
        true
    }

    /// True if the poly strictly encloses any listed node that is not one of
    /// its own ring corners.
    pub(crate) fn calc_poly_encloses_node(&self, poly: PolyId, nodes: &[NodeId]) -> bool {
        for &n in nodes {
            if !self.poly(poly).ring_nodes.contains(&n)
                && self.poly_convex_encloses(poly, self.node(n).loc)
            {
                return true;
            }
        }
        false
    }

    /// Complete network check: every leaf node anchors at least two polygon
    /// paths, and every polygon path has a poly on each eligible side.
    fn calc_polygon_validity(&mut self, leaf_nodes: &[NodeId]) {
        self.is_polygon_valid = true;
        for &n in leaf_nodes {
            let count = self
                .node(n)
                .leaf_paths
                .iter()
                .filter(|&&p| self.path(p).is_polygon_path)
                .count();
            if count < 2 {
                self.is_polygon_valid = false;
                return;
            }
        }
        for &p in &self.owned_paths {
            let path = self.path(p);
            if !path.is_polygon_path {
                continue;
            }
            if path.is_border_path {
                if path.fwd_poly.is_none() && path.bkd_poly.is_none() {
                    self.is_polygon_valid = false;
                    return;
                }
            } else if path.fwd_poly.is_none() || path.bkd_poly.is_none() {
                self.is_polygon_valid = false;
                return;
            }
        }
    }

    // ---- orphan removal ---------------------------------------------------

    pub(crate) fn path_is_incident_to_filled_poly(&self, path: PathId) -> bool {
        let p = self.path(path);
        if let Some(f) = p.fwd_poly {
            if self.poly(f).has_contents() {
                return true;
            }
        }
        if let Some(b) = p.bkd_poly {
            if self.poly(b).has_contents() {
                return true;
            }
        }
        false
    }

    /// Remove creases and vertices that no filled poly needs any more.
    fn kill_orphan_vertices_and_creases(&mut self) {
        for id in self.creases.ids().into_iter().rev() {
            let owner = self.crease(id).owner;
            match owner {
                crate::tree::CreaseOwner::Poly(_) => continue,
                crate::tree::CreaseOwner::Path(p) => {
                    if !self.paths.contains(p) {
                        self.delete_crease(id);
                        continue;
                    }
                    if self.path(p).is_sub_path {
                        continue;
                    }
                    if self.path_is_incident_to_filled_poly(p) {
                        continue;
                    }
                    self.delete_crease(id);
                }
            }
        }

        for id in self.vertices.ids().into_iter().rev() {
            let owner = self.vertex(id).owner;
            match owner {
                VertexOwner::Node(n) => {
                    if !self.nodes.contains(n) {
                        self.delete_vertex(id);
                        continue;
                    }
                    if self.node(n).is_sub_node {
                        continue;
                    }
                    if self.node(n).is_branch_node() {
                        // The node grew into a branch since the vertex was
                        // built; branch nodes carry no vertex of their own.
                        self.delete_vertex(id);
                        continue;
                    }
                    let keep = self
                        .node(n)
                        .leaf_paths
                        .clone()
                        .into_iter()
                        .any(|p| self.path_is_incident_to_filled_poly(p));
                    if keep {
                        continue;
                    }
                    self.delete_vertex(id);
                }
                VertexOwner::Path(p) => {
                    if !self.paths.contains(p) {
                        self.delete_vertex(id);
                        continue;
                    }
                    if self.path(p).is_sub_path {
                        continue;
                    }
                    if self.path_is_incident_to_filled_poly(p) {
                        continue;
                    }
                    self.delete_vertex(id);
                }
            }
        }
    }

    // ---- renumbering -------------------------------------------------------

    /// Reassign 1-based display indices to every part kind, preserving the
    /// current index order.
    pub(crate) fn calc_part_indices(&mut self) {
        fn renumber<I: PartId, T>(
            arena: &mut crate::tree::Arena<I, T>,
            index: impl Fn(&T) -> usize,
            set_index: impl Fn(&mut T, usize),
        ) {
            let mut ids: Vec<(I, usize)> =
                arena.iter().map(|(id, t)| (id, index(t))).collect();
            ids.sort_by_key(|&(id, ix)| (ix, id.raw()));
            for (k, (id, _)) in ids.into_iter().enumerate() {
                set_index(arena.get_mut(id).unwrap(), k + 1);
            }
        }
        renumber(&mut self.nodes, |n| n.index, |n, i| n.index = i);
        renumber(&mut self.edges, |e| e.index, |e, i| e.index = i);
        renumber(&mut self.paths, |p| p.index, |p, i| p.index = i);
        renumber(&mut self.polys, |p| p.index, |p, i| p.index = i);
        renumber(&mut self.vertices, |v| v.index, |v, i| v.index = i);
        renumber(&mut self.creases, |c| c.index, |c, i| c.index = i);
        renumber(&mut self.facets, |f| f.index, |f, i| f.index = i);
        renumber(&mut self.conditions, |c| c.index, |c, i| c.index = i);
    }

    fn calc_polygon_filled(&mut self) {
        self.is_polygon_filled = !self.owned_polys.is_empty()
            && self
                .owned_polys
                .iter()
                .all(|&p| self.poly(p).has_contents());
    }

    // ---- depth and bend ----------------------------------------------------

    /// Accumulated reductions back to the original leaf path this path was
    /// (transitively) inset from. Identity for tree paths.
    pub(crate) fn max_outset_path(&self, path: PathId) -> (PathId, f64, f64) {
        let p = self.path(path);
        match p.outset_path {
            None => (path, 0.0, 0.0),
            Some(outset) => {
                let (max_path, front, back) = self.max_outset_path(outset);
                (
                    max_path,
                    front + p.front_reduction,
                    back + p.back_reduction,
                )
            }
        }
    }

    /// Depth of a vertex relative to the local depth metric of this path:
    /// distance along the path from its minimum-depth point.
    pub(crate) fn path_set_vertex_depth(&mut self, path: PathId, vertex: VertexId) {
        let (p1, p2, min_depth, min_depth_dist) = {
            let p = self.path(path);
            (
                self.node(p.front_node()).loc,
                self.node(p.back_node()).loc,
                p.min_depth,
                p.min_depth_dist,
            )
        };
        let loc = self.vertex(vertex).loc;
        let d = geom::inner(loc - p1, p2 - p1) / (p2 - p1).norm();
        self.vertex_mut(vertex).depth = if d < min_depth_dist {
            min_depth + min_depth_dist - d
        } else {
            min_depth + d - min_depth_dist
        };
    }

    fn calc_depth_and_bend(&mut self) {
        if !self.is_polygon_valid || self.nodes.is_empty() {
            return;
        }

        // Tree node depths: root at zero, everyone else at the minimum paper
        // length of its path from the root.
        let root = self.root_node();
        self.node_mut(root).depth = 0.0;
        for p in self.owned_paths.clone() {
            let (front, back) = {
                let path = self.path(p);
                (path.front_node(), path.back_node())
            };
            let other = if front == root {
                back
            } else if back == root {
                front
            } else {
                continue;
            };
            let depth = self.path(p).min_paper_length;
            self.node_mut(other).depth = depth;
        }

        // Per-path local depth metric.
        for p in self.paths.ids() {
            let path = self.path_mut(p);
            path.min_depth = DEPTH_NOT_SET;
            path.min_depth_dist = 0.0;
        }
        for p in self.paths.ids() {
            if !self.path(p).is_leaf_path {
                continue;
            }
            let nodes = self.path(p).nodes.clone();
            let edges = self.path(p).edges.clone();
            let mut min_depth = self.node(nodes[0]).depth;
            let mut min_depth_dist = 0.0;
            for j in 1..nodes.len() {
                let node_depth = self.node(nodes[j]).depth;
                if min_depth > node_depth {
                    min_depth = node_depth;
                    min_depth_dist += self.edge(edges[j - 1]).strained_scaled_length(self.scale);
                }
            }
            let path = self.path_mut(p);
            path.min_depth = min_depth;
            path.min_depth_dist = min_depth_dist;
        }
        // Gusset paths inherit their metric from the leaf path they were
        // inset from, shifted by the accumulated front reduction.
        for p in self.paths.ids() {
            if !self.path(p).is_gusset_path() {
                continue;
            }
            let (outset, front_red, _back_red) = self.max_outset_path(p);
            let (min_depth, min_depth_dist) = {
                let o = self.path(outset);
                (o.min_depth, o.min_depth_dist)
            };
            let path = self.path_mut(p);
            path.min_depth = min_depth;
            path.min_depth_dist = min_depth_dist - front_red;
        }

        for v in self.vertices.ids() {
            self.vertex_mut(v).depth = DEPTH_NOT_SET;
        }

        // Depths along active axial and gusset ring paths, plus the
        // ridgeline vertices above them.
        for poly in self.polys.ids() {
            let ring_len = self.poly(poly).ring_nodes.len();
            for j in 0..ring_len {
                let front = self.poly(poly).ring_nodes[j];
                let back = self.poly(poly).ring_nodes[(j + 1) % ring_len];
                let path = self.poly(poly).ring_paths[j];
                if !(self.path(path).is_active_axial_path() || self.path(path).is_gusset_path())
                {
                    continue;
                }
                let ridge_vertices = self.ridgeline_vertices(poly, front, back);
                for v in ridge_vertices {
                    self.path_set_vertex_depth(path, v);
                }
                for v in self.path(path).owned_vertices.clone() {
                    self.path_set_vertex_depth(path, v);
                }
            }
        }

        // Inactive border paths: base vertices take the depth of the ridge
        // vertex at the top of their hinge crease.
        for p in self.owned_paths.clone() {
            let path = self.path(p);
            if !path.is_border_path || path.is_active_path {
                continue;
            }
            for v in self.path(p).owned_vertices.clone() {
                for c in self.vertex(v).creases.clone() {
                    if self.crease(c).kind.is_hinge() {
                        let ridge_vertex = self.crease(c).other_vertex(v);
                        self.vertex_mut(v).depth = self.vertex(ridge_vertex).depth;
                        break;
                    }
                }
            }
        }

        // Discrete depth: hops from the root, meaningful only for vertices
        // that project a tree node.
        for v in self.vertices.ids() {
            let tn = self.vertex(v).tree_node;
            let dd = match tn {
                Some(n) if self.nodes.contains(n) && self.node(n).is_tree_node() => {
                    self.discrete_depth(n)
                }
                _ => DISCRETE_DEPTH_NOT_SET,
            };
            self.vertex_mut(v).discrete_depth = dd;
        }

        // Two consecutive inactive border paths leave a vertex undepthed;
        // bend cannot be computed then.
        if self.vertices.iter().any(|(_, v)| !v.has_depth()) {
            return;
        }

        for poly in self.owned_polys.clone() {
            self.poly_calc_bend(poly);
        }
    }

    fn calc_vertex_depth_validity(&mut self) {
        self.is_vertex_depth_valid =
            !self.vertices.is_empty() && self.vertices.iter().all(|(_, v)| v.has_depth());
    }

    /// Resolve folded vs unfolded hinges, and rebuild the poly's local-root
    /// vertex and crease lists.
    fn poly_calc_bend(&mut self, poly: PolyId) {
        for c in self.poly(poly).owned_creases.clone() {
            self.crease_calc_bend(c);
        }

        // All vertices of the molecule: those on interior creases plus the
        // ring corners.
        let mut all_vertices: Vec<VertexId> = Vec::new();
        for c in self.poly(poly).owned_creases.clone() {
            for v in self.crease(c).vertices.clone() {
                union_push(&mut all_vertices, v);
            }
        }
        for n in self.poly(poly).ring_nodes.clone() {
            if let Some(v) = self.node(n).vertex() {
                union_push(&mut all_vertices, v);
            }
        }

        let mut local_root_vertices: Vec<VertexId> = Vec::new();
        let mut local_root_creases: Vec<CreaseId> = Vec::new();
        let mut min_dd = usize::MAX;
        for v in all_vertices {
            let dd = self.vertex(v).discrete_depth;
            if min_dd > dd {
                min_dd = dd;
                local_root_vertices.clear();
                local_root_creases.clear();
            }
            if min_dd == dd {
                union_push(&mut local_root_vertices, v);
                for c in self.vertex(v).creases.clone() {
                    if self.crease(c).kind.is_hinge()
                        && self.poly(poly).owned_creases.contains(&c)
                    {
                        union_push(&mut local_root_creases, c);
                    }
                }
            }
        }
        let p = self.poly_mut(poly);
        p.local_root_vertices = local_root_vertices;
        p.local_root_creases = local_root_creases;
    }

    /// A hinge crease is folded when the depth turns around at its base
    /// vertex, unfolded when the depth runs straight through.
    fn crease_calc_bend(&mut self, crease: CreaseId) {
        let kind = self.crease(crease).kind;
        if !kind.is_regular_hinge() {
            return;
        }
        let v2 = self.crease_lower_vertex(crease);
        debug_assert!(self.vertex_is_axial_or_gusset(v2));
        let (c1, c3) = self.vertex_axial_or_gusset_creases(v2);
        let v1 = self.crease(c1).other_vertex(v2);
        let v3 = self.crease(c3).other_vertex(v2);
        let d1 = self.vertex(v1).depth;
        let d2 = self.vertex(v2).depth;
        let d3 = self.vertex(v3).depth;
        debug_assert!(d1 != d2 && d2 != d3);
        self.crease_mut(crease).kind = if (d1 > d2 && d2 < d3) || (d1 < d2 && d2 > d3) {
            CreaseKind::FoldedHinge
        } else {
            CreaseKind::UnfoldedHinge
        };
    }

    // ---- facet validity, corridors, color, fold ---------------------------

    /// Facets must be well formed and the interior vertices of even degree
    /// (two-colorability).
    fn calc_facet_data_validity(&mut self) {
        self.is_facet_data_valid = false;
        if self.facets.is_empty() {
            return;
        }
        if self.facets.iter().any(|(_, f)| !f.is_well_formed) {
            return;
        }
        for (_, v) in self.vertices.iter() {
            if v.is_border_vertex {
                continue;
            }
            if v.creases.len() % 2 != 0 {
                return;
            }
        }
        self.is_facet_data_valid = true;
    }

    /// Tag every facet with the tree edge whose corridor contains it,
    /// spreading out from the axial facets whose bottom crease joins two
    /// tree-node vertices.
    fn calc_facet_corridor_edges(&mut self) {
        debug_assert!(self.is_facet_data_valid);
        for poly in self.owned_polys.clone() {
            for f in self.poly(poly).owned_facets.clone() {
                if self.facet(f).corridor_edge.is_some() || !self.facet_is_axial(f) {
                    continue;
                }
                let bot = self.facet(f).bottom_crease();
                let n1 = self.vertex(self.crease(bot).front_vertex()).tree_node;
                let n2 = self.vertex(self.crease(bot).back_vertex()).tree_node;
                let (Some(n1), Some(n2)) = (n1, n2) else {
                    continue;
                };
                let edge = self
                    .get_edge(n1, n2)
                    .expect("axial facet bottom crease must span a tree edge");
                self.set_facet_corridor_edge(poly, f, edge);
            }
        }
    }

    /// Spread a corridor edge across every facet reachable without crossing
    /// a regular hinge, staying inside the poly.
    fn set_facet_corridor_edge(&mut self, poly: PolyId, facet: FacetId, edge: EdgeId) {
        self.facet_mut(facet).corridor_edge = Some(edge);
        for c in self.facet(facet).creases.clone() {
            if self.crease(c).kind.is_regular_hinge() {
                continue;
            }
            let Some(other) = self.crease_other_facet(c, facet) else {
                continue;
            };
            if !self.poly(poly).owned_facets.contains(&other) {
                continue;
            }
            if self.facet(other).corridor_edge.is_some() {
                continue;
            }
            self.set_facet_corridor_edge(poly, other, edge);
        }
    }

    pub(crate) fn crease_other_facet(
        &self,
        crease: CreaseId,
        facet: FacetId,
    ) -> Option<FacetId> {
        let c = self.crease(crease);
        if c.fwd_facet == Some(facet) {
            c.bkd_facet
        } else if c.bkd_facet == Some(facet) {
            c.fwd_facet
        } else {
            None
        }
    }

    /// Two-color the facets from the source facet of the ordering graph.
    /// Every crease kind flips the color except an unfolded hinge.
    fn calc_facet_color(&mut self) {
        let mut source = None;
        for (id, f) in self.facets.iter() {
            if f.is_source_facet() {
                source = Some(id);
            }
        }
        let source = source.expect("ordering graph has no source facet");

        let mut stack = vec![(source, FacetColor::ColorUp)];
        while let Some((f, color)) = stack.pop() {
            if self.facet(f).color != FacetColor::NotOriented {
                continue;
            }
            self.facet_mut(f).color = color;
            for c in self.facet(f).creases.clone() {
                let Some(other) = self.crease_other_facet(c, f) else {
                    continue;
                };
                if self.facet(other).color != FacetColor::NotOriented {
                    continue;
                }
                let next = match self.crease(c).kind {
                    CreaseKind::UnfoldedHinge => color,
                    _ => color.opposite(),
                };
                stack.push((other, next));
            }
        }
    }

    /// Fold sense per crease: border creases stay borders, same-color
    /// neighbors fold flat, and otherwise the stacking order of the up-face
    /// decides mountain vs valley.
    fn calc_fold_directions(&mut self) {
        for c in self.creases.ids() {
            let crease = self.crease(c);
            let fold = match (crease.fwd_facet, crease.bkd_facet) {
                (Some(fwd), Some(bkd)) => {
                    let cf = self.facet(fwd).color;
                    let cb = self.facet(bkd).color;
                    if cf == cb {
                        Fold::Flat
                    } else {
                        let fwd_higher = self.facet(fwd).order > self.facet(bkd).order;
                        match (cf, fwd_higher) {
                            (FacetColor::ColorUp, true) => Fold::Mountain,
                            (FacetColor::ColorUp, false) => Fold::Valley,
                            (_, true) => Fold::Valley,
                            (_, false) => Fold::Mountain,
                        }
                    }
                }
                _ => Fold::Border,
            };
            self.crease_mut(c).fold = fold;
        }
    }
}

