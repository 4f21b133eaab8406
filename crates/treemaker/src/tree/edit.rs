//! Editing operations on the tree.
//!
//! Every public method here mutates under the cleanup guard, so a single
//! [`Tree::cleanup_after_edit`] pass runs when the outermost edit finishes.
//! Structural preconditions are checked before anything is touched; a
//! failed precondition returns an error and leaves the tree unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::geom::Vec2;
use crate::tol::is_tiny;
use crate::tree::conditions::{Condition, ConditionKind};
use crate::tree::parts::{NodeOwner, Path, PathOwner};
use crate::tree::{ConditionId, EdgeId, NodeId, PathId, PolyId, Tree};

const PERTURBATION_SIZE: f64 = 1.0e-2;

/// Push an id onto a list unless it is already present.
pub(crate) fn union_push<T: PartialEq + Copy>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

impl Tree {
    /// Copy the metric and flag fields of a tree path into a fresh path
    /// record (references to polys, vertices, and creases are not copied).
    fn clone_tree_path(&self, src: PathId) -> Path {
        let s = self.path(src);
        let mut p = Path::new(PathOwner::Tree);
        p.min_tree_length = s.min_tree_length;
        p.min_paper_length = s.min_paper_length;
        p.is_leaf_path = s.is_leaf_path;
        p.is_feasible_path = s.is_feasible_path;
        p.is_active_path = s.is_active_path;
        p.is_border_path = s.is_border_path;
        p.is_polygon_path = s.is_polygon_path;
        p.is_conditioned_path = s.is_conditioned_path;
        p.is_sub_path = s.is_sub_path;
        p.nodes = s.nodes.clone();
        p.edges = s.edges.clone();
        p
    }

    /// Path consisting of a single edge.
    fn make_path_from_edge(&mut self, edge: EdgeId) -> PathId {
        let e = self.edge(edge);
        let mut p = Path::new(PathOwner::Tree);
        p.min_tree_length = e.length;
        p.nodes = vec![e.nodes[0], e.nodes[1]];
        p.edges = vec![edge];
        self.make_path(p)
    }

    /// Add a node to the tree, connected to `from` by a new unit-length
    /// edge. With `from == None` the node becomes the first node of the
    /// tree and no edge is created.
    pub fn add_node(&mut self, from: Option<NodeId>, loc: Vec2) -> (NodeId, Option<EdgeId>) {
        debug_assert!(match from {
            None => self.owned_nodes.is_empty(),
            Some(n) => self.owned_nodes.contains(&n) && self.node(n).is_tree_node(),
        });
        self.with_cleanup(|t| {
            let new_node = t.make_node(NodeOwner::Tree, loc);
            t.node_mut(new_node).is_leaf_node = true;
            let Some(from) = from else {
                return (new_node, None);
            };

            let new_edge = t.make_edge(from, new_node, 1.0);

            // The attachment node stays a leaf only in the two-node tree;
            // otherwise it just became a branch node and its old leaf paths
            // lose their leafness.
            let from_is_leaf = t.owned_nodes.len() == 2;
            t.node_mut(from).is_leaf_node = from_is_leaf;
            let old_leaf_paths = std::mem::take(&mut t.node_mut(from).leaf_paths);
            for p in old_leaf_paths {
                t.path_mut(p).is_leaf_path = false;
            }

            // Clone every path ending on the attachment node and extend the
            // clone to the new node.
            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for src in snapshot.into_iter().rev() {
                let (front, back) = {
                    let p = t.path(src);
                    (p.front_node(), p.back_node())
                };
                if front != from && back != from {
                    continue;
                }
                let mut cloned = t.clone_tree_path(src);
                let other_node;
                if front == from {
                    cloned.nodes.insert(0, new_node);
                    cloned.edges.insert(0, new_edge);
                    other_node = back;
                } else {
                    cloned.nodes.push(new_node);
                    cloned.edges.push(new_edge);
                    other_node = front;
                }
                let new_path = t.make_path(cloned);
                if t.node(other_node).is_leaf_node {
                    if t.node(from).is_leaf_node {
                        t.node_mut(other_node).leaf_paths.retain(|&p| p != src);
                    }
                    t.node_mut(other_node).leaf_paths.push(new_path);
                    t.path_mut(new_path).is_leaf_path = true;
                    t.node_mut(new_node).leaf_paths.push(new_path);
                }
            }

            // The single-edge path for the new edge itself.
            let edge_path = t.make_path_from_edge(new_edge);
            if t.node(from).is_leaf_node {
                t.path_mut(edge_path).is_leaf_path = true;
                t.node_mut(from).leaf_paths.push(edge_path);
                t.node_mut(new_node).leaf_paths.push(edge_path);
            }

            (new_node, Some(new_edge))
        })
    }

    /// Split an edge at `split_loc` (distance in tree units along the
    /// strained length), creating a new branch node.
    pub fn split_edge(&mut self, edge: EdgeId, split_loc: f64) -> Result<NodeId> {
        let strained = self.edge(edge).strained_length();
        if split_loc <= 0.0 || split_loc >= strained {
            return Err(Error::BadSplitEdge);
        }
        Ok(self.with_cleanup(|t| {
            // Splitting invalidates any molecule built over the edge; kill
            // the affected top-level polys before touching the structure.
            let affected: Vec<_> = t
                .owned_polys
                .clone()
                .into_iter()
                .filter(|&p| t.poly_subtree_contains_edge(p, edge))
                .collect();
            for p in affected {
                t.delete_poly(p);
            }

            let (node1, node2, strain, stiffness) = {
                let e = t.edge(edge);
                (e.nodes[0], e.nodes[1], e.strain, e.stiffness)
            };
            let loc1 = t.node(node1).loc;
            let loc2 = t.node(node2).loc;
            let loc = ((strained - split_loc) * loc1 + split_loc * loc2) / strained;
            let new_node = t.make_node(NodeOwner::Tree, loc);

            let edge1 = t.make_edge(node1, new_node, split_loc / (1.0 + strain));
            t.edge_mut(edge1).strain = strain;
            t.edge_mut(edge1).stiffness = stiffness;
            let edge2 = t.make_edge(new_node, node2, (strained - split_loc) / (1.0 + strain));
            t.edge_mut(edge2).strain = strain;
            t.edge_mut(edge2).stiffness = stiffness;

            // Clone paths ending on either endpoint (and not crossing the
            // split edge) out to the new node.
            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for src in snapshot {
                let (front, back, crosses) = {
                    let p = t.path(src);
                    (p.front_node(), p.back_node(), p.edges.contains(&edge))
                };
                if front != node1 && front != node2 && back != node1 && back != node2 {
                    continue;
                }
                if crosses {
                    continue;
                }
                let mut cloned = t.clone_tree_path(src);
                if front == node1 {
                    cloned.nodes.insert(0, new_node);
                    cloned.edges.insert(0, edge1);
                    cloned.min_tree_length += t.edge(edge1).length;
                } else if front == node2 {
                    cloned.nodes.insert(0, new_node);
                    cloned.edges.insert(0, edge2);
                    cloned.min_tree_length += t.edge(edge2).length;
                } else if back == node1 {
                    cloned.nodes.push(new_node);
                    cloned.edges.push(edge1);
                    cloned.min_tree_length += t.edge(edge1).length;
                } else {
                    cloned.nodes.push(new_node);
                    cloned.edges.push(edge2);
                    cloned.min_tree_length += t.edge(edge2).length;
                }
                cloned.is_leaf_path = false;
                t.make_path(cloned);
            }

            // Paths for the two replacement edges.
            t.make_path_from_edge(edge1);
            t.make_path_from_edge(edge2);

            // Splice the new node into every path that crossed the old edge.
            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for pid in snapshot {
                let p = t.path(pid);
                let Some(ne) = p.edges.iter().position(|&e| e == edge) else {
                    continue;
                };
                let nn1 = p.nodes.iter().position(|&n| n == node1).unwrap();
                let nn2 = p.nodes.iter().position(|&n| n == node2).unwrap();
                let p = t.path_mut(pid);
                p.edges.remove(ne);
                if nn2 == nn1 + 1 {
                    p.edges.insert(ne, edge1);
                    p.edges.insert(ne + 1, edge2);
                    p.nodes.insert(nn2, new_node);
                } else {
                    p.edges.insert(ne, edge2);
                    p.edges.insert(ne + 1, edge1);
                    p.nodes.insert(nn1, new_node);
                }
            }

            t.delete_edge(edge);
            new_node
        }))
    }

    /// True if the subtree spanned by a poly's ring paths contains the edge.
    pub(crate) fn poly_subtree_contains_edge(&self, poly: PolyId, edge: EdgeId) -> bool {
        self.poly(poly)
            .ring_paths
            .iter()
            .any(|&p| self.path(p).edges.contains(&edge))
    }

    pub fn can_absorb_node(&self, node: NodeId) -> bool {
        self.node(node).is_redundant()
    }

    /// Absorb a degree-two node, merging its edges into one. The inverse of
    /// [`Tree::split_edge`].
    pub fn absorb_node(&mut self, node: NodeId) -> Result<EdgeId> {
        if !self.can_absorb_node(node) {
            return Err(Error::BadAbsorbNode);
        }
        Ok(self.with_cleanup(|t| {
            let edge1 = t.node(node).edges[0];
            let edge2 = t.node(node).edges[1];
            let node1 = t.edge(edge1).other_node(node);
            let node2 = t.edge(edge2).other_node(node);

            // Path deletion below cascades into polys; wipe them all rather
            // than chase down which ones were corrupted.
            t.kill_polys_and_crease_pattern_inner();

            let merged_length = t.edge(edge1).strained_length() + t.edge(edge2).strained_length();
            let new_edge = t.make_edge(node1, node2, merged_length);

            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for pid in snapshot.into_iter().rev() {
                if t.path(pid).starts_or_ends_with(node) {
                    t.delete_path(pid);
                }
            }
            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for pid in snapshot {
                let p = t.path(pid);
                if p.edges.contains(&edge1) && p.edges.contains(&edge2) {
                    let p = t.path_mut(pid);
                    for e in p.edges.iter_mut() {
                        if *e == edge1 {
                            *e = new_edge;
                        }
                    }
                }
            }

            t.delete_node(node);
            t.delete_edge(edge1);
            t.delete_edge(edge2);
            new_edge
        }))
    }

    pub fn can_absorb_nodes(&self, nodes: &[NodeId]) -> bool {
        nodes.iter().all(|&n| self.can_absorb_node(n))
    }

    pub fn absorb_nodes(&mut self, nodes: &[NodeId]) -> Result<()> {
        if !self.can_absorb_nodes(nodes) {
            return Err(Error::BadAbsorbNode);
        }
        self.with_cleanup(|t| {
            for &n in nodes {
                t.absorb_node(n)?;
            }
            Ok(())
        })
    }

    /// Absorb every degree-two node in the tree.
    pub fn absorb_redundant_nodes(&mut self) -> Result<()> {
        self.with_cleanup(|t| {
            let snapshot: Vec<NodeId> = t.owned_nodes.clone();
            for n in snapshot.into_iter().rev() {
                if t.nodes.contains(n) && t.node(n).is_redundant() {
                    t.absorb_node(n)?;
                }
            }
            Ok(())
        })
    }

    /// Absorb an edge, coalescing its endpoints into the front node.
    pub fn absorb_edge(&mut self, edge: EdgeId) {
        self.with_cleanup(|t| {
            let keep_node = t.edge(edge).nodes[0];
            let kill_node = t.edge(edge).nodes[1];

            t.kill_polys_and_crease_pattern_inner();

            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for pid in snapshot.into_iter().rev() {
                if t.path(pid).starts_or_ends_with(kill_node) {
                    t.delete_path(pid);
                    continue;
                }
                let contains_kill = t.path(pid).nodes.contains(&kill_node);
                if contains_kill {
                    let contains_keep = t.path(pid).nodes.contains(&keep_node);
                    let p = t.path_mut(pid);
                    if contains_keep {
                        p.nodes.retain(|&n| n != kill_node);
                    } else {
                        for n in p.nodes.iter_mut() {
                            if *n == kill_node {
                                *n = keep_node;
                            }
                        }
                    }
                }
                t.path_mut(pid).edges.retain(|&e| e != edge);
            }

            // Rewire every edge record from the dying node to the kept one.
            let edge_ids = t.edges.ids();
            for eid in edge_ids {
                let e = t.edge_mut(eid);
                for n in e.nodes.iter_mut() {
                    if *n == kill_node {
                        *n = keep_node;
                    }
                }
            }
            let kill_edges = t.node(kill_node).edges.clone();
            for e in kill_edges {
                let keep = t.node_mut(keep_node);
                union_push(&mut keep.edges, e);
            }

            t.delete_edge(edge);
            t.delete_node(kill_node);

            // Absorbing an edge can flip the kept node between leaf and
            // branch; refresh it and its incident paths.
            let is_leaf = t.node(keep_node).edges.len() == 1;
            t.node_mut(keep_node).is_leaf_node = is_leaf;
            if !is_leaf {
                t.node_mut(keep_node).leaf_paths.clear();
            }
            let snapshot: Vec<PathId> = t.owned_paths.clone();
            for pid in snapshot {
                let (front, back) = {
                    let p = t.path(pid);
                    (p.front_node(), p.back_node())
                };
                if front != keep_node && back != keep_node {
                    continue;
                }
                let leaf = t.node(front).is_leaf_node && t.node(back).is_leaf_node;
                t.path_mut(pid).is_leaf_path = leaf;
                if leaf {
                    union_push(&mut t.node_mut(keep_node).leaf_paths, pid);
                } else {
                    t.node_mut(keep_node).leaf_paths.retain(|&p| p != pid);
                }
            }
        });
    }

    pub fn absorb_edges(&mut self, edges: &[EdgeId]) {
        self.with_cleanup(|t| {
            for &e in edges {
                if t.edges.contains(e) {
                    t.absorb_edge(e);
                }
            }
        });
    }

    /// Attach a stub (new leaf node plus edge of the given length) to a
    /// point along an existing edge. `edge_loc` is measured along the
    /// strained length; a location at either end attaches directly to the
    /// endpoint instead of splitting.
    pub fn add_stub(
        &mut self,
        edge: EdgeId,
        length: f64,
        edge_loc: f64,
        loc: Vec2,
    ) -> Result<(NodeId, EdgeId)> {
        let strained = self.edge(edge).strained_length();
        debug_assert!(edge_loc > 0.0 && edge_loc < strained);
        self.with_cleanup(|t| {
            let (new_node, new_edge) = if is_tiny(edge_loc) {
                let from = t.edge(edge).nodes[0];
                t.add_node(Some(from), loc)
            } else if is_tiny(edge_loc - strained) {
                let from = t.edge(edge).nodes[1];
                t.add_node(Some(from), loc)
            } else {
                let split_node = t.split_edge(edge, edge_loc)?;
                t.add_node(Some(split_node), loc)
            };
            let new_edge = new_edge.expect("stub edge");
            t.edge_mut(new_edge).length = length;
            Ok((new_node, new_edge))
        })
    }

    /// Remove a stub edge (one leaf end, one branch end). If the branch
    /// node is left with exactly two edges it is absorbed too, and the
    /// merged edge is returned.
    pub fn remove_stub(&mut self, edge: EdgeId) -> Result<Option<EdgeId>> {
        let node1 = self.edge(edge).nodes[0];
        let node2 = self.edge(edge).nodes[1];
        let leaf1 = self.node(node1).is_leaf_node;
        let leaf2 = self.node(node2).is_leaf_node;
        let remaining = match (leaf1, leaf2) {
            (true, false) => node2,
            (false, true) => node1,
            _ => return Err(Error::BadRemoveStub),
        };
        self.with_cleanup(|t| {
            t.kill_some_nodes_and_edges(&[], &[edge])?;
            if t.node(remaining).edges.len() == 2 {
                Ok(Some(t.absorb_node(remaining)?))
            } else {
                Ok(None)
            }
        })
    }

    /// Remove the marked nodes and edges (plus everything orphaned by the
    /// removal). Fails without touching the tree if the removal would
    /// disconnect it.
    pub fn kill_some_nodes_and_edges(
        &mut self,
        marked_nodes: &[NodeId],
        marked_edges: &[EdgeId],
    ) -> Result<()> {
        // Sub-nodes cannot be deleted directly.
        let mut del_nodes: Vec<NodeId> = marked_nodes
            .iter()
            .copied()
            .filter(|&n| self.node(n).is_tree_node())
            .collect();

        // Every edge of a dying node dies too.
        let mut del_edges: Vec<EdgeId> = marked_edges.to_vec();
        for &n in &del_nodes {
            for &e in &self.node(n).edges {
                union_push(&mut del_edges, e);
            }
        }

        // A node with every incident edge dying dies as well (an isolated
        // node has no surviving edge and dies with them).
        for &n in &self.owned_nodes {
            let node = self.node(n);
            if node.edges.iter().all(|e| del_edges.contains(e)) {
                union_push(&mut del_nodes, n);
            }
        }

        // Paths touching any dying part die (and their polys with them).
        let mut del_paths: Vec<PathId> = Vec::new();
        for &p in &self.owned_paths {
            let path = self.path(p);
            if path.nodes.iter().any(|n| del_nodes.contains(n))
                || path.edges.iter().any(|e| del_edges.contains(e))
            {
                del_paths.push(p);
            }
        }

        // The removal must leave a single tree: n nodes pair into exactly
        // n(n-1)/2 paths.
        let nodes_left = self.owned_nodes.len() - del_nodes.len();
        let paths_left = self.owned_paths.len() - del_paths.len();
        if nodes_left * nodes_left.saturating_sub(1) / 2 != paths_left {
            return Err(Error::BadKillParts);
        }

        self.with_cleanup(|t| {
            for n in del_nodes {
                t.delete_node(n);
            }
            for e in del_edges {
                t.delete_edge(e);
            }
            for p in del_paths {
                t.delete_path(p);
            }

            // Re-derive leafness and the per-node leaf path caches.
            let node_snapshot = t.owned_nodes.clone();
            for n in node_snapshot {
                let is_leaf = t.node(n).edges.len() == 1;
                t.node_mut(n).is_leaf_node = is_leaf;
            }
            let path_snapshot = t.owned_paths.clone();
            for p in path_snapshot {
                let (front, back) = {
                    let path = t.path(p);
                    (path.front_node(), path.back_node())
                };
                let leaf = t.node(front).is_leaf_node && t.node(back).is_leaf_node;
                t.path_mut(p).is_leaf_path = leaf;
                if leaf {
                    union_push(&mut t.node_mut(front).leaf_paths, p);
                    union_push(&mut t.node_mut(back).leaf_paths, p);
                }
            }
            Ok(())
        })
    }

    pub fn kill_some_conditions(&mut self, marked: &[ConditionId]) {
        self.with_cleanup(|t| {
            for &c in marked {
                t.delete_condition(c);
            }
        });
    }

    pub fn kill_node_conditions(&mut self) {
        let doomed: Vec<_> = self
            .conditions
            .iter()
            .filter(|(_, c)| c.is_node_condition())
            .map(|(id, _)| id)
            .collect();
        self.kill_some_conditions(&doomed);
    }

    pub fn kill_edge_conditions(&mut self) {
        let doomed: Vec<_> = self
            .conditions
            .iter()
            .filter(|(_, c)| c.is_edge_condition())
            .map(|(id, _)| id)
            .collect();
        self.kill_some_conditions(&doomed);
    }

    pub fn kill_path_conditions(&mut self) {
        let doomed: Vec<_> = self
            .conditions
            .iter()
            .filter(|(_, c)| c.is_path_condition())
            .map(|(id, _)| id)
            .collect();
        self.kill_some_conditions(&doomed);
    }

    pub fn kill_conditions(&mut self) {
        let doomed = self.conditions.ids();
        self.kill_some_conditions(&doomed);
    }

    /// Remove nodes, edges, and conditions in one edit (the shape of a user
    /// selection).
    pub fn kill_some_parts(
        &mut self,
        marked_nodes: &[NodeId],
        marked_edges: &[EdgeId],
        marked_conditions: &[ConditionId],
    ) -> Result<()> {
        self.with_cleanup(|t| {
            t.kill_some_conditions(marked_conditions);
            t.kill_some_nodes_and_edges(marked_nodes, marked_edges)
        })
    }

    /// Delete every vertex, crease, and facet.
    pub fn kill_crease_pattern(&mut self) {
        self.with_cleanup(|t| t.kill_crease_pattern_inner());
    }

    pub(crate) fn kill_crease_pattern_inner(&mut self) {
        for v in self.vertices.ids() {
            self.delete_vertex(v);
        }
        for c in self.creases.ids() {
            self.delete_crease(c);
        }
        for f in self.facets.ids() {
            self.delete_facet(f);
        }
    }

    /// Delete the crease pattern and every poly (with its substructure).
    pub fn kill_polys_and_crease_pattern(&mut self) {
        self.with_cleanup(|t| t.kill_polys_and_crease_pattern_inner());
    }

    pub(crate) fn kill_polys_and_crease_pattern_inner(&mut self) {
        self.kill_crease_pattern_inner();
        for p in self.owned_polys.clone() {
            self.delete_poly(p);
        }
    }

    /// Wipe the tree completely.
    pub fn kill_all_parts(&mut self) {
        self.with_cleanup(|t| {
            t.kill_conditions();
            let nodes = t.owned_nodes.clone();
            let edges = t.owned_edges.clone();
            t.kill_some_nodes_and_edges(&nodes, &edges)
                .expect("removing everything cannot disconnect the tree");
        });
    }

    // ---- dimensional edits ----------------------------------------------

    pub fn can_make_node_root(&self, node: NodeId) -> bool {
        self.node(node).index != 1 && self.node(node).is_tree_node()
    }

    /// Make the given tree node the root (index 1).
    pub fn make_node_root(&mut self, node: NodeId) {
        debug_assert!(self.can_make_node_root(node));
        self.with_cleanup(|t| {
            // Index 0 sorts ahead of every live index; renumbering during
            // cleanup settles it at 1.
            t.node_mut(node).index = 0;
        });
    }

    /// Move a group of nodes. The sole way to change node locations, so the
    /// cleanup pass always observes the change.
    pub fn set_node_locs(&mut self, moving_nodes: &[NodeId], new_locs: &[Vec2]) {
        debug_assert_eq!(moving_nodes.len(), new_locs.len());
        if moving_nodes.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for (&n, &loc) in moving_nodes.iter().zip(new_locs) {
                t.node_mut(n).loc = loc;
            }
        });
    }

    /// Give the listed edges a common length and clear their strain.
    pub fn set_edge_lengths(&mut self, edges: &[EdgeId], length: f64) {
        self.with_cleanup(|t| {
            for &e in edges {
                let edge = t.edge_mut(e);
                edge.length = length;
                edge.strain = 0.0;
            }
        });
    }

    /// Scale the listed edges' lengths by a positive factor.
    pub fn scale_edge_lengths(&mut self, edges: &[EdgeId], factor: f64) {
        debug_assert!(factor > 0.0);
        self.with_cleanup(|t| {
            for &e in edges {
                t.edge_mut(e).length *= factor;
            }
        });
    }

    /// Trade scale for edge length: divide the scale by `factor` and
    /// multiply every edge length by it, leaving paper lengths unchanged.
    pub fn scale_tree(&mut self, factor: f64) {
        self.with_cleanup(|t| {
            t.scale /= factor;
            let edges = t.owned_edges.clone();
            for e in edges {
                t.edge_mut(e).length *= factor;
            }
        });
    }

    /// Renormalize so the given edge has unit length.
    pub fn renormalize_to_unit_edge(&mut self, edge: EdgeId) {
        self.scale_tree(1.0 / self.edge(edge).length);
    }

    /// Renormalize so the given path has unit minimum length.
    pub fn renormalize_to_unit_path(&mut self, path: PathId) {
        self.scale_tree(1.0 / self.path(path).min_tree_length);
    }

    /// Renormalize so the scale becomes 1.
    pub fn renormalize_to_unit_scale(&mut self) {
        self.scale_tree(self.scale);
    }

    /// Zero the strain of the listed edges, keeping their rest lengths.
    pub fn remove_strain(&mut self, edges: &[EdgeId]) {
        self.with_cleanup(|t| {
            for &e in edges {
                t.edge_mut(e).strain = 0.0;
            }
        });
    }

    pub fn remove_all_strain(&mut self) {
        let edges = self.owned_edges.clone();
        self.remove_strain(&edges);
    }

    /// Fold the strain of the listed edges into their rest lengths.
    pub fn relieve_strain(&mut self, edges: &[EdgeId]) {
        self.with_cleanup(|t| {
            for &e in edges {
                let edge = t.edge_mut(e);
                edge.length = edge.strained_length();
                edge.strain = 0.0;
            }
        });
    }

    pub fn relieve_all_strain(&mut self) {
        let edges = self.owned_edges.clone();
        self.relieve_strain(&edges);
    }

    /// Nudge the listed nodes by a small deterministic perturbation. The
    /// generator is reseeded on every call so repeated runs reproduce.
    pub fn perturb_nodes(&mut self, nodes: &[NodeId]) {
        self.with_cleanup(|t| {
            let mut rng = StdRng::seed_from_u64(0);
            for &n in nodes {
                let dx = PERTURBATION_SIZE * rng.gen_range(-1.0..1.0);
                let dy = PERTURBATION_SIZE * rng.gen_range(-1.0..1.0);
                let node = t.node_mut(n);
                node.loc.x += dx;
                node.loc.y += dy;
            }
        });
    }

    pub fn can_perturb_all_nodes(&self) -> bool {
        !self.owned_nodes.is_empty()
    }

    pub fn perturb_all_nodes(&mut self) {
        let nodes = self.owned_nodes.clone();
        self.perturb_nodes(&nodes);
    }

    // ---- condition creation ---------------------------------------------

    fn get_or_make_node_combo(&mut self, node: NodeId) -> ConditionId {
        if let Some((id, _)) = self.conditions.iter().find(|(_, c)| {
            matches!(c.kind, ConditionKind::NodeCombo { node: n, .. } if n == node)
        }) {
            return id;
        }
        let c = Condition::new(ConditionKind::NodeCombo {
            node,
            to_symmetry_line: false,
            to_paper_edge: false,
            to_paper_corner: false,
            x_fixed: false,
            x_fix_value: 0.0,
            y_fixed: false,
            y_fix_value: 0.0,
        });
        self.add_condition(c)
    }

    fn get_or_make_path_combo(&mut self, path: PathId) -> ConditionId {
        if let Some((id, _)) = self.conditions.iter().find(|(_, c)| {
            matches!(c.kind, ConditionKind::PathCombo { path: p, .. } if p == path)
        }) {
            return id;
        }
        let node1 = self.path(path).front_node();
        let node2 = self.path(path).back_node();
        let c = Condition::new(ConditionKind::PathCombo {
            path,
            node1,
            node2,
            is_angle_fixed: false,
            angle: 0.0,
            is_angle_quant: false,
            quant: 8,
            quant_offset: 0.0,
        });
        self.add_condition(c)
    }

    /// Pin the listed leaf nodes to the symmetry line.
    pub fn set_nodes_fixed_to_symmetry_line(&mut self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &n in nodes {
                let id = t.get_or_make_node_combo(n);
                if let ConditionKind::NodeCombo {
                    to_symmetry_line, ..
                } = &mut t.condition_mut(id).kind
                {
                    *to_symmetry_line = true;
                }
            }
        });
    }

    /// Pin the listed leaf nodes to the paper edge.
    pub fn set_nodes_fixed_to_paper_edge(&mut self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &n in nodes {
                let id = t.get_or_make_node_combo(n);
                if let ConditionKind::NodeCombo { to_paper_edge, .. } =
                    &mut t.condition_mut(id).kind
                {
                    *to_paper_edge = true;
                }
            }
        });
    }

    /// Pin the listed leaf nodes to a paper corner.
    pub fn set_nodes_fixed_to_paper_corner(&mut self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &n in nodes {
                let id = t.get_or_make_node_combo(n);
                if let ConditionKind::NodeCombo {
                    to_paper_corner, ..
                } = &mut t.condition_mut(id).kind
                {
                    *to_paper_corner = true;
                }
            }
        });
    }

    /// Pin one or both coordinates of the listed leaf nodes.
    pub fn set_nodes_fixed_to_position(
        &mut self,
        nodes: &[NodeId],
        x_fixed: bool,
        x_value: f64,
        y_fixed: bool,
        y_value: f64,
    ) {
        if nodes.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &n in nodes {
                let id = t.get_or_make_node_combo(n);
                if let ConditionKind::NodeCombo {
                    x_fixed: xf,
                    x_fix_value: xv,
                    y_fixed: yf,
                    y_fix_value: yv,
                    ..
                } = &mut t.condition_mut(id).kind
                {
                    *xf = x_fixed;
                    if x_fixed {
                        *xv = x_value;
                    }
                    *yf = y_fixed;
                    if y_fixed {
                        *yv = y_value;
                    }
                }
            }
        });
    }

    /// Constrain all listed edges to strain together (pairwise conditions
    /// against the first edge).
    pub fn set_edges_same_strain(&mut self, edges: &[EdgeId]) {
        if edges.len() < 2 {
            return;
        }
        self.with_cleanup(|t| {
            for &e in &edges[1..] {
                let exists = t.conditions.iter().any(|(_, c)| {
                    matches!(c.kind, ConditionKind::EdgesSameStrain { edge1, edge2 }
                        if (edge1 == edges[0] && edge2 == e) || (edge1 == e && edge2 == edges[0]))
                });
                if !exists {
                    t.add_condition(Condition::new(ConditionKind::EdgesSameStrain {
                        edge1: edges[0],
                        edge2: e,
                    }));
                }
            }
        });
    }

    /// Pin the listed leaf paths active.
    pub fn set_paths_active(&mut self, paths: &[PathId]) {
        if paths.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &p in paths {
                t.get_or_make_path_combo(p);
            }
        });
    }

    /// Pin the listed leaf paths active at a fixed angle (degrees).
    pub fn set_paths_angle_fixed(&mut self, paths: &[PathId], angle: f64) {
        if paths.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &p in paths {
                let id = t.get_or_make_path_combo(p);
                if let ConditionKind::PathCombo {
                    is_angle_fixed,
                    angle: a,
                    is_angle_quant,
                    ..
                } = &mut t.condition_mut(id).kind
                {
                    *is_angle_fixed = true;
                    *a = angle;
                    *is_angle_quant = false;
                }
            }
        });
    }

    /// Pin the listed leaf paths active at a quantized angle.
    pub fn set_paths_angle_quant(&mut self, paths: &[PathId], quant: usize, quant_offset: f64) {
        if paths.is_empty() {
            return;
        }
        self.with_cleanup(|t| {
            for &p in paths {
                let id = t.get_or_make_path_combo(p);
                if let ConditionKind::PathCombo {
                    is_angle_fixed,
                    is_angle_quant,
                    quant: q,
                    quant_offset: qo,
                    ..
                } = &mut t.condition_mut(id).kind
                {
                    *is_angle_quant = true;
                    *q = quant;
                    *qo = quant_offset;
                    *is_angle_fixed = false;
                }
            }
        });
    }

    // ---- condition setters ----------------------------------------------

    /// Re-target a path condition at another leaf path, refreshing its node
    /// references. A no-op when the path is unchanged.
    pub fn set_path_condition_path(&mut self, condition: ConditionId, path: PathId) {
        debug_assert!(self.path(path).is_leaf_path);
        let (node1, node2) = (self.path(path).front_node(), self.path(path).back_node());
        let changed = match &self.condition(condition).kind {
            ConditionKind::PathCombo { path: p, .. }
            | ConditionKind::PathActive { path: p, .. }
            | ConditionKind::PathAngleFixed { path: p, .. }
            | ConditionKind::PathAngleQuant { path: p, .. } => *p != path,
            _ => panic!("not a path condition"),
        };
        if !changed {
            return;
        }
        self.with_cleanup(|t| {
            match &mut t.condition_mut(condition).kind {
                ConditionKind::PathCombo {
                    path: p,
                    node1: n1,
                    node2: n2,
                    ..
                }
                | ConditionKind::PathActive {
                    path: p,
                    node1: n1,
                    node2: n2,
                }
                | ConditionKind::PathAngleFixed {
                    path: p,
                    node1: n1,
                    node2: n2,
                    ..
                }
                | ConditionKind::PathAngleQuant {
                    path: p,
                    node1: n1,
                    node2: n2,
                    ..
                } => {
                    *p = path;
                    *n1 = node1;
                    *n2 = node2;
                }
                _ => unreachable!(),
            }
        });
    }

    /// Replace the first node of a path condition, re-deriving the path.
    pub fn set_path_condition_node1(&mut self, condition: ConditionId, node: NodeId) {
        debug_assert!(self.node(node).is_leaf_node);
        let (cur1, cur2) = self.path_condition_nodes(condition);
        if cur1 == node {
            return;
        }
        let new_path = self.get_leaf_path(node, cur2);
        self.with_cleanup(|t| {
            t.update_path_condition(condition, new_path, node, cur2);
        });
    }

    /// Replace the second node of a path condition, re-deriving the path.
    pub fn set_path_condition_node2(&mut self, condition: ConditionId, node: NodeId) {
        debug_assert!(self.node(node).is_leaf_node);
        let (cur1, cur2) = self.path_condition_nodes(condition);
        if cur2 == node {
            return;
        }
        let new_path = self.get_leaf_path(cur1, node);
        self.with_cleanup(|t| {
            t.update_path_condition(condition, new_path, cur1, node);
        });
    }

    fn path_condition_nodes(&self, condition: ConditionId) -> (NodeId, NodeId) {
        match &self.condition(condition).kind {
            ConditionKind::PathCombo { node1, node2, .. }
            | ConditionKind::PathActive { node1, node2, .. }
            | ConditionKind::PathAngleFixed { node1, node2, .. }
            | ConditionKind::PathAngleQuant { node1, node2, .. } => (*node1, *node2),
            _ => panic!("not a path condition"),
        }
    }

    fn update_path_condition(
        &mut self,
        condition: ConditionId,
        path: PathId,
        node1: NodeId,
        node2: NodeId,
    ) {
        match &mut self.condition_mut(condition).kind {
            ConditionKind::PathCombo {
                path: p,
                node1: n1,
                node2: n2,
                ..
            }
            | ConditionKind::PathActive {
                path: p,
                node1: n1,
                node2: n2,
            }
            | ConditionKind::PathAngleFixed {
                path: p,
                node1: n1,
                node2: n2,
                ..
            }
            | ConditionKind::PathAngleQuant {
                path: p,
                node1: n1,
                node2: n2,
                ..
            } => {
                *p = path;
                *n1 = node1;
                *n2 = node2;
            }
            _ => unreachable!(),
        }
    }
}
