//! Global facet ordering: the DAG whose topological order is the stacking
//! of facets in the folded form.
//!
//! Each molecule contributes an axial loop of ordering links plus corridor
//! crossings. The loops are stitched together at local-root hinge lines:
//! connected components of local-root vertices and hinge creases
//! (pseudohinge mates included) are spliced, the depth-0 component absorbs
//! the rest, and one final link is broken to leave a single-source,
//! single-sink DAG.

use crate::tree::parts::{NetFlag, ORDER_NOT_SET};
use crate::tree::{CreaseId, FacetId, PolyId, Tree, VertexId};

/// One connected component of local-root vertices and hinge creases, with
/// its spanning tree and the degree classification used for splicing.
struct RootNetwork {
    discrete_depth: usize,
    is_connectable: bool,
    cc_vertices: Vec<VertexId>,
    cc_creases: Vec<CreaseId>,
    /// Polys owning a crease of the component (or incident to a leaf-node
    /// root vertex); used for absorption incidence tests.
    cc_polys: Vec<PolyId>,
    st_vertices: Vec<VertexId>,
    st_creases: Vec<CreaseId>,
    /// Axial vertices by (component degree, spanning tree degree).
    cc0: Vec<VertexId>,
    cc1: Vec<VertexId>,
    cc2_st1: Vec<VertexId>,
    cc2_st2: Vec<VertexId>,
}

impl RootNetwork {
    fn new(discrete_depth: usize) -> Self {
        Self {
            discrete_depth,
            is_connectable: false,
            cc_vertices: Vec::new(),
            cc_creases: Vec::new(),
            cc_polys: Vec::new(),
            st_vertices: Vec::new(),
            st_creases: Vec::new(),
            cc0: Vec::new(),
            cc1: Vec::new(),
            cc2_st1: Vec::new(),
            cc2_st2: Vec::new(),
        }
    }

    // Traversal runs through any vertex it reaches: the upper ends of
    // local-root hinges (ridge and gusset vertices) are not local roots
    // themselves but are what joins the hinges into one component.
    fn try_add_vertex_to_cc(&mut self, tree: &mut Tree, v: VertexId) {
        if tree.vertex(v).cc_flag == NetFlag::Added {
            return;
        }
        tree.vertex_mut(v).cc_flag = NetFlag::Added;
        self.cc_vertices.push(v);
        for c in tree.vertex(v).creases.clone() {
            self.try_add_crease_to_cc(tree, c);
        }
        if let Some(mate) = tree.vertex(v).left_pseudohinge_mate {
            self.try_add_vertex_to_cc(tree, mate);
        }
        if let Some(mate) = tree.vertex(v).right_pseudohinge_mate {
            self.try_add_vertex_to_cc(tree, mate);
        }

        // A root vertex on a leaf node has no creases reaching into its
        // polys, so collect the polys through its incident ridges instead.
        let is_leaf_root = tree
            .vertex(v)
            .tree_node
            .map(|n| tree.node(n).is_leaf_node)
            .unwrap_or(false);
        if is_leaf_root {
            for c in tree.vertex(v).creases.clone() {
                if !tree.crease(c).kind.is_ridge() {
                    continue;
                }
                if let crate::tree::CreaseOwner::Poly(p) = tree.crease(c).owner {
                    if !self.cc_polys.contains(&p) {
                        self.cc_polys.push(p);
                    }
                }
            }
        }
    }

    fn try_add_crease_to_cc(&mut self, tree: &mut Tree, c: CreaseId) {
        if !tree.crease(c).kind.is_hinge() {
            return;
        }
        if tree.crease(c).cc_flag != NetFlag::NotYet {
            return;
        }
        tree.crease_mut(c).cc_flag = NetFlag::Added;
        self.cc_creases.push(c);
        if let crate::tree::CreaseOwner::Poly(p) = tree.crease(c).owner {
            if !self.cc_polys.contains(&p) {
                self.cc_polys.push(p);
            }
        }
        let v1 = tree.crease(c).front_vertex();
        let v2 = tree.crease(c).back_vertex();
        self.try_add_vertex_to_cc(tree, v1);
        self.try_add_vertex_to_cc(tree, v2);
    }

    fn try_add_vertex_to_st(&mut self, tree: &mut Tree, v: VertexId) {
        if tree.vertex(v).st_flag == NetFlag::Added {
            return;
        }
        tree.vertex_mut(v).st_flag = NetFlag::Added;
        self.st_vertices.push(v);
        for c in tree.vertex(v).creases.clone() {
            self.try_add_crease_to_st(tree, c);
        }
        if let Some(mate) = tree.vertex(v).left_pseudohinge_mate {
            self.try_add_vertex_to_st(tree, mate);
        }
        if let Some(mate) = tree.vertex(v).right_pseudohinge_mate {
            self.try_add_vertex_to_st(tree, mate);
        }
    }

    /// Unlike the component, the spanning tree only takes a crease whose far
    /// vertex is new; that is what keeps it a tree.
    fn try_add_crease_to_st(&mut self, tree: &mut Tree, c: CreaseId) {
        if !tree.crease(c).kind.is_hinge() {
            return;
        }
        if tree.crease(c).cc_flag == NetFlag::Ineligible {
            return;
        }
        if tree.crease(c).st_flag == NetFlag::Added {
            return;
        }
        let v1 = tree.crease(c).front_vertex();
        let v2 = tree.crease(c).back_vertex();
        let in1 = tree.vertex(v1).st_flag == NetFlag::Added;
        let in2 = tree.vertex(v2).st_flag == NetFlag::Added;
        if in1 && in2 {
            return;
        }
        tree.crease_mut(c).st_flag = NetFlag::Added;
        self.st_creases.push(c);
        if !in1 {
            self.try_add_vertex_to_st(tree, v1);
        }
        if !in2 {
            self.try_add_vertex_to_st(tree, v2);
        }
    }

    fn build_spanning_tree(&mut self, tree: &mut Tree) {
        let first = self.cc_vertices[0];
        self.try_add_vertex_to_st(tree, first);
    }

    /// Sort the axial vertices into the degree classes used for splicing,
    /// and note whether any vertex can splice this component into another
    /// (axial hinge degree 2 but component degree 1).
    fn classify_vertices_by_degree(&mut self, tree: &Tree) {
        for &v in &self.cc_vertices {
            if !tree.vertex_is_axial(v) {
                continue;
            }
            let cc_degree = tree.vertex_degree(v, &self.cc_creases);
            let st_degree = tree.vertex_degree(v, &self.st_creases);
            match cc_degree {
                0 => self.cc0.push(v),
                1 => self.cc1.push(v),
                2 => match st_degree {
                    1 => self.cc2_st1.push(v),
                    2 => self.cc2_st2.push(v),
                    _ => panic!("degree-2 vertex with spanning tree degree {st_degree}"),
                },
                _ => panic!("local root vertex with component degree {cc_degree}"),
            }
            let ax_degree = tree.vertex_num_hinge_creases(v);
            self.is_connectable |= ax_degree == 2 && cc_degree == 1;
        }
    }

    /// Splice the ordering fragments around this component: the depth-0
    /// component becomes sortable (one splice deliberately skipped keeps it
    /// open), deeper components become loops.
    fn connect_facet_graph(&self, tree: &mut Tree) {
        debug_assert!(self.cc0.len() <= 1);
        if self.cc0.len() == 1 {
            // A degree-0 root vertex means the root node is a leaf: redo the
            // links around it, crossing the axial creases instead of the
            // ridges.
            let v = self.cc0[0];
            for c in tree.vertex(v).creases.clone() {
                if tree.crease(c).kind.is_ridge() {
                    let fwd = tree.crease(c).fwd_facet.expect("interior ridge facet");
                    let bkd = tree.crease(c).bkd_facet.expect("interior ridge facet");
                    tree.unlink_facets(fwd, bkd);
                }
            }
            // Re-link across the axial creases; an interior root keeps one
            // link out so a chain remains instead of a closed loop.
            let mut needs_skip = !tree.vertex(v).is_border_vertex;
            for c in tree.vertex(v).creases.clone() {
                if !tree.crease(c).is_border_crease() && tree.crease(c).kind.is_axial() {
                    if needs_skip {
                        needs_skip = false;
                    } else {
                        let fwd = tree.crease(c).fwd_facet.unwrap();
                        let bkd = tree.crease(c).bkd_facet.unwrap();
                        tree.join_facets(fwd, bkd);
                    }
                }
            }
            return;
        }

        for &v in &self.cc2_st2 {
            tree.swap_links_at_vertex(v);
        }
    }

    /// A vertex at which the global network can absorb this one: a
    /// component-degree-1 vertex of ours sitting on a ring path of one of
    /// the global network's polys.
    fn absorption_vertex(&self, tree: &Tree, global: &RootNetwork) -> Option<VertexId> {
        for &poly in &global.cc_polys {
            for &path in &tree.poly(poly).ring_paths {
                for &v in &tree.path(path).owned_vertices {
                    if tree.vertex(v).discrete_depth != self.discrete_depth {
                        continue;
                    }
                    if !self.cc1.contains(&v) {
                        continue;
                    }
                    return Some(v);
                }
            }
        }
        None
    }

    /// After all absorption, break a single link so the one big cycle
    /// becomes a sortable graph.
    fn break_one_link(&self, tree: &mut Tree) {
        // A leaf-node root never closed the loop in the first place.
        if !self.cc0.is_empty() {
            return;
        }
        // Prefer a border vertex of component degree 1; its hinge may abut
        // pseudohinges, so unlink the first proper facets either side.
        if let Some(&v) = self.cc1.first() {
            let c = tree.vertex_hinge_crease(v);
            let left = tree.crease_left_non_pseudohinge_facet(c);
            let right = tree.crease_right_non_pseudohinge_facet(c);
            tree.unlink_facets(left, right);
            return;
        }
        // Otherwise some degree-2 vertex is a spanning-tree leaf (a pure
        // loop of degree-2 vertices cannot be a tree).
        let v = *self
            .cc2_st1
            .first()
            .expect("no breakable vertex in the root network");
        let (c1, _c2) = tree.vertex_hinge_creases(v);
        let c1 = c1.expect("degree-2 vertex lacks hinge creases");
        let fwd = tree.crease(c1).fwd_facet.unwrap();
        let bkd = tree.crease(c1).bkd_facet.unwrap();
        tree.unlink_facets(fwd, bkd);
    }
}

impl Tree {
    /// The unique hinge-or-ridge crease interior to the poly at an axial
    /// vertex.
    fn incident_interior_crease(&self, poly: PolyId, v: VertexId) -> CreaseId {
        debug_assert!(self.vertex_is_axial(v));
        for &c in &self.vertex(v).creases {
            let kind = self.crease(c).kind;
            if (kind.is_hinge() || kind.is_ridge())
                && self.poly(poly).owned_creases.contains(&c)
            {
                return c;
            }
        }
        panic!("no interior crease at the local root vertex");
    }

    /// Build the ordering links of one molecule in isolation: a CCW axial
    /// loop with corridor crossings launched at each facet.
    fn calc_local_facet_order(&mut self, poly: PolyId) {
        for f in self.poly(poly).owned_facets.clone() {
            self.facet_mut(f).clear_links();
        }

        let start_vertex = self
            .poly(poly)
            .local_root_vertices
            .iter()
            .copied()
            .find(|&v| self.vertex_is_axial(v))
            .expect("poly has no axial local root vertex");
        let start_crease = self.incident_interior_crease(poly, start_vertex);
        let start_facet = self.crease_right_non_pseudohinge_facet(start_crease);

        let mut cur = start_facet;
        loop {
            let next = self.facet_right_non_pseudohinge_facet(cur);
            self.link_facets(cur, next);
            let bottom = self.facet(cur).bottom_crease();
            self.build_corridor_links(bottom, cur);
            cur = next;
            if cur == start_facet {
                break;
            }
        }
    }

    /// Corridor crossings from `from_facet`, entered across `from_crease`.
    /// Climbing, we cross every ridge (except the ones the axial loop
    /// already walks); descending through a gusset bottom we keep going;
    /// descending onto an axial bottom we stop unless a pseudohinge lets us
    /// jump sideways and climb again.
    fn build_corridor_links(&mut self, from_crease: CreaseId, from_facet: FacetId) {
        let bottom = self.facet(from_facet).bottom_crease();
        if bottom == from_crease {
            // Going up.
            for c in self.facet_ridge_creases(from_facet) {
                let Some(next) = self.crease_other_facet(c, from_facet) else {
                    continue;
                };
                if self.crease(bottom).kind.is_axial() {
                    if next == self.facet_left_facet(from_facet) {
                        continue;
                    }
                    if next == self.facet_right_facet(from_facet) {
                        continue;
                    }
                }
                if self.facets_are_linked(from_facet, next) {
                    continue;
                }
                self.link_facets(from_facet, next);
                self.build_corridor_links(c, next);
            }
        } else if self.crease(bottom).kind.is_gusset() {
            // Going down through a gusset: keep descending.
            let Some(next) = self.crease_other_facet(bottom, from_facet) else {
                return;
            };
            self.link_facets(from_facet, next);
            self.build_corridor_links(bottom, next);
        } else {
            // Going down onto an axial bottom: ordinary facets stop here; a
            // pseudohinge facet hops to its partner and climbs back up.
            if !self.facet_is_pseudohinge(from_facet) {
                return;
            }
            let left = self.facet(from_facet).left_crease();
            let next = if self.crease(left).kind.is_pseudohinge() {
                self.crease_left_facet(left)
            } else {
                let right = self.facet(from_facet).right_crease();
                debug_assert!(self.crease(right).kind.is_pseudohinge());
                self.crease_right_facet(right)
            };
            self.link_facets(from_facet, next);
            let next_bottom = self.facet(next).bottom_crease();
            self.build_corridor_links(next_bottom, next);
        }
    }

    /// Build the local facet orders and group the local-root vertices and
    /// hinge creases into connected components with spanning trees and
    /// degree classes.
    fn calc_root_networks(&mut self) -> Vec<RootNetwork> {
        for poly in self.owned_polys.clone() {
            self.calc_local_facet_order(poly);
        }

        let mut local_root_vertices: Vec<VertexId> = Vec::new();
        let mut local_root_creases: Vec<CreaseId> = Vec::new();
        for &poly in &self.owned_polys {
            for &v in &self.poly(poly).local_root_vertices {
                if !local_root_vertices.contains(&v) {
                    local_root_vertices.push(v);
                }
            }
            for &c in &self.poly(poly).local_root_creases {
                if !local_root_creases.contains(&c) {
                    local_root_creases.push(c);
                }
            }
        }

        for v in self.vertices.ids() {
            let vertex = self.vertex_mut(v);
            vertex.cc_flag = NetFlag::Ineligible;
            vertex.st_flag = NetFlag::Ineligible;
        }
        for c in self.creases.ids() {
            let crease = self.crease_mut(c);
            crease.cc_flag = NetFlag::Ineligible;
            crease.st_flag = NetFlag::Ineligible;
        }
        for &v in &local_root_vertices {
            let vertex = self.vertex_mut(v);
            vertex.cc_flag = NetFlag::NotYet;
            vertex.st_flag = NetFlag::NotYet;
        }
        for &c in &local_root_creases {
            let crease = self.crease_mut(c);
            crease.cc_flag = NetFlag::NotYet;
            crease.st_flag = NetFlag::NotYet;
        }

        let mut networks: Vec<RootNetwork> = Vec::new();
        for &v in &local_root_vertices {
            if networks.iter().any(|n| n.cc_vertices.contains(&v)) {
                continue;
            }
            let mut network = RootNetwork::new(self.vertex(v).discrete_depth);
            network.try_add_vertex_to_cc(self, v);
            networks.push(network);
        }

        for network in &mut networks {
            network.build_spanning_tree(self);
        }
        for network in &mut networks {
            network.classify_vertices_by_degree(self);
        }
        networks
    }

    /// Diagnostics for the status query: the vertices and creases of the
    /// components that block a global ordering.
    pub(crate) fn calc_why_not_local_root_connectable(
        &mut self,
    ) -> (Vec<VertexId>, Vec<CreaseId>) {
        let networks = self.calc_root_networks();
        let mut bad_vertices = Vec::new();
        let mut bad_creases = Vec::new();
        let mut zero_depth: Option<usize> = None;
        for (i, network) in networks.iter().enumerate() {
            if network.discrete_depth == 0 {
                match zero_depth {
                    None => zero_depth = Some(i),
                    Some(first) => {
                        // Two depth-0 components can never merge.
                        for &v in networks[first].cc_vertices.iter().chain(&network.cc_vertices)
                        {
                            if !bad_vertices.contains(&v) {
                                bad_vertices.push(v);
                            }
                        }
                        for &c in networks[first].cc_creases.iter().chain(&network.cc_creases)
                        {
                            if !bad_creases.contains(&c) {
                                bad_creases.push(c);
                            }
                        }
                    }
                }
            } else if !network.is_connectable {
                bad_vertices.extend(network.cc_vertices.iter().copied());
                bad_creases.extend(network.cc_creases.iter().copied());
            }
        }
        (bad_vertices, bad_creases)
    }

    /// Assemble the complete facet ordering: splice each component, let the
    /// depth-0 network absorb every other one, break one link, and assign
    /// topological order values.
    pub(crate) fn calc_facet_order(&mut self) {
        let mut networks = self.calc_root_networks();

        let num_depth_zero = networks.iter().filter(|n| n.discrete_depth == 0).count();
        self.is_local_root_connectable = num_depth_zero == 1
            && networks
                .iter()
                .all(|n| n.discrete_depth == 0 || n.is_connectable);
        if !self.is_local_root_connectable {
            return;
        }

        for network in &networks {
            network.connect_facet_graph(self);
        }

        let global_pos = networks
            .iter()
            .position(|n| n.discrete_depth == 0)
            .expect("no depth-0 root network");
        let mut global = networks.swap_remove(global_pos);

        // One by one, the global network absorbs every component incident
        // on it. Failure to find a candidate would mean the connectable
        // check above lied; that is a program invariant, not user input.
        while !networks.is_empty() {
            let mut absorbed = None;
            for (i, network) in networks.iter().enumerate() {
                if let Some(at) = network.absorption_vertex(self, &global) {
                    self.swap_links_at_vertex(at);
                    for &p in &network.cc_polys {
                        if !global.cc_polys.contains(&p) {
                            global.cc_polys.push(p);
                        }
                    }
                    absorbed = Some(i);
                    break;
                }
            }
            let i = absorbed.expect("unabsorbable local root network");
            networks.swap_remove(i);
        }

        global.break_one_link(self);

        // Topological order values over the finished DAG.
        let mut source = None;
        for f in self.facets.ids() {
            self.facet_mut(f).order = ORDER_NOT_SET;
        }
        for (id, f) in self.facets.iter() {
            if f.is_source_facet() {
                debug_assert!(source.is_none(), "ordering graph has two sources");
                source = Some(id);
            }
        }
        let source = source.expect("ordering graph has no source");
        let mut next_order = 0;
        self.assign_order(source, &mut next_order);
    }

    /// Depth-first order assignment: a facet takes the next value once all
    /// of its tails have one, then offers values to its heads.
    fn assign_order(&mut self, facet: FacetId, next_order: &mut usize) {
        if self.facet(facet).order != ORDER_NOT_SET {
            return;
        }
        if self
            .facet(facet)
            .tail_facets
            .iter()
            .any(|&t| self.facet(t).order == ORDER_NOT_SET)
        {
            return;
        }
        self.facet_mut(facet).order = *next_order;
        *next_order += 1;
        for head in self.facet(facet).head_facets.clone() {
            self.assign_order(head, next_order);
        }
    }
}
