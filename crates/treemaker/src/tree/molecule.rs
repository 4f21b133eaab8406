//! Polygon network construction and the universal molecule.
//!
//! A top-level poly is a CCW cycle of polygon paths. Filling it is a
//! recursive inset: every corner slides inward along its angle bisector
//! until some path (ring or cross) becomes active, which merges corners or
//! splits the region into sub-polys, down to triangles which close at their
//! incenter. The spokes, ridges, gussets, and hinges of the crease pattern
//! fall out of that construction; facets are walked out of the finished
//! crease set at the end.

use crate::geom::{self, Vec2};
use crate::tol::{is_tiny, VERTEX_SAME_TOL};
use crate::tree::edit::union_push;
use crate::tree::parts::{CreaseKind, CreaseOwner, NodeOwner, Path, PathOwner, PolyOwner,
    VertexOwner};
use crate::tree::{CreaseId, NodeId, PathId, PolyId, Tree, TreeOrPoly, VertexId};

/// True if the two points coincide for vertex-merging purposes. Looser than
/// the distance tolerance: vertices closer than this would degrade the
/// crease pattern with sliver facets.
pub(crate) fn vertices_same_loc(p1: Vec2, p2: Vec2) -> bool {
    (p1 - p2).norm() < VERTEX_SAME_TOL
}

impl Tree {
    // ---- vertex and crease creation ---------------------------------------

    /// The vertex projecting this node, created on demand. Tree nodes tell
    /// the vertex which node it projects.
    pub(crate) fn node_get_or_make_vertex_self(&mut self, node: NodeId) -> VertexId {
        debug_assert!(self.node(node).owned_vertices.len() <= 1);
        if let Some(v) = self.node(node).vertex() {
            return v;
        }
        let n = self.node(node);
        let loc = n.loc;
        let elevation = n.elevation;
        let is_border = n.is_border_node;
        let tree_node = n.is_tree_node().then_some(node);
        self.make_vertex(VertexOwner::Node(node), loc, elevation, is_border, tree_node)
    }

    /// An existing or new vertex at `p` along the path. Points within the
    /// merge tolerance of an endpoint resolve to the endpoint node's vertex.
    pub(crate) fn path_get_or_make_vertex(
        &mut self,
        path: PathId,
        p: Vec2,
        tree_node: Option<NodeId>,
    ) -> VertexId {
        let front = self.path(path).front_node();
        let back = self.path(path).back_node();
        let mut vertex = None;
        if vertices_same_loc(p, self.node(front).loc) {
            vertex = Some(self.node_get_or_make_vertex_self(front));
        } else if vertices_same_loc(p, self.node(back).loc) {
            vertex = Some(self.node_get_or_make_vertex_self(back));
        } else {
            for &v in &self.path(path).owned_vertices {
                if vertices_same_loc(p, self.vertex(v).loc) {
                    vertex = Some(v);
                    break;
                }
            }
        }
        let vertex = match vertex {
            Some(v) => v,
            None => self.path_make_vertex(path, p, tree_node),
        };
        if self.vertex(vertex).tree_node.is_none() {
            if let Some(tn) = tree_node {
                self.vertex_mut(vertex).tree_node = Some(tn);
            }
        }
        vertex
    }

    /// Create a vertex along a path, keeping the path's vertex list ordered
    /// by distance from the front node. Splits any crease the new vertex
    /// lands inside of.
    fn path_make_vertex(&mut self, path: PathId, p: Vec2, tree_node: Option<NodeId>) -> VertexId {
        let (front, back, is_border) = {
            let pa = self.path(path);
            (pa.front_node(), pa.back_node(), pa.is_border_path)
        };
        let p1 = self.node(front).loc;
        let p2 = self.node(back).loc;
        let dist_p = (p - p1).norm();
        let x = dist_p / (p2 - p1).norm();
        let elevation =
            (1.0 - x) * self.node(front).elevation + x * self.node(back).elevation;
        let vertex = self.make_vertex(VertexOwner::Path(path), p, elevation, is_border, tree_node);

        // Keep the owned list sorted by distance from the front node.
        let mut list = self.path(path).owned_vertices.clone();
        list.pop();
        let pos = list
            .iter()
            .position(|&v| dist_p < (self.vertex(v).loc - p1).norm())
            .unwrap_or(list.len());
        list.insert(pos, vertex);
        self.path_mut(path).owned_vertices = list;

        // Vertex creation should precede crease creation along a path, but
        // if a crease already spans the spot, split it.
        for c in self.path(path).owned_creases.clone() {
            let (cv1, cv2, kind) = {
                let cr = self.crease(c);
                (cr.front_vertex(), cr.back_vertex(), cr.kind)
            };
            let pc1 = self.vertex(cv1).loc;
            let pc2 = self.vertex(cv2).loc;
            let pc21 = pc2 - pc1;
            let x = geom::inner(p - pc1, pc21) / geom::mag2(pc21);
            if x > 0.0 && x < 1.0 {
                self.make_crease(CreaseOwner::Path(path), cv1, vertex, kind);
                self.make_crease(CreaseOwner::Path(path), vertex, cv2, kind);
                self.delete_crease(c);
                break;
            }
        }
        vertex
    }

    /// The crease joining two vertices within an owner's set, created with
    /// the given kind if absent.
    pub(crate) fn get_or_make_crease(
        &mut self,
        owner: CreaseOwner,
        v1: VertexId,
        v2: VertexId,
        kind: CreaseKind,
    ) -> CreaseId {
        let list = match owner {
            CreaseOwner::Path(p) => &self.path(p).owned_creases,
            CreaseOwner::Poly(p) => &self.poly(p).owned_creases,
        };
        for &c in list {
            let cr = self.crease(c);
            if cr.is_incident_to(v1) && cr.is_incident_to(v2) {
                return c;
            }
        }
        self.make_crease(owner, v1, v2, kind)
    }

    /// The top-level poly enclosing this poly (itself when top-level).
    pub(crate) fn outermost_poly(&self, poly: PolyId) -> PolyId {
        match self.poly(poly).owner {
            PolyOwner::Tree => poly,
            PolyOwner::Poly(parent) => self.outermost_poly(parent),
        }
    }

    // ---- path vertex/crease construction ----------------------------------

    /// Build the vertices along an axial or gusset path: the endpoint
    /// vertices always, plus one per branch node of the tree falling within
    /// the path metric when the path is active.
    pub(crate) fn path_build_self_vertices(&mut self, path: PathId) {
        debug_assert!(self.path(path).is_active_path || self.path(path).is_axial_path());

        let front = self.path(path).front_node();
        let back = self.path(path).back_node();
        let front_vertex = self.node_get_or_make_vertex_self(front);
        let back_vertex = self.node_get_or_make_vertex_self(back);

        if !self.path(path).owned_vertices.is_empty() {
            return;
        }
        if !self.path(path).is_active_path {
            return;
        }

        let q1 = self.vertex(front_vertex).loc;
        let q2 = self.vertex(back_vertex).loc;
        let act_len = self.path(path).act_paper_length;
        let qu = (q2 - q1) / act_len;

        let (outset, front_red, _back_red) = self.max_outset_path(path);
        let outset_nodes = self.path(outset).nodes.clone();
        let outset_edges = self.path(outset).edges.clone();
        debug_assert!(!outset_edges.is_empty());
        let mut cur_pos = -front_red;
        for i in 0..outset_edges.len() {
            let cur_node = outset_nodes[i + 1];
            cur_pos += self.edge(outset_edges[i]).strained_scaled_length(self.scale);
            if cur_pos <= 0.0 {
                continue;
            }
            if cur_pos >= act_len {
                break;
            }
            self.path_get_or_make_vertex(path, q1 + qu * cur_pos, Some(cur_node));
        }
    }

    /// Join the endpoint vertices and the owned vertices of a path with
    /// creases of the given kind, in order.
    pub(crate) fn path_connect_self_vertices(&mut self, path: PathId, kind: CreaseKind) {
        let front = self.path(path).front_node();
        let mut prev = self.node(front).vertex().expect("front vertex missing");
        for v in self.path(path).owned_vertices.clone() {
            self.get_or_make_crease(CreaseOwner::Path(path), prev, v, kind);
            prev = v;
        }
        let back = self.path(path).back_node();
        let back_vertex = self.node(back).vertex().expect("back vertex missing");
        self.get_or_make_crease(CreaseOwner::Path(path), prev, back_vertex, kind);
    }

    // ---- ridgelines --------------------------------------------------------

    /// Collect the chain of nodes and sub-paths that climbs from `front` up
    /// over the molecule's ridge and back down to `back`, which must be
    /// consecutive CCW ring corners of the poly. Recurses into sub-polys.
    pub(crate) fn ridgeline_nodes_and_paths(
        &self,
        poly: PolyId,
        front: NodeId,
        back: NodeId,
        ridge_nodes: &mut Vec<NodeId>,
        ridge_paths: &mut Vec<PathId>,
    ) {
        let p = self.poly(poly);
        let nn = p.ring_nodes.len();
        let front_offset = p
            .ring_nodes
            .iter()
            .position(|&n| n == front)
            .expect("front node not on the ring");
        let back_offset = p
            .ring_nodes
            .iter()
            .position(|&n| n == back)
            .expect("back node not on the ring");
        debug_assert_eq!((back_offset + nn - front_offset) % nn, 1);

        ridge_nodes.push(front);
        ridge_paths.push(p.spoke_paths[front_offset]);
        match p.owned_nodes.len() {
            1 => {
                ridge_nodes.push(p.owned_nodes[0]);
            }
            2 => {
                // Two distinct inset nodes are joined by a ridge; it belongs
                // to this ridgeline only when the two corners inset apart.
                let front_inset = p.inset_nodes[front_offset];
                let back_inset = p.inset_nodes[back_offset];
                ridge_nodes.push(front_inset);
                if front_inset != back_inset {
                    let ridge = p.ridge_path.expect("two inset nodes need a ridge path");
                    ridge_paths.push(ridge);
                    ridge_nodes.push(back_inset);
                }
            }
            _ => {
                let front_inset = p.inset_nodes[front_offset];
                let back_inset = p.inset_nodes[back_offset];
                if front_inset == back_inset {
                    // The corners merged: this is the peak.
                    ridge_nodes.push(front_inset);
                } else {
                    // The missing middle lives in the sub-poly whose ring
                    // carries both inset nodes.
                    let sub_poly = p
                        .owned_polys
                        .iter()
                        .copied()
                        .find(|&sp| {
                            let ring = &self.poly(sp).ring_nodes;
                            ring.contains(&front_inset) && ring.contains(&back_inset)
                        })
                        .expect("no sub-poly spans the inset pair");
                    self.ridgeline_nodes_and_paths(
                        sub_poly,
                        front_inset,
                        back_inset,
                        ridge_nodes,
                        ridge_paths,
                    );
                }
            }
        }
        ridge_paths.push(self.poly(poly).spoke_paths[back_offset]);
        ridge_nodes.push(back);
        debug_assert_eq!(ridge_nodes.len(), ridge_paths.len() + 1);
    }

    /// The vertices along the ridgeline over the ring path from `front` to
    /// `back`, sorted along the path. Sorting is by angle about the path
    /// midpoint (the endpoints map to -pi/2 and +pi/2) because the vertices
    /// of a 90-degree ridge pair have equal projections onto the path and
    /// would otherwise order by roundoff.
    pub(crate) fn ridgeline_vertices(
        &mut self,
        poly: PolyId,
        front: NodeId,
        back: NodeId,
    ) -> Vec<VertexId> {
        let mut ridge_nodes = Vec::new();
        let mut ridge_paths = Vec::new();
        self.ridgeline_nodes_and_paths(poly, front, back, &mut ridge_nodes, &mut ridge_paths);

        let p1 = self.node(front).loc;
        let p2 = self.node(back).loc;
        let pu = geom::normalize(p2 - p1);
        let pv = geom::rotate_ccw_90(pu);
        let dm = 0.5 * (p1 + p2);
        let sort_value = |loc: Vec2| {
            let dp = loc - dm;
            geom::inner(dp, pu).atan2(geom::inner(dp, pv))
        };

        let mut keyed: Vec<(f64, VertexId)> = Vec::new();
        for n in ridge_nodes {
            // Junction peaks over inactive border paths may not have been
            // given a vertex yet.
            if self.node(n).is_junction_node {
                self.node_get_or_make_vertex_self(n);
            }
            if let Some(v) = self.node(n).vertex() {
                keyed.push((sort_value(self.vertex(v).loc), v));
            }
        }
        for path in ridge_paths {
            for v in self.path(path).owned_vertices.clone() {
                keyed.push((sort_value(self.vertex(v).loc), v));
            }
        }
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        keyed.into_iter().map(|(_, v)| v).collect()
    }

    // ---- polygon construction ---------------------------------------------

    /// True if a path may seed a new poly walking forward: its forward slot
    /// is free, and border paths only seed inward (centroid on the CCW
    /// side), never the outside face of the hull.
    fn can_start_poly_fwd(&self, path: PathId, centroid: Vec2) -> bool {
        let p = self.path(path);
        if p.fwd_poly.is_some() {
            return false;
        }
        if !p.is_border_path {
            return true;
        }
        geom::are_ccw(
            self.node(p.front_node()).loc,
            self.node(p.back_node()).loc,
            centroid,
        )
    }

    fn can_start_poly_bkd(&self, path: PathId, centroid: Vec2) -> bool {
        let p = self.path(path);
        if p.bkd_poly.is_some() {
            return false;
        }
        if !p.is_border_path {
            return true;
        }
        geom::are_cw(
            self.node(p.front_node()).loc,
            self.node(p.back_node()).loc,
            centroid,
        )
    }

    /// The next polygon path CCW around `this_node` after `this_path`, and
    /// the node at its far end.
    fn next_path_and_node(&self, this_path: PathId, this_node: NodeId) -> (PathId, NodeId) {
        let this_loc = self.node(this_node).loc;
        let that = self.path(this_path).other_node(this_node);
        let this_angle = geom::angle(self.node(that).loc - this_loc);

        let mut delta = std::f64::consts::TAU;
        let mut next_path = this_path;
        let mut next_node = None;
        for &p in &self.node(this_node).leaf_paths {
            if p == this_path || !self.path(p).is_polygon_path {
                continue;
            }
            let that = self.path(p).other_node(this_node);
            let next_angle = geom::angle(self.node(that).loc - this_loc);
            let mut new_delta = this_angle - next_angle;
            while new_delta < 0.0 {
                new_delta += std::f64::consts::TAU;
            }
            while new_delta >= std::f64::consts::TAU {
                new_delta -= std::f64::consts::TAU;
            }
            if new_delta < delta {
                delta = new_delta;
                next_path = p;
                next_node = Some(that);
            }
        }
        debug_assert_ne!(next_path, this_path);
        (next_path, next_node.expect("no continuation path found"))
    }

    /// Record ring corner locations and centroid of a freshly walked poly.
    fn poly_calc_contents(&mut self, poly: PolyId) {
        let ring = self.poly(poly).ring_nodes.clone();
        let mut centroid = Vec2::zeros();
        let mut locs = Vec::with_capacity(ring.len());
        for &n in &ring {
            let loc = self.node(n).loc;
            centroid += loc;
            locs.push(loc);
        }
        centroid /= ring.len() as f64;
        let p = self.poly_mut(poly);
        p.centroid = centroid;
        p.node_locs = locs;
    }

    /// Cross-paths of a poly: the paths between non-consecutive ring
    /// corners, found in the owner's path set.
    fn poly_calc_cross_paths(&mut self, poly: PolyId) {
        let owner = match self.poly(poly).owner {
            PolyOwner::Tree => TreeOrPoly::Tree,
            PolyOwner::Poly(p) => TreeOrPoly::Poly(p),
        };
        let ring = self.poly(poly).ring_nodes.clone();
        let nn = ring.len();
        let mut cross = Vec::new();
        for i in 2..nn {
            for j in 0..i - 1 {
                if i == nn - 1 && j == 0 {
                    continue;
                }
                let path = self
                    .find_any_path(owner, ring[i], ring[j])
                    .expect("missing cross path");
                union_push(&mut cross, path);
            }
        }
        self.poly_mut(poly).cross_paths = cross;
    }

    /// Build CCW polys over the polygon paths of `path_list`. Crossing
    /// polygon paths (possible in slivers through roundoff) are demoted
    /// rather than allowed to break the walk.
    pub(crate) fn build_polys_from_paths(
        &mut self,
        owner: PolyOwner,
        path_list: &[PathId],
        border_nodes: &[NodeId],
    ) {
        let mut polygon_paths: Vec<PathId> = Vec::new();
        for &p in path_list {
            if !self.path(p).is_polygon_path {
                continue;
            }
            let crossing = polygon_paths
                .iter()
                .any(|&q| self.paths_intersect_interior(p, q));
            if crossing {
                self.path_mut(p).is_polygon_path = false;
            } else {
                polygon_paths.push(p);
            }
        }

        let mut centroid = Vec2::zeros();
        for &n in border_nodes {
            centroid += self.node(n).loc;
        }
        centroid /= border_nodes.len() as f64;

        for &seed in &polygon_paths {
            if self.can_start_poly_fwd(seed, centroid) {
                let poly = self.make_poly(owner);
                self.path_mut(seed).fwd_poly = Some(poly);
                self.walk_poly_ring(poly, seed, true);
                self.poly_calc_contents(poly);
            }
            if self.can_start_poly_bkd(seed, centroid) {
                let poly = self.make_poly(owner);
                self.path_mut(seed).bkd_poly = Some(poly);
                self.walk_poly_ring(poly, seed, false);
                self.poly_calc_contents(poly);
            }
        }

        let owned = match owner {
            PolyOwner::Tree => self.owned_polys.clone(),
            PolyOwner::Poly(p) => self.poly(p).owned_polys.clone(),
        };
        for poly in owned {
            if self.poly(poly).cross_paths.is_empty() {
                self.poly_calc_cross_paths(poly);
            }
        }
    }

    /// Walk one CCW ring starting from a seed path, recording ring nodes
    /// and paths and assigning each traversed path's facing poly slot.
    fn walk_poly_ring(&mut self, poly: PolyId, seed: PathId, forward: bool) {
        let (first_node, mut this_node) = {
            let p = self.path(seed);
            if forward {
                (p.front_node(), p.back_node())
            } else {
                (p.back_node(), p.front_node())
            }
        };
        let mut this_path = seed;
        self.poly_mut(poly).ring_nodes.push(first_node);
        self.poly_mut(poly).ring_paths.push(this_path);
        let mut watchdog = 0;
        loop {
            let (next_path, next_node) = self.next_path_and_node(this_path, this_node);
            self.poly_mut(poly).ring_nodes.push(this_node);
            self.poly_mut(poly).ring_paths.push(next_path);
            if self.path(next_path).front_node() == this_node {
                self.path_mut(next_path).fwd_poly = Some(poly);
            } else {
                self.path_mut(next_path).bkd_poly = Some(poly);
            }
            this_path = next_path;
            this_node = next_node;
            watchdog += 1;
            debug_assert!(watchdog < 100, "runaway polygon walk");
            if next_node == first_node {
                break;
            }
        }
        // The seed contributed first_node and the final path closes on it,
        // so rings end up with matched node/path counts.
        debug_assert_eq!(
            self.poly(poly).ring_nodes.len(),
            self.poly(poly).ring_paths.len()
        );
    }

    pub(crate) fn paths_intersect_interior(&self, p1: PathId, p2: PathId) -> bool {
        let a = self.path(p1);
        let b = self.path(p2);
        if a.starts_or_ends_with(b.front_node()) || a.starts_or_ends_with(b.back_node()) {
            return false;
        }
        let pa = self.node(a.front_node()).loc;
        let ra = self.node(a.back_node()).loc - pa;
        let pb = self.node(b.front_node()).loc;
        let rb = self.node(b.back_node()).loc - pb;
        match geom::line_intersection_params(pa, ra, pb, rb) {
            None => false,
            Some((tp, tq)) => tp > 0.0 && tp < 1.0 && tq > 0.0 && tq < 1.0,
        }
    }

    // ---- top-level entry points --------------------------------------------

    /// Build the top-level polys of the tree (without contents). Safe to
    /// call on partially optimized trees.
    pub fn build_tree_polys(&mut self) {
        self.with_cleanup(|t| t.build_tree_polys_inner());
    }

    fn build_tree_polys_inner(&mut self) {
        let leaf_paths = self.leaf_paths();
        let border_nodes = self.border_nodes();
        if border_nodes.is_empty() {
            return;
        }
        self.build_polys_from_paths(PolyOwner::Tree, &leaf_paths, &border_nodes);

        // Top-level construction can walk out nonconvex rings or rings that
        // swallow another leaf node; those die here.
        let leaf_nodes = self.leaf_nodes();
        for poly in self.owned_polys.clone().into_iter().rev() {
            if !self.calc_poly_is_convex(poly)
                || self.calc_poly_encloses_node(poly, &leaf_nodes)
            {
                self.delete_poly(poly);
            }
        }
    }

    /// Build the polys and fill each with its molecule: sub-polys,
    /// vertices, creases, and facets.
    pub fn build_polys_and_crease_pattern(&mut self) {
        self.with_cleanup(|t| {
            t.build_tree_polys_inner();
            // Under-length edges make molecule construction degenerate;
            // leave the polys unfilled and let the status query report it.
            for (_, e) in t.edges.iter() {
                if e.strained_length() < crate::tol::MIN_EDGE_LENGTH {
                    return;
                }
            }
            for poly in t.owned_polys.clone() {
                t.build_poly_contents(poly);
            }
        });
    }

    /// Number of inactive ring paths around a poly. More than one leaves a
    /// gap in the hinge network that facet ordering cannot bridge.
    pub fn num_inactive_border_paths(&self, poly: PolyId) -> usize {
        self.poly(poly)
            .ring_paths
            .iter()
            .filter(|&&p| !self.path(p).is_active_path)
            .count()
    }

    // ---- the molecule ------------------------------------------------------

    /// Fill a poly with its molecule. Idempotent: a filled poly is left
    /// alone.
    pub(crate) fn build_poly_contents(&mut self, poly: PolyId) {
        if self.poly(poly).has_contents() {
            return;
        }
        let nn = self.poly(poly).size();
        debug_assert!(nn >= 3);

        if nn == 3 {
            self.build_triangle_contents(poly);
        } else {
            self.build_inset_contents(poly);
        }

        // Crease construction over the ring paths. First pass: vertices
        // along axial/gusset paths, and upward hinge propagation from
        // active-axial and gusset paths to their ridgelines.
        let ring_nodes = self.poly(poly).ring_nodes.clone();
        let ring_paths = self.poly(poly).ring_paths.clone();
        for i in 0..nn {
            let front = ring_nodes[i];
            let back = ring_nodes[(i + 1) % nn];
            let path = ring_paths[i];

            if self.path(path).is_axial_path() || self.path(path).is_gusset_path() {
                self.path_build_self_vertices(path);
            }

            if self.path(path).is_active_axial_path() || self.path(path).is_gusset_path() {
                let mut ridge_nodes = Vec::new();
                let mut ridge_paths = Vec::new();
                self.ridgeline_nodes_and_paths(
                    poly,
                    front,
                    back,
                    &mut ridge_nodes,
                    &mut ridge_paths,
                );
                let p1 = self.node(front).loc;
                let p2 = self.node(back).loc;
                let outermost = self.outermost_poly(poly);
                for bot in self.path(path).owned_vertices.clone() {
                    let bot_loc = self.vertex(bot).loc;
                    let bot_tree_node = self.vertex(bot).tree_node;
                    for &ridge_path in &ridge_paths {
                        let q1 = self.node(self.path(ridge_path).front_node()).loc;
                        let q2 = self.node(self.path(ridge_path).back_node()).loc;
                        if let Some(q) = geom::project_p_to_q(p1, p2, bot_loc, q1, q2) {
                            let top = self.path_get_or_make_vertex(ridge_path, q, bot_tree_node);
                            self.get_or_make_crease(
                                CreaseOwner::Poly(outermost),
                                bot,
                                top,
                                CreaseKind::UnfoldedHinge,
                            );
                        }
                    }
                }
            }
        }

        // Second pass, after every ridgeline has all its vertices: ridge
        // creases along the ridgeline, downward hinges under inactive axial
        // paths, and the axial/gusset creases along each ring path.
        for i in 0..nn {
            let front = ring_nodes[i];
            let back = ring_nodes[(i + 1) % nn];
            let path = ring_paths[i];
            if !(self.path(path).is_axial_path() || self.path(path).is_gusset_path()) {
                continue;
            }

            let ridge_vertices = self.ridgeline_vertices(poly, front, back);
            debug_assert!(!ridge_vertices.is_empty());
            let outermost = self.outermost_poly(poly);
            for m in 1..ridge_vertices.len() {
                self.get_or_make_crease(
                    CreaseOwner::Poly(outermost),
                    ridge_vertices[m - 1],
                    ridge_vertices[m],
                    CreaseKind::Ridge,
                );
            }

            if self.path(path).is_axial_path() && !self.path(path).is_active_path {
                self.build_downward_hinges(poly, path, front, back, &ridge_vertices);
            }

            let kind = if self.path(path).is_axial_path() {
                CreaseKind::Axial
            } else {
                CreaseKind::Gusset
            };
            self.path_connect_self_vertices(path, kind);
        }

        if self.poly(poly).is_sub_poly {
            return;
        }

        // Facets: walk the creases owned by this poly plus those along its
        // ring paths.
        let mut facet_creases = self.poly(poly).owned_creases.clone();
        for &rp in &self.poly(poly).ring_paths.clone() {
            for &c in &self.path(rp).owned_creases {
                union_push(&mut facet_creases, c);
            }
        }
        self.build_facets_from_creases(poly, &facet_creases);
    }

    /// Triangle base case: one inset node at the incenter; all three
    /// corners map to it through spokes.
    fn build_triangle_contents(&mut self, poly: PolyId) {
        let ring = self.poly(poly).ring_nodes.clone();
        let p1 = self.node(ring[0]).loc;
        let p2 = self.node(ring[1]).loc;
        let p3 = self.node(ring[2]).loc;
        let apex_loc = geom::incenter(p1, p2, p3);
        let apex = self.make_node(NodeOwner::Poly(poly), apex_loc);
        self.node_mut(apex).is_junction_node = true;
        let elevation = self.node(ring[0]).elevation + geom::inradius(p1, p2, p3);
        self.node_mut(apex).elevation = elevation;

        self.poly_mut(poly).inset_nodes = vec![apex, apex, apex];
        for &corner in &ring {
            let spoke = self.make_sub_path(poly, corner, apex);
            self.poly_mut(poly).spoke_paths.push(spoke);
        }
    }

    /// General case, four or more corners: find the largest inset that
    /// keeps every ring and cross path feasible, place the inset nodes, and
    /// either finish (one or two distinct inset nodes) or build the reduced
    /// path network and recurse.
    fn build_inset_contents(&mut self, poly: PolyId) {
        let ring = self.poly(poly).ring_nodes.clone();
        let nn = ring.len();
        let locs: Vec<Vec2> = ring.iter().map(|&n| self.node(n).loc).collect();

        // Bisector at each corner, normalized so that inset distance h
        // moves the corner by h perpendicular to each adjacent side, plus
        // the cotangent of the half-angle (side reduction per unit inset).
        let mut r = vec![Vec2::zeros(); nn];
        let mut rp = vec![Vec2::zeros(); nn];
        let mut rn = vec![Vec2::zeros(); nn];
        let mut mr = vec![0.0; nn];
        for i in 0..nn {
            let ip = (i + nn - 1) % nn;
            let inext = (i + 1) % nn;
            rp[i] = geom::normalize(locs[ip] - locs[i]);
            rn[i] = geom::normalize(locs[inext] - locs[i]);
            let bis = geom::normalize(geom::rotate_ccw_90(rn[i] - rp[i]));
            r[i] = bis / geom::inner(bis, geom::rotate_ccw_90(rn[i]));
            mr[i] = geom::inner(r[i], rp[i]);
        }

        // Largest inset h keeping every path between corners feasible.
        // Adjacent corners bound h at their bisector intersection;
        // non-adjacent pairs at the root of |u + h v|^2 = (L - h(mi+mj))^2.
        const HMAX: f64 = 1.0e10;
        let owner = match self.poly(poly).owner {
            PolyOwner::Tree => TreeOrPoly::Tree,
            PolyOwner::Poly(p) => TreeOrPoly::Poly(p),
        };
        let mut h = HMAX;
        for i in 0..nn - 1 {
            for j in i + 1..nn {
                if geom::are_parallel(r[i], r[j]) && geom::inner(r[i], r[j]) > 0.0 {
                    continue;
                }
                let ni = locs[i];
                let nj = locs[j];
                if j == i + 1 || (i == 0 && j == nn - 1) {
                    if let Some(bi) = geom::line_intersection(ni, r[i], nj, r[j]) {
                        let h1 = geom::inner(bi - ni, geom::rotate_ccw_90(rn[i]));
                        // Near-parallel bisectors give huge or negative h;
                        // negative ones are spurious.
                        if h1 > 0.0 && h > h1 {
                            h = h1;
                        }
                    }
                } else {
                    let lij = {
                        let path = self
                            .find_any_path(owner, ring[i], ring[j])
                            .expect("missing corner-to-corner path");
                        self.path(path).min_paper_length
                    };
                    let u = ni - nj;
                    let v = r[i] - r[j];
                    let w = mr[i] + mr[j];
                    let a = geom::mag2(v) - w * w;
                    let b = geom::inner(u, v) + lij * w;
                    let c = geom::mag2(u) - lij * lij;
                    let d = b * b - a * c;
                    if d < 0.0 {
                        continue;
                    }
                    for h1 in [(-b + d.sqrt()) / a, (-b - d.sqrt()) / a] {
                        let lijp = lij - h1 * (mr[i] + mr[j]);
                        if lijp > 0.0 && h1 > 0.0 && h > h1 {
                            h = h1;
                        }
                    }
                }
            }
        }
        assert!(h != HMAX, "no feasible inset distance found");

        // Inset every corner; coincident corners merge into junction nodes.
        for i in 0..nn {
            let p = locs[i] + h * r[i];
            let inset = self.get_or_make_inset_node(poly, p);
            self.poly_mut(poly).inset_nodes.push(inset);
        }
        let elevation = self.node(ring[0]).elevation + h;
        for n in self.poly(poly).owned_nodes.clone() {
            self.node_mut(n).elevation = elevation;
        }

        // Every inset corner must remain strictly inside the outer ring; a
        // violation means the inset solve itself went wrong.
        for n in self.poly(poly).owned_nodes.clone() {
            let loc = self.node(n).loc;
            assert!(
                self.poly_convex_encloses(poly, loc),
                "inset corner escaped its polygon"
            );
        }

        let num_inset = self.poly(poly).owned_nodes.len();
        if num_inset <= 2 {
            for i in 0..nn {
                let inset = self.poly(poly).inset_nodes[i];
                let spoke = self.make_sub_path(poly, ring[i], inset);
                self.poly_mut(poly).spoke_paths.push(spoke);
            }
            if num_inset == 2 {
                let a = self.poly(poly).owned_nodes[0];
                let b = self.poly(poly).owned_nodes[1];
                let ridge = self.make_sub_path(poly, a, b);
                self.poly_mut(poly).ridge_path = Some(ridge);
            }
            return;
        }

        // Three or more distinct inset nodes: build the reduced path
        // network and recurse. Consecutive pairs come first so that the
        // ring paths of the inset poly inset from ring paths of this one.
        for dij in 1..nn {
            for i in 0..=(nn - dij) {
                let j = (i + dij) % nn;
                let ni = ring[i];
                let nj = ring[j];
                let rni = self.poly(poly).inset_nodes[i];
                let rnj = self.poly(poly).inset_nodes[j];
                if rni == rnj {
                    continue;
                }
                if self.find_leaf_path(rni, rnj).is_some() {
                    continue;
                }
                let outset = self
                    .find_any_path(owner, ni, nj)
                    .expect("missing outset path");
                let i_reduction = h * mr[i];
                let j_reduction = h * mr[j];

                // Preserve the outset path's orientation in the inset copy.
                let mut path = Path::new(PathOwner::Poly(poly));
                path.is_sub_path = true;
                if self.path(outset).front_node() == ni {
                    path.nodes = vec![rni, rnj];
                    path.front_reduction = i_reduction;
                    path.back_reduction = j_reduction;
                } else {
                    path.nodes = vec![rnj, rni];
                    path.front_reduction = j_reduction;
                    path.back_reduction = i_reduction;
                }
                path.outset_path = Some(outset);
                path.min_paper_length = self.path(outset).min_paper_length
                    - (path.front_reduction + path.back_reduction);
                path.act_paper_length =
                    (self.node(rni).loc - self.node(rnj).loc).norm();
                path.min_tree_length = path.min_paper_length / self.scale;
                path.act_tree_length = path.act_paper_length / self.scale;

                // Active if inset from an active path, or if the reduction
                // landed exactly on the physical span (an active cross
                // path).
                path.is_active_path = self.path(outset).is_active_path
                    || crate::tree::cleanup::test_is_active(
                        path.act_paper_length,
                        path.min_paper_length,
                    );
                path.is_border_path = dij == 1;
                path.is_polygon_path = path.is_active_path || path.is_border_path;

                let new_path = self.make_path(path);
                self.node_mut(rni).leaf_paths.push(new_path);
                self.node_mut(rnj).leaf_paths.push(new_path);
            }
        }

        let owned_paths = self.poly(poly).owned_paths.clone();
        let inset_ring = self.poly(poly).inset_nodes.clone();
        self.build_polys_from_paths(PolyOwner::Poly(poly), &owned_paths, &inset_ring);

        for sub in self.poly(poly).owned_polys.clone() {
            self.build_poly_contents(sub);
        }

        for i in 0..nn {
            let inset = self.poly(poly).inset_nodes[i];
            let spoke = self.make_sub_path(poly, ring[i], inset);
            self.poly_mut(poly).spoke_paths.push(spoke);
        }
    }

    /// The inset node at `p`, merged with an existing one when they land
    /// within tolerance of each other; merged nodes become junctions.
    fn get_or_make_inset_node(&mut self, poly: PolyId, p: Vec2) -> NodeId {
        for &n in &self.poly(poly).owned_nodes {
            if is_tiny((self.node(n).loc - p).norm()) {
                self.node_mut(n).is_junction_node = true;
                return n;
            }
        }
        self.make_node(NodeOwner::Poly(poly), p)
    }

    /// Downward hinge propagation under an inactive axial ring path: ridge
    /// vertices project onto the path, making regular hinges where the
    /// ridge vertex projects a tree node and pseudohinges where it sits
    /// between two projections of the same node. Completed
    /// hinge-pseudohinge-hinge triplets record their mate pointers.
    fn build_downward_hinges(
        &mut self,
        poly: PolyId,
        path: PathId,
        front: NodeId,
        back: NodeId,
        ridge_vertices: &[VertexId],
    ) {
        let front_vertex = self.node(front).vertex().expect("front vertex missing");
        let back_vertex = self.node(back).vertex().expect("back vertex missing");
        debug_assert_ne!(front_vertex, back_vertex);
        let p1 = self.vertex(front_vertex).loc;
        let p2 = self.vertex(back_vertex).loc;

        let mut crease0: Option<CreaseId> = None;
        let mut crease1: Option<CreaseId> = None;
        let mut crease2: Option<CreaseId>;
        for m in 1..ridge_vertices.len().saturating_sub(1) {
            let ridge_vertex = ridge_vertices[m];
            let tn = self.vertex(ridge_vertex).tree_node;
            let kind = if tn.is_some() {
                CreaseKind::UnfoldedHinge
            } else {
                let prev = self.vertex(ridge_vertices[m - 1]).tree_node;
                let next = self.vertex(ridge_vertices[m + 1]).tree_node;
                match (prev, next) {
                    (Some(a), Some(b)) if a == b => CreaseKind::Pseudohinge,
                    _ => continue,
                }
            };
            let q = self.vertex(ridge_vertex).loc;
            let Some(p) = geom::project_q_to_p(q, p1, p2) else {
                continue;
            };
            let bot = self.path_get_or_make_vertex(path, p, tn);
            crease2 = crease1;
            crease1 = crease0;
            crease0 = Some(self.get_or_make_crease(
                CreaseOwner::Poly(poly),
                bot,
                ridge_vertex,
                kind,
            ));
            if let (Some(c0), Some(c1), Some(c2)) = (crease0, crease1, crease2) {
                if self.crease(c0).kind == CreaseKind::UnfoldedHinge
                    && self.crease(c1).kind == CreaseKind::Pseudohinge
                    && self.crease(c2).kind == CreaseKind::UnfoldedHinge
                {
                    let mate0 = self.crease_lower_vertex(c0);
                    let mate2 = self.crease_lower_vertex(c2);
                    self.vertex_mut(mate0).right_pseudohinge_mate = Some(mate2);
                    self.vertex_mut(mate2).left_pseudohinge_mate = Some(mate0);
                }
            }
        }
    }

    // ---- facets ------------------------------------------------------------

    /// False if any two creases cross in their interiors. Facet walking
    /// assumes a planar embedding.
    pub(crate) fn calc_has_planar_creases(&self, crease_list: &[CreaseId]) -> bool {
        for i in 1..crease_list.len() {
            for j in 0..i {
                if self.creases_intersect_interior(crease_list[i], crease_list[j]) {
                    return false;
                }
            }
        }
        true
    }

    fn creases_intersect_interior(&self, c1: CreaseId, c2: CreaseId) -> bool {
        let a = self.crease(c1);
        let b = self.crease(c2);
        if a.vertices.contains(&b.vertices[0]) || a.vertices.contains(&b.vertices[1]) {
            return false;
        }
        let pa = self.vertex(a.front_vertex()).loc;
        let ra = self.vertex(a.back_vertex()).loc - pa;
        let pb = self.vertex(b.front_vertex()).loc;
        let rb = self.vertex(b.back_vertex()).loc - pb;
        match geom::line_intersection_params(pa, ra, pb, rb) {
            None => false,
            Some((tp, tq)) => tp > 0.0 && tp < 1.0 && tq > 0.0 && tq < 1.0,
        }
    }

    fn can_start_facet_fwd(&self, crease: CreaseId, centroid: Vec2) -> bool {
        let c = self.crease(crease);
        if c.fwd_facet.is_some() {
            return false;
        }
        if !c.kind.is_axial() {
            return true;
        }
        geom::are_ccw(
            self.vertex(c.front_vertex()).loc,
            self.vertex(c.back_vertex()).loc,
            centroid,
        )
    }

    fn can_start_facet_bkd(&self, crease: CreaseId, centroid: Vec2) -> bool {
        let c = self.crease(crease);
        if c.bkd_facet.is_some() {
            return false;
        }
        if !c.kind.is_axial() {
            return true;
        }
        geom::are_cw(
            self.vertex(c.front_vertex()).loc,
            self.vertex(c.back_vertex()).loc,
            centroid,
        )
    }

    /// The next crease CCW around `this_vertex` after `this_crease`.
    fn next_crease_and_vertex(
        &self,
        this_crease: CreaseId,
        this_vertex: VertexId,
    ) -> (CreaseId, VertexId) {
        let this_loc = self.vertex(this_vertex).loc;
        let that = self.crease(this_crease).other_vertex(this_vertex);
        let this_angle = geom::angle(self.vertex(that).loc - this_loc);

        let mut delta = std::f64::consts::TAU;
        let mut next_crease = this_crease;
        let mut next_vertex = None;
        for &c in &self.vertex(this_vertex).creases {
            if c == this_crease {
                continue;
            }
            let that = self.crease(c).other_vertex(this_vertex);
            let next_angle = geom::angle(self.vertex(that).loc - this_loc);
            let mut new_delta = this_angle - next_angle;
            while new_delta < 0.0 {
                new_delta += std::f64::consts::TAU;
            }
            while new_delta >= std::f64::consts::TAU {
                new_delta -= std::f64::consts::TAU;
            }
            if new_delta < delta {
                delta = new_delta;
                next_crease = c;
                next_vertex = Some(that);
            }
        }
        debug_assert_ne!(next_crease, this_crease);
        (next_crease, next_vertex.expect("no continuation crease"))
    }

    /// Walk CCW facets out of the crease set of a poly and assign each
    /// crease's forward/backward facet slots.
    pub(crate) fn build_facets_from_creases(&mut self, poly: PolyId, crease_list: &[CreaseId]) {
        if crease_list.is_empty() {
            return;
        }
        debug_assert!(self.calc_has_planar_creases(crease_list));

        let centroid = self.poly(poly).centroid;
        for &seed in crease_list {
            if self.can_start_facet_fwd(seed, centroid) {
                let facet = self.make_facet(poly);
                self.crease_mut(seed).fwd_facet = Some(facet);
                let first = self.crease(seed).front_vertex();
                let start = self.crease(seed).back_vertex();
                self.walk_facet(facet, seed, first, start);
                self.facet_calc_contents(facet);
            }
            if self.can_start_facet_bkd(seed, centroid) {
                let facet = self.make_facet(poly);
                self.crease_mut(seed).bkd_facet = Some(facet);
                let first = self.crease(seed).back_vertex();
                let start = self.crease(seed).front_vertex();
                self.walk_facet(facet, seed, first, start);
                self.facet_calc_contents(facet);
            }
        }
    }

    fn walk_facet(
        &mut self,
        facet: crate::tree::FacetId,
        seed: CreaseId,
        first_vertex: VertexId,
        start_vertex: VertexId,
    ) {
        self.facet_mut(facet).vertices.push(first_vertex);
        self.facet_mut(facet).creases.push(seed);
        let mut this_crease = seed;
        let mut this_vertex = start_vertex;
        let mut watchdog = 0;
        loop {
            let (next_crease, next_vertex) = self.next_crease_and_vertex(this_crease, this_vertex);
            debug_assert!(!self.facet(facet).creases.contains(&next_crease));
            self.facet_mut(facet).vertices.push(this_vertex);
            self.facet_mut(facet).creases.push(next_crease);
            if self.crease(next_crease).front_vertex() == this_vertex {
                debug_assert!(self.crease(next_crease).fwd_facet.is_none());
                self.crease_mut(next_crease).fwd_facet = Some(facet);
            } else {
                debug_assert!(self.crease(next_crease).bkd_facet.is_none());
                self.crease_mut(next_crease).bkd_facet = Some(facet);
            }
            this_crease = next_crease;
            this_vertex = next_vertex;
            watchdog += 1;
            debug_assert!(watchdog < 100, "runaway facet walk");
            if next_vertex == first_vertex {
                break;
            }
        }
    }

    /// Compute a facet's centroid and rotate its arrays so the unique
    /// axial-or-gusset crease sits at index 0 (the facet bottom). Vertical
    /// sliver facets with no such crease are flagged not well formed.
    fn facet_calc_contents(&mut self, facet: crate::tree::FacetId) {
        let vertices = self.facet(facet).vertices.clone();
        let mut centroid = Vec2::zeros();
        for &v in &vertices {
            centroid += self.vertex(v).loc;
        }
        centroid /= vertices.len() as f64;
        self.facet_mut(facet).centroid = centroid;

        let mut well_formed = true;
        let mut rotations = 0;
        while !self
            .crease(self.facet(facet).creases[0])
            .kind
            .is_axial_or_gusset()
        {
            let f = self.facet_mut(facet);
            f.vertices.rotate_left(1);
            f.creases.rotate_left(1);
            rotations += 1;
            if rotations >= vertices.len() {
                well_formed = false;
                break;
            }
        }
        self.facet_mut(facet).is_well_formed = well_formed;
    }
}
