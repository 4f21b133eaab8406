//! Navigation helpers over the crease-pattern graph: vertex/crease/facet
//! incidence, left/right orientation, and facet-ordering links.
//!
//! Left and right are meant standing on the lower (axial-side) vertex of a
//! hinge or ridge crease looking up: the left facet is the one whose right
//! crease is this crease.

use crate::tree::{CreaseId, FacetId, Tree, VertexId};

impl Tree {
    // ---- vertex incidence ------------------------------------------------

    /// True if the vertex touches an axial crease, i.e. lies on the border
    /// of a tree poly. Call only after the poly's creases exist.
    pub fn vertex_is_axial(&self, v: VertexId) -> bool {
        self.vertex(v)
            .creases
            .iter()
            .any(|&c| self.crease(c).kind.is_axial())
    }

    pub fn vertex_is_axial_or_gusset(&self, v: VertexId) -> bool {
        self.vertex(v)
            .creases
            .iter()
            .any(|&c| self.crease(c).kind.is_axial_or_gusset())
    }

    pub fn vertex_is_hinge(&self, v: VertexId) -> bool {
        self.vertex(v)
            .creases
            .iter()
            .any(|&c| self.crease(c).kind.is_hinge())
    }

    pub fn vertex_num_hinge_creases(&self, v: VertexId) -> usize {
        self.vertex(v)
            .creases
            .iter()
            .filter(|&&c| self.crease(c).kind.is_hinge())
            .count()
    }

    pub fn vertex_num_major_creases(&self, v: VertexId) -> usize {
        self.vertex(v)
            .creases
            .iter()
            .filter(|&&c| self.crease(c).kind.is_major())
            .count()
    }

    /// Number of creases from the given list incident on this vertex.
    pub fn vertex_degree(&self, v: VertexId, crease_list: &[CreaseId]) -> usize {
        self.vertex(v)
            .creases
            .iter()
            .filter(|c| crease_list.contains(c))
            .count()
    }

    /// The first incident hinge crease. The vertex must be a hinge vertex.
    pub fn vertex_hinge_crease(&self, v: VertexId) -> CreaseId {
        self.vertex(v)
            .creases
            .iter()
            .copied()
            .find(|&c| self.crease(c).kind.is_hinge())
            .expect("vertex has no hinge crease")
    }

    /// The zero, one, or two hinge creases incident on the vertex.
    pub fn vertex_hinge_creases(&self, v: VertexId) -> (Option<CreaseId>, Option<CreaseId>) {
        let mut first = None;
        let mut second = None;
        for &c in &self.vertex(v).creases {
            if self.crease(c).kind.is_hinge() {
                if first.is_none() {
                    first = Some(c);
                } else if second.is_none() {
                    second = Some(c);
                } else {
                    panic!("vertex has more than two hinge creases");
                }
            }
        }
        (first, second)
    }

    /// The two axial-or-gusset creases flanking an axial/gusset vertex.
    pub fn vertex_axial_or_gusset_creases(&self, v: VertexId) -> (CreaseId, CreaseId) {
        let mut first = None;
        for &c in &self.vertex(v).creases {
            if self.crease(c).kind.is_axial_or_gusset() {
                match first {
                    None => first = Some(c),
                    Some(f) => return (f, c),
                }
            }
        }
        panic!("vertex lacks two axial or gusset creases");
    }

    // ---- crease orientation ----------------------------------------------

    /// Lower-elevation endpoint of a ridge or hinge crease.
    pub fn crease_lower_vertex(&self, c: CreaseId) -> VertexId {
        let crease = self.crease(c);
        debug_assert!(!crease.kind.is_axial_or_gusset());
        let v1 = crease.vertices[0];
        let v2 = crease.vertices[1];
        if self.vertex(v1).elevation < self.vertex(v2).elevation {
            v1
        } else {
            v2
        }
    }

    /// Higher-elevation endpoint of a ridge or hinge crease.
    pub fn crease_higher_vertex(&self, c: CreaseId) -> VertexId {
        let crease = self.crease(c);
        debug_assert!(!crease.kind.is_axial_or_gusset());
        let v1 = crease.vertices[0];
        let v2 = crease.vertices[1];
        if self.vertex(v1).elevation < self.vertex(v2).elevation {
            v2
        } else {
            v1
        }
    }

    /// The facet to the left of a hinge or ridge crease: the incident facet
    /// whose right crease is this crease.
    pub fn crease_left_facet(&self, c: CreaseId) -> FacetId {
        let crease = self.crease(c);
        let fwd = crease.fwd_facet.expect("crease lacks forward facet");
        if self.facet(fwd).right_crease() == c {
            fwd
        } else {
            let bkd = crease.bkd_facet.expect("crease lacks backward facet");
            debug_assert_eq!(self.facet(bkd).right_crease(), c);
            bkd
        }
    }

    /// The facet to the right of a hinge or ridge crease.
    pub fn crease_right_facet(&self, c: CreaseId) -> FacetId {
        let crease = self.crease(c);
        let fwd = crease.fwd_facet.expect("crease lacks forward facet");
        if self.facet(fwd).left_crease() == c {
            fwd
        } else {
            let bkd = crease.bkd_facet.expect("crease lacks backward facet");
            debug_assert_eq!(self.facet(bkd).left_crease(), c);
            bkd
        }
    }

    /// First facet to the left of this crease that is not a pseudohinge
    /// facet.
    pub fn crease_left_non_pseudohinge_facet(&self, c: CreaseId) -> FacetId {
        let mut f = self.crease_left_facet(c);
        while self.facet_is_pseudohinge(f) {
            f = self.facet_left_facet(f);
        }
        f
    }

    /// First facet to the right of this crease that is not a pseudohinge
    /// facet.
    pub fn crease_right_non_pseudohinge_facet(&self, c: CreaseId) -> FacetId {
        let mut f = self.crease_right_facet(c);
        while self.facet_is_pseudohinge(f) {
            f = self.facet_right_facet(f);
        }
        f
    }

    // ---- facet structure -------------------------------------------------

    /// True if the facet sits on an axial crease.
    pub fn facet_is_axial(&self, f: FacetId) -> bool {
        let facet = self.facet(f);
        facet.is_well_formed && self.crease(facet.bottom_crease()).kind.is_axial()
    }

    /// True if the facet sits on a gusset crease.
    pub fn facet_is_gusset(&self, f: FacetId) -> bool {
        let facet = self.facet(f);
        facet.is_well_formed && self.crease(facet.bottom_crease()).kind.is_gusset()
    }

    /// True if either side crease of the facet is a pseudohinge.
    pub fn facet_is_pseudohinge(&self, f: FacetId) -> bool {
        let facet = self.facet(f);
        self.crease(facet.left_crease()).kind.is_pseudohinge()
            || self.crease(facet.right_crease()).kind.is_pseudohinge()
    }

    pub fn facet_left_facet(&self, f: FacetId) -> FacetId {
        self.crease_left_facet(self.facet(f).left_crease())
    }

    pub fn facet_right_facet(&self, f: FacetId) -> FacetId {
        self.crease_right_facet(self.facet(f).right_crease())
    }

    /// Next facet leftward that is not a pseudohinge facet. Pseudohinges
    /// can sit side by side, so this may skip several.
    pub fn facet_left_non_pseudohinge_facet(&self, f: FacetId) -> FacetId {
        let mut g = self.facet_left_facet(f);
        while self.facet_is_pseudohinge(g) {
            g = self.facet_left_facet(g);
        }
        g
    }

    /// Next facet rightward that is not a pseudohinge facet.
    pub fn facet_right_non_pseudohinge_facet(&self, f: FacetId) -> FacetId {
        let mut g = self.facet_right_facet(f);
        while self.facet_is_pseudohinge(g) {
            g = self.facet_right_facet(g);
        }
        g
    }

    /// The ridge creases around a facet (the bottom crease is skipped; the
    /// sides may qualify).
    pub fn facet_ridge_creases(&self, f: FacetId) -> Vec<CreaseId> {
        let facet = self.facet(f);
        debug_assert!(facet.is_well_formed);
        facet.creases[1..]
            .iter()
            .copied()
            .filter(|&c| self.crease(c).kind.is_ridge())
            .collect()
    }

    // ---- facet ordering links --------------------------------------------

    /// Add a directed ordering link `tail -> head`.
    pub fn link_facets(&mut self, tail: FacetId, head: FacetId) {
        self.facet_mut(tail).head_facets.push(head);
        self.facet_mut(head).tail_facets.push(tail);
    }

    /// True if the facets are linked in either direction.
    pub fn facets_are_linked(&self, f1: FacetId, f2: FacetId) -> bool {
        if self.facet(f1).head_facets.contains(&f2) {
            return true;
        }
        if self.facet(f2).head_facets.contains(&f1) {
            return true;
        }
        debug_assert!(!self.facet(f1).tail_facets.contains(&f2));
        debug_assert!(!self.facet(f2).tail_facets.contains(&f1));
        false
    }

    /// Join two dangling ends of the ordering graph: one facet must be a
    /// sink and the other a source; the link runs sink -> source.
    pub fn join_facets(&mut self, f1: FacetId, f2: FacetId) {
        if self.facet(f1).is_sink_facet() {
            debug_assert!(self.facet(f2).is_source_facet());
            self.link_facets(f1, f2);
        } else {
            debug_assert!(self.facet(f1).is_source_facet());
            debug_assert!(self.facet(f2).is_sink_facet());
            self.link_facets(f2, f1);
        }
    }

    /// Remove the ordering link between two facets, whichever direction it
    /// runs.
    pub fn unlink_facets(&mut self, f1: FacetId, f2: FacetId) {
        if self.facet(f1).head_facets.contains(&f2) {
            self.facet_mut(f1).head_facets.retain(|&f| f != f2);
            self.facet_mut(f2).tail_facets.retain(|&f| f != f1);
        } else {
            debug_assert!(self.facet(f1).tail_facets.contains(&f2));
            self.facet_mut(f1).tail_facets.retain(|&f| f != f2);
            self.facet_mut(f2).head_facets.retain(|&f| f != f1);
        }
    }

    /// Swap the ordering links at an axial hinge vertex from running along
    /// the axial creases to running across them. Used to stitch molecule
    /// loops together at shared hinge lines.
    pub fn swap_links_at_vertex(&mut self, v: VertexId) {
        debug_assert!(self.vertex_is_axial(v));
        debug_assert!(self.vertex_is_hinge(v));
        let (c1, c2) = self.vertex_hinge_creases(v);
        let c1 = c1.expect("swap needs two hinge creases");
        let c2 = c2.expect("swap needs two hinge creases");
        let facet_a = self.crease_left_facet(c1);
        let facet_b = self.crease_right_facet(c1);
        let facet_c = self.crease_right_facet(c2);
        let facet_d = self.crease_left_facet(c2);
        self.unlink_facets(facet_a, facet_b);
        self.unlink_facets(facet_c, facet_d);
        self.link_facets(facet_a, facet_c);
        self.link_facets(facet_d, facet_b);
    }
}
