//! Crease-pattern status reporting.

use crate::tol::MIN_EDGE_LENGTH;
use crate::tree::parts::DEPTH_NOT_SET;
use crate::tree::{CreaseId, EdgeId, FacetId, PolyId, Tree, VertexId};

/// Why a tree does or does not have a complete crease pattern, with the
/// offending parts where that helps.
#[derive(Debug, PartialEq)]
pub enum CpStatus {
    /// Everything computed through mountain/valley assignment.
    HasFullCp,
    /// Edges below the minimum usable length.
    EdgesTooShort { edges: Vec<EdgeId> },
    /// The convex hull is not filled with valid polys.
    PolysNotValid,
    /// Some polys have no molecule contents yet.
    PolysNotFilled { polys: Vec<PolyId> },
    /// Some polys have more than one inactive border path, which leaves
    /// holes in the hinge network.
    PolysMultipleIbps { polys: Vec<PolyId> },
    /// Some vertices never received a depth.
    VerticesLackDepth { vertices: Vec<VertexId> },
    /// Ill-formed facets or odd-degree interior vertices.
    FacetsNotValid {
        vertices: Vec<VertexId>,
        facets: Vec<FacetId>,
    },
    /// The local-root networks cannot be spliced into one ordering graph.
    NotLocalRootConnectable {
        vertices: Vec<VertexId>,
        creases: Vec<CreaseId>,
    },
}

impl Tree {
    /// True when the tree carries a complete crease pattern with full
    /// mountain/valley assignment.
    pub fn has_full_cp(&self) -> bool {
        self.is_polygon_valid
            && self.is_polygon_filled
            && self.is_vertex_depth_valid
            && self.is_facet_data_valid
            && self.is_local_root_connectable
    }

    /// Status of the crease pattern, with diagnostics. Checks run in
    /// pipeline order, so the first failing stage is the one reported.
    pub fn cp_status(&mut self) -> CpStatus {
        let short_edges: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, e)| e.strained_length() < MIN_EDGE_LENGTH)
            .map(|(id, _)| id)
            .collect();
        if !short_edges.is_empty() {
            return CpStatus::EdgesTooShort { edges: short_edges };
        }

        if !self.is_polygon_valid {
            return CpStatus::PolysNotValid;
        }

        if !self.is_polygon_filled {
            let polys = self
                .owned_polys
                .iter()
                .copied()
                .filter(|&p| !self.poly(p).has_contents())
                .collect();
            return CpStatus::PolysNotFilled { polys };
        }

        let multi_ibp: Vec<PolyId> = self
            .owned_polys
            .iter()
            .copied()
            .filter(|&p| self.num_inactive_border_paths(p) > 1)
            .collect();
        if !multi_ibp.is_empty() {
            return CpStatus::PolysMultipleIbps { polys: multi_ibp };
        }

        if !self.is_vertex_depth_valid {
            let vertices = self
                .vertices
                .iter()
                .filter(|(_, v)| v.depth == DEPTH_NOT_SET)
                .map(|(id, _)| id)
                .collect();
            return CpStatus::VerticesLackDepth { vertices };
        }

        if !self.is_facet_data_valid {
            let vertices = self
                .vertices
                .iter()
                .filter(|(_, v)| !v.is_border_vertex && v.creases.len() % 2 != 0)
                .map(|(id, _)| id)
                .collect();
            let facets = self
                .facets
                .iter()
                .filter(|(_, f)| !f.is_well_formed)
                .map(|(id, _)| id)
                .collect();
            return CpStatus::FacetsNotValid { vertices, facets };
        }

        if !self.is_local_root_connectable {
            let (vertices, creases) = self.calc_why_not_local_root_connectable();
            return CpStatus::NotLocalRootConnectable { vertices, creases };
        }

        CpStatus::HasFullCp
    }
}
