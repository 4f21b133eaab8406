//! Crease-pattern computation for uniaxial origami bases.
//!
//! Given a weighted tree (the metric skeleton of a base) and a square of
//! paper, the solver places the tree's leaf nodes on the paper subject to
//! the pairwise path-length constraints, then fills every active polygon
//! with a universal molecule: vertices, creases, facets, a facet stacking
//! order, and a mountain/valley assignment.
//!
//! The main pieces:
//! - [`tree`] — the model: nodes, edges, paths, polys, conditions, and the
//!   crease pattern, kept consistent by a cleanup pass after every edit.
//! - [`nlco`] — the built-in augmented Lagrangian solver and its library of
//!   differentiable constraint functions.
//! - [`optim`] — the scale, edge, and strain optimizers that connect the
//!   two.
//! - [`io`] — the line-delimited document format.

pub mod error;
pub mod geom;
pub mod io;
pub mod nlco;
pub mod optim;
pub mod tol;
pub mod tree;

pub use error::{Error, IoError, Result};
pub use geom::Vec2;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::error::{Error, IoError, Result};
    pub use crate::geom::Vec2;
    pub use crate::nlco::{DifferentiableFn, Nlco};
    pub use crate::optim::{EdgeOptimizer, ScaleOptimizer, StrainOptimizer};
    pub use crate::tree::status::CpStatus;
    pub use crate::tree::{
        ConditionId, CreaseId, CreaseKind, EdgeId, FacetColor, FacetId, Fold, NodeId, PathId,
        PolyId, Tree, VertexId,
    };
}
