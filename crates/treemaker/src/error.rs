//! Error types for the solver, the tree editing API, and file I/O.

/// Result code returned by the built-in optimizer when it fails.
pub const TOO_MANY_ITERATIONS: i32 = 1;

/// Errors surfaced by the public API. Cleanup never produces one of these;
/// it records its outcome in the tree's validity flags instead, and
/// [`crate::tree::Tree::cp_status`] turns those flags into diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested split location fell outside the interior of the edge.
    #[error("split location falls outside the edge")]
    BadSplitEdge,

    /// The node to absorb is not an interior node of degree two.
    #[error("node is not absorbable")]
    BadAbsorbNode,

    /// The edge to remove is not a stub (leaf-to-branch edge).
    #[error("edge is not a stub")]
    BadRemoveStub,

    /// Removing the marked parts would split the tree into pieces.
    #[error("deletion would disconnect the tree")]
    BadKillParts,

    /// The optimizer terminated without reaching a feasible minimum; the
    /// payload is the solver result code.
    #[error("optimizer failed to converge (code {0})")]
    BadConvergence(i32),

    /// The scale optimization drove the scale below 10% of its prior value.
    #[error("optimal scale collapsed")]
    BadScale,

    /// Edge/strain optimization was requested with no movable nodes left
    /// after filtering.
    #[error("no movable nodes")]
    NoMovingNodes,

    /// Edge/strain optimization was requested with no stretchy edges left
    /// after filtering.
    #[error("no stretchy edges")]
    NoMovingEdges,

    /// The progress callback asked for the optimization to stop.
    #[error("cancelled from progress callback")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised while reading or writing the persistent tree format. A
/// failed read leaves the tree blank.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// A part tag was malformed (not a 4-character token).
    #[error("malformed part tag {0:?}")]
    BadTag(String),

    /// A well-formed tag named a part type this build does not know.
    #[error("unrecognized part tag {0:?}")]
    UnrecognizedTag(String),

    /// A string contained an escape sequence other than `\n`, `\r`, `\\`.
    #[error("bad escape sequence {0:?}")]
    BadEscape(String),

    /// A label exceeded the maximum stored length.
    #[error("string too long: {0:?}")]
    TooLongString(String),

    /// The stream did not begin with the `tree` tag.
    #[error("not a tree document (leading token {0:?})")]
    BadTreeTag(String),

    /// The document version is not one this build can read.
    #[error("unsupported document version {0:?}")]
    BadTreeVersion(String),

    /// A numeric or boolean token failed to parse.
    #[error("bad token {0:?}")]
    BadToken(String),

    /// The read succeeded but this many condition records carried unknown
    /// tags and were skipped.
    #[error("{0} condition record(s) skipped")]
    UnrecognizedConditions(usize),

    #[error(transparent)]
    Stream(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
