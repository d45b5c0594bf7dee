use core::fmt;

/// Result alias for `cohort`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by graph construction, partitions, and the optimiser.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty where at least one element is required.
    EmptyInput,

    /// Parallel inputs disagree on length (usize).
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Found length.
        found: usize,
    },

    /// Vertex index outside `[0, N)`.
    VertexOutOfRange {
        /// Offending vertex index.
        vertex: usize,
        /// Number of vertices.
        n: usize,
    },

    /// Community index outside the valid range for the operation.
    CommunityOutOfRange {
        /// Offending community index.
        community: usize,
        /// One past the largest valid index.
        limit: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A quality computation produced a non-finite value.
    NonFiniteQuality,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::LengthMismatch { expected, found } => {
                write!(f, "length mismatch: expected {expected}, found {found}")
            }
            Error::VertexOutOfRange { vertex, n } => {
                write!(f, "vertex {vertex} out of range for graph of {n} vertices")
            }
            Error::CommunityOutOfRange { community, limit } => {
                write!(f, "community {community} out of range (limit {limit})")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::NonFiniteQuality => write!(f, "quality function produced a non-finite value"),
        }
    }
}

impl std::error::Error for Error {}
