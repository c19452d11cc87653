use thiserror::Error;

/// Failure modes of graph construction, pairwise matching, and multi-structure superposition.
///
/// Configuration and numerical errors abort the whole operation. Cancellation is reported
/// through [`Error::Cancelled`] and is never wrapped into another variant.
#[derive(Debug, Error)]
pub enum Error {
    /// The input yielded no vertices after selection and hydrogen filtering.
    #[error("cannot create a graph of '{token}': no valid vertices (check the selection)")]
    EmptyGraph { token: String },

    /// The subgraph method requires both graphs to be connected.
    #[error("graph '{token}' must be connected to use the subgraph matching method")]
    DisconnectedGraph { token: String },

    /// Neither the group-level nor the label-level groupings of the two graphs agree.
    #[error(
        "cannot match '{pivot}' and '{other}' using the combinatorial method: incompatible symmetry groupings"
    )]
    IncompatibleGroupings { pivot: String, other: String },

    /// No pivot vertex is matched in every structure, so no consensus can be built.
    #[error(
        "the average structure cannot be constructed (0 globally matching atoms); use the specific-structure pivot and filter structures by matched atom count"
    )]
    NoGlobalMatch,

    #[error("pivot index {index} is out of range for {count} structures")]
    InvalidPivot { index: usize, count: usize },

    #[error("cannot superimpose an empty point set")]
    EmptyPointSet,

    #[error("point set sizes differ: pivot has {pivot} points, other has {other}")]
    PointCountMismatch { pivot: usize, other: usize },

    /// The 4×4 eigensolver exceeded its iteration cap.
    #[error("eigen decomposition is not converging after {iterations} iterations")]
    NotConverging { iterations: usize },

    #[error("structure '{id}' is not part of this matching")]
    MissingStructure { id: String },

    #[error("failed to build the worker pool: {details}")]
    ThreadPool { details: String },

    #[error("computation cancelled")]
    Cancelled,
}

impl Error {
    pub fn empty_graph(token: impl Into<String>) -> Self {
        Self::EmptyGraph {
            token: token.into(),
        }
    }

    pub fn disconnected(token: impl Into<String>) -> Self {
        Self::DisconnectedGraph {
            token: token.into(),
        }
    }

    pub fn incompatible_groupings(pivot: impl Into<String>, other: impl Into<String>) -> Self {
        Self::IncompatibleGroupings {
            pivot: pivot.into(),
            other: other.into(),
        }
    }

    pub fn missing_structure(id: impl Into<String>) -> Self {
        Self::MissingStructure { id: id.into() }
    }

    pub fn thread_pool(details: impl Into<String>) -> Self {
        Self::ThreadPool {
            details: details.into(),
        }
    }

    /// Returns `true` for the cooperative cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
