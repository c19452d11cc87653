//! Structure matching: pairwise correspondences and multi-structure superposition.
//!
//! [`PairwiseMatching`] pairs the vertices of two graphs with either the heuristic subgraph
//! search or the exhaustive combinatorial search. [`MultipleMatching`] runs the pairwise
//! search of every structure against a pivot on a worker pool and refines the result into a
//! consensus, with optional pairwise RMSD matrix and clustering.

mod clustering;
mod combinatorial;
mod combinatorics;
mod config;
mod multiple;
mod pairwise;
mod progress;
mod statistics;
mod subgraph;

pub use clustering::{kmeans, split};
pub use combinatorial::EXHAUSTIVE_INNER_LIMIT;
pub use combinatorics::{Arrangements, Chain, Combinations, Permutations};
pub use config::{
    DEFAULT_MAX_PARALLELISM, DEFAULT_TRAVERSAL_BUDGET, GraphOptions, MatchConfig, MatchMethod,
    PivotType,
};
pub use multiple::MultipleMatching;
pub use pairwise::PairwiseMatching;
pub use progress::{CancellationToken, Progress, ProgressSink};
pub use statistics::{MatchingStatistics, SigmaGroup, StructureStatistics};
