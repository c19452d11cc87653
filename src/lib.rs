//! # BioMatch
//!
//! **BioMatch** is a pure-Rust engine that finds atom correspondences between molecular structures and superimposes them optimally. It matches fragments that share a common substructure, builds a consensus of many superimposed structures, and summarizes how far each one deviates from it.
//!
//! ## Features
//!
//! - **Labeled match graphs** – `MatchGraph` wraps atoms as vertices with element labels, residue groups, ring scores and lazily cached neighborhood signatures.
//! - **Two pairwise methods** – A heuristic maximum-common-subgraph search for related but different molecules, and an exhaustive permutation search over symmetric atom groups for identical layouts.
//! - **Closed-form superposition** – `OptimalTransformation` solves the least-squares rotation with a quaternion eigen-problem and reports the RMSD without applying it.
//! - **Consensus averaging** – `MultipleMatching` matches every structure against a pivot on a worker pool and iterates the globally matched atoms into an average structure.
//! - **Analysis** – Pairwise RMSD matrix, k-means clustering, and per-structure sigma grouping through `MatchingStatistics`.
//! - **Cooperative cancellation** – Every long loop reports through a `ProgressSink` and stops promptly when its `CancellationToken` is raised.

pub mod error;
pub mod graph;
pub mod matching;
pub mod model;
pub mod superpose;

mod utils;

pub use error::{Error, Result};
pub use graph::{MatchGraph, VertexSpec};
pub use matching::{
    CancellationToken, GraphOptions, MatchConfig, MatchMethod, MatchingStatistics,
    MultipleMatching, PairwiseMatching, PivotType, Progress, ProgressSink, SigmaGroup,
};
pub use model::atom::Atom;
pub use model::structure::Structure;
pub use model::topology::Bond;
pub use model::types::Point;
pub use superpose::OptimalTransformation;
