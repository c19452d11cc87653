//! Match graphs: labeled vertices, neighborhood signatures, and symmetry groupings.
//!
//! A [`MatchGraph`] is built once per structure and shared read-only by every search that
//! involves it, apart from its positions which superposition moves in place.

pub mod grouping;
mod match_graph;
mod signature;
mod vocabulary;

pub use grouping::{BottomGroup, TopGroup, TwoLevelGrouping, VertexGroup};
pub use match_graph::{GraphBuilder, MatchGraph, Vertex, VertexSpec};
pub use signature::{GraphSignatures, VertexSignature};
pub use vocabulary::LabelVocabulary;
