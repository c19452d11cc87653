//! Parameters of a matching run.
//!
//! Every struct here has a `Default` mirroring the behavior callers get when they do not
//! care, so partial TOML documents and `..Default::default()` literals both work.

use serde::{Deserialize, Serialize};

/// Default cap on recursive traversal steps of one directed subgraph search.
pub const DEFAULT_TRAVERSAL_BUDGET: u64 = 5_000_000;

/// Default size of the worker pool used for pairwise matching.
pub const DEFAULT_MAX_PARALLELISM: usize = 8;

/// Reference frame the structures are superimposed onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum PivotType {
    /// Iteratively refined consensus of all globally matched atoms.
    #[default]
    Average,
    /// The structure at [`MatchConfig::pivot_index`].
    SpecificStructure,
}

/// Pairwise correspondence algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    /// Heuristic backtracking over bonded neighborhoods; tolerates different molecules.
    #[default]
    Subgraph,
    /// Exhaustive permutation of symmetric groups; requires identical group layouts.
    Combinatorial,
}

/// Which atoms of a structure become graph vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Keep only atoms flagged as selected.
    pub only_selection: bool,
    /// Drop hydrogen atoms.
    pub ignore_hydrogens: bool,
    /// Score ring membership during subgraph search.
    pub use_ring_heuristic: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            only_selection: false,
            ignore_hydrogens: false,
            use_ring_heuristic: true,
        }
    }
}

/// Full configuration of [`MultipleMatching::find`](super::MultipleMatching::find).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub pivot_type: PivotType,
    /// Index of the pivot structure; also used as reference in `Average` mode.
    pub pivot_index: usize,
    pub method: MatchMethod,
    /// Compute the all-pairs RMSD matrix of the aligned structures.
    pub pairwise_matrix: bool,
    /// Number of k-means clusters; values below 2 put every structure in one cluster.
    pub clusters: usize,
    pub max_parallelism: usize,
    pub traversal_budget: u64,
    pub graph: GraphOptions,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            pivot_type: PivotType::Average,
            pivot_index: 0,
            method: MatchMethod::Subgraph,
            pairwise_matrix: false,
            clusters: 1,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            traversal_budget: DEFAULT_TRAVERSAL_BUDGET,
            graph: GraphOptions::default(),
        }
    }
}

impl MatchConfig {
    /// Superimposes onto one chosen structure instead of the consensus.
    pub fn specific(pivot_index: usize) -> Self {
        Self {
            pivot_type: PivotType::SpecificStructure,
            pivot_index,
            ..Default::default()
        }
    }

    /// Requests the pairwise matrix and `k` clusters.
    pub fn with_clusters(mut self, k: usize) -> Self {
        self.pairwise_matrix = true;
        self.clusters = k;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MatchConfig::default();
        assert_eq!(config.pivot_type, PivotType::Average);
        assert_eq!(config.method, MatchMethod::Subgraph);
        assert_eq!(config.traversal_budget, 5_000_000);
        assert_eq!(config.clusters, 1);
        assert!(config.graph.use_ring_heuristic);
        assert!(!config.graph.only_selection);
    }

    #[test]
    fn specific_sets_pivot() {
        let config = MatchConfig::specific(3).with_clusters(2);
        assert_eq!(config.pivot_type, PivotType::SpecificStructure);
        assert_eq!(config.pivot_index, 3);
        assert!(config.pairwise_matrix);
        assert_eq!(config.clusters, 2);
    }
}
