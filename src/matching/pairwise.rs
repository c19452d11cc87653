//! Correspondence between the vertices of two match graphs.

use super::config::{DEFAULT_TRAVERSAL_BUDGET, MatchMethod};
use super::progress::Progress;
use super::{combinatorial, subgraph};
use crate::error::Result;
use crate::graph::{LabelVocabulary, MatchGraph};
use crate::superpose::{EigenWorkspace, OptimalTransformation};
use serde::Serialize;
use std::sync::Arc;

/// Matched vertex pairs of a pivot and an other graph.
///
/// `pivot_ordering[i]` corresponds to `other_ordering[i]`; both hold vertex indices of their
/// respective graphs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseMatching {
    pub pivot_token: String,
    pub other_token: String,
    pub pivot_ordering: Vec<usize>,
    pub other_ordering: Vec<usize>,
    /// Optimal superposition RMSD of the matched pairs.
    pub rmsd: f64,
    /// Neighborhood agreement of the matched pairs; zero for the combinatorial method.
    pub topology_score: f64,
    /// The subgraph search stopped at its traversal budget; the result may be suboptimal.
    pub budget_exhausted: bool,
}

impl PairwiseMatching {
    /// A matching without pairs.
    pub fn empty(pivot_token: &str, other_token: &str) -> Self {
        Self {
            pivot_token: pivot_token.to_string(),
            other_token: other_token.to_string(),
            pivot_ordering: Vec::new(),
            other_ordering: Vec::new(),
            rmsd: 0.0,
            topology_score: 0.0,
            budget_exhausted: false,
        }
    }

    /// Matches every vertex of `graph` with itself.
    pub fn identity<T>(graph: &MatchGraph<T>) -> Self {
        let ordering: Vec<usize> = (0..graph.len()).collect();
        Self {
            pivot_token: graph.token().to_string(),
            other_token: graph.token().to_string(),
            pivot_ordering: ordering.clone(),
            other_ordering: ordering,
            rmsd: 0.0,
            topology_score: 0.0,
            budget_exhausted: false,
        }
    }

    /// Number of matched pairs.
    pub fn size(&self) -> usize {
        self.pivot_ordering.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivot_ordering.is_empty()
    }

    /// Exchanges the roles of pivot and other.
    pub fn swap(self) -> Self {
        Self {
            pivot_token: self.other_token,
            other_token: self.pivot_token,
            pivot_ordering: self.other_ordering,
            other_ordering: self.pivot_ordering,
            ..self
        }
    }

    /// `(pivot vertex, other vertex)` pairs in match order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + Clone + '_ {
        self.pivot_ordering
            .iter()
            .copied()
            .zip(self.other_ordering.iter().copied())
    }

    /// Finds the correspondence and superimposes `other` onto `pivot`.
    ///
    /// The combinatorial method also moves `pivot` onto its centroid.
    ///
    /// # Errors
    ///
    /// Fails for disconnected graphs (subgraph method), incompatible groupings
    /// (combinatorial method), or on cancellation.
    pub fn find<T>(
        pivot: &mut MatchGraph<T>,
        other: &mut MatchGraph<T>,
        method: MatchMethod,
        progress: &Progress,
    ) -> Result<Self> {
        let mut ws = EigenWorkspace::new();
        let matching =
            Self::find_with(pivot, other, method, DEFAULT_TRAVERSAL_BUDGET, &mut ws, progress)?;
        if !matching.is_empty() {
            matching.superimpose(pivot, other, &mut ws)?;
        }
        Ok(matching)
    }

    /// Finds the correspondence without superimposing, reusing `ws`.
    pub fn find_with<T>(
        pivot: &mut MatchGraph<T>,
        other: &mut MatchGraph<T>,
        method: MatchMethod,
        traversal_budget: u64,
        ws: &mut EigenWorkspace,
        progress: &Progress,
    ) -> Result<Self> {
        if !pivot.shares_vocabulary(other) {
            let vocabulary = Arc::new(LabelVocabulary::from_labels(
                pivot.labels().chain(other.labels()),
            ));
            pivot.prepare_signatures(&vocabulary);
            other.prepare_signatures(&vocabulary);
        }

        let matching = match method {
            MatchMethod::Subgraph => subgraph::find(pivot, other, traversal_budget, ws, progress)?,
            MatchMethod::Combinatorial => combinatorial::find(pivot, other, ws, progress)?,
        };

        tracing::debug!(
            pivot = %matching.pivot_token,
            other = %matching.other_token,
            size = matching.size(),
            rmsd = matching.rmsd,
            budget_exhausted = matching.budget_exhausted,
            "pairwise matching finished"
        );
        if matching.budget_exhausted {
            tracing::warn!(
                "traversal budget exhausted while matching '{}' and '{}'; keeping the best match found",
                matching.pivot_token,
                matching.other_token
            );
        }
        Ok(matching)
    }

    /// Transformation superimposing the matched vertices of `other` onto those of `pivot`.
    pub fn transformation<T>(
        &self,
        pivot: &MatchGraph<T>,
        other: &MatchGraph<T>,
        ws: &mut EigenWorkspace,
    ) -> Result<OptimalTransformation> {
        OptimalTransformation::find_pairs(
            ws,
            self.pairs()
                .map(|(p, o)| (pivot.position(p), other.position(o))),
        )
    }

    /// Moves `other` onto `pivot` and returns the applied transformation.
    pub fn superimpose<T>(
        &self,
        pivot: &MatchGraph<T>,
        other: &mut MatchGraph<T>,
        ws: &mut EigenWorkspace,
    ) -> Result<OptimalTransformation> {
        let transformation = self.transformation(pivot, other, ws)?;
        other.transform(&transformation);
        Ok(transformation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexSpec;
    use crate::model::types::Point;
    use nalgebra::{UnitQuaternion, Vector3};

    fn triangle(token: &str, offset: Vector3<f64>) -> MatchGraph<usize> {
        let rotation = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9);
        let points = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.4, 0.0, 0.0),
            Point::new(0.3, 1.2, 0.0),
            Point::new(2.1, 1.1, 0.4),
        ];
        let labels = ["C", "N", "O", "C"];
        let mut builder = MatchGraph::builder(token);
        for (i, (p, label)) in points.iter().zip(labels).enumerate() {
            builder.add_vertex(VertexSpec::new(i, label, "1", rotation * p + offset));
        }
        builder.add_edge(0, 1);
        builder.add_edge(0, 2);
        builder.add_edge(1, 3);
        builder.build().unwrap()
    }

    #[test]
    fn identity_pairs_every_vertex() {
        let g = triangle("t", Vector3::zeros());
        let m = PairwiseMatching::identity(&g);
        assert_eq!(m.size(), 4);
        assert!(m.pairs().all(|(a, b)| a == b));
        assert_eq!(m.rmsd, 0.0);
    }

    #[test]
    fn swap_exchanges_roles() {
        let m = PairwiseMatching {
            pivot_ordering: vec![0, 1],
            other_ordering: vec![5, 4],
            ..PairwiseMatching::empty("a", "b")
        };
        let swapped = m.swap();
        assert_eq!(swapped.pivot_token, "b");
        assert_eq!(swapped.pivot_ordering, vec![5, 4]);
        assert_eq!(swapped.other_ordering, vec![0, 1]);
    }

    #[test]
    fn find_superimposes_other_onto_pivot() {
        let mut pivot = triangle("pivot", Vector3::zeros());
        let mut other = triangle("other", Vector3::new(4.0, -2.0, 7.5));

        let m = PairwiseMatching::find(
            &mut pivot,
            &mut other,
            MatchMethod::Subgraph,
            &Progress::silent(),
        )
        .unwrap();

        assert_eq!(m.size(), 4);
        assert!(m.rmsd < 1e-5);
        for (p, o) in m.pairs() {
            assert!((pivot.position(p) - other.position(o)).norm() < 1e-6);
        }
    }
}
