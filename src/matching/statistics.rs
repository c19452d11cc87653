//! Summary of how far each structure deviates from the pivot.

use super::config::PivotType;
use super::pairwise::PairwiseMatching;
use serde::Serialize;
use std::fmt;

/// Below this standard deviation every matched structure lands in [`SigmaGroup::Zero`].
const SIGMA_EPSILON: f64 = 1e-7;

/// Distance of a structure's RMSD from the mean, in whole standard deviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigmaGroup {
    Zero,
    One,
    Two,
    Three,
    /// The structure shares no matched atom with the pivot.
    Invalid,
}

impl SigmaGroup {
    fn classify(rmsd: f64, average: f64, sigma: f64) -> Self {
        if sigma < SIGMA_EPSILON {
            return Self::Zero;
        }
        let diff = rmsd - average;
        if diff < sigma {
            Self::Zero
        } else if diff < 2.0 * sigma {
            Self::One
        } else if diff < 3.0 * sigma {
            Self::Two
        } else {
            Self::Three
        }
    }

    /// Numeric group, `1000` for [`SigmaGroup::Invalid`].
    pub fn index(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Invalid => 1000,
        }
    }
}

impl fmt::Display for SigmaGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("-"),
            group => write!(f, "{}σ", group.index()),
        }
    }
}

/// Per-structure row of [`MatchingStatistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureStatistics {
    pub token: String,
    pub matched: usize,
    /// RMSD to the pivot or consensus; zero for unmatched structures.
    pub rmsd: f64,
    pub sigma_group: SigmaGroup,
    pub cluster: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingStatistics {
    pub average_rmsd: f64,
    pub sigma: f64,
    pub cluster_count: usize,
    pub rows: Vec<StructureStatistics>,
}

impl MatchingStatistics {
    /// Summarizes the rows of a multiple matching.
    ///
    /// `matchings[0]` is the pivot row; it is left out of the mean in
    /// [`PivotType::SpecificStructure`] mode where its RMSD is zero by construction.
    pub fn compute(
        matchings: &[PairwiseMatching],
        rmsd_to_pivot: &[f64],
        clusters: &[Vec<usize>],
        pivot_type: PivotType,
    ) -> Self {
        let rmsd_of = |row: usize| {
            if matchings[row].size() > 0 {
                rmsd_to_pivot.get(row).copied().unwrap_or(0.0)
            } else {
                0.0
            }
        };

        let mut relevant: Vec<f64> = (0..matchings.len())
            .filter(|&row| matchings[row].size() > 0)
            .filter(|&row| !(pivot_type == PivotType::SpecificStructure && row == 0))
            .map(rmsd_of)
            .collect();
        if relevant.is_empty() {
            relevant.push(0.0);
        }

        let n = relevant.len() as f64;
        let average_rmsd = relevant.iter().sum::<f64>() / n;
        let mean_square = relevant.iter().map(|x| x * x).sum::<f64>() / n;
        let sigma = (mean_square - average_rmsd * average_rmsd).max(0.0).sqrt();

        let mut cluster_of = vec![0; matchings.len()];
        for (c, members) in clusters.iter().enumerate() {
            for &row in members {
                if let Some(slot) = cluster_of.get_mut(row) {
                    *slot = c;
                }
            }
        }

        let rows = matchings
            .iter()
            .enumerate()
            .map(|(row, matching)| {
                let rmsd = rmsd_of(row);
                let sigma_group = if matching.size() > 0 {
                    SigmaGroup::classify(rmsd, average_rmsd, sigma)
                } else {
                    SigmaGroup::Invalid
                };
                StructureStatistics {
                    token: matching.other_token.clone(),
                    matched: matching.size(),
                    rmsd,
                    sigma_group,
                    cluster: cluster_of[row],
                }
            })
            .collect();

        Self {
            average_rmsd,
            sigma,
            cluster_count: clusters.len().max(1),
            rows,
        }
    }

    pub fn row(&self, row: usize) -> Option<&StructureStatistics> {
        self.rows.get(row)
    }
}

impl fmt::Display for MatchingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Avg. Rmsd = {:.3}, Sigma = {:.3}",
            self.average_rmsd, self.sigma
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(token: &str, size: usize) -> PairwiseMatching {
        PairwiseMatching {
            pivot_ordering: (0..size).collect(),
            other_ordering: (0..size).collect(),
            ..PairwiseMatching::empty("pivot", token)
        }
    }

    #[test]
    fn sigma_groups_follow_thresholds() {
        assert_eq!(SigmaGroup::classify(1.0, 1.0, 0.0), SigmaGroup::Zero);
        assert_eq!(SigmaGroup::classify(0.5, 1.0, 0.2), SigmaGroup::Zero);
        assert_eq!(SigmaGroup::classify(1.25, 1.0, 0.2), SigmaGroup::One);
        assert_eq!(SigmaGroup::classify(1.5, 1.0, 0.2), SigmaGroup::Two);
        assert_eq!(SigmaGroup::classify(1.7, 1.0, 0.2), SigmaGroup::Three);
        assert_eq!(SigmaGroup::Invalid.index(), 1000);
    }

    #[test]
    fn specific_mode_excludes_pivot_row() {
        let matchings = vec![row("pivot", 4), row("a", 4), row("b", 4)];
        let stats = MatchingStatistics::compute(
            &matchings,
            &[0.0, 1.0, 3.0],
            &[vec![0, 1, 2]],
            PivotType::SpecificStructure,
        );
        assert!((stats.average_rmsd - 2.0).abs() < 1e-12);
        assert!((stats.sigma - 1.0).abs() < 1e-12);
        assert_eq!(stats.to_string(), "Avg. Rmsd = 2.000, Sigma = 1.000");
    }

    #[test]
    fn unmatched_rows_are_invalid_and_ignored() {
        let matchings = vec![row("pivot", 4), row("a", 4), row("b", 0)];
        let stats = MatchingStatistics::compute(
            &matchings,
            &[0.0, 0.5, 9.0],
            &[vec![0, 2], vec![1]],
            PivotType::SpecificStructure,
        );
        assert_eq!(stats.average_rmsd, 0.5);
        assert_eq!(stats.sigma, 0.0);
        assert_eq!(stats.rows[2].sigma_group, SigmaGroup::Invalid);
        assert_eq!(stats.rows[2].rmsd, 0.0);
        assert_eq!(stats.rows[1].cluster, 1);
        assert_eq!(stats.rows[2].cluster, 0);
        assert_eq!(stats.cluster_count, 2);
    }

    #[test]
    fn empty_input_yields_zero_summary() {
        let stats =
            MatchingStatistics::compute(&[row("pivot", 0)], &[0.0], &[], PivotType::Average);
        assert_eq!(stats.average_rmsd, 0.0);
        assert_eq!(stats.sigma, 0.0);
        assert_eq!(stats.rows[0].sigma_group, SigmaGroup::Invalid);
    }
}
