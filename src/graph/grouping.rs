//! Two-level symmetry groupings used by the combinatorial matcher.
//!
//! Vertices are grouped by an outer key (residue or label), then by label inside each outer
//! group. Outer groups with identical label composition are interchangeable and collected
//! under one top group; vertices of one label inside an outer group are interchangeable
//! among themselves.

use super::match_graph::Vertex;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};

/// Vertices of a single label inside one outer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexGroup {
    pub label: SmolStr,
    pub vertices: Vec<usize>,
}

impl VertexGroup {
    pub fn width(&self) -> usize {
        self.vertices.len()
    }
}

/// One outer group, split into label groups sorted by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottomGroup {
    pub key: SmolStr,
    /// Concatenated `label + width` of the contained vertex groups, e.g. `C6H5N1`.
    pub signature: String,
    pub groups: Vec<VertexGroup>,
    pub width: usize,
}

/// Interchangeable outer groups sharing one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopGroup {
    pub signature: String,
    pub bottoms: Vec<BottomGroup>,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoLevelGrouping {
    tops: Vec<TopGroup>,
    width: usize,
}

impl TwoLevelGrouping {
    /// Groups `vertices` by `outer` key, then by label.
    ///
    /// Outer groups keep first-appearance order inside a top group; top groups are sorted
    /// by signature.
    pub fn build<T, F>(vertices: &[Vertex<T>], outer: F) -> Self
    where
        F: Fn(&Vertex<T>) -> SmolStr,
    {
        let mut outer_index: HashMap<SmolStr, usize> = HashMap::new();
        let mut outer_groups: Vec<(SmolStr, Vec<usize>)> = Vec::new();
        for vertex in vertices {
            let key = outer(vertex);
            let slot = *outer_index.entry(key.clone()).or_insert_with(|| {
                outer_groups.push((key, Vec::new()));
                outer_groups.len() - 1
            });
            outer_groups[slot].1.push(vertex.index);
        }

        let mut top_index: HashMap<String, usize> = HashMap::new();
        let mut tops: Vec<TopGroup> = Vec::new();
        for (key, members) in outer_groups {
            let mut by_label: BTreeMap<SmolStr, Vec<usize>> = BTreeMap::new();
            for idx in members {
                by_label
                    .entry(vertices[idx].label.clone())
                    .or_default()
                    .push(idx);
            }
            let groups: Vec<VertexGroup> = by_label
                .into_iter()
                .map(|(label, vertices)| VertexGroup { label, vertices })
                .collect();
            let signature: String = groups
                .iter()
                .map(|g| format!("{}{}", g.label, g.width()))
                .collect();
            let width = groups.iter().map(VertexGroup::width).sum();

            let bottom = BottomGroup {
                key,
                signature: signature.clone(),
                groups,
                width,
            };
            let slot = *top_index.entry(signature.clone()).or_insert_with(|| {
                tops.push(TopGroup {
                    signature,
                    bottoms: Vec::new(),
                    width: 0,
                });
                tops.len() - 1
            });
            tops[slot].width += bottom.width;
            tops[slot].bottoms.push(bottom);
        }

        tops.sort_by(|a, b| a.signature.cmp(&b.signature));
        let width = tops.iter().map(|t| t.width).sum();
        Self { tops, width }
    }

    pub fn tops(&self) -> &[TopGroup] {
        &self.tops
    }

    /// Total number of vertices covered.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Two groupings are compatible when their top groups agree in signature and size.
    pub fn is_compatible(&self, other: &TwoLevelGrouping) -> bool {
        self.tops.len() == other.tops.len()
            && self
                .tops
                .iter()
                .zip(&other.tops)
                .all(|(a, b)| a.signature == b.signature && a.bottoms.len() == b.bottoms.len())
    }

    /// Number of outer-group arrangements: `Π (bottoms per top)!`, saturating.
    pub fn arrangement_count(&self) -> u64 {
        self.tops
            .iter()
            .fold(1u64, |acc, top| acc.saturating_mul(factorial(top.bottoms.len())))
    }

    /// Number of vertex arrangements inside a fixed outer arrangement: `Π width!`, saturating.
    pub fn inner_permutation_count(&self) -> u64 {
        self.vertex_groups()
            .fold(1u64, |acc, group| acc.saturating_mul(factorial(group.width())))
    }

    /// Full search-space size of the combinatorial matcher, saturating.
    pub fn size(&self) -> u64 {
        self.arrangement_count()
            .saturating_mul(self.inner_permutation_count())
    }

    /// Vertex groups in flattened order.
    pub fn vertex_groups(&self) -> impl Iterator<Item = &VertexGroup> {
        self.tops
            .iter()
            .flat_map(|t| t.bottoms.iter())
            .flat_map(|b| b.groups.iter())
    }

    /// Vertex indices in flattened order: tops, then bottoms, then label groups.
    pub fn flatten(&self) -> Vec<usize> {
        self.vertex_groups()
            .flat_map(|g| g.vertices.iter().copied())
            .collect()
    }
}

/// `n!`, saturating at `u64::MAX`.
pub fn factorial(n: usize) -> u64 {
    (2..=n as u64).fold(1u64, |acc, k| acc.saturating_mul(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::match_graph::{MatchGraph, VertexSpec};
    use crate::model::types::Point;

    // Two identical water-like residues plus one methane-like residue.
    fn graph(groups: &[(&str, &str)]) -> MatchGraph<usize> {
        let mut builder = MatchGraph::builder("g");
        for (i, (label, group)) in groups.iter().enumerate() {
            builder.add_vertex(VertexSpec::new(i, *label, *group, Point::new(i as f64, 0.0, 0.0)));
        }
        builder.build().unwrap()
    }

    fn sample() -> MatchGraph<usize> {
        graph(&[
            ("O", "1"),
            ("H", "1"),
            ("H", "1"),
            ("C", "2"),
            ("H", "2"),
            ("H", "2"),
            ("H", "2"),
            ("H", "2"),
            ("H", "3"),
            ("O", "3"),
            ("H", "3"),
        ])
    }

    #[test]
    fn factorial_saturates() {
        assert_eq!(factorial(0), 1);
        assert_eq!(factorial(5), 120);
        assert_eq!(factorial(40), u64::MAX);
    }

    #[test]
    fn group_level_grouping_collects_identical_residues() {
        let g = sample();
        let grouping = g.group_grouping();

        assert_eq!(grouping.width(), 11);
        assert_eq!(grouping.tops().len(), 2);

        let signatures: Vec<&str> = grouping.tops().iter().map(|t| t.signature.as_str()).collect();
        assert_eq!(signatures, vec!["C1H4", "H2O1"]);

        let water = &grouping.tops()[1];
        assert_eq!(water.bottoms.len(), 2);
        assert_eq!(water.bottoms[0].key, "1");
        assert_eq!(water.bottoms[1].key, "3");
        assert_eq!(water.bottoms[1].groups[0].vertices, vec![8, 10]);
    }

    #[test]
    fn sizes_multiply_outer_and_inner_permutations() {
        let g = sample();
        let grouping = g.group_grouping();

        assert_eq!(grouping.arrangement_count(), 2);
        // 4! for methane hydrogens, 2! for each water.
        assert_eq!(grouping.inner_permutation_count(), 24 * 2 * 2);
        assert_eq!(grouping.size(), 2 * 96);
    }

    #[test]
    fn flatten_follows_group_order() {
        let g = sample();
        let flat = g.group_grouping().flatten();
        assert_eq!(flat, vec![3, 4, 5, 6, 7, 1, 2, 0, 8, 10, 9]);
    }

    #[test]
    fn label_grouping_has_one_bottom_per_label() {
        let g = sample();
        let grouping = g.label_grouping();

        assert_eq!(grouping.tops().len(), 3);
        assert!(grouping.tops().iter().all(|t| t.bottoms.len() == 1));
        assert_eq!(grouping.arrangement_count(), 1);
    }

    #[test]
    fn compatibility_requires_matching_signatures() {
        let a = sample();
        let b = graph(&[
            ("H", "7"),
            ("O", "7"),
            ("H", "7"),
            ("H", "8"),
            ("H", "8"),
            ("O", "8"),
            ("H", "9"),
            ("C", "9"),
            ("H", "9"),
            ("H", "9"),
            ("H", "9"),
        ]);
        let c = graph(&[("O", "1"), ("H", "1"), ("H", "2"), ("C", "2")]);

        assert!(a.group_grouping().is_compatible(b.group_grouping()));
        assert!(!a.group_grouping().is_compatible(c.group_grouping()));
        assert!(!a.label_grouping().is_compatible(c.label_grouping()));
    }
}
