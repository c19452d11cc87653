//! Neighborhood fingerprints of match-graph vertices.
//!
//! Every vertex gets two label strings (short: non-terminal neighbors only, long: all
//! neighbors), label histograms of its 2-hop and 3-hop neighborhoods, and a fixed traversal
//! order of its neighbors. The histograms are the main scoring signal of the subgraph
//! search; the traversal order makes its greedy tie-breaking reproducible.

use super::match_graph::MatchGraph;
use super::vocabulary::LabelVocabulary;
use std::sync::Arc;

/// Cached fingerprint of one vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSignature {
    short: String,
    short_size: usize,
    long: String,
    long_size: usize,
    two_hop: Vec<u32>,
    three_hop: Vec<u32>,
    two_hop_size: usize,
    three_hop_size: usize,
    traversal: Vec<usize>,
}

impl VertexSignature {
    /// Own label, a space, then sorted labels of neighbors that have more than one neighbor.
    pub fn short(&self) -> &str {
        &self.short
    }

    pub fn short_size(&self) -> usize {
        self.short_size
    }

    /// Own label, a space, then sorted labels of all neighbors.
    pub fn long(&self) -> &str {
        &self.long
    }

    pub fn long_size(&self) -> usize {
        self.long_size
    }

    /// Number of distinct vertices within two bonds, excluding the vertex itself.
    pub fn two_hop_size(&self) -> usize {
        self.two_hop_size
    }

    /// Number of distinct vertices within three bonds, excluding the vertex itself.
    pub fn three_hop_size(&self) -> usize {
        self.three_hop_size
    }

    pub fn two_hop(&self) -> &[u32] {
        &self.two_hop
    }

    pub fn three_hop(&self) -> &[u32] {
        &self.three_hop
    }

    /// Neighbors ordered by descending 3-hop size, then distance, then coordinates.
    pub fn traversal(&self) -> &[usize] {
        &self.traversal
    }

    /// Label overlap of the 2-hop neighborhoods: `Σ min(a_l, b_l)`.
    pub fn common_two_hop(&self, other: &VertexSignature) -> u32 {
        common(&self.two_hop, &other.two_hop)
    }

    /// Label overlap of the 3-hop neighborhoods: `Σ min(a_l, b_l)`.
    pub fn common_three_hop(&self, other: &VertexSignature) -> u32 {
        common(&self.three_hop, &other.three_hop)
    }
}

fn common(a: &[u32], b: &[u32]) -> u32 {
    a.iter().zip(b).map(|(&x, &y)| x.min(y)).sum()
}

/// Signatures of all vertices of a graph, tied to the vocabulary they were built with.
#[derive(Debug, Clone)]
pub struct GraphSignatures {
    vocabulary: Arc<LabelVocabulary>,
    vertices: Vec<VertexSignature>,
}

impl GraphSignatures {
    pub fn vocabulary(&self) -> &Arc<LabelVocabulary> {
        &self.vocabulary
    }

    pub fn vertex(&self, index: usize) -> &VertexSignature {
        &self.vertices[index]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VertexSignature> {
        self.vertices.iter()
    }

    /// Computes signatures for every vertex of `graph` using its current positions.
    pub fn compute<T>(graph: &MatchGraph<T>, vocabulary: Arc<LabelVocabulary>) -> Self {
        let n = graph.len();
        let width = vocabulary.len();
        let label_ids: Vec<Option<usize>> = graph
            .vertices()
            .iter()
            .map(|v| vocabulary.index_of(&v.label))
            .collect();

        let mut distance = vec![u8::MAX; n];
        let mut touched = Vec::new();
        let mut frontier = Vec::new();
        let mut next = Vec::new();

        let mut vertices: Vec<VertexSignature> = graph
            .vertices()
            .iter()
            .map(|vertex| {
                let (short, short_size, long, long_size) = label_strings(graph, vertex.index);

                for &idx in &touched {
                    distance[idx] = u8::MAX;
                }
                touched.clear();
                frontier.clear();

                distance[vertex.index] = 0;
                touched.push(vertex.index);
                frontier.push(vertex.index);
                for hop in 1..=3u8 {
                    next.clear();
                    for &current in &frontier {
                        for &neighbor in graph.neighbors(current) {
                            if distance[neighbor] == u8::MAX {
                                distance[neighbor] = hop;
                                touched.push(neighbor);
                                next.push(neighbor);
                            }
                        }
                    }
                    std::mem::swap(&mut frontier, &mut next);
                }

                let mut two_hop = vec![0u32; width];
                let mut three_hop = vec![0u32; width];
                let mut two_hop_size = 0;
                let mut three_hop_size = 0;
                for &idx in &touched {
                    let hop = distance[idx];
                    if hop == 0 {
                        continue;
                    }
                    three_hop_size += 1;
                    if hop <= 2 {
                        two_hop_size += 1;
                    }
                    if let Some(label) = label_ids[idx] {
                        three_hop[label] += 1;
                        if hop <= 2 {
                            two_hop[label] += 1;
                        }
                    }
                }

                VertexSignature {
                    short,
                    short_size,
                    long,
                    long_size,
                    two_hop,
                    three_hop,
                    two_hop_size,
                    three_hop_size,
                    traversal: Vec::new(),
                }
            })
            .collect();

        let positions = graph.positions();
        for index in 0..n {
            let origin = positions[index];
            let mut order = graph.neighbors(index).to_vec();
            order.sort_by(|&a, &b| {
                let (pa, pb) = (positions[a], positions[b]);
                vertices[b]
                    .three_hop_size
                    .cmp(&vertices[a].three_hop_size)
                    .then_with(|| {
                        nalgebra::distance_squared(&pa, &origin)
                            .total_cmp(&nalgebra::distance_squared(&pb, &origin))
                    })
                    .then_with(|| pa.x.total_cmp(&pb.x))
                    .then_with(|| pa.y.total_cmp(&pb.y))
                    .then_with(|| pa.z.total_cmp(&pb.z))
            });
            vertices[index].traversal = order;
        }

        Self {
            vocabulary,
            vertices,
        }
    }
}

fn label_strings<T>(graph: &MatchGraph<T>, index: usize) -> (String, usize, String, usize) {
    let own = &graph.vertex(index).label;
    let mut short: Vec<&str> = Vec::new();
    let mut long: Vec<&str> = Vec::new();
    for &neighbor in graph.neighbors(index) {
        let label = graph.vertex(neighbor).label.as_str();
        if graph.degree(neighbor) > 1 {
            short.push(label);
        }
        long.push(label);
    }
    short.sort_unstable();
    long.sort_unstable();
    (
        format!("{own} {}", short.concat()),
        short.len(),
        format!("{own} {}", long.concat()),
        long.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::match_graph::{MatchGraph, VertexSpec};
    use crate::model::types::Point;

    // Ethanol heavy-atom skeleton with hydrogens on the oxygen and one carbon:
    // C0 - C1 - O2 - H3, C0 - H4
    fn ethanol_fragment() -> MatchGraph<usize> {
        let labels = ["C", "C", "O", "H", "H"];
        let bonds = [(0, 1), (1, 2), (2, 3), (0, 4)];
        let positions = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.5, 0.0, 0.0),
            Point::new(2.0, 1.3, 0.0),
            Point::new(2.9, 1.3, 0.0),
            Point::new(-0.9, 0.3, 0.0),
        ];
        let mut builder = MatchGraph::builder("ethanol");
        for (i, label) in labels.iter().enumerate() {
            builder.add_vertex(VertexSpec::new(i, *label, "1", positions[i]));
        }
        for (a, b) in bonds {
            builder.add_edge(a, b);
        }
        builder.build().unwrap()
    }

    #[test]
    fn short_and_long_signatures_distinguish_terminal_neighbors() {
        let graph = ethanol_fragment();
        let sig = graph.signatures();

        let c0 = sig.vertex(0);
        assert_eq!(c0.long(), "C CH");
        assert_eq!(c0.long_size(), 2);
        assert_eq!(c0.short(), "C C");
        assert_eq!(c0.short_size(), 1);

        let o2 = sig.vertex(2);
        assert_eq!(o2.long(), "O CH");
        assert_eq!(o2.short(), "O C");
    }

    #[test]
    fn hop_histograms_exclude_self_and_respect_radius() {
        let graph = ethanol_fragment();
        let sig = graph.signatures();
        let vocab = sig.vocabulary();
        let h = vocab.index_of("H").unwrap();
        let o = vocab.index_of("O").unwrap();
        let c = vocab.index_of("C").unwrap();

        // From H4: C0 (1), C1 (2), O2 (3); H3 is four bonds away.
        let h4 = sig.vertex(4);
        assert_eq!(h4.two_hop_size(), 2);
        assert_eq!(h4.three_hop_size(), 3);
        assert_eq!(h4.two_hop()[c], 2);
        assert_eq!(h4.two_hop()[o], 0);
        assert_eq!(h4.three_hop()[o], 1);
        assert_eq!(h4.three_hop()[h], 0);
    }

    #[test]
    fn common_counts_take_label_minimum() {
        let graph = ethanol_fragment();
        let sig = graph.signatures();
        let c0 = sig.vertex(0);
        let c1 = sig.vertex(1);

        assert_eq!(c0.common_three_hop(c0) as usize, c0.three_hop_size());
        assert!(c0.common_three_hop(c1) <= c0.three_hop_size().min(c1.three_hop_size()) as u32);
        assert_eq!(c0.common_two_hop(c1), c1.common_two_hop(c0));
    }

    #[test]
    fn traversal_order_prefers_richer_neighborhoods() {
        let graph = ethanol_fragment();
        let sig = graph.signatures();

        // C1 sees C0 (3-hop: C1,O2,H4,H3 = 4) and O2 (3-hop: C1,H3,C0,H4 = 4); tie broken by distance.
        let order = sig.vertex(1).traversal();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], 2);
        assert_eq!(order[1], 0);

        // C0 sees C1 (richer) before the terminal hydrogen.
        assert_eq!(sig.vertex(0).traversal(), &[1, 4]);
    }
}
