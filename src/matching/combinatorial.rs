//! Exhaustive matching of structures built from interchangeable atom groups.
//!
//! Both graphs are organized into two-level groupings. Outer groups with the same label
//! composition may swap places, and atoms of one label inside an outer group may permute
//! among themselves; nothing else moves. Every such assignment is scored by the optimal
//! rotation RMSD of the centroid-centered coordinates and the global minimum is kept.

use super::combinatorics::{Arrangements, Chain, Permutations};
use super::pairwise::PairwiseMatching;
use super::progress::Progress;
use crate::error::{Error, Result};
use crate::graph::{MatchGraph, TwoLevelGrouping};
use crate::model::types::Point;
use crate::superpose::{EigenWorkspace, OptimalTransformation};

/// Largest number of inner permutations searched jointly; above it every label group is
/// optimized on its own.
pub const EXHAUSTIVE_INNER_LIMIT: u64 = 40_320;

const CANCEL_INTERVAL: u64 = 1 << 10;
const LARGE_SPACE: u64 = 1 << 15;
const HUGE_SPACE: u64 = 1 << 20;
const LARGE_GROUP_WIDTH: usize = 7;

/// Lowest-RMSD group-preserving correspondence; moves both graphs onto their centroids.
pub(crate) fn find<T>(
    pivot: &mut MatchGraph<T>,
    other: &mut MatchGraph<T>,
    ws: &mut EigenWorkspace,
    progress: &Progress,
) -> Result<PairwiseMatching> {
    pivot.center();
    other.center();
    let (pivot, other) = (&*pivot, &*other);

    let (pivot_grouping, other_grouping) =
        if pivot.group_grouping().is_compatible(other.group_grouping()) {
            (pivot.group_grouping(), other.group_grouping())
        } else if pivot.label_grouping().is_compatible(other.label_grouping()) {
            (pivot.label_grouping(), other.label_grouping())
        } else {
            return Err(Error::incompatible_groupings(pivot.token(), other.token()));
        };

    report_search_space(pivot, other, other_grouping, progress);

    let pivot_order = pivot_grouping.flatten();
    let pivot_points: Vec<Point> = pivot_order.iter().map(|&i| pivot.position(i)).collect();
    let canonical = other_grouping.flatten();
    let layout = Layout::new(other_grouping);

    let mut outer = Chain::new(
        other_grouping
            .tops()
            .iter()
            .map(|top| {
                Box::new(Permutations::new((0..top.bottoms.len()).collect()))
                    as Box<dyn Arrangements<usize> + Send>
            })
            .collect(),
    );

    let mut best = Best {
        rmsd: f64::INFINITY,
        ordering: canonical.clone(),
        leaves: 0,
    };
    let mut assembled = canonical.clone();

    if other_grouping.inner_permutation_count() <= EXHAUSTIVE_INNER_LIMIT {
        let mut inner = Chain::new(
            other_grouping
                .vertex_groups()
                .map(|group| {
                    Box::new(Permutations::new(group.vertices.clone()))
                        as Box<dyn Arrangements<usize> + Send>
                })
                .collect(),
        );
        outer.visit(&mut |arrangement| {
            inner.visit(&mut |permuted| {
                layout.arrange(arrangement, permuted, &mut assembled);
                let rmsd = centered_rmsd(ws, &pivot_points, other, &assembled)?;
                best.offer(rmsd, &assembled, progress)
            })
        })?;
    } else {
        outer.visit(&mut |arrangement| {
            layout.arrange(arrangement, &canonical, &mut assembled);
            for &(offset, width) in &layout.segments {
                if width > 1 {
                    optimize_block(
                        ws,
                        &pivot_points[offset..offset + width],
                        other,
                        &mut assembled[offset..offset + width],
                        progress,
                    )?;
                }
            }
            let rmsd = centered_rmsd(ws, &pivot_points, other, &assembled)?;
            best.offer(rmsd, &assembled, progress)
        })?;
    }

    Ok(PairwiseMatching {
        pivot_token: pivot.token().to_string(),
        other_token: other.token().to_string(),
        pivot_ordering: pivot_order,
        other_ordering: best.ordering,
        rmsd: best.rmsd,
        topology_score: 0.0,
        budget_exhausted: false,
    })
}

fn report_search_space<T>(
    pivot: &MatchGraph<T>,
    other: &MatchGraph<T>,
    grouping: &TwoLevelGrouping,
    progress: &Progress,
) {
    let size = grouping.size();
    if size > HUGE_SPACE {
        progress.status(&format!(
            "Superimposing '{}' and '{}'... {size} arrangements, this will take a while.",
            pivot.token(),
            other.token()
        ));
    } else if size > LARGE_SPACE {
        progress.status(&format!(
            "Superimposing '{}' and '{}'...",
            pivot.token(),
            other.token()
        ));
    }

    if let Some(group) = grouping
        .vertex_groups()
        .find(|g| g.width() > LARGE_GROUP_WIDTH)
    {
        tracing::warn!(
            label = %group.label,
            width = group.width(),
            "permuting a large group of equivalent atoms"
        );
        progress.status(&format!(
            "Superimposing a large group of {} atoms ({}!). This might take a while.",
            group.label,
            group.width()
        ));
    }
}

struct Best {
    rmsd: f64,
    ordering: Vec<usize>,
    leaves: u64,
}

impl Best {
    fn offer(&mut self, rmsd: f64, ordering: &[usize], progress: &Progress) -> Result<()> {
        if rmsd < self.rmsd {
            self.rmsd = rmsd;
            self.ordering.copy_from_slice(ordering);
        }
        self.leaves += 1;
        if self.leaves % CANCEL_INTERVAL == 0 {
            progress.check()?;
        }
        Ok(())
    }
}

/// Offsets of the outer groups and label groups inside the flattened canonical order.
struct Layout {
    bottom_offsets: Vec<Vec<usize>>,
    bottom_widths: Vec<usize>,
    segments: Vec<(usize, usize)>,
}

impl Layout {
    fn new(grouping: &TwoLevelGrouping) -> Self {
        let mut bottom_offsets = Vec::with_capacity(grouping.tops().len());
        let mut bottom_widths = Vec::with_capacity(grouping.tops().len());
        let mut segments = Vec::new();
        let mut offset = 0;
        for top in grouping.tops() {
            let mut offsets = Vec::with_capacity(top.bottoms.len());
            for bottom in &top.bottoms {
                offsets.push(offset);
                for group in &bottom.groups {
                    segments.push((offset, group.width()));
                    offset += group.width();
                }
            }
            bottom_offsets.push(offsets);
            bottom_widths.push(top.bottoms.first().map_or(0, |b| b.width));
        }
        Self {
            bottom_offsets,
            bottom_widths,
            segments,
        }
    }

    /// Writes `source` into `target` with the outer groups of every top group reordered by
    /// `arrangement`.
    fn arrange(&self, arrangement: &[usize], source: &[usize], target: &mut [usize]) {
        let mut cursor = 0;
        for (offsets, &width) in self.bottom_offsets.iter().zip(&self.bottom_widths) {
            for (slot, &dest) in offsets.iter().enumerate() {
                let src = offsets[arrangement[cursor + slot]];
                target[dest..dest + width].copy_from_slice(&source[src..src + width]);
            }
            cursor += offsets.len();
        }
    }
}

fn centered_rmsd<T>(
    ws: &mut EigenWorkspace,
    pivot_points: &[Point],
    other: &MatchGraph<T>,
    ordering: &[usize],
) -> Result<f64> {
    OptimalTransformation::rmsd_centered(
        ws,
        pivot_points
            .iter()
            .copied()
            .zip(ordering.iter().map(|&o| other.position(o))),
    )
}

/// Replaces `block` by its permutation with the lowest rotation-only RMSD against `target`.
fn optimize_block<T>(
    ws: &mut EigenWorkspace,
    target: &[Point],
    other: &MatchGraph<T>,
    block: &mut [usize],
    progress: &Progress,
) -> Result<()> {
    let mut best_rmsd = f64::INFINITY;
    let mut chosen = block.to_vec();
    let mut visited = 0u64;
    Permutations::new(block.to_vec()).visit(&mut |perm| {
        visited += 1;
        if visited % CANCEL_INTERVAL == 0 {
            progress.check()?;
        }
        let rmsd = centered_rmsd(ws, target, other, perm)?;
        if rmsd < best_rmsd {
            best_rmsd = rmsd;
            chosen.copy_from_slice(perm);
        }
        Ok(())
    })?;
    block.copy_from_slice(&chosen);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexSpec;
    use nalgebra::{UnitQuaternion, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Atom {
        label: &'static str,
        group: &'static str,
        pos: Point,
        payload: usize,
    }

    fn graph(token: &str, atoms: &[Atom]) -> MatchGraph<usize> {
        let mut builder = MatchGraph::builder(token);
        for atom in atoms {
            builder.add_vertex(VertexSpec::new(atom.payload, atom.label, atom.group, atom.pos));
        }
        builder.build().unwrap()
    }

    fn random_point(rng: &mut StdRng) -> Point {
        Point::new(
            rng.random_range(-3.0..3.0),
            rng.random_range(-3.0..3.0),
            rng.random_range(-3.0..3.0),
        )
    }

    /// Pivot atoms plus a rigidly moved copy listed in `order`.
    fn pair(
        spec: &[(&'static str, &'static str)],
        other_groups: &[&'static str],
        order: &[usize],
        seed: u64,
    ) -> (MatchGraph<usize>, MatchGraph<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let points: Vec<Point> = spec.iter().map(|_| random_point(&mut rng)).collect();
        let rotation = UnitQuaternion::from_euler_angles(0.4, 1.2, -0.7);
        let shift = Vector3::new(5.0, -1.0, 2.0);

        let pivot: Vec<Atom> = spec
            .iter()
            .enumerate()
            .map(|(i, &(label, group))| Atom {
                label,
                group,
                pos: points[i],
                payload: i,
            })
            .collect();
        let other: Vec<Atom> = order
            .iter()
            .zip(other_groups)
            .map(|(&i, &group)| Atom {
                label: spec[i].0,
                group,
                pos: rotation * points[i] + shift,
                payload: i,
            })
            .collect();
        (graph("pivot", &pivot), graph("other", &other))
    }

    fn run(pivot: &mut MatchGraph<usize>, other: &mut MatchGraph<usize>) -> Result<PairwiseMatching> {
        find(pivot, other, &mut EigenWorkspace::new(), &Progress::silent())
    }

    fn assert_payloads_agree(m: &PairwiseMatching, pivot: &MatchGraph<usize>, other: &MatchGraph<usize>) {
        for (p, o) in m.pairs() {
            assert_eq!(pivot.vertex(p).payload, other.vertex(o).payload);
        }
    }

    #[test]
    fn graph_matched_against_itself_is_identity() {
        let spec = [("O", "1"), ("H", "1"), ("H", "1"), ("O", "2"), ("H", "2"), ("H", "2")];
        let (mut pivot, _) = pair(&spec, &["1"; 6], &[0, 1, 2, 3, 4, 5], 1);
        let mut copy = pivot.clone();

        let m = run(&mut pivot, &mut copy).unwrap();

        assert_eq!(m.size(), 6);
        assert!(m.rmsd < 1e-5);
        assert_eq!(m.pivot_ordering, m.other_ordering);
    }

    #[test]
    fn exchangeable_residues_may_swap() {
        let spec = [("O", "1"), ("H", "1"), ("H", "1"), ("O", "2"), ("H", "2"), ("H", "2")];
        // The copy lists the second residue first, hydrogens reversed, under swapped numbers.
        let (mut pivot, mut other) = pair(
            &spec,
            &["1", "1", "1", "2", "2", "2"],
            &[5, 3, 4, 2, 1, 0],
            2,
        );

        let m = run(&mut pivot, &mut other).unwrap();

        assert_eq!(m.size(), 6);
        assert!(m.rmsd < 1e-5);
        assert_payloads_agree(&m, &pivot, &other);
    }

    #[test]
    fn matches_brute_force_minimum() {
        let spec = [("C", "1"), ("C", "1"), ("C", "1"), ("O", "1"), ("O", "1"), ("O", "1")];
        let (mut pivot, mut other) = pair(&spec, &["1"; 6], &[2, 0, 1, 4, 5, 3], 3);
        let mut rng = StdRng::seed_from_u64(4);
        let noisy: Vec<Point> = other
            .positions()
            .iter()
            .map(|p| p + Vector3::new(rng.random_range(-0.3..0.3), rng.random_range(-0.3..0.3), 0.1))
            .collect();
        let mut builder = MatchGraph::builder("noisy");
        for (i, v) in other.vertices().iter().enumerate() {
            builder.add_vertex(VertexSpec::new(v.payload, v.label.clone(), "1", noisy[i]));
        }
        other = builder.build().unwrap();

        let mut ws = EigenWorkspace::new();
        let mut brute = f64::INFINITY;
        let carbons: Vec<usize> = (0..6).filter(|&i| other.vertex(i).label == "C").collect();
        let oxygens: Vec<usize> = (0..6).filter(|&i| other.vertex(i).label == "O").collect();
        let mut carbon_perms = Permutations::new(carbons);
        carbon_perms
            .visit(&mut |cs| {
                let mut oxygen_perms = Permutations::new(oxygens.clone());
                oxygen_perms.visit(&mut |os| {
                    let ordering: Vec<usize> = cs.iter().chain(os).copied().collect();
                    let rmsd = OptimalTransformation::rmsd_pairs(
                        &mut ws,
                        (0..6).map(|i| (pivot.position(i), other.position(ordering[i]))),
                    )?;
                    brute = brute.min(rmsd);
                    Ok(())
                })
            })
            .unwrap();

        let m = run(&mut pivot, &mut other).unwrap();

        assert_eq!(m.size(), 6);
        assert!((m.rmsd - brute).abs() < 1e-9);
    }

    #[test]
    fn label_grouping_is_used_when_residues_differ() {
        let spec = [("N", "1"), ("C", "1"), ("C", "1"), ("O", "1")];
        let (mut pivot, mut other) = pair(&spec, &["7", "7", "8", "8"], &[2, 0, 1, 3], 5);

        let m = run(&mut pivot, &mut other).unwrap();

        assert!(m.rmsd < 1e-5);
        assert_payloads_agree(&m, &pivot, &other);
    }

    #[test]
    fn incompatible_compositions_are_rejected() {
        let spec = [("N", "1"), ("C", "1"), ("C", "1")];
        let (mut pivot, _) = pair(&spec, &["1"; 3], &[0, 1, 2], 6);
        let mut other = graph(
            "other",
            &[
                Atom { label: "N", group: "1", pos: Point::origin(), payload: 0 },
                Atom { label: "N", group: "1", pos: Point::new(1.0, 0.0, 0.0), payload: 1 },
                Atom { label: "C", group: "1", pos: Point::new(0.0, 1.0, 0.0), payload: 2 },
            ],
        );

        let err = run(&mut pivot, &mut other).unwrap_err();
        assert!(matches!(err, Error::IncompatibleGroupings { .. }));
    }

    #[test]
    fn large_groups_fall_back_to_blockwise_search() {
        let mut spec = vec![("C", "1"), ("C", "1")];
        spec.extend(std::iter::repeat_n(("H", "1"), 8));
        let order = [1, 0, 9, 8, 7, 6, 5, 4, 3, 2];
        let (mut pivot, mut other) = pair(&spec, &["1"; 10], &order, 7);
        assert!(pivot.group_grouping().inner_permutation_count() > EXHAUSTIVE_INNER_LIMIT);

        let m = run(&mut pivot, &mut other).unwrap();

        assert_eq!(m.size(), 10);
        assert!(m.rmsd < 1e-5);
        assert_payloads_agree(&m, &pivot, &other);
    }

    #[test]
    fn cancellation_interrupts_long_searches() {
        let mut spec = vec![("C", "1")];
        spec.extend(std::iter::repeat_n(("H", "1"), 7));
        let (mut pivot, mut other) = pair(&spec, &["1"; 8], &[0, 1, 2, 3, 4, 5, 6, 7], 8);
        let progress = Progress::silent();
        progress.token().cancel();

        let err = find(&mut pivot, &mut other, &mut EigenWorkspace::new(), &progress).unwrap_err();
        assert!(err.is_cancelled());
    }
}
