//! Heuristic maximum common subgraph search.
//!
//! For every compatible pair of seed vertices the other graph is pre-aligned on a three-point
//! superposition (the seeds and two of their neighbors) and the match is grown breadth-first
//! over both graphs at once. Each pivot neighbor takes the free other neighbor with the same
//! label and the largest 3-hop overlap, then 2-hop overlap; remaining ties are resolved by a
//! bounded lookahead. The best grown match by topology score (ties: lower RMSD) wins.

use super::pairwise::PairwiseMatching;
use super::progress::Progress;
use crate::error::{Error, Result};
use crate::graph::{GraphSignatures, MatchGraph, VertexSignature};
use crate::model::types::Point;
use crate::superpose::{EigenWorkspace, OptimalTransformation};
use std::cmp::Reverse;

/// Traversal steps between two cancellation checks.
const CANCEL_INTERVAL: u64 = 1 << 16;

/// Depth of the lookahead used to break exact ties.
const LOOKAHEAD_DEPTH: usize = 6;

/// Subgraph correspondence of two connected graphs, trying both graphs as pivot.
pub(crate) fn find<T>(
    pivot: &MatchGraph<T>,
    other: &MatchGraph<T>,
    budget: u64,
    ws: &mut EigenWorkspace,
    progress: &Progress,
) -> Result<PairwiseMatching> {
    for graph in [pivot, other] {
        if !graph.is_connected() {
            return Err(Error::disconnected(graph.token()));
        }
    }

    if pivot.len() < 3 || other.len() < 3 {
        return Ok(if pivot.len() <= other.len() {
            degenerate(pivot, other)
        } else {
            degenerate(other, pivot).swap()
        });
    }

    let forward = Search::run(pivot, other, budget, ws, progress)?;
    let backward = Search::run(other, pivot, budget, ws, progress)?;
    let budget_exhausted = forward.exhausted || backward.exhausted;

    let mut matching = if forward.is_at_least_as_good_as(&backward) {
        forward.into_matching(pivot, other)
    } else {
        backward.into_matching(other, pivot).swap()
    };
    matching.budget_exhausted = budget_exhausted;
    Ok(matching)
}

/// Graphs too small for a three-point seed: match a single vertex by label.
///
/// A two-vertex graph picks the bonded pair of the bigger graph closest to it, but only the
/// first vertex is reported so no rigid fit is attempted on two points.
fn degenerate<T>(smaller: &MatchGraph<T>, bigger: &MatchGraph<T>) -> PairwiseMatching {
    let mut matching = PairwiseMatching::empty(smaller.token(), bigger.token());
    let found = match smaller.len() {
        1 => {
            let label = &smaller.vertex(0).label;
            bigger
                .vertices()
                .iter()
                .find(|v| v.label == *label)
                .map(|v| v.index)
        }
        2 => {
            let (a, b) = (smaller.vertex(0), smaller.vertex(1));
            let (pa, pb) = (smaller.position(0), smaller.position(1));
            let mut best: Option<(f64, usize)> = None;
            for v in bigger.vertices().iter().filter(|v| v.label == a.label) {
                let da = nalgebra::distance_squared(&bigger.position(v.index), &pa);
                for &w in bigger.neighbors(v.index) {
                    if bigger.vertex(w).label != b.label {
                        continue;
                    }
                    let db = nalgebra::distance_squared(&bigger.position(w), &pb);
                    let rmsd = (0.5 * (da + db)).sqrt();
                    if best.is_none_or(|(min, _)| rmsd < min) {
                        best = Some((rmsd, v.index));
                    }
                }
            }
            best.map(|(_, x)| x)
        }
        _ => None,
    };

    if let Some(x) = found {
        matching.pivot_ordering = vec![0];
        matching.other_ordering = vec![x];
    }
    matching
}

/// Best match of one directed search.
#[derive(Debug, Clone)]
struct Outcome {
    pairs: Vec<(usize, usize)>,
    score: f64,
    rmsd: f64,
    exhausted: bool,
}

impl Outcome {
    fn none() -> Self {
        Self {
            pairs: Vec::new(),
            score: f64::NEG_INFINITY,
            rmsd: f64::MAX,
            exhausted: false,
        }
    }

    /// Incumbent rule: strictly higher score, or equal score and strictly lower RMSD.
    fn offer(&mut self, pairs: &[(usize, usize)], score: f64, rmsd: f64) {
        if score > self.score || (score == self.score && rmsd < self.rmsd) {
            self.pairs.clear();
            self.pairs.extend_from_slice(pairs);
            self.score = score;
            self.rmsd = rmsd;
        }
    }

    fn is_at_least_as_good_as(&self, other: &Outcome) -> bool {
        self.score > other.score || (self.score == other.score && self.rmsd <= other.rmsd)
    }

    fn into_matching<T>(self, pivot: &MatchGraph<T>, other: &MatchGraph<T>) -> PairwiseMatching {
        if self.pairs.is_empty() {
            return PairwiseMatching::empty(pivot.token(), other.token());
        }
        let (pivot_ordering, other_ordering) = self.pairs.into_iter().unzip();
        PairwiseMatching {
            pivot_token: pivot.token().to_string(),
            other_token: other.token().to_string(),
            pivot_ordering,
            other_ordering,
            rmsd: self.rmsd,
            topology_score: self.score,
            budget_exhausted: false,
        }
    }
}

/// Seed candidates ranked by signature size.
struct Ranking {
    order: Vec<usize>,
    short: bool,
    top_size: usize,
}

impl Ranking {
    /// Orders vertices by short signature; falls back to the long signature when no vertex
    /// has two non-terminal neighbors. `None` when no vertex has two neighbors at all.
    fn build(signatures: &GraphSignatures) -> Option<Self> {
        let mut order: Vec<usize> = (0..signatures.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (signatures.vertex(a), signatures.vertex(b));
            sb.short_size()
                .cmp(&sa.short_size())
                .then_with(|| sa.short().cmp(sb.short()))
        });
        let top = signatures.vertex(*order.first()?).short_size();
        if top >= 2 {
            return Some(Self {
                order,
                short: true,
                top_size: top,
            });
        }

        order.sort_by(|&a, &b| {
            let (sa, sb) = (signatures.vertex(a), signatures.vertex(b));
            sb.long_size()
                .cmp(&sa.long_size())
                .then_with(|| sa.long().cmp(sb.long()))
        });
        let top = signatures.vertex(order[0]).long_size();
        (top >= 2).then_some(Self {
            order,
            short: false,
            top_size: top,
        })
    }

    fn size(&self, signature: &VertexSignature) -> usize {
        if self.short {
            signature.short_size()
        } else {
            signature.long_size()
        }
    }
}

/// Mutable state of one directed search: visited marks, the growing match, and the
/// working copy of the other graph's positions.
struct Search<'a, T> {
    pivot: &'a MatchGraph<T>,
    other: &'a MatchGraph<T>,
    psig: &'a GraphSignatures,
    osig: &'a GraphSignatures,
    positions: Vec<Point>,
    pivot_colored: Vec<bool>,
    other_colored: Vec<bool>,
    matched: Vec<(usize, usize)>,
    traversals: u64,
    budget: u64,
    ws: &'a mut EigenWorkspace,
    progress: &'a Progress,
    best: Outcome,
}

impl<'a, T> Search<'a, T> {
    fn run(
        pivot: &'a MatchGraph<T>,
        other: &'a MatchGraph<T>,
        budget: u64,
        ws: &'a mut EigenWorkspace,
        progress: &'a Progress,
    ) -> Result<Outcome> {
        let psig = pivot.signatures();
        let osig = other.signatures();
        let (Some(pranked), Some(oranked)) = (Ranking::build(psig), Ranking::build(osig)) else {
            return Ok(Outcome::none());
        };

        let shared_size = pranked.top_size.min(oranked.top_size);
        let mut pivot_candidates: Vec<usize> = pranked
            .order
            .iter()
            .copied()
            .take_while(|&v| pranked.size(psig.vertex(v)) >= shared_size)
            .collect();
        pivot_candidates.sort_by_key(|&v| Reverse(psig.vertex(v).three_hop_size()));
        let mut other_candidates = oranked.order;
        other_candidates.sort_by_key(|&v| Reverse(osig.vertex(v).three_hop_size()));

        let mut search = Search {
            pivot,
            other,
            psig,
            osig,
            positions: other.positions().to_vec(),
            pivot_colored: vec![false; pivot.len()],
            other_colored: vec![false; other.len()],
            matched: Vec::with_capacity(pivot.len().min(other.len())),
            traversals: 0,
            budget,
            ws,
            progress,
            best: Outcome::none(),
        };

        'seeds: for &vp in &pivot_candidates {
            for &vo in &other_candidates {
                progress.check()?;
                search.seed(vp, vo)?;
                if search.exhausted() {
                    break 'seeds;
                }
            }
        }

        let exhausted = search.exhausted();
        Ok(Outcome {
            exhausted,
            ..search.best
        })
    }

    fn exhausted(&self) -> bool {
        self.traversals > self.budget
    }

    fn ring(&self, graph: &MatchGraph<T>, index: usize) -> u32 {
        graph.vertex(index).ring_score
    }

    /// Grows matches from `(vp, vo)` for every label-compatible pairing of their neighbors.
    fn seed(&mut self, vp: usize, vo: usize) -> Result<()> {
        let (pivot, other, psig, osig) = (self.pivot, self.other, self.psig, self.osig);
        if psig.vertex(vp).long_size() < 2
            || pivot.vertex(vp).label != other.vertex(vo).label
            || pivot.vertex(vp).ring_score != other.vertex(vo).ring_score
        {
            return Ok(());
        }

        let ptrav = psig.vertex(vp).traversal();
        let otrav = osig.vertex(vo).traversal();
        for (ix, &px) in ptrav.iter().enumerate() {
            for &py in &ptrav[ix + 1..] {
                for (i, &x) in otrav.iter().enumerate() {
                    for &y in &otrav[i + 1..] {
                        if self.ring(other, x) != self.ring(other, y) {
                            continue;
                        }
                        if self.exhausted() {
                            return Ok(());
                        }

                        let (lx, ly) = (&other.vertex(x).label, &other.vertex(y).label);
                        let (lpx, lpy) = (&pivot.vertex(px).label, &pivot.vertex(py).label);
                        if lx == lpx && ly == lpy {
                            self.grow([px, py, vp], [x, y, vo])?;
                        }
                        if lx == lpy && ly == lpx {
                            self.grow([py, px, vp], [x, y, vo])?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Aligns the other graph on three point pairs, then grows and scores a full match.
    fn grow(&mut self, pivot_seed: [usize; 3], other_seed: [usize; 3]) -> Result<()> {
        let pivot_points = pivot_seed.map(|i| self.pivot.position(i));
        let other_points = other_seed.map(|i| self.other.position(i));
        let alignment = OptimalTransformation::find_with(self.ws, &pivot_points, &other_points)?;
        for (working, original) in self.positions.iter_mut().zip(self.other.positions()) {
            *working = alignment.apply(original);
        }

        let (vp, vo) = (pivot_seed[2], other_seed[2]);
        self.pivot_colored.fill(false);
        self.other_colored.fill(false);
        self.matched.clear();
        self.matched.push((vp, vo));

        self.traverse(vp, vo, usize::MAX)?;

        let rmsd = self.matched_rmsd()?;
        let score = self.topology_score();
        self.best.offer(&self.matched, score, rmsd);
        Ok(())
    }

    /// Matches the free neighbors of `(vp, vo)`, then recurses into every newly matched pair.
    fn traverse(&mut self, vp: usize, vo: usize, depth: usize) -> Result<()> {
        self.traversals += 1;
        if self.exhausted() {
            return Ok(());
        }
        if self.traversals % CANCEL_INTERVAL == 0 {
            self.progress.check()?;
        }

        self.pivot_colored[vp] = true;
        self.other_colored[vo] = true;
        let match_count = self.matched.len();
        if depth == 0 {
            return Ok(());
        }

        let (pivot, other, psig, osig) = (self.pivot, self.other, self.psig, self.osig);
        for &na in psig.vertex(vp).traversal() {
            if self.pivot_colored[na] {
                continue;
            }
            let label = &pivot.vertex(na).label;
            let na_ending = pivot.degree(na) == 1;
            let na_position = pivot.position(na);

            let mut paired: Option<usize> = None;
            let mut paired_score: Option<(f64, f64)> = None;
            let (mut count3, mut count2) = (0u32, 0u32);
            let mut min_distance = f64::MAX;

            for &nb in osig.vertex(vo).traversal() {
                if self.other_colored[nb] || other.vertex(nb).label != *label {
                    continue;
                }

                if match_count == 1 {
                    let distance = nalgebra::distance_squared(&na_position, &self.positions[nb]);
                    if distance < min_distance {
                        min_distance = distance;
                        paired = Some(nb);
                    }
                    continue;
                }

                let c3 = psig.vertex(na).common_three_hop(osig.vertex(nb));
                let c2 = psig.vertex(na).common_two_hop(osig.vertex(nb));
                let Some(current) = paired else {
                    (paired, count3, count2) = (Some(nb), c3, c2);
                    continue;
                };
                if c3 > count3 || (c3 == count3 && c2 > count2) {
                    (paired, count3, count2) = (Some(nb), c3, c2);
                    paired_score = None;
                    continue;
                }
                if c3 < count3 || c2 < count2 {
                    continue;
                }

                if na_ending && other.degree(current) == 1 && other.degree(nb) != 1 {
                    continue;
                }

                let (new_score, new_rmsd) = self.lookahead(na, nb)?;
                let (old_score, old_rmsd) = match paired_score {
                    Some(scored) => scored,
                    None => self.lookahead(na, current)?,
                };
                paired_score = Some((old_score, old_rmsd));
                if new_score > old_score || (new_score == old_score && new_rmsd <= old_rmsd) {
                    paired = Some(nb);
                    paired_score = Some((new_score, new_rmsd));
                }
            }

            if let Some(nb) = paired {
                self.matched.push((na, nb));
                self.pivot_colored[na] = true;
                self.other_colored[nb] = true;
            }
        }

        let mut k = match_count;
        while k < self.matched.len() {
            let (a, b) = self.matched[k];
            self.traverse(a, b, depth - 1)?;
            k += 1;
        }
        Ok(())
    }

    /// Score and RMSD the match would reach after pairing `na` with `nb`; state is restored.
    fn lookahead(&mut self, na: usize, nb: usize) -> Result<(f64, f64)> {
        let base = self.matched.len();
        self.matched.push((na, nb));
        self.traverse(na, nb, LOOKAHEAD_DEPTH)?;
        let score = self.topology_score();
        let rmsd = self.matched_rmsd()?;

        for &(a, b) in &self.matched[base..] {
            self.pivot_colored[a] = false;
            self.other_colored[b] = false;
        }
        self.matched.truncate(base);
        Ok((score, rmsd))
    }

    fn matched_rmsd(&mut self) -> Result<f64> {
        let pivot = self.pivot;
        let positions = &self.positions;
        OptimalTransformation::rmsd_pairs(
            self.ws,
            self.matched
                .iter()
                .map(|&(a, b)| (pivot.position(a), positions[b])),
        )
    }

    /// `Σ common3 × max(ring − nonring, 1)²` over the matched pairs.
    fn topology_score(&self) -> f64 {
        let mut score = 0u64;
        let (mut ring, mut nonring) = (0i64, 0i64);
        for &(a, b) in &self.matched {
            let (ra, rb) = (self.ring(self.pivot, a), self.ring(self.other, b));
            if ra == rb {
                ring += i64::from(ra);
            } else {
                nonring += i64::from(ra.max(rb));
            }
            score += u64::from(self.psig.vertex(a).common_three_hop(self.osig.vertex(b)));
        }
        let balance = (ring - nonring).max(1) as f64;
        score as f64 * balance * balance
    }
}
