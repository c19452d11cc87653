//! Matching and superposition of many structures against one pivot.
//!
//! Every structure is matched to the pivot in parallel. The pivot vertices matched in all of
//! them form the rows of the average matrix, which are refined into a consensus structure by
//! repeated superposition onto their mean. The pairwise RMSD matrix, clustering and
//! statistics are derived from the aligned rows.

use super::clustering;
use super::combinatorics::{Arrangements, Combinations};
use super::config::{MatchConfig, MatchMethod, PivotType};
use super::pairwise::PairwiseMatching;
use super::progress::Progress;
use super::statistics::{MatchingStatistics, SigmaGroup};
use crate::error::{Error, Result};
use crate::graph::{LabelVocabulary, MatchGraph};
use crate::model::structure::Structure;
use crate::model::types::{Point, Vector};
use crate::superpose::{EigenWorkspace, OptimalTransformation};
use crate::utils::parallel::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Maximum number of consensus refinement rounds after the initial superposition.
const MAX_CONSENSUS_ITERATIONS: usize = 10;

/// Refinement stops once a round improves the mean RMSD by less than 5%.
const CONVERGENCE_RATIO: f64 = 0.95;

/// Mean RMSD treated as a perfect fit.
const PERFECT_FIT: f64 = 1e-12;

/// Pairs between cancellation checks while filling the pairwise matrix.
const MATRIX_CHECK_INTERVAL: usize = 100;

/// Per-worker state reused across the pairwise matches of one pool thread.
struct WorkerContext<T> {
    pivot: MatchGraph<T>,
    workspace: EigenWorkspace,
}

/// Outcome of iterating the average matrix to a consensus.
struct Consensus {
    average: Vec<Point>,
    rows: Vec<Vec<Point>>,
    rmsd: Vec<f64>,
    iterations: usize,
}

/// Result of superimposing a set of structures onto a common pivot.
#[derive(Debug, Clone)]
pub struct MultipleMatching<T> {
    pivot_index: usize,
    pivot_token: String,
    pivot_type: PivotType,
    method: MatchMethod,
    /// Row 0 is the identity match of the pivot, then every matched structure in input order.
    matchings: Vec<PairwiseMatching>,
    /// Graph index of each row.
    row_graphs: Vec<usize>,
    graphs: Vec<MatchGraph<T>>,
    average_indices: Vec<usize>,
    average_matrix: Vec<Vec<usize>>,
    aligned: Vec<Vec<Point>>,
    final_average: Vec<Point>,
    consensus_iterations: usize,
    pairwise_matrix: Option<Vec<Vec<f64>>>,
    clusters: Vec<Vec<usize>>,
    statistics: MatchingStatistics,
}

impl<T: Clone + Send + Sync> MultipleMatching<T> {
    /// Matches every graph against `graphs[config.pivot_index]` and builds the consensus.
    ///
    /// After return the owned graphs are superimposed onto the pivot.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPivot`] when the pivot index is out of range.
    /// - The first pairwise failure in input order, e.g. [`Error::DisconnectedGraph`].
    /// - [`Error::NoGlobalMatch`] in [`PivotType::Average`] mode when no pivot vertex is
    ///   matched in every structure.
    /// - [`Error::Cancelled`] when the progress token is raised.
    pub fn find(
        mut graphs: Vec<MatchGraph<T>>,
        config: &MatchConfig,
        progress: &Progress,
    ) -> Result<Self> {
        let pivot_index = config.pivot_index;
        if pivot_index >= graphs.len() {
            return Err(Error::InvalidPivot {
                index: pivot_index,
                count: graphs.len(),
            });
        }

        let vocabulary = Arc::new(LabelVocabulary::from_labels(
            graphs.iter().flat_map(|g| g.labels()),
        ));
        for graph in graphs.iter_mut() {
            graph.prepare_signatures(&vocabulary);
        }
        let template = graphs[pivot_index].clone();

        tracing::info!(
            structures = graphs.len(),
            pivot = %template.token(),
            method = ?config.method,
            pivot_type = ?config.pivot_type,
            "matching structures"
        );
        progress.status("Superimposing to pivot...");
        progress.update(0, graphs.len());

        let results = match_all(&mut graphs, &template, config, progress)?;

        let mut matchings = vec![PairwiseMatching::identity(&template)];
        let mut row_graphs = vec![pivot_index];
        for (index, result) in results.into_iter().enumerate() {
            if let Some(matching) = result? {
                matchings.push(matching);
                row_graphs.push(index);
            }
        }
        progress.check()?;

        let mut ws = EigenWorkspace::new();
        for (matching, &graph) in matchings.iter().zip(&row_graphs) {
            if !matching.is_empty() {
                matching.superimpose(&template, &mut graphs[graph], &mut ws)?;
            }
        }

        progress.indeterminate();
        progress.status("Computing average structure...");
        let average_indices = global_indices(&matchings, template.len());
        if config.pivot_type == PivotType::Average && average_indices.is_empty() {
            return Err(Error::NoGlobalMatch);
        }

        let average_matrix = average_matrix(&matchings, &average_indices);
        let consensus = if average_indices.is_empty() {
            Consensus {
                average: Vec::new(),
                rows: Vec::new(),
                rmsd: vec![0.0; matchings.len()],
                iterations: 0,
            }
        } else {
            let rows: Vec<Vec<Point>> = average_matrix
                .iter()
                .zip(&row_graphs)
                .map(|(indices, &graph)| {
                    indices.iter().map(|&v| graphs[graph].position(v)).collect()
                })
                .collect();
            iterate_consensus(rows, &mut ws, progress)?
        };
        tracing::info!(
            global = average_indices.len(),
            iterations = consensus.iterations,
            "consensus built"
        );

        let rmsd_to_pivot = match config.pivot_type {
            PivotType::Average => consensus.rmsd,
            PivotType::SpecificStructure => matchings.iter().map(|m| m.rmsd).collect(),
        };

        let pairwise_matrix = if !config.pairwise_matrix {
            None
        } else if consensus.rows.is_empty() {
            tracing::warn!("no atoms are matched in every structure; skipping the pairwise matrix");
            None
        } else {
            Some(pairwise_matrix(&consensus.rows, &mut ws, progress)?)
        };

        let clusters = match &pairwise_matrix {
            Some(matrix) if config.clusters > 1 => {
                progress.status("Computing k-Means clustering...");
                clustering::kmeans(config.clusters, matrix, progress)?
            }
            _ => vec![(0..matchings.len()).collect()],
        };

        progress.status("Computing statistics...");
        let statistics =
            MatchingStatistics::compute(&matchings, &rmsd_to_pivot, &clusters, config.pivot_type);
        tracing::info!("{statistics}");

        Ok(Self {
            pivot_index,
            pivot_token: template.token().to_string(),
            pivot_type: config.pivot_type,
            method: config.method,
            matchings,
            row_graphs,
            graphs,
            average_indices,
            average_matrix,
            aligned: consensus.rows,
            final_average: consensus.average,
            consensus_iterations: consensus.iterations,
            pairwise_matrix,
            clusters,
            statistics,
        })
    }
}

impl<T> MultipleMatching<T> {
    pub fn pivot_index(&self) -> usize {
        self.pivot_index
    }

    pub fn pivot_token(&self) -> &str {
        &self.pivot_token
    }

    pub fn pivot_type(&self) -> PivotType {
        self.pivot_type
    }

    pub fn method(&self) -> MatchMethod {
        self.method
    }

    /// Pairwise matchings by row; row 0 is the pivot itself.
    pub fn matchings(&self) -> &[PairwiseMatching] {
        &self.matchings
    }

    pub fn row_count(&self) -> usize {
        self.matchings.len()
    }

    /// Graphs in input order, superimposed onto the pivot.
    pub fn graphs(&self) -> &[MatchGraph<T>] {
        &self.graphs
    }

    /// Graph behind a row.
    pub fn row_graph(&self, row: usize) -> Option<&MatchGraph<T>> {
        self.row_graphs.get(row).map(|&g| &self.graphs[g])
    }

    /// Pivot vertices matched in every structure, ascending.
    pub fn average_indices(&self) -> &[usize] {
        &self.average_indices
    }

    /// Per row, the vertex matched to each entry of [`Self::average_indices`].
    pub fn average_matrix(&self) -> &[Vec<usize>] {
        &self.average_matrix
    }

    /// Positions of the average matrix after consensus superposition.
    pub fn aligned_rows(&self) -> &[Vec<Point>] {
        &self.aligned
    }

    /// Consensus structure centered on its centroid; empty without global matches.
    pub fn final_average(&self) -> &[Point] {
        &self.final_average
    }

    pub fn consensus_iterations(&self) -> usize {
        self.consensus_iterations
    }

    pub fn pairwise_matrix(&self) -> Option<&[Vec<f64>]> {
        self.pairwise_matrix.as_deref()
    }

    /// Row indices per cluster, largest cluster first.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    pub fn statistics(&self) -> &MatchingStatistics {
        &self.statistics
    }

    pub fn matched_count(&self, row: usize) -> Option<usize> {
        self.matchings.get(row).map(PairwiseMatching::size)
    }

    /// RMSD of a row to the consensus (Average) or to the pivot (SpecificStructure).
    pub fn rmsd_to_pivot(&self, row: usize) -> Option<f64> {
        self.statistics.row(row).map(|s| s.rmsd)
    }

    pub fn sigma_group(&self, row: usize) -> Option<SigmaGroup> {
        self.statistics.row(row).map(|s| s.sigma_group)
    }

    pub fn cluster_of(&self, row: usize) -> Option<usize> {
        self.statistics.row(row).map(|s| s.cluster)
    }
}

impl MultipleMatching<usize> {
    /// Builds graphs from `structures` with `config.graph` and matches them.
    pub fn from_structures(
        structures: &[Structure],
        config: &MatchConfig,
        progress: &Progress,
    ) -> Result<Self> {
        let graphs = structures
            .iter()
            .map(|s| MatchGraph::from_structure(s, &config.graph))
            .collect::<Result<Vec<_>>>()?;
        Self::find(graphs, config, progress)
    }

    /// Transformation of every matched structure into the pivot frame, keyed by structure id.
    ///
    /// Average mode superimposes the globally matched atoms onto the consensus;
    /// SpecificStructure mode uses each pairwise correspondence against the pivot structure.
    /// Unmatched structures get no entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingStructure`] when a matched structure is absent from
    /// `structures` or has fewer atoms than its graph refers to.
    pub fn transformations(
        &self,
        structures: &[Structure],
    ) -> Result<HashMap<String, OptimalTransformation>> {
        let by_id: HashMap<&str, &Structure> = structures.iter().map(|s| (s.id(), s)).collect();
        let lookup = |id: &str| {
            by_id
                .get(id)
                .copied()
                .ok_or_else(|| Error::missing_structure(id))
        };

        let mut ws = EigenWorkspace::new();
        let mut transformations = HashMap::new();
        match self.pivot_type {
            PivotType::SpecificStructure => {
                let pivot_graph = &self.graphs[self.pivot_index];
                let pivot = lookup(&self.pivot_token)?;
                for (row, matching) in self.matchings.iter().enumerate() {
                    if matching.is_empty() {
                        continue;
                    }
                    let graph = &self.graphs[self.row_graphs[row]];
                    let other = lookup(&matching.other_token)?;
                    let pairs = matching
                        .pairs()
                        .map(|(p, o)| {
                            Ok((
                                atom_position(pivot, pivot_graph, p)?,
                                atom_position(other, graph, o)?,
                            ))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let transformation =
                        OptimalTransformation::find_pairs(&mut ws, pairs.into_iter())?;
                    transformations.insert(other.id().to_string(), transformation);
                }
            }
            PivotType::Average => {
                for (row, indices) in self.average_matrix.iter().enumerate() {
                    let graph = &self.graphs[self.row_graphs[row]];
                    let other = lookup(&self.matchings[row].other_token)?;
                    let points = indices
                        .iter()
                        .map(|&v| atom_position(other, graph, v))
                        .collect::<Result<Vec<_>>>()?;
                    let transformation =
                        OptimalTransformation::find_with(&mut ws, &self.final_average, &points)?;
                    transformations.insert(other.id().to_string(), transformation);
                }
            }
        }
        Ok(transformations)
    }

    /// Moves every matched structure into the pivot frame in place.
    pub fn superimpose(&self, structures: &mut [Structure]) -> Result<()> {
        let transformations = self.transformations(structures)?;
        for structure in structures.iter_mut() {
            if let Some(transformation) = transformations.get(structure.id()) {
                transformation.apply_to_structure(structure);
            }
        }
        Ok(())
    }
}

fn atom_position(structure: &Structure, graph: &MatchGraph<usize>, vertex: usize) -> Result<Point> {
    structure
        .atom(graph.vertex(vertex).payload)
        .map(|atom| atom.pos)
        .ok_or_else(|| Error::missing_structure(structure.id()))
}

/// Matches every non-pivot graph against a fresh copy of `template` on the worker pool.
///
/// Results are in input order; the pivot slot is `Ok(None)`.
fn match_all<T: Clone + Send + Sync>(
    graphs: &mut [MatchGraph<T>],
    template: &MatchGraph<T>,
    config: &MatchConfig,
    progress: &Progress,
) -> Result<Vec<Result<Option<PairwiseMatching>>>> {
    let total = graphs.len();
    let done = Mutex::new(0usize);

    install(config.max_parallelism, || {
        graphs
            .par_iter_mut()
            .enumerate()
            .map_init(
                || WorkerContext {
                    pivot: template.clone(),
                    workspace: EigenWorkspace::new(),
                },
                |ctx: &mut WorkerContext<T>,
                 (index, graph): (usize, &mut MatchGraph<T>)|
                 -> Result<Option<PairwiseMatching>> {
                    progress.check()?;
                    if index == config.pivot_index {
                        return Ok(None);
                    }
                    ctx.pivot.reset_positions(template);
                    let matching = PairwiseMatching::find_with(
                        &mut ctx.pivot,
                        graph,
                        config.method,
                        config.traversal_budget,
                        &mut ctx.workspace,
                        progress,
                    )?;

                    let mut done = done.lock().unwrap_or_else(PoisonError::into_inner);
                    *done += 1;
                    progress.update(*done, total);
                    Ok(Some(matching))
                },
            )
            .collect::<Vec<_>>()
    })
}

/// Pivot vertices present in every matching, ascending.
fn global_indices(matchings: &[PairwiseMatching], pivot_len: usize) -> Vec<usize> {
    let links: Vec<HashSet<usize>> = matchings
        .iter()
        .map(|m| m.pivot_ordering.iter().copied().collect())
        .collect();
    (0..pivot_len)
        .filter(|v| links.iter().all(|link| link.contains(v)))
        .collect()
}

fn average_matrix(matchings: &[PairwiseMatching], indices: &[usize]) -> Vec<Vec<usize>> {
    matchings
        .iter()
        .map(|matching| {
            let link: HashMap<usize, usize> = matching.pairs().collect();
            indices.iter().filter_map(|v| link.get(v).copied()).collect()
        })
        .collect()
}

fn mean_structure(rows: &[Vec<Point>]) -> Vec<Point> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Vec::new();
    };
    let scale = 1.0 / rows.len() as f64;
    (0..width)
        .map(|i| {
            let sum = rows.iter().fold(Vector::zeros(), |acc, row| acc + row[i].coords);
            Point::from(sum * scale)
        })
        .collect()
}

/// Superimposes every row onto `average`; returns the mean RMSD.
fn superimpose_rows(
    average: &[Point],
    rows: &mut [Vec<Point>],
    rmsd: &mut [f64],
    ws: &mut EigenWorkspace,
) -> Result<f64> {
    let mut total = 0.0;
    for (row, slot) in rows.iter_mut().zip(rmsd.iter_mut()) {
        let transformation = OptimalTransformation::find_with(ws, average, row)?;
        transformation.apply_all(row);
        *slot = transformation.rmsd;
        total += transformation.rmsd;
    }
    Ok(total / rows.len() as f64)
}

fn iterate_consensus(
    mut rows: Vec<Vec<Point>>,
    ws: &mut EigenWorkspace,
    progress: &Progress,
) -> Result<Consensus> {
    let mut rmsd = vec![0.0; rows.len()];
    let mut average = mean_structure(&rows);
    let mut current = superimpose_rows(&average, &mut rows, &mut rmsd, ws)?;

    let mut iterations = 0;
    while iterations < MAX_CONSENSUS_ITERATIONS {
        progress.check()?;
        average = mean_structure(&rows);
        let next = superimpose_rows(&average, &mut rows, &mut rmsd, ws)?;
        tracing::debug!(iteration = iterations, rmsd = next, "consensus refinement");
        if current < PERFECT_FIT || next / current > CONVERGENCE_RATIO {
            break;
        }
        current = next;
        iterations += 1;
    }

    let shift = average.iter().fold(Vector::zeros(), |acc, p| acc + p.coords) / average.len() as f64;
    for point in average.iter_mut().chain(rows.iter_mut().flatten()) {
        *point -= shift;
    }

    Ok(Consensus {
        average,
        rows,
        rmsd,
        iterations,
    })
}

/// Symmetric matrix of optimal RMSDs between aligned rows.
fn pairwise_matrix(
    rows: &[Vec<Point>],
    ws: &mut EigenWorkspace,
    progress: &Progress,
) -> Result<Vec<Vec<f64>>> {
    progress.status("Computing pairwise matrix...");
    let n = rows.len();
    let total = (n * n.saturating_sub(1) / 2).max(1);
    let mut matrix = vec![vec![0.0; n]; n];
    let mut done = 0usize;

    Combinations::new((0..n).collect(), 2).visit(&mut |pair| {
        let (i, j) = (pair[0], pair[1]);
        if done % MATRIX_CHECK_INTERVAL == 0 {
            progress.check()?;
            progress.update(done * 100 / total, 100);
        }
        let rmsd = OptimalTransformation::rmsd_with(ws, &rows[i], &rows[j])?;
        matrix[i][j] = rmsd;
        matrix[j][i] = rmsd;
        done += 1;
        Ok(())
    })?;
    progress.update(100, 100);
    Ok(matrix)
}
