use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{Table, format, row};

use bio_match::{MatchConfig, MatchMethod, MultipleMatching, PivotType, SigmaGroup, Structure};

use crate::commands::{IoParameters, interactive_stdout_requested, run_with_spinner, write_json};

/// Matches every structure against a pivot and superimposes them.
#[derive(Debug, Default, Args)]
pub struct SuperimposeArgs {
    /// Superimpose onto the consensus average or onto the pivot structure itself.
    #[arg(long, value_enum)]
    pub pivot_type: Option<PivotType>,
    /// Index of the pivot structure in the input list.
    #[arg(short, long, value_name = "INDEX")]
    pub pivot: Option<usize>,
    /// Pairwise correspondence algorithm.
    #[arg(short, long, value_enum)]
    pub method: Option<MatchMethod>,
    /// Compute the pairwise RMSD matrix of the aligned structures.
    #[arg(long)]
    pub pairwise_matrix: bool,
    /// Number of k-means clusters (implies --pairwise-matrix when above 1).
    #[arg(short = 'k', long, value_name = "K")]
    pub clusters: Option<usize>,
    /// Maximum worker threads for pairwise matching.
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,
    /// Cap on traversal steps of one subgraph search.
    #[arg(long, value_name = "STEPS")]
    pub budget: Option<u64>,
    /// Only match atoms flagged as selected.
    #[arg(long)]
    pub only_selection: bool,
    /// Ignore hydrogen atoms.
    #[arg(long)]
    pub ignore_hydrogens: bool,
    /// Disable the ring-membership heuristic of the subgraph search.
    #[arg(long)]
    pub no_ring_heuristic: bool,
    /// Write the statistics, matrix and clusters as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl SuperimposeArgs {
    /// Overlays the command-line flags onto a configuration loaded from file.
    pub fn apply(&self, config: &mut MatchConfig) {
        if let Some(pivot_type) = self.pivot_type {
            config.pivot_type = pivot_type;
        }
        if let Some(pivot) = self.pivot {
            config.pivot_index = pivot;
        }
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(threads) = self.threads {
            config.max_parallelism = threads;
        }
        if let Some(budget) = self.budget {
            config.traversal_budget = budget;
        }
        if let Some(clusters) = self.clusters {
            config.clusters = clusters;
        }
        config.pairwise_matrix |= self.pairwise_matrix || config.clusters > 1;
        config.graph.only_selection |= self.only_selection;
        config.graph.ignore_hydrogens |= self.ignore_hydrogens;
        if self.no_ring_heuristic {
            config.graph.use_ring_heuristic = false;
        }
    }
}

#[derive(serde::Serialize)]
struct Report<'a> {
    pivot: &'a str,
    statistics: &'a bio_match::MatchingStatistics,
    average_atoms: usize,
    consensus_iterations: usize,
    pairwise_matrix: Option<&'a [Vec<f64>]>,
    clusters: Vec<Vec<&'a str>>,
}

/// Runs the multiple matching and moves `structures` into the pivot frame.
pub fn run(
    structures: &mut [Structure],
    args: &SuperimposeArgs,
    config: MatchConfig,
    io_params: &IoParameters,
) -> Result<()> {
    let mut config = config;
    args.apply(&mut config);
    tracing::debug!(?config, "effective configuration");

    let matching = run_with_spinner("Superimposing structures", |progress| {
        let matching = MultipleMatching::from_structures(structures, &config, progress)
            .context("Failed to match structures")?;
        matching
            .superimpose(structures)
            .context("Failed to apply superposition")?;
        Ok(matching)
    })?;

    print_tables(&matching, io_params)?;

    if let Some(path) = &args.report {
        let tokens: Vec<&str> = matching
            .matchings()
            .iter()
            .map(|m| m.other_token.as_str())
            .collect();
        let report = Report {
            pivot: matching.pivot_token(),
            statistics: matching.statistics(),
            average_atoms: matching.average_indices().len(),
            consensus_iterations: matching.consensus_iterations(),
            pairwise_matrix: matching.pairwise_matrix(),
            clusters: matching
                .clusters()
                .iter()
                .map(|rows| rows.iter().map(|&row| tokens[row]).collect())
                .collect(),
        };
        write_json(&report, Some(path))?;
    }
    Ok(())
}

fn print_tables(matching: &MultipleMatching<usize>, io_params: &IoParameters) -> Result<()> {
    let mut stderr = io::stderr().lock();
    let statistics = matching.statistics();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row!["Structure", "Matched", "RMSD (Å)", "Sigma", "Cluster"]);
    for row in &statistics.rows {
        let rmsd = if row.sigma_group == SigmaGroup::Invalid {
            "-".to_string()
        } else {
            format!("{:.3}", row.rmsd)
        };
        table.add_row(row![row.token, row.matched, rmsd, row.sigma_group, row.cluster + 1]);
    }
    table
        .print(&mut stderr)
        .context("Failed to render matching summary")?;

    writeln!(
        &mut stderr,
        "Pivot '{}' ({:?}), {} globally matched atoms: {}",
        matching.pivot_token(),
        matching.pivot_type(),
        matching.average_indices().len(),
        statistics
    )?;
    if interactive_stdout_requested(io_params) {
        writeln!(
            &mut stderr,
            "Use -o/--output or a pipe to save the superimposed structures."
        )?;
    }
    Ok(())
}
