use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{Table, format, row};

use bio_match::superpose::EigenWorkspace;
use bio_match::{
    MatchConfig, MatchGraph, MatchMethod, OptimalTransformation, PairwiseMatching, Structure,
};

use crate::commands::{find_structure, run_with_spinner};

/// Matches two structures and superimposes the second onto the first.
#[derive(Debug, Default, Args)]
pub struct PairArgs {
    /// Id or index of the pivot structure (defaults to the first one).
    #[arg(long, value_name = "ID")]
    pub pivot: Option<String>,
    /// Id or index of the structure to move (defaults to the second one).
    #[arg(long, value_name = "ID")]
    pub other: Option<String>,
    /// Pairwise correspondence algorithm.
    #[arg(short, long, value_enum)]
    pub method: Option<MatchMethod>,
    /// Print every matched atom pair.
    #[arg(long)]
    pub list_pairs: bool,
}

/// Returns the pivot and the superimposed other structure.
pub fn run(
    structures: &[Structure],
    args: &PairArgs,
    config: &MatchConfig,
) -> Result<Vec<Structure>> {
    let pivot = find_structure(structures, args.pivot.as_deref().unwrap_or("0"))?;
    let mut other = find_structure(structures, args.other.as_deref().unwrap_or("1"))?.clone();
    let method = args.method.unwrap_or(config.method);

    let (matching, pivot_graph, other_graph) = run_with_spinner("Matching pair", |progress| {
        let mut pivot_graph = MatchGraph::from_structure(pivot, &config.graph)
            .with_context(|| format!("Failed to build the graph of '{}'", pivot.id()))?;
        let mut other_graph = MatchGraph::from_structure(&other, &config.graph)
            .with_context(|| format!("Failed to build the graph of '{}'", other.id()))?;
        let matching =
            PairwiseMatching::find(&mut pivot_graph, &mut other_graph, method, progress)
                .with_context(|| format!("Failed to match '{}' and '{}'", pivot.id(), other.id()))?;
        Ok((matching, pivot_graph, other_graph))
    })?;

    if !matching.is_empty() {
        let mut ws = EigenWorkspace::new();
        let atom_pairs = matching.pairs().map(|(p, o)| {
            (
                pivot.atoms()[pivot_graph.vertex(p).payload].pos,
                other.atoms()[other_graph.vertex(o).payload].pos,
            )
        });
        let transformation = OptimalTransformation::find_pairs(&mut ws, atom_pairs)
            .context("Failed to superimpose the matched atoms")?;
        transformation.apply_to_structure(&mut other);
    }

    print_summary(pivot, &other, &matching, &pivot_graph, &other_graph, args.list_pairs)?;
    Ok(vec![pivot.clone(), other])
}

fn print_summary(
    pivot: &Structure,
    other: &Structure,
    matching: &PairwiseMatching,
    pivot_graph: &MatchGraph<usize>,
    other_graph: &MatchGraph<usize>,
    list_pairs: bool,
) -> Result<()> {
    let mut stderr = io::stderr().lock();

    let mut summary = Table::new();
    summary.set_format(*format::consts::FORMAT_BOX_CHARS);
    summary.set_titles(row!["Metric", "Value"]);
    summary.add_row(row!["Pivot", pivot.id()]);
    summary.add_row(row!["Other", other.id()]);
    summary.add_row(row!["Matched atoms", matching.size()]);
    summary.add_row(row!["RMSD (Å)", format!("{:.4}", matching.rmsd)]);
    summary.add_row(row!["Topology score", matching.topology_score]);
    if matching.budget_exhausted {
        summary.add_row(row!["Note", "traversal budget exhausted"]);
    }
    summary
        .print(&mut stderr)
        .context("Failed to render pair summary")?;

    if list_pairs {
        let mut pairs = Table::new();
        pairs.set_format(*format::consts::FORMAT_BOX_CHARS);
        pairs.set_titles(row!["Pivot atom", "Other atom", "Distance (Å)"]);
        for (p, o) in matching.pairs() {
            let a = &pivot.atoms()[pivot_graph.vertex(p).payload];
            let b = &other.atoms()[other_graph.vertex(o).payload];
            pairs.add_row(row![
                format!("{} {}", a.residue_seq, a.name),
                format!("{} {}", b.residue_seq, b.name),
                format!("{:.3}", a.distance(b))
            ]);
        }
        pairs
            .print(&mut stderr)
            .context("Failed to render matched pairs")?;
    }
    writeln!(&mut stderr)?;
    Ok(())
}
