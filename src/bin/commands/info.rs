use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{Table, format, row};

use bio_match::{MatchConfig, MatchGraph, Structure};

/// Report-only command that checks whether each structure can be matched.
#[derive(Debug, Default, Args)]
pub struct InfoArgs {}

/// Prints atom, bond, ring and graph statistics for every structure.
pub fn run(structures: &[Structure], _args: &InfoArgs, config: &MatchConfig) -> Result<()> {
    let mut stderr = io::stderr().lock();

    print_boxed_label(&mut stderr, "BioMatch Input Report")?;
    writeln!(&mut stderr)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row!["Structure", "Atoms", "Bonds", "Rings", "Vertices", "Connected"]);
    for structure in structures {
        let (vertices, connected) = match MatchGraph::from_structure(structure, &config.graph) {
            Ok(graph) => (
                graph.len().to_string(),
                if graph.is_connected() { "yes" } else { "no" },
            ),
            Err(err) => {
                tracing::warn!("{err}");
                ("0".to_string(), "-")
            }
        };
        table.add_row(row![
            structure.id(),
            structure.atom_count(),
            structure.bonds().len(),
            structure.rings().len(),
            vertices,
            connected
        ]);
    }
    table
        .print(&mut stderr)
        .context("Failed to render input summary")?;
    Ok(())
}

fn print_boxed_label<W: Write>(writer: &mut W, title: &str) -> io::Result<()> {
    let inner = format!(" {title} ");
    let width = inner.chars().count();
    writeln!(writer, "╭{}╮", "─".repeat(width))?;
    writeln!(writer, "│{}│", inner)?;
    writeln!(writer, "╰{}╯", "─".repeat(width))?;
    Ok(())
}
