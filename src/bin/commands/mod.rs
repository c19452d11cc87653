use std::fs::{self, File};
use std::io::{self as stdio, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};

use bio_match::{Atom, MatchConfig, Point, Progress, ProgressSink, Structure};

pub mod info;
pub mod pair;
pub mod superimpose;

/// Aggregated IO parameters shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct IoParameters {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// One atom of the JSON exchange format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomRecord {
    #[serde(default)]
    pub name: String,
    pub element: String,
    #[serde(default)]
    pub residue: i32,
    pub position: [f64; 3],
    #[serde(default = "selected_by_default")]
    pub selected: bool,
}

fn selected_by_default() -> bool {
    true
}

/// One structure of the JSON exchange format; bonds are pairs of atom indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureRecord {
    pub id: String,
    pub atoms: Vec<AtomRecord>,
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
}

impl StructureRecord {
    fn into_structure(self) -> Structure {
        let mut structure = Structure::new(self.id);
        for record in &self.atoms {
            let [x, y, z] = record.position;
            let name = if record.name.is_empty() {
                record.element.as_str()
            } else {
                record.name.as_str()
            };
            structure.add_atom(
                Atom::new(name, &record.element, record.residue, Point::new(x, y, z))
                    .with_selected(record.selected),
            );
        }
        for [a, b] in self.bonds {
            if !structure.add_bond(a, b) {
                tracing::warn!(
                    structure = structure.id(),
                    "ignoring invalid or duplicate bond {a}-{b}"
                );
            }
        }
        structure
    }

    fn from_structure(structure: &Structure) -> Self {
        Self {
            id: structure.id().to_string(),
            atoms: structure
                .iter_atoms()
                .map(|atom| AtomRecord {
                    name: atom.name.to_string(),
                    element: atom.element.to_string(),
                    residue: atom.residue_seq,
                    position: [atom.pos.x, atom.pos.y, atom.pos.z],
                    selected: atom.selected,
                })
                .collect(),
            bonds: structure
                .bonds()
                .iter()
                .map(|bond| [bond.a1_idx, bond.a2_idx])
                .collect(),
        }
    }
}

/// Loads every structure from the configured input source.
pub fn load_structures(params: &IoParameters) -> Result<Vec<Structure>> {
    let records: Vec<StructureRecord> = if let Some(path) = &params.input {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse structures from {}", path.display()))?
    } else {
        let stdin = stdio::stdin();
        if stdin.is_terminal() {
            bail!(
                "No --input provided and stdin is a TTY. Provide -i/--input or pipe a JSON structure list into biomatch."
            );
        }
        let mut buffer = String::new();
        stdin
            .lock()
            .read_to_string(&mut buffer)
            .context("Failed to read structures from stdin")?;
        serde_json::from_str(&buffer).context("Failed to parse structures from stdin")?
    };

    if records.is_empty() {
        bail!("The input contains no structures.");
    }
    Ok(records
        .into_iter()
        .map(StructureRecord::into_structure)
        .collect())
}

/// Writes structures as JSON to the configured output destination.
pub fn save_structures(structures: &[Structure], params: &IoParameters) -> Result<()> {
    let records: Vec<StructureRecord> = structures
        .iter()
        .map(StructureRecord::from_structure)
        .collect();
    write_json(&records, params.output.as_deref())
}

/// Serializes `value` as pretty JSON to `output`, or stdout when omitted.
pub fn write_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)
                .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
            writer.flush().context("Failed to flush output writer")?;
        }
        None => {
            let stdout = stdio::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, value)
                .context("Failed to write JSON to stdout")?;
            writeln!(writer)?;
            writer.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

/// Reads the optional TOML configuration; missing keys keep their defaults.
pub fn load_config(params: &IoParameters) -> Result<MatchConfig> {
    let Some(path) = &params.config else {
        return Ok(MatchConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Finds a structure by id, or by position when `id` is a plain index.
pub fn find_structure<'a>(structures: &'a [Structure], id: &str) -> Result<&'a Structure> {
    if let Some(found) = structures.iter().find(|s| s.id() == id) {
        return Ok(found);
    }
    if let Ok(index) = id.parse::<usize>() {
        if let Some(found) = structures.get(index) {
            return Ok(found);
        }
    }
    bail!("No structure with id or index '{id}' in the input.")
}

/// Routes library progress reports to a terminal spinner.
struct SpinnerSink {
    bar: ProgressBar,
}

impl ProgressSink for SpinnerSink {
    fn status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn progress(&self, current: usize, total: usize) {
        self.bar.set_prefix(format!("{current}/{total}"));
    }

    fn indeterminate(&self) {
        self.bar.set_prefix("");
    }
}

/// Wraps a long-running matching job with a spinner rendered to stderr.
///
/// The closure receives a [`Progress`] whose status updates replace the spinner message.
pub fn run_with_spinner<T, F>(message: &str, work: F) -> Result<T>
where
    F: FnOnce(&Progress) -> Result<T>,
{
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg} {prefix:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());

    let progress = Progress::new(Arc::new(SpinnerSink {
        bar: spinner.clone(),
    }));
    let result = work(&progress);

    spinner.set_prefix("");
    match &result {
        Ok(_) => spinner.finish_with_message(format!("{} ✓", message)),
        Err(_) => spinner.abandon_with_message(format!("{} ✗", message)),
    }

    result
}

/// Returns true when stdout is a TTY and no explicit output file was supplied.
pub fn interactive_stdout_requested(params: &IoParameters) -> bool {
    params.output.is_none() && stdio::stdout().is_terminal()
}
