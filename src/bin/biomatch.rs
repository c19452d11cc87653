use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::IoParameters;
use commands::{info, pair, superimpose};

#[derive(Parser, Debug)]
#[command(
    name = "biomatch",
    about = "A command-line tool for matching molecular fragments and superimposing them onto a common pivot or consensus.",
    version,
    author,
    arg_required_else_help = true
)]
struct Cli {
    /// Input JSON file with a list of structures. When omitted, stdin is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,
    /// Output file for the superimposed structures. When omitted, stdout is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
    /// TOML file with matching defaults; command-line flags take precedence.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report atoms, bonds, rings and graph connectivity of each input structure.
    Info(info::InfoArgs),
    /// Match two structures and superimpose the second onto the first.
    Pair(pair::PairArgs),
    /// Match all structures against a pivot, build the consensus, and superimpose them.
    Superimpose(superimpose::SuperimposeArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let io_params = IoParameters {
        input: cli.input.clone(),
        output: cli.output.clone(),
        config: cli.config.clone(),
    };
    let config = commands::load_config(&io_params)?;
    let mut structures = commands::load_structures(&io_params)?;

    match cli.command {
        Command::Info(args) => {
            info::run(&structures, &args, &config)?;
        }
        Command::Pair(args) => {
            let aligned = pair::run(&structures, &args, &config)?;
            if !commands::interactive_stdout_requested(&io_params) {
                commands::save_structures(&aligned, &io_params)?;
            }
        }
        Command::Superimpose(args) => {
            superimpose::run(&mut structures, &args, config, &io_params)?;
            if !commands::interactive_stdout_requested(&io_params) {
                commands::save_structures(&structures, &io_params)?;
            }
        }
    }

    Ok(())
}
