//! Fakt CLI, the build-tool entry point to the incremental generation engine.
//!
//! A build tool invokes `fakt` once per compilation node: `resolve` to learn
//! where output goes, `plan` to learn which contracts need regeneration,
//! `commit` after the generator ran, `reap` to reclaim stale artifacts, and
//! `route` to redistribute artifacts across a multi-target consumer.

#![warn(missing_docs)]

mod commit;
mod compact;
mod logging;
mod pipeline;
mod plan;
mod reap;
mod resolve;
mod route;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Fakt: incremental fake generation for multi-target builds.
#[derive(Parser, Debug)]
#[command(name = "fakt", version, about = "Fakt incremental generation engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `fakt.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output format for results and diagnostics.
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a build node's ancestors and output location.
    Resolve {
        /// Build node name.
        node: String,
    },
    /// Decide which contracts need regeneration.
    Plan(ContractArgs),
    /// Record signatures after successful generation.
    Commit(ContractArgs),
    /// Delete artifacts of contracts that no longer exist.
    Reap(ContractArgs),
    /// Rewrite a node's signature store with one record per contract.
    Compact {
        /// Build node name.
        node: String,
    },
    /// Redistribute a producer's artifacts into per-target destinations.
    Route(RouteArgs),
}

/// Arguments shared by commands that take the analyzer's contract list.
#[derive(Parser, Debug)]
pub struct ContractArgs {
    /// Build node being compiled.
    pub node: String,

    /// JSON file with the contracts of this pass.
    #[arg(long)]
    pub contracts: PathBuf,
}

/// Arguments for the `fakt route` subcommand.
#[derive(Parser, Debug)]
pub struct RouteArgs {
    /// Producing build node; its output is read from `<producer>/<node>`.
    pub node: String,

    /// Root directory holding producer output.
    #[arg(long)]
    pub producer: PathBuf,

    /// Root directory of the consumer's per-target directories.
    #[arg(long)]
    pub consumer: PathBuf,

    /// Candidate destinations, overriding `[routing]` in `fakt.toml`.
    #[arg(long = "dest", num_args = 1..)]
    pub destinations: Vec<String>,

    /// Fallback destination, overriding `[routing]` in `fakt.toml`.
    #[arg(long = "default")]
    pub default_destination: Option<String>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Result and diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
    /// Output format.
    pub format: ReportFormat,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
        format: cli.format,
    };

    let result = match cli.command {
        Command::Resolve { ref node } => resolve::run(node, &global),
        Command::Plan(ref args) => plan::run(args, &global),
        Command::Commit(ref args) => commit::run(args, &global),
        Command::Reap(ref args) => reap::run(args, &global),
        Command::Compact { ref node } => compact::run(node, &global),
        Command::Route(ref args) => route::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
