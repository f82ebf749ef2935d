//! tame: command-line interface for the tame metadata graph engine.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tame_core::TameError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that failed with an error rather than a verdict.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(
    name = "tame",
    about = "Track metadata for data files as a linked graph of YAML documents"
)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Repository root (defaults to the nearest directory holding tame.yaml)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Worker threads for loading, resolution and copying
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a metadata file or every document under a directory
    Validate {
        /// File or directory to validate
        path: PathBuf,

        /// Accept documents without a files key and skip tracked-file checks
        #[arg(short = 'm', long)]
        metadata_only: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a human-readable description of a metadata document
    Describe {
        /// Metadata file to describe
        path: PathBuf,
    },

    /// Copy a document's files and those of all its ancestors
    Collect {
        /// Metadata file to start from
        path: PathBuf,

        /// Destination directory
        destination: PathBuf,

        /// Put every file directly in the destination
        #[arg(long)]
        flatten: bool,

        /// Print the copy report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the metadata documents that claim a data file
    Locate {
        /// Data file to look up
        file: PathBuf,
    },

    /// Find documents by key/value terms such as `organism=yeast` or `temperature>=30`
    Search {
        /// Search terms; `=` wildcard, `<` `<=` `>` `>=` numbers or dates, `~` regex
        #[arg(required = true)]
        terms: Vec<String>,

        /// Directory or file to search under (defaults to the repository root)
        #[arg(long)]
        under: Option<PathBuf>,

        /// Match when any term matches instead of all of them
        #[arg(long)]
        any: bool,

        /// Ignore fields inherited from parent documents
        #[arg(long)]
        no_parents: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var("TAME_LOG")
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("tame=warn,tame_core=warn")),
        1 => EnvFilter::new("tame=info,tame_core=info"),
        _ => EnvFilter::new("tame=debug,tame_core=debug"),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    debug!("tame {} starting", env!("CARGO_PKG_VERSION"));
    let result = match cli.command {
        Commands::Validate {
            path,
            metadata_only,
            json,
        } => commands::cmd_validate(&cli.global, &path, metadata_only, json),
        Commands::Describe { path } => commands::cmd_describe(&cli.global, &path),
        Commands::Collect {
            path,
            destination,
            flatten,
            json,
        } => commands::cmd_collect(&cli.global, &path, &destination, flatten, json),
        Commands::Locate { file } => commands::cmd_locate(&cli.global, &file),
        Commands::Search {
            terms,
            under,
            any,
            no_parents,
        } => commands::cmd_search(&cli.global, &terms, under.as_deref(), any, no_parents),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            if let Some(excerpt) = err.downcast_ref::<TameError>().and_then(TameError::excerpt) {
                for line in excerpt.lines() {
                    eprintln!("  | {line}");
                }
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}
