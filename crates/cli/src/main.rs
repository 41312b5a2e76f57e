//! Loupe CLI: index source trees and query the context engine.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cmd_index, cmd_search, cmd_status, cmd_watch};

/// Exit code for configuration problems.
const EXIT_CONFIG: u8 = 1;
/// Exit code for indexing failures.
const EXIT_INDEXING: u8 = 2;

#[derive(Parser)]
#[command(name = "loupe")]
#[command(about = "Local context indexing and retrieval for agent orchestration")]
#[command(after_help = "\
QUICK START:
  loupe index --root .            # Index the current tree
  loupe status                    # Totals and per-file state
  loupe search \"worker pool\"      # Ranked context snippets
  loupe watch --root .            # Incremental updates on change")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Scan the watch roots and (re-)index changed files
  Index {
    /// Watch root(s); defaults to configured roots or the current directory
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
    /// Extra root registered for this run (alias of --root)
    #[arg(long = "watch-root")]
    watch_roots: Vec<PathBuf>,
    /// Re-index everything, ignoring stored file state
    #[arg(long)]
    rebuild: bool,
    /// Worker count for the batch indexer
    #[arg(long)]
    parallelism: Option<usize>,
    /// Emit the result as JSON
    #[arg(long)]
    json: bool,
  },
  /// Show catalog totals and per-file entries
  Status {
    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
  },
  /// Query the retrieval pipeline
  Search {
    /// The query text
    query: String,
    /// Restrict to path prefixes (repeatable)
    #[arg(long = "path")]
    paths: Vec<String>,
    /// Restrict to languages (repeatable, e.g. rust)
    #[arg(long = "language")]
    languages: Vec<String>,
    /// Maximum tokens in the returned context
    #[arg(long, default_value_t = 4096)]
    budget: usize,
    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
  },
  /// Watch the roots and index incrementally until interrupted
  Watch {
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  let _log_guard = match &cli.command {
    Commands::Watch { .. } => logging::init_watch(),
    _ => {
      logging::init();
      None
    }
  };

  let outcome = match cli.command {
    Commands::Index {
      roots,
      watch_roots,
      rebuild,
      parallelism,
      json,
    } => cmd_index(roots, watch_roots, rebuild, parallelism, json).await,
    Commands::Status { json } => cmd_status(json).await,
    Commands::Search {
      query,
      paths,
      languages,
      budget,
      json,
    } => cmd_search(query, paths, languages, budget, json).await,
    Commands::Watch { roots } => cmd_watch(roots).await,
  };

  match outcome {
    Ok(commands::Outcome::Ok) => ExitCode::SUCCESS,
    Ok(commands::Outcome::IndexingFailures) => ExitCode::from(EXIT_INDEXING),
    Err(e) => {
      eprintln!("error: {e:#}");
      ExitCode::from(EXIT_CONFIG)
    }
  }
}
