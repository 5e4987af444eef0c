//! chainstore CLI
//!
//! Command-line tools for chainstore files.
//!
//! # Commands
//!
//! - `inspect` - Display checkpoint, key count and damage state
//! - `verify` - Replay the log and report every fault
//! - `get` - Print one document as JSON
//! - `import` - Load a JSON array of documents in one commit
//! - `compact` - Write live state to a fresh file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// chainstore command-line tools.
#[derive(Parser)]
#[command(name = "chainstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay the log and check every commit
    Verify {
        /// List every valid commit
        #[arg(short, long)]
        commits: bool,
    },

    /// Print a document as JSON
    Get {
        /// Key of the document
        key: String,

        /// Read from the snapshot at this checkpoint (decimal or 0x hex)
        #[arg(short, long, value_parser = commands::parse_checkpoint)]
        at: Option<u64>,
    },

    /// Import a JSON array of documents as one commit
    Import {
        /// JSON file holding an array of objects
        file: PathBuf,

        /// Field whose value becomes the key of each document
        #[arg(short, long)]
        key_field: String,

        /// Fail on keys that already exist instead of replacing them
        #[arg(short, long)]
        strict: bool,

        /// Page size for a newly created file
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Write live state to a new file, dropping history
    Compact {
        /// Output file
        out: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(commands::CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { commits } => {
            let path = cli.path.ok_or(commands::CliError::MissingPath("verify"))?;
            commands::verify::run(&path, commits)?;
        }
        Commands::Get { key, at } => {
            let path = cli.path.ok_or(commands::CliError::MissingPath("get"))?;
            commands::get::run(&path, &key, at)?;
        }
        Commands::Import {
            file,
            key_field,
            strict,
            page_size,
        } => {
            let path = cli.path.ok_or(commands::CliError::MissingPath("import"))?;
            commands::import::run(&path, &file, &key_field, strict, page_size)?;
        }
        Commands::Compact { out } => {
            let path = cli.path.ok_or(commands::CliError::MissingPath("compact"))?;
            commands::compact::run(&path, &out)?;
        }
        Commands::Version => {
            println!("chainstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("chainstore core v{}", chainstore_core::VERSION);
            println!("file format v{}", chainstore_core::log::FORMAT_VERSION);
        }
    }

    Ok(())
}
