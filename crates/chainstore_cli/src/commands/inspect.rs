//! Inspect command implementation.

use chainstore_core::{OpenMode, Store};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Checkpoint alignment recorded in the header.
    pub page_size: u32,
    /// Current checkpoint.
    pub checkpoint: u64,
    /// Checkpoint before the current one.
    pub previous_checkpoint: u64,
    /// Number of valid commits.
    pub commits: u64,
    /// Number of live keys.
    pub keys: usize,
    /// Whether replay stopped before the end of the file.
    pub damaged: bool,
    /// Bytes past the last valid commit.
    pub discarded_bytes: u64,
    /// Why replay stopped, if it stopped early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl InspectResult {
    fn from_store(path: &Path, store: &Store) -> Self {
        let report = store.recovery();
        Self {
            path: path.display().to_string(),
            file_size: report.file_size,
            page_size: store.page_size(),
            checkpoint: store.checkpoint().as_u64(),
            previous_checkpoint: store.previous_checkpoint().as_u64(),
            commits: report.commits_applied,
            keys: store.len(),
            damaged: store.is_damaged(),
            discarded_bytes: report.discarded_bytes(),
            fault: report.fault.as_ref().map(ToString::to_string),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path, OpenMode::ReadOnly)?;
    let result = InspectResult::from_store(path, &store);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text(&result),
    }

    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!();
    println!("File:");
    println!("  Size:        {} bytes", result.file_size);
    println!("  Page size:   {}", result.page_size);
    println!();
    println!("Log:");
    println!("  Commits:     {}", result.commits);
    println!("  Checkpoint:  {:#x}", result.checkpoint);
    println!("  Previous:    {:#x}", result.previous_checkpoint);
    println!("  Keys:        {}", result.keys);
    println!();
    if result.damaged {
        println!("Damage:");
        println!(
            "  {} bytes past the last valid commit are ignored",
            result.discarded_bytes
        );
        if let Some(fault) = &result.fault {
            println!("  {fault}");
        }
    } else {
        println!("No damage detected");
    }
}
