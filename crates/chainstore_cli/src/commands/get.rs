//! Get command implementation.

use super::CliError;
use chainstore_core::{Checkpoint, OpenMode, Store};
use std::path::Path;

/// Runs the get command.
///
/// With `at` set, the document is read from the snapshot at that
/// checkpoint.
pub fn run(path: &Path, key: &str, at: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path, OpenMode::ReadOnly)?;
    let value = match at {
        Some(checkpoint) => store.open_at(Checkpoint::new(checkpoint))?.get(key.as_bytes())?,
        None => store.get(key.as_bytes())?,
    };

    let value = value.ok_or_else(|| CliError::KeyNotFound(key.to_string()))?;
    let json = serde_json::Value::from(&value);
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
