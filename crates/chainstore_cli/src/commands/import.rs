//! Import command implementation.

use super::CliError;
use chainstore_codec::from_json;
use chainstore_core::{Config, OpenMode, Store, Value};
use std::path::Path;
use tracing::debug;

/// Runs the import command.
///
/// Every object in the array is stored under the value of `key_field`.
/// All documents go into a single commit.
pub fn run(
    path: &Path,
    file: &Path,
    key_field: &str,
    strict: bool,
    page_size: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(file)?;
    let documents = from_json(&json)?;
    let entries = keyed_documents(documents, key_field)?;

    let mut config = Config::default();
    if let Some(size) = page_size {
        config = config.page_size(size);
    }
    let mut store = Store::open_with_config(path, OpenMode::CreateAndWrite, config)?;
    let before = store.checkpoint();

    for (key, document) in &entries {
        if strict {
            store.insert(key, document)?;
        } else {
            store.put(key, document)?;
        }
    }
    debug!(documents = entries.len(), "documents staged");
    let checkpoint = store.commit_changes()?;

    println!(
        "Imported {} documents from {}",
        entries.len(),
        file.display()
    );
    println!("  Checkpoint: {before} -> {checkpoint}");
    println!("  Keys:       {}", store.len());
    store.close()?;
    Ok(())
}

/// Splits a JSON array into `(key, document)` pairs.
///
/// Text keys are stored as their UTF-8 bytes, integer keys as their
/// decimal form.
pub fn keyed_documents(
    documents: Value,
    key_field: &str,
) -> Result<Vec<(Vec<u8>, Value)>, CliError> {
    let items = match documents {
        Value::Array(items) => items,
        other => {
            return Err(CliError::NotAnArray {
                found: other.type_name(),
            })
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, document) in items.into_iter().enumerate() {
        let key = match document.get(key_field) {
            Some(Value::Text(text)) if !text.is_empty() => text.as_bytes().to_vec(),
            Some(Value::Integer(n)) => n.to_string().into_bytes(),
            Some(other) => {
                return Err(CliError::BadDocument {
                    index,
                    reason: format!("field {key_field:?} is {}", other.type_name()),
                })
            }
            None => {
                return Err(CliError::BadDocument {
                    index,
                    reason: format!("missing field {key_field:?}"),
                })
            }
        };
        entries.push((key, document));
    }
    Ok(entries)
}
