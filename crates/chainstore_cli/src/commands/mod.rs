//! CLI command implementations.

pub mod compact;
pub mod get;
pub mod import;
pub mod inspect;
pub mod verify;

use thiserror::Error;

/// Errors raised by the CLI itself rather than the store.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command needs `--path`.
    #[error("store path required for {0} (use --path)")]
    MissingPath(&'static str),

    /// The import file is not a JSON array.
    #[error("import file must hold a JSON array, found {found}")]
    NotAnArray {
        /// Type of the top-level value.
        found: &'static str,
    },

    /// An imported document has no usable key.
    #[error("document {index}: {reason}")]
    BadDocument {
        /// Position in the import array.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// No document is stored under the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Verification found a problem.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

/// Parses a checkpoint given as decimal or `0x`-prefixed hex.
pub fn parse_checkpoint(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid checkpoint {text:?}: {e}"))
}
