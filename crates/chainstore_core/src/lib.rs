//! # chainstore core
//!
//! Embedded, append-only document store engine.
//!
//! This crate provides:
//! - The on-disk format: header, commit frames and chained trailers
//! - Replay recovery that keeps every valid commit of a damaged file
//! - An in-memory index with a buffer of staged changes and overlays
//! - Read-only snapshots at earlier checkpoints
//! - Export of live state into a fresh file
//!
//! ## Example
//!
//! ```rust
//! use chainstore_core::{Config, OpenMode, Store, Value};
//! use chainstore_storage::InMemoryBackend;
//!
//! let backend = Box::new(InMemoryBackend::new());
//! let mut store = Store::open_with_backend(backend, OpenMode::CreateAndWrite, Config::default())?;
//!
//! store.put(b"ada", &Value::dict(vec![("name", Value::from("Ada"))]))?;
//! let first = store.commit_changes()?;
//!
//! store.get_mutable(b"ada")?.unwrap().set("born", 1815);
//! store.commit_changes()?;
//!
//! let snapshot = store.open_at(first)?;
//! assert!(snapshot.get(b"ada")?.unwrap().get("born").is_none());
//! # Ok::<(), chainstore_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compaction;
mod config;
mod error;
mod index;
mod iter;
pub mod log;
mod store;
mod transaction;
mod types;

pub use chainstore_codec::{MutableDict, Value};
pub use compaction::{CompactionResult, Compactor};
pub use config::{Config, OpenMode, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
pub use error::{CoreError, CoreResult};
pub use index::Index;
pub use iter::Iter;
pub use log::{Fault, FaultReason, RecoveryReport};
pub use store::Store;
pub use transaction::{OverlayOrigin, PendingWrite, TransactionBuffer};
pub use types::Checkpoint;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
