//! # chainstore storage
//!
//! Storage backend trait and implementations for chainstore.
//!
//! This crate provides the lowest-level storage abstraction. Storage
//! backends are **opaque byte stores** - they do not interpret the data
//! they store. The header, commit frames and trailers are owned by
//! `chainstore_core`.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, flush, truncate)
//! - No knowledge of commit frames, trailers or checkpoints
//! - Must be `Send + Sync`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use chainstore_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileAccess, FileBackend};
pub use memory::InMemoryBackend;
