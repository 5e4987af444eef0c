//! # chainstore testkit
//!
//! Test utilities for chainstore.
//!
//! This crate provides:
//! - Temporary store fixtures
//! - Property-based test generators using proptest
//! - File corruption helpers and a fault-injecting backend
//! - A random person-document generator
//!
//! The recovery properties and end-to-end scenarios live in `tests/`.
//!
//! ## Usage
//!
//! ```rust
//! use chainstore_testkit::prelude::*;
//!
//! let temp = TempStore::new();
//! let mut store = temp.create();
//! store.put(b"k", &chainstore_core::Value::Integer(1)).unwrap();
//! store.commit_changes().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corruption;
pub mod fixtures;
pub mod generators;
pub mod person;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::corruption::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::person::*;
}

pub use corruption::*;
pub use fixtures::*;
pub use generators::*;
pub use person::*;
