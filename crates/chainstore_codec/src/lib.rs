//! # chainstore codec
//!
//! Document values and their binary encoding for chainstore.
//!
//! Values are stored as canonical CBOR, so that:
//! - Identical documents produce identical bytes
//! - A changed overlay can be detected by comparing encodings
//! - Decoding rejects anything the encoder would never produce
//!
//! ## Canonical CBOR Rules
//!
//! - Dicts have text keys, sorted length-first then bytewise
//! - Integers use shortest encoding
//! - Floats are always 64-bit, never NaN
//! - Strings must be UTF-8
//! - No indefinite-length items, no tags
//!
//! The crate also turns JSON text into documents ([`from_json`]) through
//! an event-driven [`DocumentBuilder`], and provides [`MutableDict`], the
//! patchable overlay the store hands out for in-place edits.
//!
//! ## Usage
//!
//! ```
//! use chainstore_codec::{from_cbor, from_json, to_canonical_cbor, Value};
//!
//! let person = from_json(r#"{"name": "Ada", "age": 36}"#).unwrap();
//! let bytes = to_canonical_cbor(&person).unwrap();
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded.get("age"), Some(&Value::Integer(36)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod mutable;
mod value;

pub use decoder::{
    from_cbor, CanonicalDecoder, MAX_BYTES_LENGTH, MAX_CONTAINER_ELEMENTS, MAX_DEPTH,
};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{emit_json, from_json, json_to_cbor, DocumentBuilder, ValueBuilder};
pub use mutable::MutableDict;
pub use value::{cmp_keys, Value};
