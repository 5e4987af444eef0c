//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding, decoding or JSON conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode value to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// NaN values are forbidden.
    #[error("NaN values are forbidden")]
    NaNForbidden,

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes left over after a complete value.
    #[error("{count} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// Invalid CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Unsupported CBOR type.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// A length prefix exceeds the decoder's limits.
    #[error("size limit exceeded: claimed {claimed}, maximum {max_allowed}")]
    SizeLimitExceeded {
        /// The length claimed by the input.
        claimed: u64,
        /// The maximum accepted length.
        max_allowed: u64,
    },

    /// JSON input could not be parsed or converted.
    #[error("JSON error at line {line}, column {column}: {message}")]
    Json {
        /// Description of the JSON error.
        message: String,
        /// 1-based line of the error (0 if unknown).
        line: usize,
        /// 1-based column of the error (0 if unknown).
        column: usize,
    },

    /// A document builder received events in an invalid order.
    #[error("invalid builder event: {message}")]
    BuilderState {
        /// Description of the misuse.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create a builder state error.
    pub fn builder_state(message: impl Into<String>) -> Self {
        Self::BuilderState {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}
