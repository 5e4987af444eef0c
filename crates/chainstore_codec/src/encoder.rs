//! Canonical CBOR encoder.

use crate::decoder::{MAX_BYTES_LENGTH, MAX_CONTAINER_ELEMENTS, MAX_DEPTH};
use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_keys, Value};

/// Encode a value to canonical CBOR bytes.
///
/// This function produces deterministic output following the canonical
/// CBOR rules of RFC 8949 Section 4.2.1:
/// - Dict keys are written in canonical order (length-first, then bytewise)
/// - Integers and lengths use the shortest possible encoding
/// - Floats are always written as doubles
/// - No indefinite-length encoding
///
/// Values the decoder would refuse are refused here too: nesting deeper
/// than [`MAX_DEPTH`], containers over [`MAX_CONTAINER_ELEMENTS`] and
/// strings or byte strings over [`MAX_BYTES_LENGTH`].
///
/// # Errors
///
/// Returns an error if the value contains NaN, a dict with duplicate keys,
/// or exceeds one of the decoder's limits.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            depth: 0,
        }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// See [`to_canonical_cbor`]. On error the buffer may hold a partial
    /// encoding and should be discarded.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f)?,
            Value::Bytes(b) => {
                check_len(b.len(), MAX_BYTES_LENGTH)?;
                self.encode_unsigned(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => self.encode_text(s)?,
            Value::Array(arr) => self.nested(|e| {
                check_len(arr.len(), MAX_CONTAINER_ELEMENTS)?;
                e.encode_unsigned(4, arr.len() as u64);
                for item in arr {
                    e.encode(item)?;
                }
                Ok(())
            })?,
            Value::Dict(pairs) => self.nested(|e| e.encode_dict(pairs))?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<()>) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::encoding_failed(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            self.encode_unsigned(1, (-(n + 1)) as u64);
        }
    }

    fn encode_float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) -> CodecResult<()> {
        check_len(text.len(), MAX_BYTES_LENGTH)?;
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn encode_dict(&mut self, pairs: &[(String, Value)]) -> CodecResult<()> {
        // Values built through `Value::dict` are already ordered; sort a view
        // anyway so hand-built dicts still encode canonically.
        let mut ordered: Vec<&(String, Value)> = pairs.iter().collect();
        ordered.sort_by(|a, b| cmp_keys(&a.0, &b.0));
        if ordered.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::encoding_failed("duplicate dict key"));
        }

        check_len(pairs.len(), MAX_CONTAINER_ELEMENTS)?;
        self.encode_unsigned(5, pairs.len() as u64);
        for (key, value) in ordered {
            self.encode_text(key)?;
            self.encode(value)?;
        }
        Ok(())
    }
}

fn check_len(len: usize, max: u64) -> CodecResult<()> {
    let claimed = len as u64;
    if claimed > max {
        return Err(CodecError::SizeLimitExceeded {
            claimed,
            max_allowed: max,
        });
    }
    Ok(())
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}
