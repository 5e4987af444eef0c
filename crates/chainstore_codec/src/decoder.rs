//! Canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_keys, Value};
use std::cmp::Ordering;

/// Decode a single value from CBOR bytes.
///
/// The whole input must be consumed by exactly one value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid canonical CBOR, contain
/// forbidden constructs (NaN, indefinite-length, non-shortest forms) or
/// are followed by trailing bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// This decoder validates that input follows canonical CBOR rules
/// and rejects forbidden constructs.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Maximum allowed element count for arrays and dicts.
pub const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
pub const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Maximum container nesting depth.
///
/// A value may hold at most this many nested arrays and dicts, counting
/// the outermost one.
pub const MAX_DEPTH: usize = 512;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            1 => {
                // Negative integer: value is -(n+1)
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-n - 1))
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            2 => {
                let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            3 => {
                let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
                Ok(Value::Text(self.read_text(len)?.to_string()))
            }
            4 => self.nested(|d| d.decode_array(additional_info)),
            5 => self.nested(|d| d.decode_dict(additional_info)),
            6 => Err(CodecError::unsupported_type("tagged value")),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<T>) -> CodecResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_text(&mut self, len: usize) -> CodecResult<&'a str> {
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let value = u64::from_be_bytes(raw);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            _ => Err(CodecError::IndefiniteLengthForbidden),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len = self.decode_unsigned(additional_info)?;
        if len > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: max,
            });
        }
        usize::try_from(len).map_err(|_| CodecError::SizeLimitExceeded {
            claimed: len,
            max_allowed: max,
        })
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        // Every element takes at least one byte.
        let mut items = Vec::with_capacity(len.min(self.remaining().len()));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_dict(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut pairs: Vec<(String, Value)> = Vec::with_capacity(len.min(self.remaining().len()));

        for _ in 0..len {
            let key_byte = self.read_byte()?;
            if key_byte >> 5 != 3 {
                return Err(CodecError::invalid_structure("dict key is not a text string"));
            }
            let key_len = self.decode_length(key_byte & 0x1f, MAX_BYTES_LENGTH)?;
            let key = self.read_text(key_len)?;

            // Keys must be strictly increasing in canonical order.
            if let Some((prev, _)) = pairs.last() {
                if cmp_keys(prev, key) != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: dict keys not in sorted order",
                    ));
                }
            }

            let value = self.decode()?;
            pairs.push((key.to_string(), value));
        }

        Ok(Value::Dict(pairs))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must be encoded as doubles",
            )),
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let f = f64::from_bits(u64::from_be_bytes(raw));
                if f.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(f))
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}
