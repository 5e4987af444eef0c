//! JSON ingestion.
//!
//! JSON text is parsed by `serde_json`'s streaming deserializer. Each
//! syntactic event is forwarded synchronously to a [`DocumentBuilder`],
//! so a document can be assembled without an intermediate
//! `serde_json::Value` tree. [`ValueBuilder`] is the builder used by
//! [`from_json`].

use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

/// Receives document construction events.
///
/// Events arrive in document order. A dict is announced by
/// [`begin_dict`](Self::begin_dict) and every member is a
/// [`write_key`](Self::write_key) followed by exactly one value.
pub trait DocumentBuilder {
    /// Starts an array.
    fn begin_array(&mut self) -> CodecResult<()>;
    /// Ends the innermost array.
    fn end_array(&mut self) -> CodecResult<()>;
    /// Starts a dict.
    fn begin_dict(&mut self) -> CodecResult<()>;
    /// Ends the innermost dict.
    fn end_dict(&mut self) -> CodecResult<()>;
    /// Writes the key of the next dict member.
    fn write_key(&mut self, key: &str) -> CodecResult<()>;
    /// Writes a scalar value (null, bool, number or text).
    fn write_scalar(&mut self, value: Value) -> CodecResult<()>;
}

/// Parses JSON text into a [`Value`].
///
/// Integers that do not fit in `i64` become floats. Duplicate object
/// keys keep the last value.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed input.
pub fn from_json(json: &str) -> CodecResult<Value> {
    let mut builder = ValueBuilder::new();
    emit_json(json, &mut builder)?;
    builder.finish()
}

/// Parses JSON text and encodes it as canonical CBOR.
///
/// # Errors
///
/// Returns an error for malformed JSON.
pub fn json_to_cbor(json: &str) -> CodecResult<Vec<u8>> {
    to_canonical_cbor(&from_json(json)?)
}

/// Parses JSON text, dispatching every event into `builder`.
///
/// The input must hold exactly one JSON value, optionally surrounded by
/// whitespace.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed input, or the builder's own
/// error if it rejected an event.
pub fn emit_json<B: DocumentBuilder>(json: &str, builder: &mut B) -> CodecResult<()> {
    let mut de = serde_json::Deserializer::from_str(json);
    let mut failure = None;
    let result = Emit {
        builder,
        failure: &mut failure,
    }
    .deserialize(&mut de);

    if let Some(err) = failure {
        return Err(err);
    }
    result?;
    de.end()?;
    Ok(())
}

/// Records a builder error so it can be surfaced unchanged once the
/// deserializer unwinds.
fn stash<E: de::Error>(failure: &mut Option<CodecError>, result: CodecResult<()>) -> Result<(), E> {
    result.map_err(|err| {
        let message = err.to_string();
        *failure = Some(err);
        E::custom(message)
    })
}

struct Emit<'a, B> {
    builder: &'a mut B,
    failure: &'a mut Option<CodecError>,
}

impl<'de, B: DocumentBuilder> DeserializeSeed<'de> for Emit<'_, B> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, B: DocumentBuilder> Visitor<'de> for Emit<'_, B> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        stash(self.failure, self.builder.write_scalar(Value::Null))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        stash(self.failure, self.builder.write_scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        stash(self.failure, self.builder.write_scalar(Value::Integer(v)))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        let value = i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer);
        stash(self.failure, self.builder.write_scalar(value))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        stash(self.failure, self.builder.write_scalar(Value::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        stash(self.failure, self.builder.write_scalar(Value::from(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        stash(&mut *self.failure, self.builder.begin_array())?;
        while seq
            .next_element_seed(Emit {
                builder: &mut *self.builder,
                failure: &mut *self.failure,
            })?
            .is_some()
        {}
        stash(self.failure, self.builder.end_array())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        stash(&mut *self.failure, self.builder.begin_dict())?;
        while map
            .next_key_seed(Key {
                builder: &mut *self.builder,
                failure: &mut *self.failure,
            })?
            .is_some()
        {
            map.next_value_seed(Emit {
                builder: &mut *self.builder,
                failure: &mut *self.failure,
            })?;
        }
        stash(self.failure, self.builder.end_dict())
    }
}

struct Key<'a, B> {
    builder: &'a mut B,
    failure: &'a mut Option<CodecError>,
}

impl<'de, B: DocumentBuilder> DeserializeSeed<'de> for Key<'_, B> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de, B: DocumentBuilder> Visitor<'de> for Key<'_, B> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        stash(self.failure, self.builder.write_key(v))
    }
}

enum Frame {
    Array(Vec<Value>),
    Dict {
        pairs: Vec<(String, Value)>,
        key: Option<String>,
    },
}

/// Builds a [`Value`] from document events using an explicit frame stack.
#[derive(Default)]
pub struct ValueBuilder {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl ValueBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the finished document.
    ///
    /// # Errors
    ///
    /// Fails if a container is still open or no value was written.
    pub fn finish(self) -> CodecResult<Value> {
        if !self.stack.is_empty() {
            return Err(CodecError::builder_state("unterminated container"));
        }
        self.root
            .ok_or_else(|| CodecError::builder_state("no value was written"))
    }

    fn push_value(&mut self, value: Value) -> CodecResult<()> {
        match self.stack.last_mut() {
            None if self.root.is_some() => Err(CodecError::builder_state("multiple root values")),
            None => {
                self.root = Some(value);
                Ok(())
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Dict { pairs, key }) => {
                let key = key
                    .take()
                    .ok_or_else(|| CodecError::builder_state("dict value without a key"))?;
                pairs.push((key, value));
                Ok(())
            }
        }
    }
}

impl DocumentBuilder for ValueBuilder {
    fn begin_array(&mut self) -> CodecResult<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> CodecResult<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push_value(Value::Array(items)),
            _ => Err(CodecError::builder_state("end_array without begin_array")),
        }
    }

    fn begin_dict(&mut self) -> CodecResult<()> {
        self.stack.push(Frame::Dict {
            pairs: Vec::new(),
            key: None,
        });
        Ok(())
    }

    fn end_dict(&mut self) -> CodecResult<()> {
        match self.stack.pop() {
            Some(Frame::Dict { pairs, key: None }) => self.push_value(Value::dict(pairs)),
            Some(Frame::Dict { key: Some(_), .. }) => {
                Err(CodecError::builder_state("dict ended after a dangling key"))
            }
            _ => Err(CodecError::builder_state("end_dict without begin_dict")),
        }
    }

    fn write_key(&mut self, key: &str) -> CodecResult<()> {
        match self.stack.last_mut() {
            Some(Frame::Dict { key: slot, .. }) => {
                if slot.is_some() {
                    return Err(CodecError::builder_state("two keys in a row"));
                }
                *slot = Some(key.to_string());
                Ok(())
            }
            _ => Err(CodecError::builder_state("key outside of a dict")),
        }
    }

    fn write_scalar(&mut self, value: Value) -> CodecResult<()> {
        self.push_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::from_cbor;

    #[test]
    fn parse_person() {
        let value = from_json(
            r#"{"guid": "a1", "name": {"first": "Ada", "last": "Lovelace"},
                "age": 36, "balance": 12.5, "active": true, "tags": ["x", null]}"#,
        )
        .unwrap();

        assert_eq!(value.get("guid"), Some(&Value::from("a1")));
        assert_eq!(value.get("age"), Some(&Value::Integer(36)));
        assert_eq!(value.get("balance"), Some(&Value::Float(12.5)));
        assert_eq!(value.get("active"), Some(&Value::Bool(true)));
        assert_eq!(
            value.get("name").and_then(|n| n.get("last")),
            Some(&Value::from("Lovelace"))
        );
        assert_eq!(
            value.get("tags"),
            Some(&Value::Array(vec![Value::from("x"), Value::Null]))
        );
    }

    #[test]
    fn scalar_roots() {
        assert_eq!(from_json("null").unwrap(), Value::Null);
        assert_eq!(from_json(" -7 ").unwrap(), Value::Integer(-7));
        assert_eq!(from_json(r#""a\nb""#).unwrap(), Value::from("a\nb"));
    }

    #[test]
    fn integer_overflow_becomes_float() {
        assert_eq!(
            from_json("9223372036854775807").unwrap(),
            Value::Integer(i64::MAX)
        );
        assert_eq!(
            from_json("18446744073709551615").unwrap(),
            Value::Float(2f64.powi(64))
        );
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let value = from_json(r#"{"a": 1, "a": 2}"#).unwrap();
        assert_eq!(value, Value::dict(vec![("a", Value::Integer(2))]));
    }

    #[test]
    fn malformed_json_reports_position() {
        let err = from_json("{\n  \"a\": }").unwrap_err();
        match err {
            CodecError::Json { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(from_json("[1, 2"), Err(CodecError::Json { .. })));
        assert!(matches!(from_json("1 2"), Err(CodecError::Json { .. })));
    }

    #[test]
    fn json_to_cbor_is_canonical() {
        let bytes = json_to_cbor(r#"{"bb": 2, "a": 1}"#).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
        assert!(from_cbor(&bytes).is_ok());
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl DocumentBuilder for Recorder {
        fn begin_array(&mut self) -> CodecResult<()> {
            self.events.push("[".into());
            Ok(())
        }
        fn end_array(&mut self) -> CodecResult<()> {
            self.events.push("]".into());
            Ok(())
        }
        fn begin_dict(&mut self) -> CodecResult<()> {
            self.events.push("{".into());
            Ok(())
        }
        fn end_dict(&mut self) -> CodecResult<()> {
            self.events.push("}".into());
            Ok(())
        }
        fn write_key(&mut self, key: &str) -> CodecResult<()> {
            self.events.push(format!("k:{key}"));
            Ok(())
        }
        fn write_scalar(&mut self, value: Value) -> CodecResult<()> {
            if value.as_text() == Some("stop") {
                return Err(CodecError::builder_state("stop requested"));
            }
            self.events.push(value.to_json_string());
            Ok(())
        }
    }

    #[test]
    fn events_arrive_in_document_order() {
        let mut recorder = Recorder::default();
        emit_json(r#"{"a": [1, {"b": null}], "c": "d"}"#, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec!["{", "k:a", "[", "1", "{", "k:b", "null", "}", "]", "k:c", "\"d\"", "}"]
        );
    }

    #[test]
    fn builder_errors_surface_unchanged() {
        let mut recorder = Recorder::default();
        let err = emit_json(r#"[1, "stop", 3]"#, &mut recorder).unwrap_err();
        assert_eq!(err, CodecError::builder_state("stop requested"));
    }

    #[test]
    fn value_builder_rejects_misuse() {
        let mut builder = ValueBuilder::new();
        assert!(builder.end_array().is_err());

        let mut builder = ValueBuilder::new();
        builder.begin_dict().unwrap();
        assert!(builder.write_scalar(Value::Null).is_err());

        let mut builder = ValueBuilder::new();
        builder.begin_array().unwrap();
        assert!(builder.write_key("a").is_err());

        let mut builder = ValueBuilder::new();
        builder.begin_array().unwrap();
        assert!(builder.finish().is_err());

        let mut builder = ValueBuilder::new();
        builder.write_scalar(Value::Integer(1)).unwrap();
        assert!(builder.write_scalar(Value::Integer(2)).is_err());
    }
}
