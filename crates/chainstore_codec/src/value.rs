//! Dynamic document value type.

use std::cmp::Ordering;
use std::fmt::Write as _;

/// A structured document value.
///
/// Documents are trees of dicts, arrays and scalars. Dict keys are
/// strings kept in canonical order (shorter keys first, then bytewise),
/// which is the order the encoder writes them in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Double-precision float. NaN cannot be encoded.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Dict of string keys to values, in canonical key order.
    Dict(Vec<(String, Value)>),
}

/// Compares two dict keys in canonical order: length first, then bytewise.
///
/// This is the order of the keys' canonical CBOR encodings.
pub fn cmp_keys(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
        ord => ord,
    }
}

impl Value {
    /// Create a dict value with keys in canonical order.
    ///
    /// If a key appears more than once, the last occurrence wins.
    pub fn dict<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut pairs: Vec<(String, Value)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        // Stable sort keeps insertion order among equal keys.
        pairs.sort_by(|a, b| cmp_keys(&a.0, &b.0));
        let mut deduped: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match deduped.last_mut() {
                Some(last) if last.0 == key => last.1 = value,
                _ => deduped.push((key, value)),
            }
        }
        Value::Dict(deduped)
    }

    /// Creates an empty dict.
    #[must_use]
    pub fn empty_dict() -> Self {
        Value::Dict(Vec::new())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as dict entries, if it is a dict.
    pub fn as_dict(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a key in this dict value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of this value's type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
        }
    }

    /// Renders this value as compact JSON.
    ///
    /// Byte strings render as lowercase hex strings and non-finite floats
    /// as `null`, so the output is always valid JSON.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self).to_string()
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Bytes(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(hex, "{b:02x}");
                }
                serde_json::Value::String(hex)
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Dict(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_keys_are_canonically_ordered() {
        let dict = Value::dict(vec![
            ("abc", Value::Integer(1)),
            ("b", Value::Integer(2)),
            ("a", Value::Integer(3)),
            ("ab", Value::Integer(4)),
        ]);

        let keys: Vec<&str> = dict
            .as_dict()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b", "ab", "abc"]);
    }

    #[test]
    fn dict_duplicate_keys_last_wins() {
        let dict = Value::dict(vec![
            ("name", Value::from("first")),
            ("age", Value::Integer(3)),
            ("name", Value::from("second")),
        ]);

        assert_eq!(dict.as_dict().unwrap().len(), 2);
        assert_eq!(dict.get("name"), Some(&Value::from("second")));
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Integer(2).as_float(), Some(2.0));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
        assert_eq!(Value::empty_dict().as_dict().map(<[_]>::len), Some(0));
    }

    #[test]
    fn dict_get() {
        let person = Value::dict(vec![
            ("name", Value::from("Alice")),
            ("age", Value::Integer(30)),
        ]);

        assert_eq!(person.get("name"), Some(&Value::from("Alice")));
        assert_eq!(person.get("age"), Some(&Value::Integer(30)));
        assert_eq!(person.get("missing"), None);
        assert_eq!(Value::Integer(1).get("name"), None);
    }

    #[test]
    fn json_rendering() {
        let doc = Value::dict(vec![
            ("tags", Value::Array(vec![Value::from("x"), Value::Null])),
            ("raw", Value::Bytes(vec![0xca, 0xfe])),
            ("score", Value::Float(2.5)),
            ("ok", Value::Bool(true)),
        ]);

        let parsed: serde_json::Value = serde_json::from_str(&doc.to_json_string()).unwrap();
        assert_eq!(parsed["tags"][0], "x");
        assert_eq!(parsed["raw"], "cafe");
        assert_eq!(parsed["score"], 2.5);
        assert_eq!(parsed["ok"], true);
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(42u32), Value::Integer(42));
        assert_eq!(Value::from(0.5), Value::Float(0.5));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(vec![1u8, 2, 3]), Value::Bytes(vec![1, 2, 3]));
        assert_eq!(Value::from(()), Value::Null);
    }
}
