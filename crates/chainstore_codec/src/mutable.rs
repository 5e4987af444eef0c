//! Mutable overlay over a decoded dict document.

use crate::encoder::to_canonical_cbor;
use crate::error::CodecResult;
use crate::value::{cmp_keys, Value};

/// A patchable dict document.
///
/// Wraps the entries of a decoded [`Value::Dict`] and tracks whether any
/// edit has been made since it was created. Entries stay in canonical key
/// order, so [`reencode`](Self::reencode) produces the same bytes the
/// encoder would for the equivalent [`Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutableDict {
    entries: Vec<(String, Value)>,
    changed: bool,
}

impl MutableDict {
    /// Creates an empty, unchanged dict.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a dict value. Returns `None` if `value` is not a dict.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Dict(pairs) => {
                let Value::Dict(entries) = Value::dict(pairs) else {
                    return None;
                };
                Some(Self {
                    entries,
                    changed: false,
                })
            }
            _ => None,
        }
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| cmp_keys(k, key))
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).ok().map(|i| &self.entries[i].1)
    }

    /// Returns a mutable reference to the value under `key`.
    ///
    /// The dict counts as changed once a mutable reference is handed out.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let i = self.position(key).ok()?;
        self.changed = true;
        Some(&mut self.entries[i].1)
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Ok(i) => {
                if self.entries[i].1 != value {
                    self.entries[i].1 = value;
                    self.changed = true;
                }
            }
            Err(i) => {
                self.entries.insert(i, (key, value));
                self.changed = true;
            }
        }
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.position(key).ok()?;
        self.changed = true;
        Some(self.entries.remove(i).1)
    }

    /// Removes every entry.
    pub fn remove_all(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.changed = true;
        }
    }

    /// Returns `true` if the dict was edited since it was created.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the dict has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the current content as a [`Value::Dict`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Dict(self.entries.clone())
    }

    /// Encodes the current content to canonical CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested value cannot be encoded (NaN, or
    /// content past the codec's size and depth limits).
    pub fn reencode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&Value::Dict(self.entries.clone()))
    }
}

impl From<MutableDict> for Value {
    fn from(dict: MutableDict) -> Self {
        Value::Dict(dict.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::from_cbor;

    fn person() -> Value {
        Value::dict(vec![
            ("name", Value::from("Ada")),
            ("age", Value::Integer(36)),
        ])
    }

    #[test]
    fn from_value_requires_dict() {
        assert!(MutableDict::from_value(Value::Integer(1)).is_none());
        assert!(MutableDict::from_value(Value::Null).is_none());

        let dict = MutableDict::from_value(person()).unwrap();
        assert_eq!(dict.len(), 2);
        assert!(!dict.is_changed());
    }

    #[test]
    fn set_and_get() {
        let mut dict = MutableDict::from_value(person()).unwrap();
        dict.set("age", 37);
        dict.set("city", "London");

        assert!(dict.is_changed());
        assert_eq!(dict.get("age"), Some(&Value::Integer(37)));
        assert_eq!(dict.get("city"), Some(&Value::from("London")));
        assert_eq!(dict.get("missing"), None);
    }

    #[test]
    fn setting_identical_value_is_not_a_change() {
        let mut dict = MutableDict::from_value(person()).unwrap();
        dict.set("age", 36);
        assert!(!dict.is_changed());
    }

    #[test]
    fn get_mut_marks_changed() {
        let mut dict = MutableDict::from_value(person()).unwrap();
        *dict.get_mut("name").unwrap() = Value::from("Grace");

        assert!(dict.is_changed());
        assert_eq!(dict.get("name"), Some(&Value::from("Grace")));
        assert!(dict.get_mut("missing").is_none());
    }

    #[test]
    fn remove_and_remove_all() {
        let mut dict = MutableDict::from_value(person()).unwrap();
        assert_eq!(dict.remove("age"), Some(Value::Integer(36)));
        assert_eq!(dict.remove("age"), None);
        assert_eq!(dict.len(), 1);

        dict.remove_all();
        assert!(dict.is_empty());
        assert!(dict.is_changed());
    }

    #[test]
    fn iteration_is_canonical() {
        let mut dict = MutableDict::new();
        dict.set("zz", 1);
        dict.set("b", 2);
        dict.set("a", 3);

        let keys: Vec<&str> = dict.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "zz"]);
    }

    #[test]
    fn reencode_matches_value_encoding() {
        let mut dict = MutableDict::from_value(person()).unwrap();
        dict.set("guid", "1234");

        let bytes = dict.reencode().unwrap();
        assert_eq!(bytes, to_canonical_cbor(&dict.to_value()).unwrap());
        assert_eq!(from_cbor(&bytes).unwrap(), dict.to_value());
    }
}
