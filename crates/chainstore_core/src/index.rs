//! Committed key/value index.

use crate::log::Mutation;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Committed state: every live key and its encoded value.
///
/// Values are kept encoded and shared, so iterators and snapshots can
/// hold on to them without copying.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: BTreeMap<Vec<u8>, Arc<[u8]>>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the encoded value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Arc<[u8]>> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` is live.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over live entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Arc<[u8]>)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Applies a commit's mutations in order.
    pub fn apply(&mut self, mutations: Vec<Mutation>) {
        for mutation in mutations {
            match mutation {
                Mutation::Put { key, value } => {
                    self.entries.insert(key, Arc::from(value));
                }
                Mutation::Remove { key } => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_put_and_remove() {
        let mut index = Index::new();
        index.apply(vec![
            Mutation::Put {
                key: b"a".to_vec(),
                value: vec![1],
            },
            Mutation::Put {
                key: b"b".to_vec(),
                value: vec![2],
            },
        ]);
        index.apply(vec![
            Mutation::Remove { key: b"a".to_vec() },
            Mutation::Put {
                key: b"b".to_vec(),
                value: vec![3],
            },
            // Removing an absent key is harmless.
            Mutation::Remove { key: b"zz".to_vec() },
        ]);

        assert_eq!(index.len(), 1);
        assert!(!index.contains(b"a"));
        assert_eq!(index.get(b"b").map(|v| &v[..]), Some(&[3u8][..]));
    }

    #[test]
    fn iter_is_key_ordered() {
        let mut index = Index::new();
        for key in ["c", "a", "b"] {
            index.apply(vec![Mutation::Put {
                key: key.as_bytes().to_vec(),
                value: vec![],
            }]);
        }
        let keys: Vec<&[u8]> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&b"a"[..], b"b", b"c"]);
    }
}
