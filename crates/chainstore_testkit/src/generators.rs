//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, documents and operation sequences, plus
//! a model of the expected committed state.

use chainstore_codec::{Value, MAX_DEPTH};
use chainstore_core::{CoreResult, Store};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating valid keys from a small alphabet, so
/// sequences revisit the same keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("[a-f]{1,3}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}

/// Strategy for generating scalar values (no NaN).
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for generating arbitrary nested values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..6)
                .prop_map(|pairs| Value::dict(pairs)),
        ]
    })
}

/// Strategy for generating dict documents.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-z]{1,8}", value_strategy()), 0..6)
        .prop_map(|pairs| Value::dict(pairs))
}

/// Strategy for documents nested at or just past the codec's depth limit.
///
/// Yields the document with its container depth, counting the document
/// itself. Inner levels are arrays, or alternate between arrays and dicts.
pub fn deep_document_strategy() -> impl Strategy<Value = (Value, usize)> {
    (MAX_DEPTH - 2..=MAX_DEPTH + 2, any::<bool>(), scalar_strategy()).prop_map(
        |(depth, mixed, leaf)| {
            let mut value = leaf;
            for level in 1..depth {
                value = if mixed && level % 2 == 0 {
                    Value::dict(vec![("n", value)])
                } else {
                    Value::Array(vec![value])
                };
            }
            (Value::dict(vec![("nested", value)]), depth)
        },
    )
}

/// One step applied to a store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Stage a value.
    Put {
        /// Key
        key: Vec<u8>,
        /// Document
        value: Value,
    },
    /// Stage a removal.
    Remove {
        /// Key
        key: Vec<u8>,
    },
    /// Commit everything staged.
    Commit,
}

/// Strategy for generating store operations.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        4 => (key_strategy(), document_strategy())
            .prop_map(|(key, value)| StoreOperation::Put { key, value }),
        2 => key_strategy().prop_map(|key| StoreOperation::Remove { key }),
        1 => Just(StoreOperation::Commit),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Expected contents of a store, tracked alongside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// State as of the last commit.
    pub committed: BTreeMap<Vec<u8>, Value>,
    /// State including staged operations.
    pub staged: BTreeMap<Vec<u8>, Value>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` to both the store and the model.
    pub fn apply(&mut self, store: &mut Store, op: &StoreOperation) -> CoreResult<()> {
        match op {
            StoreOperation::Put { key, value } => {
                store.put(key, value)?;
                self.staged.insert(key.clone(), value.clone());
            }
            StoreOperation::Remove { key } => {
                store.remove(key)?;
                self.staged.remove(key);
            }
            StoreOperation::Commit => {
                store.commit_changes()?;
                self.committed = self.staged.clone();
            }
        }
        Ok(())
    }
}

/// Reads every live entry of `store` into a map.
pub fn store_contents(store: &Store) -> CoreResult<BTreeMap<Vec<u8>, Value>> {
    store.iter().collect()
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
