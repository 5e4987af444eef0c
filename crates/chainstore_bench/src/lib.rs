//! Benchmark utilities.

#![warn(missing_docs)]

use chainstore_codec::Value;
use chainstore_core::{Config, OpenMode, Store};
use chainstore_storage::InMemoryBackend;
use rand::Rng;

/// Generate a random document with `fields` text and integer fields.
pub fn random_document<R: Rng>(rng: &mut R, fields: usize) -> Value {
    Value::dict((0..fields).map(|i| {
        let value = if i % 2 == 0 {
            Value::Integer(rng.gen())
        } else {
            let len = rng.gen_range(4..32);
            Value::Text((0..len).map(|_| rng.gen_range('a'..='z')).collect())
        };
        (format!("field_{i}"), value)
    }))
}

/// Generate `count` keyed documents.
pub fn generate_documents(count: usize, fields: usize) -> Vec<(Vec<u8>, Value)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            (
                format!("doc-{i:08}").into_bytes(),
                random_document(&mut rng, fields),
            )
        })
        .collect()
}

/// Configuration for benchmark stores: no fsync, so runs measure the
/// engine rather than the disk.
pub fn bench_config() -> Config {
    Config::new().sync_on_commit(false).lock_file(false)
}

/// Opens an empty in-memory store, returning it with a handle on its bytes.
pub fn memory_store() -> (InMemoryBackend, Store) {
    let backend = InMemoryBackend::new();
    let store = Store::open_with_backend(
        Box::new(backend.share()),
        OpenMode::CreateAndWrite,
        bench_config(),
    )
    .unwrap_or_else(|e| panic!("failed to open in-memory store: {e}"));
    (backend, store)
}

/// Builds the bytes of a store holding `commits` commits of `per_commit`
/// documents each.
pub fn build_log(commits: usize, per_commit: usize) -> InMemoryBackend {
    let (backend, mut store) = memory_store();
    let documents = generate_documents(commits * per_commit, 6);
    for chunk in documents.chunks(per_commit.max(1)) {
        for (key, value) in chunk {
            store
                .put(key, value)
                .unwrap_or_else(|e| panic!("put failed: {e}"));
        }
        store
            .commit_changes()
            .unwrap_or_else(|e| panic!("commit failed: {e}"));
    }
    backend
}
