//! Failed and torn commits.
//!
//! A commit that fails part-way must leave the file either exactly as it
//! was or with a tail that replay rejects.

use chainstore_core::{Checkpoint, OpenMode, Store, Value};
use chainstore_storage::InMemoryBackend;
use chainstore_testkit::prelude::*;
use std::sync::Arc;

fn faulty_store() -> (InMemoryBackend, Arc<FaultPlan>, Store) {
    let memory = InMemoryBackend::new();
    let (backend, plan) = FaultyBackend::new(Box::new(memory.share()));
    let store =
        Store::open_with_backend(Box::new(backend), OpenMode::CreateAndWrite, test_config())
            .unwrap();
    (memory, plan, store)
}

fn reopen(memory: &InMemoryBackend) -> chainstore_core::CoreResult<Store> {
    Store::open_with_backend(
        Box::new(memory.share_read_only()),
        OpenMode::ReadOnly,
        test_config(),
    )
}

fn doc(n: i64) -> Value {
    Value::dict(vec![("n", Value::Integer(n))])
}

#[test]
fn failed_append_is_rolled_back() {
    let (memory, plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    let c1 = store.commit_changes().unwrap();
    let size = memory.data().len();

    store.put(b"b", &doc(2)).unwrap();
    plan.fail_append_after(100);
    assert!(store.commit_changes().is_err());
    assert!(plan.has_tripped());

    assert_eq!(memory.data().len(), size);
    assert_eq!(store.checkpoint(), c1);
    assert!(store.has_changes());
    assert!(store.get(b"b").unwrap().is_some());

    let reopened = reopen(&memory).unwrap();
    assert!(!reopened.is_damaged());
    assert_eq!(reopened.checkpoint(), c1);
    assert!(reopened.get(b"b").unwrap().is_none());

    plan.reset();
    let c2 = store.commit_changes().unwrap();
    assert!(c2 > c1);
    assert_eq!(store.previous_checkpoint(), c1);
}

#[test]
fn failed_sync_is_rolled_back() {
    let (memory, plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    let c1 = store.commit_changes().unwrap();
    let size = memory.data().len();

    store.put(b"b", &doc(2)).unwrap();
    plan.set_fail_sync(true);
    assert!(store.commit_changes().is_err());
    assert_eq!(memory.data().len(), size);
    assert_eq!(store.checkpoint(), c1);

    plan.reset();
    store.commit_changes().unwrap();
    let reopened = reopen(&memory).unwrap();
    assert_eq!(reopened.get(b"b").unwrap(), Some(doc(2)));
}

#[test]
fn unrolled_torn_write_is_damage_then_repaired() {
    let (memory, plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    let c1 = store.commit_changes().unwrap();

    store.put(b"b", &doc(2)).unwrap();
    plan.fail_append_after(50);
    plan.set_fail_truncate(true);
    assert!(store.commit_changes().is_err());

    let reopened = reopen(&memory).unwrap();
    assert!(reopened.is_damaged());
    assert_eq!(reopened.checkpoint(), c1);
    assert_eq!(reopened.recovery().discarded_bytes(), 50);
    drop(reopened);

    // The live store cuts the torn bytes off before its next commit.
    plan.reset();
    let c2 = store.commit_changes().unwrap();
    let reopened = reopen(&memory).unwrap();
    assert!(!reopened.is_damaged());
    assert_eq!(reopened.checkpoint(), c2);
    assert_eq!(reopened.previous_checkpoint(), c1);
}

#[test]
fn torn_write_at_every_offset() {
    // Reference run to learn the frame length.
    let (memory, _plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    let c1 = store.commit_changes().unwrap();
    store.put(b"a", &doc(2)).unwrap();
    store.put(b"b", &doc(3)).unwrap();
    let c2 = store.commit_changes().unwrap();
    drop(store);
    let full = memory.data();
    let frame_len = c2.as_u64() - c1.as_u64();

    for cut in 0..frame_len {
        let memory = InMemoryBackend::with_data(full[..c1.as_u64() as usize].to_vec());
        let (backend, plan) = FaultyBackend::new(Box::new(memory.share()));
        let mut store =
            Store::open_with_backend(Box::new(backend), OpenMode::Write, test_config()).unwrap();
        store.put(b"a", &doc(2)).unwrap();
        store.put(b"b", &doc(3)).unwrap();
        plan.fail_append_after(cut);
        plan.set_fail_truncate(true);
        assert!(store.commit_changes().is_err(), "cut {cut}");
        drop(store);

        let reopened = reopen(&memory).unwrap();
        assert_eq!(reopened.checkpoint(), c1, "cut {cut}");
        assert_eq!(reopened.is_damaged(), cut > 0, "cut {cut}");
        assert_eq!(reopened.get(b"a").unwrap(), Some(doc(1)), "cut {cut}");
        assert!(reopened.get(b"b").unwrap().is_none(), "cut {cut}");
    }
}

#[test]
fn torn_first_commit_never_opens() {
    let (memory, _plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    let c1 = store.commit_changes().unwrap();
    drop(store);
    let full = memory.data();
    let header_end = chainstore_core::log::HEADER_SIZE as u64;

    for cut in header_end + 1..c1.as_u64() {
        let memory = InMemoryBackend::with_data(full[..cut as usize].to_vec());
        let err = reopen(&memory).unwrap_err();
        assert!(err.is_fatal_format(), "cut {cut}: {err}");
    }
}

#[test]
fn uncommitted_changes_are_discarded_on_close() {
    let (memory, _plan, mut store) = faulty_store();
    store.put(b"a", &doc(1)).unwrap();
    store.commit_changes().unwrap();
    store.put(b"b", &doc(2)).unwrap();
    store.get_mutable(b"a").unwrap().unwrap().set("n", 10);
    store.close().unwrap();

    let reopened = reopen(&memory).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(b"a").unwrap(), Some(doc(1)));
    assert_ne!(reopened.checkpoint(), Checkpoint::NONE);
}
