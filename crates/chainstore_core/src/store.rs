//! Store facade and recovery.

use crate::compaction::{ensure_distinct, Compactor};
use crate::config::{Config, OpenMode};
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::iter::{Captured, Iter};
use crate::log::{replay, validate_key, Header, LogWriter, RecoveryReport, HEADER_SIZE};
use crate::transaction::{pending_value, OverlayOrigin, PendingWrite, TransactionBuffer};
use crate::types::Checkpoint;
use chainstore_codec::{from_cbor, to_canonical_cbor, MutableDict, Value};
use chainstore_storage::{FileAccess, FileBackend, StorageBackend, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An open store file.
///
/// `Store` owns the committed index rebuilt by replay and a buffer of
/// changes staged since the last commit. Reads see staged changes first;
/// nothing reaches the file until [`commit_changes`](Self::commit_changes).
///
/// # Opening a Store
///
/// ```rust,no_run
/// use chainstore_core::{OpenMode, Store, Value};
/// use std::path::Path;
///
/// let mut store = Store::open(Path::new("people.chain"), OpenMode::CreateAndWrite)?;
/// store.put(b"ada", &Value::dict(vec![("name", Value::from("Ada"))]))?;
/// let checkpoint = store.commit_changes()?;
///
/// if store.is_damaged() {
///     eprintln!("the file had an unreadable tail");
/// }
/// # Ok::<(), chainstore_core::CoreError>(())
/// ```
///
/// # Snapshots
///
/// [`open_at`](Self::open_at) replays the same file up to an earlier
/// checkpoint. The result is an independent, read-only store.
pub struct Store {
    /// File path. None for stores over a caller-supplied backend.
    path: Option<PathBuf>,
    /// Mode the store was opened with.
    mode: OpenMode,
    /// Configuration.
    config: Config,
    /// Header of the file.
    header: Header,
    /// Commit writer (owns the backend). None for snapshots.
    log: Option<LogWriter>,
    /// Committed state.
    index: Index,
    /// Staged changes.
    buffer: TransactionBuffer,
    /// Current checkpoint.
    checkpoint: Checkpoint,
    /// Checkpoint before the current one.
    previous: Checkpoint,
    /// What replay found when the store was opened.
    recovery: RecoveryReport,
}

impl Store {
    /// Opens the store file at `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing (`Write`, `ReadOnly`) or cannot be opened
    /// - The header is invalid, or the file holds no valid commit
    ///   (`InvalidFormat`)
    /// - Another handle has the file locked (`DatabaseLocked`)
    pub fn open(path: &Path, mode: OpenMode) -> CoreResult<Self> {
        Self::open_with_config(path, mode, Config::default())
    }

    /// Opens the store file at `path` with a custom configuration.
    ///
    /// With [`OpenMode::CreateAndWrite`] a missing or empty file is
    /// initialised with a header. A file whose tail cannot be read opens
    /// successfully with [`is_damaged`](Self::is_damaged) set.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_config(path: &Path, mode: OpenMode, config: Config) -> CoreResult<Self> {
        let access = match mode {
            OpenMode::CreateAndWrite => FileAccess::Create,
            OpenMode::Write => FileAccess::ReadWrite,
            OpenMode::ReadOnly => FileAccess::ReadOnly,
        };
        let backend = FileBackend::open_with(path, access)?;

        if config.lock_file {
            backend
                .try_lock(mode.is_writable())
                .map_err(|err| match err {
                    StorageError::Locked => CoreError::DatabaseLocked,
                    other => CoreError::Storage(other),
                })?;
        }

        let mut store = Self::open_with_backend(Box::new(backend), mode, config)?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Opens a store over an existing backend.
    ///
    /// Used for in-memory stores and for tests that inject faults below
    /// the log.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for an unusable file, or a storage error.
    pub fn open_with_backend(
        mut backend: Box<dyn StorageBackend>,
        mode: OpenMode,
        config: Config,
    ) -> CoreResult<Self> {
        config.validate()?;

        let size = backend.size()?;
        let header = if size == 0 {
            if mode != OpenMode::CreateAndWrite {
                return Err(CoreError::invalid_format("file is empty"));
            }
            let header = Header::new(config.page_size);
            backend.append(&header.encode())?;
            backend.sync()?;
            info!(page_size = header.page_size, "store file initialised");
            header
        } else if size < HEADER_SIZE as u64 {
            return Err(CoreError::invalid_format(format!(
                "file too short for header: {size} bytes"
            )));
        } else {
            Header::decode(&backend.read_at(0, HEADER_SIZE)?)?
        };

        let replayed = replay(backend.as_ref(), &header, None, config.verify_values)?;
        let report = replayed.report;
        match &report.fault {
            Some(fault) => warn!(
                %fault,
                checkpoint = %replayed.checkpoint,
                commits = report.commits_applied,
                discarded = report.discarded_bytes(),
                "store opened with damaged tail"
            ),
            None => info!(
                checkpoint = %replayed.checkpoint,
                commits = report.commits_applied,
                keys = replayed.index.len(),
                "store opened"
            ),
        }

        let log = LogWriter::new(
            backend,
            header.page_size,
            config.sync_on_commit,
            report.valid_end,
            replayed.checkpoint,
        );

        Ok(Self {
            path: None,
            mode,
            config,
            header,
            log: Some(log),
            index: replayed.index,
            buffer: TransactionBuffer::new(),
            checkpoint: replayed.checkpoint,
            previous: replayed.previous,
            recovery: report,
        })
    }

    /// Opens a read-only snapshot of this store's file at `checkpoint`.
    ///
    /// The file is replayed again, stopping right after the commit that
    /// reaches `checkpoint`. Staged changes of this store are not visible
    /// in the snapshot, and later commits do not affect it.
    ///
    /// # Errors
    ///
    /// - `CheckpointNotFound` if replay never reaches `checkpoint`
    /// - `InvalidOperation` if called on a snapshot
    pub fn open_at(&self, checkpoint: Checkpoint) -> CoreResult<Self> {
        let log = self
            .log
            .as_ref()
            .ok_or_else(|| CoreError::invalid_operation("cannot open a snapshot of a snapshot"))?;

        let replayed = replay(
            log.backend(),
            &self.header,
            Some(checkpoint),
            self.config.verify_values,
        )?;
        debug!(
            checkpoint = %checkpoint,
            keys = replayed.index.len(),
            "snapshot opened"
        );

        Ok(Self {
            path: self.path.clone(),
            mode: OpenMode::ReadOnly,
            config: self.config.clone(),
            header: self.header,
            log: None,
            index: replayed.index,
            buffer: TransactionBuffer::new(),
            checkpoint: replayed.checkpoint,
            previous: replayed.previous,
            recovery: replayed.report,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns the current value of `key`, or `None` if it is not live.
    ///
    /// Staged changes take precedence over the committed value.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored bytes cannot be decoded.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Value>> {
        if let Some(write) = self.buffer.get(key) {
            return pending_value(write);
        }
        match self.index.get(key) {
            Some(bytes) => Ok(Some(from_cbor(bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if `key` is live, counting staged changes.
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.buffer.get(key) {
            Some(write) => write.is_live(),
            None => self.index.contains(key),
        }
    }

    /// Number of live keys, counting staged changes.
    pub fn len(&self) -> usize {
        let mut count = self.index.len();
        for (key, write) in self.buffer.iter() {
            match (self.index.contains(key), write.is_live()) {
                (true, false) => count -= 1,
                (false, true) => count += 1,
                _ => {}
            }
        }
        count
    }

    /// Returns `true` if no key is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every live `(key, value)` pair in key order.
    ///
    /// The set of entries is captured now; staging or committing changes
    /// afterwards does not affect the iterator. Values are decoded lazily.
    pub fn iter(&self) -> Iter {
        let mut entries: Vec<(Vec<u8>, Captured)> = self
            .index
            .iter()
            .filter(|(key, _)| self.buffer.get(key).is_none())
            .map(|(key, value)| (key.to_vec(), Captured::Encoded(Arc::clone(value))))
            .collect();

        for (key, write) in self.buffer.iter() {
            let captured = match write {
                PendingWrite::Put { payload } => Captured::Encoded(Arc::from(payload.as_slice())),
                PendingWrite::Overlay { dict, .. } if write.is_live() => {
                    Captured::Decoded(dict.to_value())
                }
                _ => continue,
            };
            entries.push((key.clone(), captured));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Iter::new(entries)
    }

    // ========================================================================
    // Staged writes
    // ========================================================================

    /// Stages `value` for `key`, replacing any staged or committed value.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` for read-only stores and snapshots
    /// - `InvalidArgument` for empty or oversized keys
    /// - Codec errors if `value` cannot be encoded (NaN floats)
    pub fn put(&mut self, key: &[u8], value: &Value) -> CoreResult<()> {
        self.ensure_writable()?;
        validate_key(key)?;
        let payload = to_canonical_cbor(value)?;
        self.buffer
            .stage(key.to_vec(), PendingWrite::Put { payload });
        Ok(())
    }

    /// Stages `value` for `key`, failing if `key` is already live.
    ///
    /// # Errors
    ///
    /// `KeyExists` if `key` is live; otherwise as [`put`](Self::put).
    pub fn insert(&mut self, key: &[u8], value: &Value) -> CoreResult<()> {
        self.ensure_writable()?;
        if self.contains(key) {
            return Err(CoreError::key_exists(key));
        }
        self.put(key, value)
    }

    /// Stages removal of `key`. Removing an absent key does nothing.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for read-only stores and snapshots; `InvalidArgument`
    /// for invalid keys.
    pub fn remove(&mut self, key: &[u8]) -> CoreResult<()> {
        self.ensure_writable()?;
        validate_key(key)?;
        if self.index.contains(key) {
            self.buffer.stage(key.to_vec(), PendingWrite::Remove);
        } else {
            self.buffer.discard(key);
        }
        Ok(())
    }

    /// Returns the overlay for `key`, creating it on first request.
    ///
    /// The overlay is seeded from the current value, or empty if the key
    /// is not live. Every request for the same key before the next commit
    /// returns the same overlay, and its edits show up in
    /// [`get`](Self::get) and [`iter`](Self::iter) immediately.
    ///
    /// Returns `None` if the current value is not a dict.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for read-only stores and snapshots; codec errors if the
    /// current value cannot be decoded.
    pub fn get_mutable(&mut self, key: &[u8]) -> CoreResult<Option<&mut MutableDict>> {
        self.ensure_writable()?;
        validate_key(key)?;

        if self.buffer.overlay_mut(key).is_none() {
            let seeded = match self.buffer.get(key) {
                Some(PendingWrite::Put { payload }) => {
                    MutableDict::from_value(from_cbor(payload)?).map(|d| (d, OverlayOrigin::Staged))
                }
                Some(_) => Some((MutableDict::new(), OverlayOrigin::Absent)),
                None => match self.index.get(key) {
                    Some(bytes) => MutableDict::from_value(from_cbor(bytes)?)
                        .map(|d| (d, OverlayOrigin::Committed)),
                    None => Some((MutableDict::new(), OverlayOrigin::Absent)),
                },
            };
            let Some((dict, origin)) = seeded else {
                return Ok(None);
            };
            self.buffer
                .stage(key.to_vec(), PendingWrite::Overlay { dict, origin });
        }

        Ok(self.buffer.overlay_mut(key))
    }

    /// Returns `true` if any change is staged.
    pub fn has_changes(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discards every staged change and overlay.
    pub fn revert_changes(&mut self) {
        if !self.buffer.is_empty() {
            debug!(entries = self.buffer.len(), "staged changes reverted");
        }
        self.buffer.clear();
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Writes every staged change as one commit and returns its checkpoint.
    ///
    /// The commit is durable when this returns. If nothing would change
    /// the file, no commit is written and the current checkpoint is
    /// returned.
    ///
    /// On failure the staged changes are kept, the committed state is
    /// unchanged, and the file still ends at the last valid commit.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for read-only stores and snapshots, or any encoding or
    /// storage error from the write.
    pub fn commit_changes(&mut self) -> CoreResult<Checkpoint> {
        self.ensure_writable()?;
        if self.buffer.is_empty() {
            return Ok(self.checkpoint);
        }

        let mutations = self.buffer.to_mutations(&self.index)?;
        if mutations.is_empty() {
            self.buffer.clear();
            return Ok(self.checkpoint);
        }

        let log = self.log.as_mut().ok_or(CoreError::ReadOnly)?;
        let count = mutations.len();
        let checkpoint = log.append_commit(&mutations)?;

        self.index.apply(mutations);
        self.previous = self.checkpoint;
        self.checkpoint = checkpoint;
        self.buffer.clear();

        info!(
            checkpoint = %checkpoint,
            previous = %self.previous,
            mutations = count,
            "changes committed"
        );
        Ok(checkpoint)
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Writes the committed live state to a new file at `path`.
    ///
    /// The new file holds a header and a single commit with every live
    /// key; its previous checkpoint is 0. Staged changes are not written.
    /// This store and its file are not modified.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `path` is this store's own file; otherwise any
    /// I/O error.
    pub fn write_to(&self, path: &Path) -> CoreResult<Checkpoint> {
        ensure_distinct(self.path.as_deref(), path)?;
        let result = Compactor::new(self.header.page_size).export(&self.index, path)?;
        Ok(result.into())
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Returns the checkpoint of the last commit (0 if none).
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// Returns the checkpoint before the current one (0 if none).
    pub fn previous_checkpoint(&self) -> Checkpoint {
        self.previous
    }

    /// Returns `true` if replay stopped before the end of the file when
    /// this store was opened.
    ///
    /// The flag is diagnostic only: the store stays fully usable, and the
    /// next commit cuts the unreadable tail off.
    pub fn is_damaged(&self) -> bool {
        self.recovery.is_damaged()
    }

    /// Returns what replay found when the store was opened.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Returns `true` if writes are rejected.
    pub fn is_read_only(&self) -> bool {
        !self.mode.is_writable() || self.log.is_none()
    }

    /// Returns `true` for snapshots opened with [`open_at`](Self::open_at).
    pub fn is_snapshot(&self) -> bool {
        self.log.is_none()
    }

    /// Returns the file path, if the store was opened from one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the open mode.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the page size recorded in the file header.
    pub fn page_size(&self) -> u32 {
        self.header.page_size
    }

    /// Closes the store, discarding staged changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(mut self) -> CoreResult<()> {
        if !self.buffer.is_empty() {
            warn!(
                entries = self.buffer.len(),
                "closing store with uncommitted changes"
            );
        }
        if let Some(log) = self.log.as_mut() {
            if self.mode.is_writable() {
                log.sync()?;
            }
        }
        Ok(())
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.is_read_only() {
            Err(CoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("checkpoint", &self.checkpoint)
            .field("previous", &self.previous)
            .field("keys", &self.index.len())
            .field("staged", &self.buffer.len())
            .field("damaged", &self.is_damaged())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstore_storage::InMemoryBackend;

    fn config() -> Config {
        Config::new().page_size(256).lock_file(false)
    }

    fn create() -> (InMemoryBackend, Store) {
        let backend = InMemoryBackend::new();
        let store =
            Store::open_with_backend(Box::new(backend.share()), OpenMode::CreateAndWrite, config())
                .unwrap();
        (backend, store)
    }

    fn reopen(backend: &InMemoryBackend) -> CoreResult<Store> {
        Store::open_with_backend(Box::new(backend.share()), OpenMode::Write, config())
    }

    fn person(name: &str, age: i64) -> Value {
        Value::dict(vec![("name", Value::from(name)), ("age", Value::Integer(age))])
    }

    #[test]
    fn new_store_is_empty() {
        let (backend, store) = create();
        assert!(store.is_empty());
        assert!(store.checkpoint().is_none());
        assert!(!store.is_damaged());
        assert_eq!(backend.data().len(), HEADER_SIZE);
    }

    #[test]
    fn empty_file_requires_create_mode() {
        let err = Store::open_with_backend(
            Box::new(InMemoryBackend::new()),
            OpenMode::Write,
            config(),
        )
        .unwrap_err();
        assert!(err.is_fatal_format());
    }

    #[test]
    fn header_only_file_opens_empty() {
        let (backend, store) = create();
        drop(store);
        let store = reopen(&backend).unwrap();
        assert!(store.is_empty());
        assert!(!store.is_damaged());
    }

    #[test]
    fn staged_changes_are_visible_before_commit() {
        let (_backend, mut store) = create();
        store.put(b"ada", &person("Ada", 36)).unwrap();

        assert!(store.has_changes());
        assert_eq!(store.get(b"ada").unwrap(), Some(person("Ada", 36)));
        assert!(store.checkpoint().is_none());
    }

    #[test]
    fn commit_persists_and_advances_checkpoint() {
        let (backend, mut store) = create();
        store.put(b"ada", &person("Ada", 36)).unwrap();
        let c1 = store.commit_changes().unwrap();
        store.put(b"bob", &person("Bob", 41)).unwrap();
        let c2 = store.commit_changes().unwrap();

        assert!(c2 > c1);
        assert_eq!(store.previous_checkpoint(), c1);
        assert!(!store.has_changes());
        drop(store);

        let store = reopen(&backend).unwrap();
        assert_eq!(store.checkpoint(), c2);
        assert_eq!(store.previous_checkpoint(), c1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"bob").unwrap(), Some(person("Bob", 41)));
    }

    #[test]
    fn empty_commit_is_noop() {
        let (backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        let c1 = store.commit_changes().unwrap();
        let size = backend.data().len();

        assert_eq!(store.commit_changes().unwrap(), c1);
        // Removing an absent key stages nothing.
        store.remove(b"missing").unwrap();
        assert_eq!(store.commit_changes().unwrap(), c1);
        assert_eq!(backend.data().len(), size);
    }

    #[test]
    fn put_is_upsert_and_insert_is_strict() {
        let (_backend, mut store) = create();
        store.put(b"k", &Value::Integer(1)).unwrap();
        store.put(b"k", &Value::Integer(2)).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(Value::Integer(2)));

        let err = store.insert(b"k", &Value::Integer(3)).unwrap_err();
        assert!(matches!(err, CoreError::KeyExists { .. }));
        store.insert(b"other", &Value::Integer(3)).unwrap();
    }

    #[test]
    fn remove_committed_and_staged_keys() {
        let (_backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        store.commit_changes().unwrap();

        store.put(b"b", &Value::Integer(2)).unwrap();
        store.remove(b"b").unwrap();
        store.remove(b"a").unwrap();
        assert!(!store.contains(b"a"));
        assert!(!store.contains(b"b"));
        assert_eq!(store.len(), 0);

        store.commit_changes().unwrap();
        assert!(store.get(b"a").unwrap().is_none());
    }

    #[test]
    fn overlay_is_shared_until_commit() {
        let (_backend, mut store) = create();
        store.put(b"ada", &person("Ada", 36)).unwrap();
        store.commit_changes().unwrap();

        store.get_mutable(b"ada").unwrap().unwrap().set("age", 37);
        let age = store
            .get_mutable(b"ada")
            .unwrap()
            .unwrap()
            .get("age")
            .cloned();
        assert_eq!(age, Some(Value::Integer(37)));
        assert_eq!(store.get(b"ada").unwrap(), Some(person("Ada", 37)));

        let before = store.checkpoint();
        assert!(store.commit_changes().unwrap() > before);
        assert_eq!(store.get(b"ada").unwrap(), Some(person("Ada", 37)));
    }

    #[test]
    fn overlay_on_absent_key_creates_it_only_when_edited() {
        let (_backend, mut store) = create();
        assert!(store.get_mutable(b"new").unwrap().unwrap().is_empty());
        assert!(!store.contains(b"new"));
        assert_eq!(store.commit_changes().unwrap(), Checkpoint::NONE);

        store.get_mutable(b"new").unwrap().unwrap().set("x", 1);
        assert!(store.contains(b"new"));
        store.commit_changes().unwrap();
        assert_eq!(
            store.get(b"new").unwrap(),
            Some(Value::dict(vec![("x", Value::Integer(1))]))
        );
    }

    #[test]
    fn overlay_on_non_dict_is_none() {
        let (_backend, mut store) = create();
        store.put(b"n", &Value::Integer(5)).unwrap();
        assert!(store.get_mutable(b"n").unwrap().is_none());
    }

    #[test]
    fn revert_discards_everything() {
        let (_backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        store.get_mutable(b"b").unwrap().unwrap().set("x", 1);
        store.revert_changes();

        assert!(!store.has_changes());
        assert!(store.is_empty());
    }

    #[test]
    fn iterator_merges_and_is_isolated() {
        let (_backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        store.put(b"c", &Value::Integer(3)).unwrap();
        store.commit_changes().unwrap();
        store.put(b"b", &Value::Integer(2)).unwrap();
        store.remove(b"c").unwrap();

        let iter = store.iter();
        store.put(b"d", &Value::Integer(4)).unwrap();

        let items: Vec<_> = iter.map(Result::unwrap).collect();
        assert_eq!(
            items,
            vec![
                (b"a".to_vec(), Value::Integer(1)),
                (b"b".to_vec(), Value::Integer(2)),
            ]
        );
        assert_eq!(store.iter().len(), 3);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let (backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        store.commit_changes().unwrap();
        drop(store);

        let mut store = Store::open_with_backend(
            Box::new(backend.share_read_only()),
            OpenMode::ReadOnly,
            config(),
        )
        .unwrap();
        assert!(store.is_read_only());
        assert_eq!(store.get(b"a").unwrap(), Some(Value::Integer(1)));
        assert!(matches!(
            store.put(b"b", &Value::Null),
            Err(CoreError::ReadOnly)
        ));
        assert!(matches!(store.remove(b"a"), Err(CoreError::ReadOnly)));
        assert!(matches!(store.get_mutable(b"a"), Err(CoreError::ReadOnly)));
        assert!(matches!(store.commit_changes(), Err(CoreError::ReadOnly)));
    }

    #[test]
    fn snapshot_sees_history_only() {
        let (_backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        let c1 = store.commit_changes().unwrap();
        store.put(b"a", &Value::Integer(2)).unwrap();
        store.put(b"b", &Value::Integer(3)).unwrap();
        store.commit_changes().unwrap();

        let mut snapshot = store.open_at(store.previous_checkpoint()).unwrap();
        assert_eq!(snapshot.checkpoint(), c1);
        assert_eq!(snapshot.previous_checkpoint(), Checkpoint::NONE);
        assert_eq!(snapshot.get(b"a").unwrap(), Some(Value::Integer(1)));
        assert!(snapshot.get(b"b").unwrap().is_none());
        assert!(snapshot.is_snapshot());
        assert!(matches!(
            snapshot.put(b"c", &Value::Null),
            Err(CoreError::ReadOnly)
        ));

        store.remove(b"a").unwrap();
        store.commit_changes().unwrap();
        assert_eq!(snapshot.get(b"a").unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn snapshot_at_unknown_checkpoint_fails() {
        let (_backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        let c1 = store.commit_changes().unwrap();

        for bad in [Checkpoint::NONE, Checkpoint::new(c1.as_u64() + 1), Checkpoint::new(7)] {
            assert!(matches!(
                store.open_at(bad),
                Err(CoreError::CheckpointNotFound { .. })
            ));
        }

        let snapshot = store.open_at(c1).unwrap();
        assert!(matches!(
            snapshot.open_at(c1),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn damaged_tail_is_cut_off_by_next_commit() {
        let (backend, mut store) = create();
        store.put(b"a", &Value::Integer(1)).unwrap();
        let c1 = store.commit_changes().unwrap();
        drop(store);

        let mut raw = backend.share();
        raw.append(b"garbage").unwrap();

        let mut store = reopen(&backend).unwrap();
        assert!(store.is_damaged());
        assert_eq!(store.checkpoint(), c1);
        assert_eq!(store.recovery().discarded_bytes(), 7);

        store.put(b"b", &Value::Integer(2)).unwrap();
        let c2 = store.commit_changes().unwrap();
        assert!(store.is_damaged());
        drop(store);

        let store = reopen(&backend).unwrap();
        assert!(!store.is_damaged());
        assert_eq!(store.checkpoint(), c2);
        assert_eq!(store.previous_checkpoint(), c1);
    }

    #[test]
    fn invalid_keys_rejected() {
        let (_backend, mut store) = create();
        assert!(matches!(
            store.put(b"", &Value::Null),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    fn nested_arrays(depth: usize) -> Value {
        let mut value = Value::Null;
        for _ in 0..depth {
            value = Value::Array(vec![value]);
        }
        value
    }

    #[test]
    fn put_rejects_value_the_decoder_would_refuse() {
        let (backend, mut store) = create();
        store.put(b"ok", &Value::Integer(1)).unwrap();
        let c1 = store.commit_changes().unwrap();

        let err = store
            .put(b"deep", &nested_arrays(chainstore_codec::MAX_DEPTH + 1))
            .unwrap_err();
        assert!(matches!(err, CoreError::Codec(_)), "{err}");
        assert!(!store.has_changes());
        assert_eq!(store.commit_changes().unwrap(), c1);

        store
            .put(b"deep", &nested_arrays(chainstore_codec::MAX_DEPTH))
            .unwrap();
        let c2 = store.commit_changes().unwrap();
        drop(store);

        let store = reopen(&backend).unwrap();
        assert_eq!(store.checkpoint(), c2);
        assert_eq!(store.get(b"ok").unwrap(), Some(Value::Integer(1)));
        assert_eq!(
            store.get(b"deep").unwrap(),
            Some(nested_arrays(chainstore_codec::MAX_DEPTH))
        );
    }

    #[test]
    fn overlay_past_depth_limit_fails_commit_without_writing() {
        let (backend, mut store) = create();
        store.put(b"ada", &person("Ada", 36)).unwrap();
        let c1 = store.commit_changes().unwrap();
        let size = backend.data().len();

        // The overlay itself is one level, so its content may hold one less.
        store
            .get_mutable(b"ada")
            .unwrap()
            .unwrap()
            .set("deep", nested_arrays(chainstore_codec::MAX_DEPTH));
        assert!(matches!(
            store.commit_changes(),
            Err(CoreError::Codec(_))
        ));
        assert_eq!(backend.data().len(), size);
        assert_eq!(store.checkpoint(), c1);
        assert!(store.has_changes());

        store.revert_changes();
        drop(store);
        let store = reopen(&backend).unwrap();
        assert!(!store.is_damaged());
        assert_eq!(store.get(b"ada").unwrap(), Some(person("Ada", 36)));
    }
}
