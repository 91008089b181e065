//! Transaction Executor
//!
//! Runs a unit of work against the store so that its writes either all
//! apply or none do.
//!
//! ## Lifecycle
//!
//! ```text
//!   begin (take executor lock, assign id)
//!        │
//!        ▼
//!   unit of work ──── Err ────> rollback: drop write set ──> Aborted
//!        │
//!        Ok
//!        ▼
//!   elapsed > timeout? ── yes ─> rollback ──────────────────> TimedOut
//!        │
//!        no
//!        ▼
//!   store.commit(write set) ── Err ─────────────────────────> Commit
//!        │
//!        ▼
//!     Ok(id)
//! ```
//!
//! Writes are buffered inside the [`Transaction`] and reach the store only in
//! the final `commit`, which the store applies atomically. The executor runs
//! one unit of work at a time, so transactional writers to the same key are
//! serialized in commit order.

use crate::storage::engine::{KeyValueStore, StoreError};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Identifier assigned to each transaction when it begins.
pub type TxId = u64;

/// A unit of work executed inside a transaction.
pub type UnitOfWork<'a> = Box<dyn FnOnce(&mut Transaction) -> anyhow::Result<()> + Send + 'a>;

/// Why a transaction did not commit.
#[derive(Debug, Error)]
pub enum TransactionFailure {
    /// The unit of work returned an error; nothing was written
    #[error("transaction {id} aborted: {source}")]
    Aborted {
        id: TxId,
        #[source]
        source: anyhow::Error,
    },

    /// The unit of work outlived the transaction timeout; nothing was written
    #[error("transaction {id} timed out after {elapsed:?} (limit {timeout:?})")]
    TimedOut {
        id: TxId,
        elapsed: Duration,
        timeout: Duration,
    },

    /// The store refused the write set
    #[error("transaction {id} failed to commit: {source}")]
    Commit {
        id: TxId,
        #[source]
        source: StoreError,
    },
}

impl TransactionFailure {
    /// The id of the failed transaction.
    pub fn id(&self) -> TxId {
        match self {
            TransactionFailure::Aborted { id, .. }
            | TransactionFailure::TimedOut { id, .. }
            | TransactionFailure::Commit { id, .. } => *id,
        }
    }
}

/// Runs units of work atomically against a store.
pub trait TransactionExecutor: Send + Sync {
    /// Executes `work` in a new transaction and commits its writes.
    fn execute(&self, work: UnitOfWork<'_>) -> Result<TxId, TransactionFailure>;
}

/// An open transaction: the store it reads through and its pending writes.
pub struct Transaction {
    id: TxId,
    store: Arc<dyn KeyValueStore>,
    writes: Vec<(Bytes, Bytes)>,
}

impl Transaction {
    fn new(id: TxId, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            id,
            store,
            writes: Vec::new(),
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    /// Reads a key, seeing this transaction's own pending writes first.
    pub fn read(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        if let Some((_, value)) = self.writes.iter().rev().find(|(k, _)| k.as_ref() == key) {
            return Ok(Some(value.clone()));
        }
        self.store.read(key)
    }

    /// Buffers a write until the transaction commits.
    pub fn write(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.writes.push((key.into(), value.into()));
    }

    /// Number of buffered writes.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }
}

/// Configuration for the transaction executor.
#[derive(Debug, Clone)]
pub struct TxConfig {
    /// Longest a unit of work may run and still commit (default: 30s)
    pub timeout: Duration,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// In-process transaction executor over a [`KeyValueStore`].
pub struct LocalTransactionExecutor {
    store: Arc<dyn KeyValueStore>,
    config: TxConfig,
    next_id: AtomicU64,
    /// Held from begin to commit; serializes transactions
    lock: Mutex<()>,
}

impl LocalTransactionExecutor {
    pub fn new(store: Arc<dyn KeyValueStore>, config: TxConfig) -> Self {
        Self {
            store,
            config,
            next_id: AtomicU64::new(1),
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TxConfig {
        &self.config
    }
}

impl TransactionExecutor for LocalTransactionExecutor {
    fn execute(&self, work: UnitOfWork<'_>) -> Result<TxId, TransactionFailure> {
        // The lock guards no data, so a panicked unit of work leaves nothing to repair.
        let _serial = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let mut tx = Transaction::new(id, Arc::clone(&self.store));
        trace!(tx = id, "Transaction started");

        if let Err(source) = work(&mut tx) {
            debug!(tx = id, discarded = tx.pending(), "Transaction rolled back");
            return Err(TransactionFailure::Aborted { id, source });
        }

        let elapsed = started.elapsed();
        if elapsed > self.config.timeout {
            warn!(tx = id, ?elapsed, "Transaction timed out before commit");
            return Err(TransactionFailure::TimedOut {
                id,
                elapsed,
                timeout: self.config.timeout,
            });
        }

        let writes = tx.writes.len();
        self.store
            .commit(tx.writes)
            .map_err(|source| TransactionFailure::Commit { id, source })?;

        debug!(tx = id, writes, "Transaction committed");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::StorageEngine;
    use std::thread;
    use tokio_test::assert_ok;

    fn create_executor(timeout: Duration) -> (Arc<StorageEngine>, LocalTransactionExecutor) {
        let engine = Arc::new(StorageEngine::new());
        let executor = LocalTransactionExecutor::new(engine.clone(), TxConfig { timeout });
        (engine, executor)
    }

    #[test]
    fn test_commit() {
        let (engine, executor) = create_executor(Duration::from_secs(30));

        let id = assert_ok!(executor.execute(Box::new(|tx| {
            tx.write("alice", "Bob");
            Ok(())
        })));

        assert_eq!(id, 1);
        assert_eq!(engine.read(b"alice").unwrap(), Some(Bytes::from("Bob")));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (_, executor) = create_executor(Duration::from_secs(30));

        let first = executor.execute(Box::new(|_| Ok(()))).unwrap();
        let mut seen = 0;
        let second = executor
            .execute(Box::new(|tx| {
                seen = tx.id();
                Ok(())
            }))
            .unwrap();
        let failed = executor
            .execute(Box::new(|_| Err(anyhow::anyhow!("boom"))))
            .unwrap_err();

        assert!(second > first);
        assert_eq!(seen, second);
        assert_eq!(failed.id(), second + 1);
    }

    #[test]
    fn test_abort_discards_writes() {
        let (engine, executor) = create_executor(Duration::from_secs(30));

        let result = executor.execute(Box::new(|tx| {
            tx.write("a", "1");
            tx.write("b", "2");
            anyhow::bail!("body failed after writing")
        }));

        assert!(matches!(result, Err(TransactionFailure::Aborted { .. })));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_reads_own_writes() {
        let (engine, executor) = create_executor(Duration::from_secs(30));
        engine.write(Bytes::from("k"), Bytes::from("old")).unwrap();

        executor
            .execute(Box::new(|tx| {
                assert_eq!(tx.read(b"k")?, Some(Bytes::from("old")));
                tx.write("k", "new");
                assert_eq!(tx.read(b"k")?, Some(Bytes::from("new")));
                assert_eq!(tx.pending(), 1);
                Ok(())
            }))
            .unwrap();

        assert_eq!(engine.read(b"k").unwrap(), Some(Bytes::from("new")));
    }

    #[test]
    fn test_timeout_discards_writes() {
        let (engine, executor) = create_executor(Duration::from_millis(10));

        let result = executor.execute(Box::new(|tx| {
            tx.write("slow", "value");
            thread::sleep(Duration::from_millis(50));
            Ok(())
        }));

        assert!(matches!(result, Err(TransactionFailure::TimedOut { .. })));
        assert_eq!(engine.read(b"slow").unwrap(), None);
    }

    #[test]
    fn test_survives_panicking_unit_of_work() {
        let (engine, executor) = create_executor(Duration::from_secs(30));

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = executor.execute(Box::new(|tx| {
                tx.write("k", "lost");
                panic!("unit of work panicked");
            }));
        }));
        assert!(panicked.is_err());

        executor
            .execute(Box::new(|tx| {
                tx.write("k", "kept");
                Ok(())
            }))
            .unwrap();
        assert_eq!(engine.read(b"k").unwrap(), Some(Bytes::from("kept")));
    }

    #[test]
    fn test_commit_failure() {
        struct ReadOnlyStore;

        impl KeyValueStore for ReadOnlyStore {
            fn read(&self, _key: &[u8]) -> Result<Option<Bytes>, StoreError> {
                Ok(None)
            }
            fn write(&self, _key: Bytes, _value: Bytes) -> Result<(), StoreError> {
                Err(StoreError::Unavailable("read-only".into()))
            }
            fn commit(&self, _writes: Vec<(Bytes, Bytes)>) -> Result<(), StoreError> {
                Err(StoreError::Unavailable("read-only".into()))
            }
        }

        let executor = LocalTransactionExecutor::new(Arc::new(ReadOnlyStore), TxConfig::default());
        let result = executor.execute(Box::new(|tx| {
            tx.write("k", "v");
            Ok(())
        }));

        match result {
            Err(TransactionFailure::Commit { id, source }) => {
                assert_eq!(id, 1);
                assert_eq!(source, StoreError::Unavailable("read-only".into()));
            }
            other => panic!("expected commit failure, got {:?}", other),
        }
    }

    #[test]
    fn test_transactions_are_serialized() {
        let (engine, executor) = create_executor(Duration::from_secs(30));
        let executor = Arc::new(executor);
        engine.write(Bytes::from("counter"), Bytes::from("0")).unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let executor = Arc::clone(&executor);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    executor
                        .execute(Box::new(|tx| {
                            let current = tx.read(b"counter")?.unwrap_or_default();
                            let n: u64 = std::str::from_utf8(&current)?.parse()?;
                            tx.write("counter", (n + 1).to_string());
                            Ok(())
                        }))
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.read(b"counter").unwrap(), Some(Bytes::from("400")));
    }
}
