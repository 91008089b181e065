//! Thread-Safe Storage Engine
//!
//! This module implements the dataset the service reads and writes.
//! It provides a thread-safe, sharded HashMap from key to value, plus an
//! atomic multi-key `commit` used by the transaction executor.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Last Writer Wins**: A write replaces any prior value; there is no versioning.
//! 3. **Ordered Commit**: A batch locks every shard it touches in ascending shard order,
//!    so two concurrent commits can never deadlock and readers never see half a batch.
//! 4. **No Panics on Poison**: A poisoned shard is reported as [`StoreError::Poisoned`]
//!    and fails only the request that hit it.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲ read / write               ▲ commit (ordered locks)
//!   GreetingHandler            TransactionExecutor
//! ```

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};
use thiserror::Error;

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Errors raised by a key-value store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// A writer panicked while holding the shard lock
    #[error("shard {shard} lock poisoned")]
    Poisoned { shard: usize },

    /// The backing store rejected the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The dataset interface the handler and the transaction executor consume.
///
/// Implementations must be safe to share across every request worker.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never written.
    fn read(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    /// Upserts a single record outside of any transaction.
    fn write(&self, key: Bytes, value: Bytes) -> Result<(), StoreError>;

    /// Applies every write in the batch, all or nothing.
    ///
    /// Later entries for the same key win over earlier ones.
    fn commit(&self, writes: Vec<(Bytes, Bytes)>) -> Result<(), StoreError>;
}

/// A single shard containing a portion of the records.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

/// The in-process dataset backing the service.
///
/// Provisioned once at startup, wrapped in an `Arc` and shared by every
/// request worker. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use kvresponder::storage::{KeyValueStore, StorageEngine};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.write(Bytes::from("alice"), Bytes::from("Bob")).unwrap();
/// assert_eq!(engine.read(b"alice").unwrap(), Some(Bytes::from("Bob")));
/// assert_eq!(engine.read(b"carol").unwrap(), None);
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of keys (approximate)
    key_count: AtomicU64,

    /// Statistics: total read operations
    read_count: AtomicU64,

    /// Statistics: total single-key write operations
    write_count: AtomicU64,

    /// Statistics: total committed batches
    commit_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("write_count", &self.write_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    fn write_shard(
        &self,
        index: usize,
    ) -> Result<RwLockWriteGuard<'_, HashMap<Bytes, Bytes>>, StoreError> {
        self.shards[index]
            .data
            .write()
            .map_err(|_| StoreError::Poisoned { shard: index })
    }

    /// Returns the number of keys in the store.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns operation statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            commits: self.commit_count.load(Ordering::Relaxed),
        }
    }
}

impl KeyValueStore for StorageEngine {
    fn read(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let index = self.shard_index(key);
        let data = self.shards[index]
            .data
            .read()
            .map_err(|_| StoreError::Poisoned { shard: index })?;
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.write_shard(self.shard_index(&key))?;
        if data.insert(key, value).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    fn commit(&self, writes: Vec<(Bytes, Bytes)>) -> Result<(), StoreError> {
        if writes.is_empty() {
            self.commit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        // Group by shard; BTreeMap keeps lock acquisition in ascending order.
        let mut by_shard: BTreeMap<usize, Vec<(Bytes, Bytes)>> = BTreeMap::new();
        for (key, value) in writes {
            by_shard
                .entry(self.shard_index(&key))
                .or_default()
                .push((key, value));
        }

        // Acquire every lock before touching any shard.
        let mut guards = Vec::with_capacity(by_shard.len());
        for &index in by_shard.keys() {
            guards.push(self.write_shard(index)?);
        }

        let mut created = 0;
        for (guard, batch) in guards.iter_mut().zip(by_shard.into_values()) {
            for (key, value) in batch {
                if guard.insert(key, value).is_none() {
                    created += 1;
                }
            }
        }

        self.key_count.fetch_add(created, Ordering::Relaxed);
        self.commit_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total read operations
    pub reads: u64,
    /// Total non-transactional writes
    pub writes: u64,
    /// Total committed batches
    pub commits: u64,
}
