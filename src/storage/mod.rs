//! Storage Module
//!
//! This module provides the dataset the service reads and writes, and the
//! transaction executor that applies grouped writes atomically.
//!
//! ## Architecture
//!
//! ```text
//!   GreetingHandler ─── read / write ───────────────┐
//!         │                                         ▼
//!         │                    ┌─────────────────────────────────────┐
//!         │                    │            StorageEngine            │
//!         └─ execute ─┐        │  ┌─────────┐ ┌─────────┐ ┌───────┐  │
//!                     ▼        │  │ Shard 0 │ │ Shard 1 │ │...64  │  │
//!   ┌──────────────────────┐   │  │ RwLock  │ │ RwLock  │ │shards │  │
//!   │ TransactionExecutor  │──>│  └─────────┘ └─────────┘ └───────┘  │
//!   │ (buffer, commit)     │   └─────────────────────────────────────┘
//!   └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use kvresponder::storage::{
//!     KeyValueStore, LocalTransactionExecutor, StorageEngine, TransactionExecutor, TxConfig,
//! };
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//! let executor = LocalTransactionExecutor::new(engine.clone(), TxConfig::default());
//!
//! executor
//!     .execute(Box::new(|tx| {
//!         tx.write("alice", "Bob");
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! assert_eq!(engine.read(b"alice").unwrap(), Some(Bytes::from("Bob")));
//! ```

pub mod engine;
pub mod transaction;

// Re-export commonly used types
pub use engine::{KeyValueStore, StorageEngine, StorageStats, StoreError};
pub use transaction::{
    LocalTransactionExecutor, Transaction, TransactionExecutor, TransactionFailure, TxConfig,
    TxId, UnitOfWork,
};
