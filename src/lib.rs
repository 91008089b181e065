//! # kvresponder - Write, Respond and Delay Orderings over HTTP
//!
//! kvresponder is a small key-value HTTP service. Each request reads or writes
//! one record in a shared dataset, and the three write routes differ only in
//! the order of the write, the response and a synthetic CPU-bound delay.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            kvresponder                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐             │
//! │  │ axum Router │───>│  dispatch   │───>│ GreetingHandler  │             │
//! │  │ (http)      │<───│ (Responder) │<───│ (blocking worker)│             │
//! │  └─────────────┘    └─────────────┘    └────────┬─────────┘             │
//! │                                                 │                       │
//! │                            ┌────────────────────┼──────────────┐        │
//! │                            ▼                    ▼              ▼        │
//! │                 ┌──────────────────┐ ┌────────────────┐ ┌──────────┐    │
//! │                 │  StorageEngine   │<│ Transaction    │ │ BusyWait │    │
//! │                 │ (dataset "whom") │ │ Executor       │ │ (delay)  │    │
//! │                 └──────────────────┘ └────────────────┘ └──────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Orderings
//!
//! - `POST add/predelay/{key}/{value}`: write, respond 201, delay.
//!   The client gets its answer without waiting for the delay.
//! - `POST add/postdelay/{key}/{value}`: write, delay, respond 201.
//!   The client waits for the whole delay.
//! - `POST add/transaction/{key}/{value}`: transactional write, respond 201, delay.
//!   A failed transaction is logged and still answered with 201.
//!
//! `GET readkey/{key}` answers `Value is {value}!` or 404.
//!
//! ## Module Overview
//!
//! - [`storage`]: Sharded key-value store and transaction executor
//! - [`handler`]: The request operations, the response sink and the delay
//! - [`http`]: axum routes and server

pub mod handler;
pub mod http;
pub mod storage;

// Re-export commonly used types for convenience
pub use handler::{BusyWait, Delay, GreetingHandler, Reply, Responder, TxOutcome};
pub use http::{build_router, serve, AppState};
pub use storage::{KeyValueStore, LocalTransactionExecutor, StorageEngine, TransactionExecutor};

/// The default port kvresponder listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host kvresponder binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Name of the dataset the service reads and writes
pub const DATASET_NAME: &str = "whom";

/// Version of kvresponder
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
