//! HTTP Module
//!
//! This module exposes the handler over HTTP with axum.
//!
//! ## Routes
//!
//! Relative to the configured base path:
//!
//! | Method | Path                             | Response                          |
//! |--------|----------------------------------|-----------------------------------|
//! | GET    | `readkey/{key}`                  | 200 `Value is {value}!` or 404    |
//! | POST   | `add/predelay/{key}/{value}`     | 201, sent before the delay        |
//! | POST   | `add/postdelay/{key}/{value}`    | 201, sent after the delay         |
//! | POST   | `add/transaction/{key}/{value}`  | 201, even if the transaction fails|
//! | GET    | `info`                           | 200 plain-text statistics         |
//!
//! ## Example
//!
//! ```ignore
//! use kvresponder::handler::{BusyWait, GreetingHandler};
//! use kvresponder::http::{build_router, serve, AppState};
//! use kvresponder::storage::{LocalTransactionExecutor, StorageEngine, TxConfig};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let executor = Arc::new(LocalTransactionExecutor::new(storage.clone(), TxConfig::default()));
//! let handler = GreetingHandler::new(storage.clone(), executor, Arc::new(BusyWait::default()));
//!
//! let app = build_router(AppState::new(handler, storage), "");
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! serve(listener, app, std::future::pending()).await?;
//! ```

pub mod server;

// Re-export commonly used types
pub use server::{build_router, normalize_base_path, serve, AppState, RequestStats};
