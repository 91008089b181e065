//! Request Handler Module
//!
//! This module holds the request logic of the service: the four operations,
//! the response sink they answer through, and the busy-wait delay.
//!
//! ## Architecture
//!
//! ```text
//! HTTP route (http module)
//!       │  spawn_blocking
//!       ▼
//! ┌──────────────────┐   send_status / send_string   ┌──────────────┐
//! │ GreetingHandler  │ ─────────────────────────────> │  Responder   │ ──> client
//! │                  │                                └──────────────┘
//! │  - read          │
//! │  - add_pre_delay │ ──> KeyValueStore / TransactionExecutor (storage module)
//! │  - add_post_delay│
//! │  - add_transaction ──> Delay (BusyWait)
//! └──────────────────┘
//! ```

pub mod delay;
pub mod greeting;
pub mod responder;

// Re-export the main handler types
pub use delay::{BusyWait, Delay};
pub use greeting::{GreetingHandler, HandlerError, HandlerStats, TxOutcome};
pub use responder::{Reply, Responder};
