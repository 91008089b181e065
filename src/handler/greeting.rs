//! Greeting Handler
//!
//! Translates the four request intents into store operations. Three of them
//! write and differ only in the order of the write, the response and the
//! delay:
//!
//! ```text
//!  add_pre_delay      write ──> respond 201 ──> delay
//!  add_post_delay     write ──> delay ──────> respond 201
//!  add_transaction    tx(write) ──> respond 201 ──> delay
//!                        │
//!                        └─ failure is logged, the response is still 201
//! ```
//!
//! Every operation runs synchronously on the calling thread and answers
//! through a [`Responder`]. Store failures are returned to the caller, which
//! turns them into a 500 if nothing was sent yet.

use crate::handler::delay::Delay;
use crate::handler::responder::Responder;
use crate::storage::{KeyValueStore, StoreError, TransactionExecutor, TransactionFailure, TxId};
use axum::http::StatusCode;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Errors a handler operation cannot absorb itself.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The store failed to read or write
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// What happened to a transactional write.
#[derive(Debug)]
pub enum TxOutcome {
    /// The write committed in the given transaction
    Committed(TxId),
    /// The write did not commit, but the request was acknowledged anyway
    FailedButAcknowledged(TransactionFailure),
}

impl TxOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed(_))
    }
}

/// Counters for handler activity
#[derive(Debug, Default)]
pub struct HandlerStats {
    /// Reads that found a value
    pub read_hits: AtomicU64,
    /// Reads that found nothing
    pub read_misses: AtomicU64,
    /// Non-transactional writes
    pub writes: AtomicU64,
    /// Transactional writes that committed
    pub transactions_committed: AtomicU64,
    /// Transactional writes that failed and were acknowledged anyway
    pub transactions_failed: AtomicU64,
    /// Delays run to completion
    pub delays_completed: AtomicU64,
}

impl HandlerStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Handles the service's read and write requests.
///
/// The store, the transaction executor and the delay are provisioned once
/// and shared; the handler itself keeps no per-request state.
#[derive(Clone)]
pub struct GreetingHandler {
    store: Arc<dyn KeyValueStore>,
    transactions: Arc<dyn TransactionExecutor>,
    delay: Arc<dyn Delay>,
    stats: Arc<HandlerStats>,
}

impl GreetingHandler {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transactions: Arc<dyn TransactionExecutor>,
        delay: Arc<dyn Delay>,
    ) -> Self {
        Self {
            store,
            transactions,
            delay,
            stats: Arc::new(HandlerStats::new()),
        }
    }

    pub fn stats(&self) -> &HandlerStats {
        &self.stats
    }

    /// GET readkey/{key}
    ///
    /// Responds 200 `Value is {value}!` when the key exists, 404 otherwise.
    pub fn read(&self, responder: &mut Responder, key: &str) -> Result<(), HandlerError> {
        match self.store.read(key.as_bytes())? {
            Some(value) => {
                self.stats.read_hits.fetch_add(1, Ordering::Relaxed);
                responder.send_string(format!("Value is {}!", String::from_utf8_lossy(&value)));
            }
            None => {
                self.stats.read_misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Key not found");
                responder.send_status(StatusCode::NOT_FOUND);
            }
        }
        Ok(())
    }

    /// POST add/predelay/{key}/{value}
    ///
    /// Writes, responds 201, then runs the delay.
    pub fn add_pre_delay(
        &self,
        responder: &mut Responder,
        key: &str,
        value: &str,
    ) -> Result<(), HandlerError> {
        self.write(key, value)?;
        responder.send_status(StatusCode::CREATED);
        self.delay();
        Ok(())
    }

    /// POST add/postdelay/{key}/{value}
    ///
    /// Writes, runs the delay, then responds 201.
    pub fn add_post_delay(
        &self,
        responder: &mut Responder,
        key: &str,
        value: &str,
    ) -> Result<(), HandlerError> {
        self.write(key, value)?;
        self.delay();
        responder.send_status(StatusCode::CREATED);
        Ok(())
    }

    /// POST add/transaction/{key}/{value}
    ///
    /// Writes inside a transaction, responds 201 whatever the transaction's
    /// fate, then runs the delay.
    pub fn add_transaction(&self, responder: &mut Responder, key: &str, value: &str) -> TxOutcome {
        let record_key = Bytes::copy_from_slice(key.as_bytes());
        let record_value = Bytes::copy_from_slice(value.as_bytes());

        let result = self.transactions.execute(Box::new(move |tx| {
            tx.write(record_key, record_value);
            Ok(())
        }));

        let outcome = match result {
            Ok(id) => {
                self.stats
                    .transactions_committed
                    .fetch_add(1, Ordering::Relaxed);
                debug!(tx = id, key = %key, "Transactional write committed");
                TxOutcome::Committed(id)
            }
            Err(failure) => {
                self.stats.transactions_failed.fetch_add(1, Ordering::Relaxed);
                error!(key = %key, error = %failure, "Transactional write failed, acknowledging anyway");
                TxOutcome::FailedButAcknowledged(failure)
            }
        };

        responder.send_status(StatusCode::CREATED);
        self.delay();
        outcome
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.write(
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
        )?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delay(&self) {
        self.delay.run();
        self.stats.delays_completed.fetch_add(1, Ordering::Relaxed);
    }
}
