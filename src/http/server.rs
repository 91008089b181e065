//! HTTP Server
//!
//! This module maps HTTP routes onto [`GreetingHandler`] operations.
//!
//! ## Request Lifecycle
//!
//! ```text
//! 1. axum matches the route and extracts the path segments
//!        │
//!        ▼
//! 2. dispatch(): create Responder + receiver
//!        │
//!        ├──── spawn_blocking ───> handler operation (write / delay / respond)
//!        │                                 │
//!        ▼                                 │ send_status / send_string
//! 3. await receiver <──────────────────────┘
//!        │
//!        ▼
//! 4. Reply written to the client
//!    (the blocking worker may still be running its delay)
//! ```
//!
//! If the operation fails before responding, the worker answers 500 itself.
//! If it panics, the responder is dropped unsent and the request task
//! answers 500 when it sees the closed channel.

use crate::handler::{GreetingHandler, HandlerError, Reply, Responder};
use crate::storage::StorageEngine;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, trace};

/// Statistics for request handling
#[derive(Debug, Default)]
pub struct RequestStats {
    /// Total requests dispatched to the handler
    pub requests_received: AtomicU64,
    /// Total responses handed back to the client
    pub responses_sent: AtomicU64,
    /// Responses with a 5xx status
    pub server_errors: AtomicU64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self, status: StatusCode) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        if status.is_server_error() {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    handler: GreetingHandler,
    storage: Arc<StorageEngine>,
    stats: Arc<RequestStats>,
    start_time: Instant,
}

impl AppState {
    pub fn new(handler: GreetingHandler, storage: Arc<StorageEngine>) -> Self {
        Self {
            handler,
            storage,
            stats: Arc::new(RequestStats::new()),
            start_time: Instant::now(),
        }
    }

    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }
}

/// Turns a configured base route into the prefix to nest under.
///
/// Returns `None` when the routes should be served from the root.
pub fn normalize_base_path(base_path: &str) -> Option<String> {
    let cleaned = base_path.trim_matches('/');
    if cleaned.is_empty() {
        None
    } else {
        Some(format!("/{}", cleaned))
    }
}

/// Builds the service router, optionally nested under `base_path`.
pub fn build_router(state: AppState, base_path: &str) -> Router {
    let routes = Router::new()
        .route("/readkey/:key", get(read_key))
        .route("/add/predelay/:key/:value", post(add_pre_delay))
        .route("/add/postdelay/:key/:value", post(add_post_delay))
        .route("/add/transaction/:key/:value", post(add_transaction))
        .route("/info", get(server_info))
        .with_state(state);

    let app = match normalize_base_path(base_path) {
        Some(base) => Router::new().nest(&base, routes),
        None => routes,
    };

    app.layer(TraceLayer::new_for_http())
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Runs a handler operation on a blocking worker and waits for its response.
async fn dispatch<F>(state: &AppState, route: &'static str, op: F) -> Reply
where
    F: FnOnce(&GreetingHandler, &mut Responder) -> Result<(), HandlerError> + Send + 'static,
{
    state.stats.request_received();

    let (mut responder, rx) = Responder::channel();
    let handler = state.handler.clone();

    // Detached: the worker outlives this task when it delays after responding.
    tokio::task::spawn_blocking(move || {
        if let Err(e) = op(&handler, &mut responder) {
            error!(route, error = %e, "Request failed");
            if !responder.is_sent() {
                responder.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
        trace!(route, "Handler finished");
    });

    let reply = match rx.await {
        Ok(reply) => reply,
        Err(_) => {
            error!(route, "Handler ended without responding");
            Reply::internal_error()
        }
    };

    state.stats.response_sent(reply.status);
    reply
}

async fn read_key(State(state): State<AppState>, Path(key): Path<String>) -> Reply {
    dispatch(&state, "readkey", move |handler, responder| {
        handler.read(responder, &key)
    })
    .await
}

async fn add_pre_delay(
    State(state): State<AppState>,
    Path((key, value)): Path<(String, String)>,
) -> Reply {
    dispatch(&state, "add/predelay", move |handler, responder| {
        handler.add_pre_delay(responder, &key, &value)
    })
    .await
}

async fn add_post_delay(
    State(state): State<AppState>,
    Path((key, value)): Path<(String, String)>,
) -> Reply {
    dispatch(&state, "add/postdelay", move |handler, responder| {
        handler.add_post_delay(responder, &key, &value)
    })
    .await
}

async fn add_transaction(
    State(state): State<AppState>,
    Path((key, value)): Path<(String, String)>,
) -> Reply {
    dispatch(&state, "add/transaction", move |handler, responder| {
        handler.add_transaction(responder, &key, &value);
        Ok(())
    })
    .await
}

/// GET info
async fn server_info(State(state): State<AppState>) -> Reply {
    let store = state.storage.stats();
    let handler = state.handler.stats();
    let requests = &state.stats;

    let info = format!(
        "# Server\r\n\
         kvresponder_version:{}\r\n\
         dataset:{}\r\n\
         uptime_in_seconds:{}\r\n\
         \r\n\
         # Requests\r\n\
         requests_received:{}\r\n\
         responses_sent:{}\r\n\
         server_errors:{}\r\n\
         \r\n\
         # Handler\r\n\
         read_hits:{}\r\n\
         read_misses:{}\r\n\
         writes:{}\r\n\
         transactions_committed:{}\r\n\
         transactions_failed:{}\r\n\
         delays_completed:{}\r\n\
         \r\n\
         # Keyspace\r\n\
         keys:{}\r\n\
         store_reads:{}\r\n\
         store_writes:{}\r\n\
         store_commits:{}\r\n",
        crate::VERSION,
        crate::DATASET_NAME,
        state.start_time.elapsed().as_secs(),
        requests.requests_received.load(Ordering::Relaxed),
        requests.responses_sent.load(Ordering::Relaxed),
        requests.server_errors.load(Ordering::Relaxed),
        handler.read_hits.load(Ordering::Relaxed),
        handler.read_misses.load(Ordering::Relaxed),
        handler.writes.load(Ordering::Relaxed),
        handler.transactions_committed.load(Ordering::Relaxed),
        handler.transactions_failed.load(Ordering::Relaxed),
        handler.delays_completed.load(Ordering::Relaxed),
        store.keys,
        store.reads,
        store.writes,
        store.commits,
    );

    Reply::text(info)
}
