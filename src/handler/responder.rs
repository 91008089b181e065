//! Response Sink
//!
//! A [`Responder`] carries the one terminal response of a request from the
//! handler, which runs on a blocking worker, to the HTTP task awaiting it.
//! The response leaves as soon as it is sent, whether or not the handler
//! still has work to do afterwards.
//!
//! ```text
//!  blocking worker                          HTTP task
//!  ───────────────                          ─────────
//!  handler.add_pre_delay(&mut responder)
//!     write
//!     responder.send_status(201) ──oneshot──> rx.await ──> client sees 201
//!     delay ...
//!  return
//! ```

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A terminal response: status and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// The reply used when a handler ended without responding.
    pub fn internal_error() -> Self {
        Self::status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        if self.body.is_empty() {
            self.status.into_response()
        } else {
            (
                self.status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.body,
            )
                .into_response()
        }
    }
}

/// Sends the terminal response of one request.
///
/// Only the first send counts. Dropping a responder that never sent anything
/// leaves the receiving side with a closed channel.
#[derive(Debug)]
pub struct Responder {
    tx: Option<oneshot::Sender<Reply>>,
}

impl Responder {
    /// Creates a responder and the receiver its reply will arrive on.
    pub fn channel() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Responds with a status and an empty body.
    pub fn send_status(&mut self, status: StatusCode) {
        self.send(Reply::status(status));
    }

    /// Responds 200 with a plain-text body.
    pub fn send_string(&mut self, body: impl Into<String>) {
        self.send(Reply::text(body));
    }

    /// Returns true once a response has been sent.
    pub fn is_sent(&self) -> bool {
        self.tx.is_none()
    }

    fn send(&mut self, reply: Reply) {
        let Some(tx) = self.tx.take() else {
            warn!(status = %reply.status, "Response already sent, ignoring");
            return;
        };

        if let Err(reply) = tx.send(reply) {
            debug!(status = %reply.status, "Client went away before the response was sent");
        }
    }
}
