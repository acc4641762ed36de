//! Transport seam between this crate and the server.
//!
//! The server talks over a bidirectional message channel offering two
//! primitives:
//!
//! * **subscribe**: register a push listener that receives every message of
//!   the subscription, in arrival order, until it is unsubscribed;
//! * **call**: a one-shot request/response.
//!
//! [`Transport`] captures exactly that.  Messages are plain
//! `serde_json::Value`s; decoding them is the caller's job.  Implementations
//! are expected to deliver a subscription's messages in order and to drop
//! the listener once the subscription is unsubscribed.
//!
//! [`ReplayTransport`] replays a recorded run for tooling and tests.

pub mod replay;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use replay::ReplayTransport;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Failures of the channel itself, as opposed to failures reported inside a
/// run (those arrive as `error` events).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is gone.
    #[error("connection closed")]
    Closed,

    /// The server refused the request.
    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The transport does not handle this request type.
    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// Lower-level I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Listener invoked once per pushed message.
pub type EventCallback = Box<dyn FnMut(Value) + Send>;

/// A live subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Stop delivery.  Called at most once per subscription by this crate.
    async fn unsubscribe(&mut self) -> Result<(), TransportError>;
}

/// Message channel to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a subscription with `payload`; every pushed message is handed to
    /// `on_event` until the returned subscription is unsubscribed.
    async fn subscribe(
        &self,
        payload: Value,
        on_event: EventCallback,
    ) -> Result<Box<dyn Subscription>, TransportError>;

    /// Send `payload` and wait for the single response.
    async fn call(&self, payload: Value) -> Result<Value, TransportError>;
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transport>, _: Box<dyn Subscription>) {}
};
