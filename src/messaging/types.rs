//! Messaging boundary types and traits.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

/// Boxed future returned by transport trait methods.
pub type MessageFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, MessageError>> + Send + 'a>>;

/// Boxed future produced by a message handler's asynchronous phase.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, MessageError>> + Send>>;

/// Errors surfaced by messaging operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MessageError {
    /// The outgoing payload is not a well-formed message.
    #[error("invalid message: {0}")]
    Invalid(String),

    /// The serialized payload exceeds the host's message size limit.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Serialized size of the rejected payload.
        size: usize,
        /// The host's limit.
        max: usize,
    },

    /// The transport failed to deliver the message.
    #[error("transport failed: {0}")]
    Transport(String),

    /// A registered handler failed.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A send failed after exhausting its retry budget.
    #[error("{label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Label of the logical operation.
        label: String,
        /// Number of attempts performed.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<MessageError>,
    },
}

impl From<crate::retry::RetryError<MessageError>> for MessageError {
    fn from(err: crate::retry::RetryError<MessageError>) -> Self {
        let crate::retry::RetryError {
            label,
            attempts,
            source,
        } = err;
        MessageError::RetriesExhausted {
            label,
            attempts,
            source: Box::new(source),
        }
    }
}

/// Origin of an incoming message, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSender {
    /// Tab the message came from, when tab-addressed.
    pub tab_id: Option<u32>,
    /// Frame within the tab.
    pub frame_id: Option<u32>,
    /// URL of the originating page.
    pub url: Option<String>,
}

/// Handler for incoming messages.
///
/// Handling is two-phase: the synchronous call may reject immediately (the
/// error propagates to the host's own error surface), otherwise it returns
/// a future whose rejection is logged and swallowed by the dispatch wrapper
/// so one bad handler cannot break dispatch for others.
pub trait MessageHandler: Send + Sync {
    /// Handle one incoming message.
    fn handle(&self, message: Value, sender: MessageSender)
        -> Result<HandlerFuture, MessageError>;
}

/// Message-passing primitive exposed by the host.
///
/// Delivery is at-most-once per call with no built-in retry; the facade
/// layers retries and metadata on top.
pub trait MessageTransport: Send + Sync {
    /// Send a message to the extension runtime and await the response.
    fn send(&self, message: Value) -> MessageFuture<'_, Value>;

    /// Send a message to a specific tab and await the response.
    fn send_to_tab(&self, tab_id: u32, message: Value) -> MessageFuture<'_, Value>;

    /// Register the handler invoked for each incoming message.
    fn on_message(&self, handler: std::sync::Arc<dyn MessageHandler>);
}
