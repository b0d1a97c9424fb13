//! Public messaging surface.
//!
//! `MessagingFacade` layers retries and envelope metadata over the host's
//! message transport, and wraps registered handlers so one bad handler
//! cannot break dispatch: a handler's synchronous error still propagates to
//! the host's own error surface, while its asynchronous rejection is logged
//! and swallowed.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::envelope::{
    process_incoming, sanitize_incoming, validate_outgoing, MessageIdGenerator,
};
use super::types::{
    HandlerFuture, MessageError, MessageHandler, MessageSender, MessageTransport,
};
use crate::host::{HostKind, HostProfile};
use crate::retry::RetryExecutor;

/// Resilient send/receive over the substrate transport.
pub struct MessagingFacade {
    transport: Arc<dyn MessageTransport>,
    retry: RetryExecutor,
    host: HostKind,
    tag_messages: bool,
    version: String,
    ids: MessageIdGenerator,
}

impl MessagingFacade {
    /// Compose a facade from its collaborators.
    ///
    /// `version` is the embedding application's version tag, stamped onto
    /// every outgoing message.
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        retry: RetryExecutor,
        host: HostKind,
        profile: &HostProfile,
        version: String,
    ) -> Self {
        Self {
            transport,
            retry,
            host,
            tag_messages: profile.tag_outgoing_messages,
            version,
            ids: MessageIdGenerator::new(),
        }
    }

    /// Send a message to the extension runtime.
    ///
    /// The payload is validated and enriched once, then delivery is retried
    /// with the facade's policy.
    pub async fn send(&self, message: Value) -> Result<Value, MessageError> {
        let envelope = self.prepare(message, None)?;
        debug!(message_id = envelope["messageId"].as_str(), "Sending message");

        self.retry
            .run("message send", || self.transport.send(envelope.clone()))
            .await
            .map_err(MessageError::from)
    }

    /// Send a message to a specific tab.
    pub async fn send_to_tab(&self, tab_id: u32, message: Value) -> Result<Value, MessageError> {
        let envelope = self.prepare(message, Some(tab_id))?;
        debug!(
            tab_id,
            message_id = envelope["messageId"].as_str(),
            "Sending tab message"
        );

        self.retry
            .run("tab message send", || {
                self.transport.send_to_tab(tab_id, envelope.clone())
            })
            .await
            .map_err(MessageError::from)
    }

    /// Register a handler for incoming messages.
    ///
    /// The handler is wrapped in the dispatch guard before registration
    /// with the transport.
    pub fn on_message(&self, handler: Arc<dyn MessageHandler>) {
        let guard = Arc::new(DispatchGuard {
            inner: handler,
            host: self.host,
            tag_sender: self.tag_messages,
        });
        self.transport.on_message(guard);
    }

    /// Validate and enrich an outgoing payload.
    fn prepare(&self, mut message: Value, target_tab: Option<u32>) -> Result<Value, MessageError> {
        validate_outgoing(&message)?;

        // Validation guarantees an object.
        if let Some(object) = message.as_object_mut() {
            object.insert(
                "timestamp".to_string(),
                json!(chrono::Utc::now().timestamp_millis()),
            );
            object.insert("version".to_string(), json!(self.version));
            object.insert("messageId".to_string(), json!(self.ids.next_id()));

            if self.tag_messages {
                object.insert("platform".to_string(), json!(self.host.to_string()));
            }
            if let Some(tab_id) = target_tab {
                object.insert("targetTabId".to_string(), json!(tab_id));
            }
        }

        Ok(message)
    }
}

/// Wraps registered handlers for safe dispatch.
///
/// Sanitizes and stamps the incoming payload, then invokes the inner
/// handler. The two handler failure phases get different treatment: a
/// synchronous error is logged and re-raised so the host's error surface
/// still fires, an asynchronous rejection is logged and swallowed so the
/// dispatch loop survives.
struct DispatchGuard {
    inner: Arc<dyn MessageHandler>,
    host: HostKind,
    tag_sender: bool,
}

impl MessageHandler for DispatchGuard {
    fn handle(
        &self,
        message: Value,
        sender: MessageSender,
    ) -> Result<HandlerFuture, MessageError> {
        let message = sanitize_incoming(message);
        let message = process_incoming(message, &sender, self.host, self.tag_sender);
        debug!(kind = message["type"].as_str(), "Dispatching message");

        match self.inner.handle(message, sender) {
            Ok(response) => Ok(Box::pin(async move {
                match response.await {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        warn!(error = %err, "Message handler rejected asynchronously");
                        Ok(Value::Null)
                    }
                }
            })),
            Err(err) => {
                error!(error = %err, "Message handler failed synchronously");
                Err(err)
            }
        }
    }
}
