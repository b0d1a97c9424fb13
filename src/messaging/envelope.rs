//! Message validation and envelope metadata.
//!
//! Outgoing payloads are validated once per logical send, then enriched
//! with a capture timestamp, a version tag and a generated message id
//! (plus a host platform tag and target tab id where applicable). Incoming
//! payloads are sanitized rather than rejected: a malformed message is
//! replaced with an `INVALID_MESSAGE` placeholder so dispatch never crashes
//! on bad input.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use super::types::{MessageError, MessageSender};
use crate::host::HostKind;

/// Host message size limit applied to serialized outgoing payloads.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Placeholder `type` substituted for malformed incoming messages.
pub const INVALID_MESSAGE_TYPE: &str = "INVALID_MESSAGE";

/// Generates process-unique message ids.
///
/// Ids combine the capture timestamp with a monotonic sequence number:
/// `msg_<epoch-ms>_<seq>`.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    seq: AtomicU64,
}

impl MessageIdGenerator {
    /// Create a generator starting at sequence 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next message id.
    pub fn next_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("msg_{}_{}", Utc::now().timestamp_millis(), seq)
    }
}

/// Validate an outgoing payload.
///
/// A message must be a JSON object with a non-empty string `type`, and its
/// serialized form must fit within [`MAX_MESSAGE_BYTES`].
pub fn validate_outgoing(message: &Value) -> Result<(), MessageError> {
    let object = message
        .as_object()
        .ok_or_else(|| MessageError::Invalid("message must be an object".to_string()))?;

    match object.get("type").and_then(Value::as_str) {
        Some(kind) if !kind.is_empty() => {}
        _ => {
            return Err(MessageError::Invalid(
                "message type is required and must be a string".to_string(),
            ))
        }
    }

    let size = serde_json::to_string(message)
        .map_err(|err| MessageError::Invalid(err.to_string()))?
        .len();
    if size > MAX_MESSAGE_BYTES {
        return Err(MessageError::TooLarge {
            size,
            max: MAX_MESSAGE_BYTES,
        });
    }

    Ok(())
}

/// Sanitize an incoming payload.
///
/// Non-object messages and messages without a `type` are replaced with an
/// [`INVALID_MESSAGE_TYPE`] placeholder instead of failing dispatch.
pub fn sanitize_incoming(message: Value) -> Value {
    let valid = message
        .as_object()
        .is_some_and(|object| object.get("type").is_some());

    if valid {
        message
    } else {
        warn!("Malformed incoming message replaced with placeholder");
        json!({ "type": INVALID_MESSAGE_TYPE, "data": null })
    }
}

/// Stamp dispatch metadata onto an incoming message.
///
/// Adds `processedAt` (epoch ms). Hosts that tag messages also get a
/// `sender` block with the originating tab, frame, url and platform.
pub fn process_incoming(
    mut message: Value,
    sender: &MessageSender,
    host: HostKind,
    tag_sender: bool,
) -> Value {
    if let Some(object) = message.as_object_mut() {
        object.insert(
            "processedAt".to_string(),
            json!(Utc::now().timestamp_millis()),
        );

        if tag_sender {
            object.insert(
                "sender".to_string(),
                json!({
                    "tabId": sender.tab_id,
                    "frameId": sender.frame_id,
                    "url": sender.url,
                    "platform": host.to_string(),
                }),
            );
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_message_passes() {
        let message = json!({ "type": "saveBookmark", "url": "https://example.com" });
        assert!(validate_outgoing(&message).is_ok());
    }

    #[test]
    fn non_object_message_is_invalid() {
        assert!(matches!(
            validate_outgoing(&json!("just a string")),
            Err(MessageError::Invalid(_))
        ));
    }

    #[test]
    fn missing_type_is_invalid() {
        assert!(matches!(
            validate_outgoing(&json!({ "data": 1 })),
            Err(MessageError::Invalid(_))
        ));
    }

    #[test]
    fn non_string_type_is_invalid() {
        assert!(matches!(
            validate_outgoing(&json!({ "type": 42 })),
            Err(MessageError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let message = json!({ "type": "blob", "data": "x".repeat(MAX_MESSAGE_BYTES) });
        assert!(matches!(
            validate_outgoing(&message),
            Err(MessageError::TooLarge { .. })
        ));
    }

    #[test]
    fn sanitize_keeps_well_formed_messages() {
        let message = json!({ "type": "ping" });
        assert_eq!(sanitize_incoming(message.clone()), message);
    }

    #[test]
    fn sanitize_replaces_malformed_messages() {
        let replaced = sanitize_incoming(json!([1, 2, 3]));
        assert_eq!(replaced["type"], INVALID_MESSAGE_TYPE);

        let replaced = sanitize_incoming(json!({ "data": 1 }));
        assert_eq!(replaced["type"], INVALID_MESSAGE_TYPE);
    }

    #[test]
    fn process_incoming_stamps_processed_at() {
        let message = process_incoming(
            json!({ "type": "ping" }),
            &MessageSender::default(),
            HostKind::Chromium,
            false,
        );
        assert!(message["processedAt"].is_i64());
        assert!(message.get("sender").is_none());
    }

    #[test]
    fn process_incoming_tags_sender_when_requested() {
        let sender = MessageSender {
            tab_id: Some(7),
            frame_id: Some(0),
            url: Some("https://example.com".to_string()),
        };
        let message =
            process_incoming(json!({ "type": "ping" }), &sender, HostKind::WebKit, true);

        assert_eq!(message["sender"]["tabId"], json!(7));
        assert_eq!(message["sender"]["platform"], json!("webkit"));
    }

    #[test]
    fn message_ids_are_unique_and_prefixed() {
        let ids = MessageIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();

        assert!(first.starts_with("msg_"));
        assert_ne!(first, second);
    }
}
