//! Resilient message passing over the substrate transport.

mod envelope;
mod facade;
mod types;

pub use envelope::{
    sanitize_incoming, validate_outgoing, MessageIdGenerator, INVALID_MESSAGE_TYPE,
    MAX_MESSAGE_BYTES,
};
pub use facade::MessagingFacade;
pub use types::{
    HandlerFuture, MessageError, MessageFuture, MessageHandler, MessageSender, MessageTransport,
};
