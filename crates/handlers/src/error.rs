//! Handler error types.

use thiserror::Error;

/// Errors that can occur while handling or publishing events.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A handler could not process an event.
    #[error("Handler {handler} failed: {message}")]
    Failed {
        handler: &'static str,
        message: String,
    },

    /// One or more handlers failed for a published event.
    #[error("{failed} handler(s) failed for {event_type}")]
    DeliveryFailed {
        event_type: &'static str,
        failed: usize,
    },
}

impl HandlerError {
    pub fn failed(handler: &'static str, message: impl Into<String>) -> Self {
        HandlerError::Failed {
            handler,
            message: message.into(),
        }
    }
}

/// Result type for handler operations.
pub type Result<T> = std::result::Result<T, HandlerError>;
