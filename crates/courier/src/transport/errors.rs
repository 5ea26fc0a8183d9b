//! Error types for transport operations.

use thiserror::Error;

/// Errors surfaced by connections and sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection broke underneath its sessions.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Provider-supplied description.
        reason: String,
    },
    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// The operation is not valid in the current state.
    #[error("illegal state: {message}")]
    IllegalState {
        /// What was attempted.
        message: String,
    },
    /// The destination does not exist.
    #[error("destination {destination} does not exist")]
    DestinationNotFound {
        /// Destination name.
        destination: String,
    },
    /// The provider refused to open a connection.
    #[error("transport unavailable: {reason}")]
    Unavailable {
        /// Provider-supplied description.
        reason: String,
    },
    /// The session was closed.
    #[error("session closed")]
    SessionClosed,
}

impl TransportError {
    /// Builds a [`TransportError::ConnectionLost`].
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Builds a [`TransportError::IllegalState`].
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Builds a [`TransportError::DestinationNotFound`].
    pub fn destination_not_found(destination: impl Into<String>) -> Self {
        Self::DestinationNotFound {
            destination: destination.into(),
        }
    }

    /// Builds a [`TransportError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the owning connection is unusable and must be
    /// replaced.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. } | Self::ConnectionClosed)
    }
}
