//! Errors surfaced to callers of remote services.

use std::time::Duration;

use courier_types::{RemoteError, RemoteErrorKind};
use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Failure of a remote call as seen by the caller.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No reply arrived before the deadline. The server may still complete
    /// the call; its reply is discarded.
    #[error("no reply on {destination} within {timeout:?}")]
    Timeout {
        /// Destination the caller was waiting on.
        destination: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The server processed the call and reported an error.
    #[error("remote call {request_id} failed: {error}")]
    Remote {
        /// Identifier of the failed call.
        request_id: String,
        /// Error raised on the server.
        #[source]
        error: RemoteError,
    },
    /// Sending or receiving failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The call or the reply could not be (de)serialised.
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
    /// The result did not convert to the type the caller asked for.
    #[error("unexpected result type from {method}: {source}")]
    Conversion {
        /// Method whose result failed to convert.
        method: String,
        /// Deserialiser error.
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    /// The server-side error, when the call failed remotely.
    #[must_use]
    pub const fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Kind of the server-side error, when the call failed remotely.
    #[must_use]
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        self.remote_error().map(|error| error.kind)
    }

    /// Returns `true` when the call timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
