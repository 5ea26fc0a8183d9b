//! Errors shipped back to callers as data.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure raised while serving a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteErrorKind {
    /// No binding exists for the requested interface and version.
    ServiceNotFound,
    /// The binding exists but exposes no method with the requested signature.
    MethodNotFound,
    /// The parameters did not match the declared parameter types.
    InvalidArguments,
    /// The handler body raised an error or panicked.
    Invocation,
    /// The request payload could not be decoded.
    MalformedRequest,
}

impl RemoteErrorKind {
    /// Returns the canonical wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceNotFound => "serviceNotFound",
            Self::MethodNotFound => "methodNotFound",
            Self::InvalidArguments => "invalidArguments",
            Self::Invocation => "invocation",
            Self::MalformedRequest => "malformedRequest",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure raised on the server and carried back inside a result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// What went wrong.
    pub kind: RemoteErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Name of the original error type, when the handler reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl RemoteError {
    /// Builds an error of the given kind.
    #[must_use]
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            type_name: None,
        }
    }

    /// Attaches the name of the original error type.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// No binding was registered under `key`.
    #[must_use]
    pub fn service_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            RemoteErrorKind::ServiceNotFound,
            format!("can not find service by key: {key}"),
        )
    }

    /// The binding has no method matching `method(signature...)`.
    #[must_use]
    pub fn method_not_found(method: &str, signature: &[String]) -> Self {
        Self::new(
            RemoteErrorKind::MethodNotFound,
            format!("no method {method}({})", signature.join(", ")),
        )
    }

    /// The request payload could not be decoded.
    #[must_use]
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::MalformedRequest, message)
    }
}
