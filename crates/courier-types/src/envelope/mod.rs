//! Call and result envelopes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::binding::BindingKey;
use crate::error::RemoteError;

/// Outbound unit describing one remote method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    /// Caller-generated identifier used for tracing.
    pub request_id: String,
    /// Fully-qualified service identity.
    pub interface_name: String,
    /// Service version; empty selects the default binding.
    #[serde(default)]
    pub service_version: String,
    /// Name of the method to invoke.
    pub method_name: String,
    /// Ordered parameter type descriptors.
    #[serde(default)]
    pub parameter_signature: Vec<String>,
    /// Ordered parameter values.
    #[serde(default)]
    pub parameters: Vec<Value>,
}

impl CallEnvelope {
    /// Builds an envelope for a parameterless call on the default binding.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        interface_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            interface_name: interface_name.into(),
            service_version: String::new(),
            method_name: method_name.into(),
            parameter_signature: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Targets a specific service version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Appends one parameter together with its type descriptor.
    #[must_use]
    pub fn with_argument(mut self, descriptor: impl Into<String>, value: Value) -> Self {
        self.parameter_signature.push(descriptor.into());
        self.parameters.push(value);
        self
    }

    /// Replaces the parameter list wholesale.
    #[must_use]
    pub fn with_parameters(mut self, signature: Vec<String>, parameters: Vec<Value>) -> Self {
        self.parameter_signature = signature;
        self.parameters = parameters;
        self
    }

    /// Key of the service binding this call targets.
    #[must_use]
    pub fn binding_key(&self) -> BindingKey {
        BindingKey::new(self.interface_name.as_str(), self.service_version.as_str())
    }
}

/// Either the value a method returned or the error it raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// The invocation completed and produced this value.
    Result(Value),
    /// The invocation failed.
    Error(RemoteError),
}

/// Inbound unit carrying the outcome of one remote invocation.
///
/// On the wire the outcome is flattened, so a serialised envelope carries
/// exactly one of the `result` or `error` keys next to `requestId`. Decoding
/// rejects bodies carrying both keys or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireResult")]
pub struct ResultEnvelope {
    /// Identifier copied from the originating call.
    pub request_id: String,
    /// Result or error.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResultEnvelope {
    /// Builds a successful envelope.
    #[must_use]
    pub fn success(request_id: impl Into<String>, value: Value) -> Self {
        Self {
            request_id: request_id.into(),
            outcome: Outcome::Result(value),
        }
    }

    /// Builds a failed envelope.
    #[must_use]
    pub fn failure(request_id: impl Into<String>, error: RemoteError) -> Self {
        Self {
            request_id: request_id.into(),
            outcome: Outcome::Error(error),
        }
    }

    /// Returns the result value when the invocation succeeded.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Returns the error when the invocation failed.
    #[must_use]
    pub fn error(&self) -> Option<&RemoteError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    /// Returns `true` when the envelope carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Converts the envelope into a standard result.
    ///
    /// # Errors
    ///
    /// Returns the carried [`RemoteError`] when the invocation failed.
    pub fn into_result(self) -> Result<Value, RemoteError> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(error) => Err(error),
        }
    }
}

/// Result envelope as read off the wire, before the outcome is checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResult {
    request_id: String,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

/// Maps a present key to `Some`, so `"result": null` is kept as a value.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Error)]
enum OutcomeShapeError {
    #[error("result envelope {request_id:?} carries both result and error")]
    Both { request_id: String },
    #[error("result envelope {request_id:?} carries neither result nor error")]
    Neither { request_id: String },
}

impl TryFrom<WireResult> for ResultEnvelope {
    type Error = OutcomeShapeError;

    fn try_from(wire: WireResult) -> Result<Self, Self::Error> {
        let WireResult {
            request_id,
            result,
            error,
        } = wire;
        let outcome = match (result, error) {
            (Some(value), None) => Outcome::Result(value),
            (None, Some(error)) => Outcome::Error(error),
            (Some(_), Some(_)) => return Err(OutcomeShapeError::Both { request_id }),
            (None, None) => return Err(OutcomeShapeError::Neither { request_id }),
        };
        Ok(Self {
            request_id,
            outcome,
        })
    }
}
