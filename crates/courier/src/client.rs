//! Caller-side entry points for remote services.
//!
//! [`RpcClient`] turns a method call into a [`CallEnvelope`], hands the
//! encoded body to the [`CorrelationTransport`] and unwraps the
//! [`ResultEnvelope`] that comes back. [`ServiceProxy`] binds a client to
//! one interface and version so call sites only name the method.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use courier_config::Config;
use courier_types::{BindingKey, CallEnvelope, ResultEnvelope};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::{Codec, JsonCodec};
use crate::correlation::CorrelationTransport;
use crate::error::RpcError;
use crate::transport::ConnectionFactory;

pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Blocking client for services exposed by a listener container.
pub struct RpcClient {
    transport: CorrelationTransport,
    codec: Arc<dyn Codec>,
    default_timeout: Option<Duration>,
}

impl RpcClient {
    /// Creates a client using the JSON codec and no default timeout.
    #[must_use]
    pub fn new(transport: CorrelationTransport) -> Self {
        Self {
            transport,
            codec: Arc::new(JsonCodec),
            default_timeout: None,
        }
    }

    /// Builds a client from the resolved configuration.
    #[must_use]
    pub fn from_config(factory: Arc<dyn ConnectionFactory>, config: &Config) -> Self {
        Self::new(CorrelationTransport::from_config(factory, config))
            .with_timeout(config.receive_timeout())
    }

    /// Replaces the codec used for envelopes.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the timeout applied to calls that do not choose their own.
    /// `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Timeout applied to calls that do not choose their own.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Returns a proxy for one interface and version. An empty version
    /// addresses the default binding.
    #[must_use]
    pub fn proxy(&self, interface_name: &str, version: &str) -> ServiceProxy<'_> {
        ServiceProxy {
            client: self,
            target: BindingKey::new(interface_name, version),
            timeout: self.default_timeout,
        }
    }

    /// Calls `method` on the binding `target` using the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] when the server reports a failure,
    /// [`RpcError::Timeout`] when no reply arrives in time, and transport or
    /// codec errors as they occur.
    pub fn call(
        &self,
        target: &BindingKey,
        method: &str,
        signature: &[&str],
        parameters: Vec<Value>,
    ) -> Result<Value, RpcError> {
        self.call_with_timeout(target, method, signature, parameters, self.default_timeout)
    }

    /// Calls `method` on the binding `target`, waiting at most `timeout` for
    /// the reply. `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::call`].
    pub fn call_with_timeout(
        &self,
        target: &BindingKey,
        method: &str,
        signature: &[&str],
        parameters: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, RpcError> {
        let request_id = Uuid::new_v4().to_string();
        let call = CallEnvelope::new(request_id.as_str(), target.interface_name(), method)
            .with_version(target.version())
            .with_parameters(
                signature.iter().map(|descriptor| (*descriptor).to_owned()).collect(),
                parameters,
            );
        debug!(
            target: CLIENT_TARGET,
            request_id = %request_id,
            service = %target,
            method,
            "invoking remote method"
        );

        let body = self.codec.encode_call(&call)?;
        let reply = self.transport.send_and_await(body, timeout)?;
        let envelope = self.codec.decode_result(&reply)?;
        unwrap_result(&request_id, envelope)
    }

    /// Closes the client's connection. The next call reconnects.
    pub fn close(&self) {
        self.transport.close();
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RpcClient")
            .field("request_destination", self.transport.request_destination())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

fn unwrap_result(request_id: &str, envelope: ResultEnvelope) -> Result<Value, RpcError> {
    if envelope.request_id != request_id {
        warn!(
            target: CLIENT_TARGET,
            expected = request_id,
            received = %envelope.request_id,
            "reply carries a different request id"
        );
    }
    envelope.into_result().map_err(|error| RpcError::Remote {
        request_id: request_id.to_owned(),
        error,
    })
}

/// Client bound to one service binding.
#[derive(Debug, Clone)]
pub struct ServiceProxy<'client> {
    client: &'client RpcClient,
    target: BindingKey,
    timeout: Option<Duration>,
}

impl ServiceProxy<'_> {
    /// Overrides the timeout for calls made through this proxy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binding the proxy calls.
    #[must_use]
    pub const fn target(&self) -> &BindingKey {
        &self.target
    }

    /// Invokes `method` and returns the raw result value.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::call`].
    pub fn invoke(
        &self,
        method: &str,
        signature: &[&str],
        parameters: Vec<Value>,
    ) -> Result<Value, RpcError> {
        self.client
            .call_with_timeout(&self.target, method, signature, parameters, self.timeout)
    }

    /// Invokes `method` and converts the result into `R`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Conversion`] when the result does not deserialise
    /// into `R`, otherwise see [`RpcClient::call`].
    pub fn invoke_as<R>(
        &self,
        method: &str,
        signature: &[&str],
        parameters: Vec<Value>,
    ) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
    {
        let value = self.invoke(method, signature, parameters)?;
        serde_json::from_value(value).map_err(|source| RpcError::Conversion {
            method: method.to_owned(),
            source,
        })
    }
}
