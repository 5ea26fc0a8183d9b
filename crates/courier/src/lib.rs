//! Synchronous remote procedure calls over a point-to-point message queue.
//!
//! A caller invokes a method through an [`RpcClient`] or a [`ServiceProxy`].
//! The call travels as a [`CallEnvelope`](courier_types::CallEnvelope) to
//! the request destination, where one of the consumers of a
//! [`ListenerContainer`] hands it to the [`ServiceDispatcher`]. The
//! dispatcher resolves the binding in a [`ServiceRegistry`], invokes the
//! method and ships the outcome back as a
//! [`ResultEnvelope`](courier_types::ResultEnvelope) on the caller's reply
//! destination. The [`CorrelationTransport`] matches that reply to the
//! waiting call by the correlation id the provider assigned to the request,
//! so any number of concurrent callers can share the same destinations.
//!
//! The transport is abstract. [`transport::memory::MemoryBroker`] provides
//! an in-process implementation of the contract used by the tests and the
//! `courier-demo` binary.
//!
//! ## Recovery
//!
//! A listener container owns one shared connection through its
//! [`ConnectionLifecycle`]. When the provider reports the connection broken
//! the container discards every consumer session, replaces the connection
//! and attaches a fresh set of consumers. Bindings and settings survive.
//! If the replacement cannot be established the container stays in
//! [`ContainerState::Recovering`] with no consumers until
//! [`ListenerContainer::recover`] is called.

mod bootstrap;
mod client;
mod codec;
mod container;
mod correlation;
pub mod demo;
mod dispatch;
mod error;
mod health;
mod lifecycle;
mod registry;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Courier, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use client::{RpcClient, ServiceProxy};
pub use codec::{Codec, CodecError, JsonCodec};
pub use container::{
    ContainerBuilder, ContainerError, ContainerSettings, ContainerState, DEFAULT_POLL_INTERVAL,
    ListenerContainer,
};
pub use correlation::CorrelationTransport;
pub use dispatch::ServiceDispatcher;
pub use error::RpcError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::ConnectionLifecycle;
pub use registry::{InvocationError, MethodTable, RegistryError, ServiceHandler, ServiceRegistry};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
