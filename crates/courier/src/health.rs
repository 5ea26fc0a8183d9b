//! Structured health reporting for bootstrap and container lifecycle events.

use std::sync::Arc;

use courier_config::Config;

use crate::bootstrap::BootstrapError;
use crate::container::ContainerError;
use crate::transport::TransportError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before a listener container attaches its consumers.
    fn container_starting(&self, destination: &str, consumers: usize);

    /// Invoked once every consumer is attached and delivery has started.
    fn container_running(&self, consumers: usize, generation: u64);

    /// Invoked when a listener container fails to start.
    fn container_start_failed(&self, error: &ContainerError);

    /// Invoked after a listener container has released its connection.
    fn container_stopped(&self);

    /// Invoked when the shared connection of generation `generation` breaks.
    fn transport_failed(&self, error: &TransportError, generation: u64);

    /// Invoked after the container rebuilt its connection and consumers.
    fn recovery_succeeded(&self, consumers: usize, generation: u64);

    /// Invoked when rebuilding the connection or consumers fails.
    fn recovery_failed(&self, error: &ContainerError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn container_starting(&self, destination: &str, consumers: usize) {
        (**self).container_starting(destination, consumers);
    }

    fn container_running(&self, consumers: usize, generation: u64) {
        (**self).container_running(consumers, generation);
    }

    fn container_start_failed(&self, error: &ContainerError) {
        (**self).container_start_failed(error);
    }

    fn container_stopped(&self) {
        (**self).container_stopped();
    }

    fn transport_failed(&self, error: &TransportError, generation: u64) {
        (**self).transport_failed(error, generation);
    }

    fn recovery_succeeded(&self, consumers: usize, generation: u64) {
        (**self).recovery_succeeded(consumers, generation);
    }

    fn recovery_failed(&self, error: &ContainerError) {
        (**self).recovery_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting courier bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            request_destination = config.request_destination(),
            reply_strategy = %config.reply_strategy(),
            concurrent_consumers = config.concurrent_consumers(),
            worker_threads = config.worker_threads(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "courier bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "courier bootstrap failed"
        );
    }

    fn container_starting(&self, destination: &str, consumers: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "container_starting",
            destination,
            consumers,
            "starting listener container"
        );
    }

    fn container_running(&self, consumers: usize, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "container_running",
            consumers,
            generation,
            "listener container running"
        );
    }

    fn container_start_failed(&self, error: &ContainerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "container_start_failed",
            error = %error,
            "listener container failed to start"
        );
    }

    fn container_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "container_stopped",
            "listener container stopped"
        );
    }

    fn transport_failed(&self, error: &TransportError, generation: u64) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "transport_failed",
            generation,
            error = %error,
            "shared connection failed, recovering"
        );
    }

    fn recovery_succeeded(&self, consumers: usize, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "recovery_succeeded",
            consumers,
            generation,
            "listener container recovered"
        );
    }

    fn recovery_failed(&self, error: &ContainerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "recovery_failed",
            error = %error,
            "listener container could not recover"
        );
    }
}
