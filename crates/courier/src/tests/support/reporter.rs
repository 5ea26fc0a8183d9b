//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures bootstrap and listener container telemetry so unit
//! and behaviour tests can validate observable lifecycle events.

use std::sync::Mutex;

use courier_config::Config;

use crate::bootstrap::BootstrapError;
use crate::container::ContainerError;
use crate::health::HealthReporter;
use crate::transport::TransportError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A container began attaching consumers.
    ContainerStarting { consumers: usize },
    /// A container reached the running state.
    ContainerRunning { consumers: usize, generation: u64 },
    /// A container failed to start.
    ContainerStartFailed(String),
    /// A container stopped.
    ContainerStopped,
    /// The shared connection broke.
    TransportFailed { generation: u64 },
    /// Recovery restored the container.
    RecoverySucceeded { consumers: usize, generation: u64 },
    /// Recovery failed with an error description.
    RecoveryFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Returns `true` when any recorded event satisfies `predicate`.
    pub fn recorded(&self, predicate: impl Fn(&HealthEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn container_starting(&self, _destination: &str, consumers: usize) {
        self.record(HealthEvent::ContainerStarting { consumers });
    }

    fn container_running(&self, consumers: usize, generation: u64) {
        self.record(HealthEvent::ContainerRunning {
            consumers,
            generation,
        });
    }

    fn container_start_failed(&self, error: &ContainerError) {
        self.record(HealthEvent::ContainerStartFailed(error.to_string()));
    }

    fn container_stopped(&self) {
        self.record(HealthEvent::ContainerStopped);
    }

    fn transport_failed(&self, _error: &TransportError, generation: u64) {
        self.record(HealthEvent::TransportFailed { generation });
    }

    fn recovery_succeeded(&self, consumers: usize, generation: u64) {
        self.record(HealthEvent::RecoverySucceeded {
            consumers,
            generation,
        });
    }

    fn recovery_failed(&self, error: &ContainerError) {
        self.record(HealthEvent::RecoveryFailed(error.to_string()));
    }
}
