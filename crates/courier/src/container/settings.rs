//! Listener container settings.

use std::time::Duration;

use courier_config::{
    Config, ConfigError, DEFAULT_CONCURRENT_CONSUMERS, DEFAULT_REQUEST_DESTINATION,
    DEFAULT_WORKER_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS,
};

/// Interval at which idle consumers wake to check for shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a listener container consumes its request destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    request_destination: String,
    concurrent_consumers: usize,
    worker_threads: usize,
    worker_queue_capacity: usize,
    poll_interval: Duration,
}

impl ContainerSettings {
    /// Settings for one consumer on `request_destination`, dispatching on the
    /// consuming thread.
    #[must_use]
    pub fn new(request_destination: impl Into<String>) -> Self {
        Self {
            request_destination: request_destination.into(),
            concurrent_consumers: DEFAULT_CONCURRENT_CONSUMERS,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue_capacity: DEFAULT_WORKER_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Copies the container-related values out of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.request_destination())
            .with_concurrent_consumers(config.concurrent_consumers())
            .with_workers(config.worker_threads(), config.worker_queue_capacity())
    }

    /// Sets the number of consumer sessions.
    #[must_use]
    pub const fn with_concurrent_consumers(mut self, consumers: usize) -> Self {
        self.concurrent_consumers = consumers;
        self
    }

    /// Hands dispatch to `threads` workers fed by a queue of
    /// `queue_capacity` requests. Zero threads dispatches on the consuming
    /// thread.
    #[must_use]
    pub const fn with_workers(mut self, threads: usize, queue_capacity: usize) -> Self {
        self.worker_threads = threads;
        self.worker_queue_capacity = queue_capacity;
        self
    }

    /// Sets how long an idle consumer blocks before checking for shutdown.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Destination the consumers listen on.
    #[must_use]
    pub fn request_destination(&self) -> &str {
        &self.request_destination
    }

    /// Number of consumer sessions.
    #[must_use]
    pub const fn concurrent_consumers(&self) -> usize {
        self.concurrent_consumers
    }

    /// Number of dispatch workers; zero dispatches inline.
    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Capacity of the queue feeding the workers.
    #[must_use]
    pub const fn worker_queue_capacity(&self) -> usize {
        self.worker_queue_capacity
    }

    /// How long an idle consumer blocks before checking for shutdown.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Rejects settings the container cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_destination.trim().is_empty() {
            return Err(ConfigError::EmptyDestination {
                field: "request_destination",
            });
        }
        if self.concurrent_consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.worker_threads > 0 && self.worker_queue_capacity == 0 {
            return Err(ConfigError::EmptyWorkerQueue {
                workers: self.worker_threads,
            });
        }
        Ok(())
    }
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_DESTINATION)
    }
}
