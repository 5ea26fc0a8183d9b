//! Layered configuration shared by Courier clients and listener containers.
//!
//! Values resolve from built-in defaults, then a TOML file named by
//! `--config-path` or `COURIER_CONFIG_PATH`, then `COURIER_*` environment
//! variables, and finally command-line flags. [`Config::validate`] rejects
//! combinations the runtime cannot honour so callers fail fast before any
//! connection is opened.

mod defaults;
mod logging;
mod reply;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CONCURRENT_CONSUMERS, DEFAULT_LOG_FILTER, DEFAULT_PRIORITY,
    DEFAULT_RECEIVE_TIMEOUT_MS, DEFAULT_REPLY_DESTINATION, DEFAULT_REQUEST_DESTINATION,
    DEFAULT_WORKER_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS, MAX_PRIORITY, default_log_filter,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use reply::{ReplyStrategy, ReplyStrategyParseError};

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// Destination the listener container consumes and clients send to.
    #[serde(default = "defaults::default_request_destination")]
    request_destination: String,
    /// How callers receive replies.
    #[serde(default = "defaults::default_reply_strategy")]
    reply_strategy: ReplyStrategy,
    /// Named reply destination used by the shared strategy.
    #[serde(default = "defaults::default_reply_destination")]
    reply_destination: String,
    /// Number of concurrent consumers run by the listener container.
    #[serde(default = "defaults::default_concurrent_consumers")]
    concurrent_consumers: usize,
    /// Reply wait in milliseconds; zero waits indefinitely.
    #[serde(default = "defaults::default_receive_timeout_ms")]
    receive_timeout_ms: u64,
    /// Priority attached to outbound requests.
    #[serde(default = "defaults::default_priority")]
    priority: u8,
    /// Worker threads that process requests off the consumer threads.
    #[serde(default = "defaults::default_worker_threads")]
    worker_threads: usize,
    /// Bound on requests waiting for a worker.
    #[serde(default = "defaults::default_worker_queue_capacity")]
    worker_queue_capacity: usize,
    /// Filter expression applied to log output.
    #[serde(default = "defaults::default_log_filter_string")]
    log_filter: String,
    /// Output format for log events.
    #[serde(default = "defaults::default_log_format")]
    log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_destination: defaults::default_request_destination(),
            reply_strategy: defaults::default_reply_strategy(),
            reply_destination: defaults::default_reply_destination(),
            concurrent_consumers: DEFAULT_CONCURRENT_CONSUMERS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            priority: DEFAULT_PRIORITY,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue_capacity: DEFAULT_WORKER_QUEUE_CAPACITY,
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Destination carrying call envelopes.
    #[must_use]
    pub fn request_destination(&self) -> &str {
        &self.request_destination
    }

    /// Reply strategy used by clients.
    #[must_use]
    pub const fn reply_strategy(&self) -> ReplyStrategy {
        self.reply_strategy
    }

    /// Named reply destination for [`ReplyStrategy::Shared`].
    #[must_use]
    pub fn reply_destination(&self) -> &str {
        &self.reply_destination
    }

    /// Number of concurrent consumers.
    #[must_use]
    pub const fn concurrent_consumers(&self) -> usize {
        self.concurrent_consumers
    }

    /// Reply wait, or `None` to block until a reply arrives.
    #[must_use]
    pub const fn receive_timeout(&self) -> Option<Duration> {
        if self.receive_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.receive_timeout_ms))
        }
    }

    /// Priority applied to outbound requests.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    /// Worker threads; zero processes requests on the consumer threads.
    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Capacity of the worker queue.
    #[must_use]
    pub const fn worker_queue_capacity(&self) -> usize {
        self.worker_queue_capacity
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Overrides the request destination.
    #[must_use]
    pub fn with_request_destination(mut self, destination: impl Into<String>) -> Self {
        self.request_destination = destination.into();
        self
    }

    /// Overrides the reply strategy and, for the shared strategy, its destination.
    #[must_use]
    pub fn with_reply_strategy(mut self, strategy: ReplyStrategy) -> Self {
        self.reply_strategy = strategy;
        self
    }

    /// Overrides the shared reply destination.
    #[must_use]
    pub fn with_reply_destination(mut self, destination: impl Into<String>) -> Self {
        self.reply_destination = destination.into();
        self
    }

    /// Overrides the consumer count.
    #[must_use]
    pub const fn with_concurrent_consumers(mut self, consumers: usize) -> Self {
        self.concurrent_consumers = consumers;
        self
    }

    /// Overrides the reply wait; `None` blocks indefinitely.
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout_ms = timeout.map_or(0, |value| {
            u64::try_from(value.as_millis()).unwrap_or(u64::MAX).max(1)
        });
        self
    }

    /// Overrides the request priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Overrides the worker pool shape.
    #[must_use]
    pub const fn with_workers(mut self, threads: usize, queue_capacity: usize) -> Self {
        self.worker_threads = threads;
        self.worker_queue_capacity = queue_capacity;
        self
    }

    /// Overrides the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Overrides the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Checks that the resolved values describe a runnable configuration.
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
        if self.reply_strategy == ReplyStrategy::Shared
            && self.reply_destination.trim().is_empty()
        {
            return Err(ConfigError::EmptyDestination {
                field: "reply_destination",
            });
        }
        if self.concurrent_consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.priority > MAX_PRIORITY {
            return Err(ConfigError::PriorityOutOfRange {
                priority: self.priority,
            });
        }
        if self.worker_threads > 0 && self.worker_queue_capacity == 0 {
            return Err(ConfigError::EmptyWorkerQueue {
                workers: self.worker_threads,
            });
        }
        Ok(())
    }
}

/// Reasons a loaded configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A destination name was blank.
    #[error("{field} must name a destination")]
    EmptyDestination {
        /// Offending configuration key.
        field: &'static str,
    },
    /// The consumer count was zero.
    #[error("concurrent_consumers must be at least 1")]
    NoConsumers,
    /// The priority exceeded [`MAX_PRIORITY`].
    #[error("priority {priority} exceeds the maximum of {MAX_PRIORITY}")]
    PriorityOutOfRange {
        /// Requested priority.
        priority: u8,
    },
    /// Workers were requested without room to queue work for them.
    #[error("{workers} worker threads need a worker_queue_capacity of at least 1")]
    EmptyWorkerQueue {
        /// Requested worker count.
        workers: usize,
    },
}
