//! Built-in configuration defaults.

use crate::logging::LogFormat;
use crate::reply::ReplyStrategy;

/// Destination the listener container consumes requests from.
pub const DEFAULT_REQUEST_DESTINATION: &str = "courier.requests";

/// Shared reply destination used by [`ReplyStrategy::Shared`].
pub const DEFAULT_REPLY_DESTINATION: &str = "courier.replies";

/// Number of consumers the listener container runs by default.
pub const DEFAULT_CONCURRENT_CONSUMERS: usize = 1;

/// Reply wait in milliseconds; zero blocks until a reply arrives.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 0;

/// Message priority applied to outbound requests.
pub const DEFAULT_PRIORITY: u8 = 4;

/// Highest priority a transport accepts.
pub const MAX_PRIORITY: u8 = 9;

/// Worker threads backing the listener container; zero processes inline.
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Bound on requests queued for the worker pool.
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 64;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned request destination used where allocation is required (e.g. serde).
pub fn default_request_destination() -> String {
    DEFAULT_REQUEST_DESTINATION.to_owned()
}

/// Owned reply destination used where allocation is required (e.g. serde).
pub fn default_reply_destination() -> String {
    DEFAULT_REPLY_DESTINATION.to_owned()
}

/// Default reply strategy.
pub const fn default_reply_strategy() -> ReplyStrategy {
    ReplyStrategy::Temporary
}

/// Serde helper for [`DEFAULT_CONCURRENT_CONSUMERS`].
pub const fn default_concurrent_consumers() -> usize {
    DEFAULT_CONCURRENT_CONSUMERS
}

/// Serde helper for [`DEFAULT_RECEIVE_TIMEOUT_MS`].
pub const fn default_receive_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT_MS
}

/// Serde helper for [`DEFAULT_PRIORITY`].
pub const fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// Serde helper for [`DEFAULT_WORKER_THREADS`].
pub const fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

/// Serde helper for [`DEFAULT_WORKER_QUEUE_CAPACITY`].
pub const fn default_worker_queue_capacity() -> usize {
    DEFAULT_WORKER_QUEUE_CAPACITY
}

/// Default log filter expression used by the binaries.
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
