//! Message, destination and identifier types.

use std::fmt;
use std::time::{Duration, Instant};

use courier_config::DEFAULT_PRIORITY;

/// Whether a destination is a named queue or a temporary reply queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// Long-lived named queue, created on first use.
    Queue,
    /// Queue owned by one connection and deleted explicitly.
    Temporary,
}

/// Address messages are sent to and received from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    name: String,
    kind: DestinationKind,
}

impl Destination {
    /// A named queue.
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Queue,
        }
    }

    /// A temporary queue.
    pub fn temporary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Temporary,
        }
    }

    /// Destination name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination kind.
    #[must_use]
    pub const fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Returns `true` for temporary destinations.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self.kind, DestinationKind::Temporary)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.name)
    }
}

/// Provider-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps a provider identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Transport-level token matching a reply to its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wraps a correlation token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&MessageId> for CorrelationId {
    fn from(id: &MessageId) -> Self {
        Self(id.0.clone())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A message about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Encoded payload.
    pub body: Vec<u8>,
    /// Correlation header.
    pub correlation_id: Option<CorrelationId>,
    /// Where the receiver should reply.
    pub reply_to: Option<Destination>,
    /// Delivery priority, 0 (lowest) to 9 (highest).
    pub priority: u8,
    /// How long the provider keeps the message before discarding it unread.
    pub time_to_live: Option<Duration>,
}

impl OutboundMessage {
    /// A message with no headers at the default priority.
    #[must_use]
    pub const fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            correlation_id: None,
            reply_to: None,
            priority: DEFAULT_PRIORITY,
            time_to_live: None,
        }
    }

    /// Sets the correlation header.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the reply destination.
    #[must_use]
    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.reply_to = Some(destination);
        self
    }

    /// Sets the delivery priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the time-to-live; `None` keeps the message until it is consumed.
    #[must_use]
    pub const fn with_time_to_live(mut self, time_to_live: Option<Duration>) -> Self {
        self.time_to_live = time_to_live;
        self
    }
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Provider-assigned identifier.
    pub id: MessageId,
    /// Correlation header, if the sender set one.
    pub correlation_id: Option<CorrelationId>,
    /// Reply destination, if the sender set one.
    pub reply_to: Option<Destination>,
    /// Delivery priority.
    pub priority: u8,
    /// Instant after which the provider discards the message.
    pub expires_at: Option<Instant>,
    /// Encoded payload.
    pub body: Vec<u8>,
}

impl Message {
    /// Token a reply to this message must carry: the inbound correlation id,
    /// or the message id when none was set.
    #[must_use]
    pub fn reply_correlation(&self) -> CorrelationId {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| CorrelationId::from(&self.id))
    }

    /// Returns `true` once the message has outlived its time-to-live.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Lifetime left before expiry, or `None` when the message never expires.
    #[must_use]
    pub fn remaining_time_to_live(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}
