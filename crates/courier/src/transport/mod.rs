//! Point-to-point message transport contract.
//!
//! The core drives the transport through three object-safe traits: a
//! [`ConnectionFactory`] hands out shared [`Connection`]s, each connection
//! creates single-threaded [`Session`]s, and a [`FailureListener`] is told
//! when the connection breaks. [`memory::MemoryBroker`] implements the
//! contract in-process.

mod errors;
mod message;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

pub use self::errors::TransportError;
pub use self::message::{
    CorrelationId, Destination, DestinationKind, Message, MessageId, OutboundMessage,
};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Creates connections to a message provider.
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new, stopped connection.
    fn create_connection(&self) -> Result<Arc<dyn Connection>, TransportError>;
}

/// A connection shared by every session created from it.
///
/// Connections are safe to use from many threads. Messages are only
/// delivered to sessions while the connection is started.
pub trait Connection: Send + Sync {
    /// Starts delivery. Starting an already started connection fails with
    /// [`TransportError::IllegalState`].
    fn start(&self) -> Result<(), TransportError>;

    /// Pauses delivery without releasing the connection.
    fn stop(&self) -> Result<(), TransportError>;

    /// Releases the connection together with its temporary destinations.
    fn close(&self);

    /// Creates a new session. Each session must only be driven by one thread
    /// at a time.
    fn create_session(&self) -> Result<Box<dyn Session>, TransportError>;

    /// Registers the callback invoked when the connection breaks.
    fn set_failure_listener(&self, listener: Arc<dyn FailureListener>);
}

/// A single-threaded context for producing and consuming messages.
pub trait Session: Send {
    /// Sends `message` to `destination`, returning the id the provider
    /// assigned to it.
    fn send(
        &mut self,
        destination: &Destination,
        message: OutboundMessage,
    ) -> Result<MessageId, TransportError>;

    /// Waits for the next message on `destination`.
    ///
    /// When `filter` is set only a message carrying that correlation id is
    /// taken. `None` as the timeout waits indefinitely; `Ok(None)` reports
    /// that the timeout elapsed.
    fn receive(
        &mut self,
        destination: &Destination,
        filter: Option<&CorrelationId>,
        timeout: Option<Duration>,
    ) -> Result<Option<Message>, TransportError>;

    /// Creates a destination that lives until deleted or until its
    /// connection closes.
    fn create_temporary_destination(&mut self) -> Result<Destination, TransportError>;

    /// Deletes a temporary destination, discarding undelivered messages.
    fn delete_temporary_destination(
        &mut self,
        destination: &Destination,
    ) -> Result<(), TransportError>;

    /// Closes the session. Further calls fail with
    /// [`TransportError::SessionClosed`].
    fn close(&mut self);
}

/// Callback notified when a connection fails.
pub trait FailureListener: Send + Sync {
    /// Invoked once per failure, on a provider-owned thread.
    fn on_failure(&self, error: &TransportError);
}

impl<T> FailureListener for Arc<T>
where
    T: FailureListener,
{
    fn on_failure(&self, error: &TransportError) {
        (**self).on_failure(error);
    }
}
