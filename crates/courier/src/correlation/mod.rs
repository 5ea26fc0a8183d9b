//! Request/reply correlation over the message transport.
//!
//! Each call sends its body to the request destination with a reply
//! destination attached, then blocks on that destination for a message whose
//! correlation id equals the id the provider assigned to the request. Replies
//! are either received on a temporary destination created for the call or on
//! a shared destination filtered by correlation id; in both cases two
//! concurrent calls can never consume each other's reply.
//!
//! Requests carry the call timeout as their time-to-live and the container
//! hands the unexpired remainder to the reply, so a request or reply that
//! outlives its caller is discarded by the provider instead of piling up on
//! a shared reply destination.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use courier_config::{Config, DEFAULT_PRIORITY, ReplyStrategy};
use tracing::{debug, warn};

use crate::error::RpcError;
use crate::transport::{
    Connection, ConnectionFactory, CorrelationId, Destination, FailureListener, OutboundMessage,
    Session, TransportError,
};

pub(crate) const CORRELATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::correlation");

/// Sends request bodies and waits for the correlated reply.
pub struct CorrelationTransport {
    factory: Arc<dyn ConnectionFactory>,
    request_destination: Destination,
    shared_replies: Option<Destination>,
    priority: u8,
    cached: Arc<Mutex<CachedConnection>>,
}

#[derive(Default)]
struct CachedConnection {
    connection: Option<Arc<dyn Connection>>,
    generation: u64,
}

impl CorrelationTransport {
    /// Creates a transport sending to `request_destination` and receiving
    /// replies on a temporary destination per call.
    pub fn new(factory: Arc<dyn ConnectionFactory>, request_destination: impl Into<String>) -> Self {
        Self {
            factory,
            request_destination: Destination::queue(request_destination),
            shared_replies: None,
            priority: DEFAULT_PRIORITY,
            cached: Arc::new(Mutex::new(CachedConnection::default())),
        }
    }

    /// Builds a transport from the resolved configuration.
    pub fn from_config(factory: Arc<dyn ConnectionFactory>, config: &Config) -> Self {
        let transport =
            Self::new(factory, config.request_destination()).with_priority(config.priority());
        match config.reply_strategy() {
            ReplyStrategy::Temporary => transport,
            ReplyStrategy::Shared => transport.with_shared_replies(config.reply_destination()),
        }
    }

    /// Receives every reply on one named destination, filtered by
    /// correlation id.
    #[must_use]
    pub fn with_shared_replies(mut self, destination: impl Into<String>) -> Self {
        self.shared_replies = Some(Destination::queue(destination));
        self
    }

    /// Sets the priority stamped on requests.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Destination requests are sent to.
    #[must_use]
    pub const fn request_destination(&self) -> &Destination {
        &self.request_destination
    }

    /// Sends `body` and blocks until its reply arrives. `None` waits
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Timeout`] when no reply arrives in time and
    /// [`RpcError::Transport`] when the provider fails.
    pub fn send_and_await(
        &self,
        body: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, RpcError> {
        let connection = self.connection()?;
        let mut call = ReplySession::open(connection.as_ref(), self.shared_replies.as_ref())?;

        let request = OutboundMessage::new(body)
            .with_reply_to(call.reply_to.clone())
            .with_priority(self.priority)
            .with_time_to_live(timeout);
        let message_id = call.session.send(&self.request_destination, request)?;
        let correlation = CorrelationId::from(&message_id);
        debug!(
            target: CORRELATION_TARGET,
            correlation = %correlation,
            reply_to = %call.reply_to,
            "request sent, awaiting reply"
        );

        let reply_to = call.reply_to.clone();
        match call.session.receive(&reply_to, Some(&correlation), timeout)? {
            Some(reply) => Ok(reply.body),
            None => {
                let waited = timeout.unwrap_or_default();
                warn!(
                    target: CORRELATION_TARGET,
                    correlation = %correlation,
                    timeout = ?waited,
                    "no reply before the deadline"
                );
                Err(RpcError::Timeout {
                    destination: reply_to.name().to_owned(),
                    timeout: waited,
                })
            }
        }
    }

    /// Closes the cached connection. The next call opens a new one.
    pub fn close(&self) {
        let connection = lock(&self.cached).connection.take();
        if let Some(connection) = connection {
            connection.close();
        }
    }

    fn connection(&self) -> Result<Arc<dyn Connection>, TransportError> {
        let mut cached = lock(&self.cached);
        if let Some(connection) = &cached.connection {
            return Ok(Arc::clone(connection));
        }

        let connection = self.factory.create_connection()?;
        cached.generation += 1;
        connection.set_failure_listener(Arc::new(InvalidateOnFailure {
            cached: Arc::downgrade(&self.cached),
            generation: cached.generation,
        }));
        match connection.start() {
            Ok(()) | Err(TransportError::IllegalState { .. }) => {}
            Err(error) => {
                connection.close();
                return Err(error);
            }
        }
        cached.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }
}

impl Drop for CorrelationTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(cached: &Mutex<CachedConnection>) -> MutexGuard<'_, CachedConnection> {
    cached.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forgets a cached connection once the provider reports it broken.
struct InvalidateOnFailure {
    cached: Weak<Mutex<CachedConnection>>,
    generation: u64,
}

impl FailureListener for InvalidateOnFailure {
    fn on_failure(&self, error: &TransportError) {
        let Some(cached) = self.cached.upgrade() else {
            return;
        };
        let stale = {
            let mut guard = lock(&cached);
            if guard.generation == self.generation {
                guard.connection.take()
            } else {
                None
            }
        };
        if let Some(connection) = stale {
            warn!(
                target: CORRELATION_TARGET,
                %error,
                "client connection failed, reconnecting on next call"
            );
            connection.close();
        }
    }
}

/// Session used for one call, cleaned up on every exit path.
struct ReplySession {
    session: Box<dyn Session>,
    reply_to: Destination,
    temporary: bool,
}

impl ReplySession {
    fn open(
        connection: &dyn Connection,
        shared_replies: Option<&Destination>,
    ) -> Result<Self, TransportError> {
        let mut session = connection.create_session()?;
        if let Some(destination) = shared_replies {
            return Ok(Self {
                session,
                reply_to: destination.clone(),
                temporary: false,
            });
        }
        match session.create_temporary_destination() {
            Ok(reply_to) => Ok(Self {
                session,
                reply_to,
                temporary: true,
            }),
            Err(error) => {
                session.close();
                Err(error)
            }
        }
    }
}

impl Drop for ReplySession {
    fn drop(&mut self) {
        if self.temporary
            && let Err(error) = self.session.delete_temporary_destination(&self.reply_to)
        {
            debug!(
                target: CORRELATION_TARGET,
                reply_to = %self.reply_to,
                %error,
                "failed to delete temporary reply destination"
            );
        }
        self.session.close();
    }
}

#[cfg(test)]
mod tests;
