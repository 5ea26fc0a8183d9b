//! Ownership of the shared transport connection.
//!
//! [`ConnectionLifecycle`] is the only component that creates, starts and
//! releases the connection shared by a container's sessions. A failed
//! connection is never repaired in place: [`ConnectionLifecycle::refresh`]
//! closes it and establishes a replacement, bumping the generation so
//! notifications about the old connection can be recognised as stale.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::transport::{Connection, ConnectionFactory, TransportError};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Creates, starts, stops and replaces one shared connection.
pub struct ConnectionLifecycle {
    factory: Arc<dyn ConnectionFactory>,
    connection: Option<Arc<dyn Connection>>,
    started: bool,
    generation: u64,
}

impl ConnectionLifecycle {
    /// Creates a manager with no connection yet.
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connection: None,
            started: false,
            generation: 0,
        }
    }

    /// Returns the shared connection, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns the factory's error when no connection can be opened.
    pub fn establish(&mut self) -> Result<Arc<dyn Connection>, TransportError> {
        if let Some(connection) = &self.connection {
            return Ok(Arc::clone(connection));
        }
        let connection = self.factory.create_connection()?;
        self.generation += 1;
        self.started = false;
        self.connection = Some(Arc::clone(&connection));
        info!(
            target: LIFECYCLE_TARGET,
            generation = self.generation,
            "shared connection established"
        );
        Ok(connection)
    }

    /// Establishes the connection if needed and starts delivery.
    ///
    /// A connection the provider reports as already started is accepted.
    ///
    /// # Errors
    ///
    /// Returns any other error raised while establishing or starting.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let connection = self.establish()?;
        if self.started {
            return Ok(());
        }
        match connection.start() {
            Ok(()) => {}
            Err(TransportError::IllegalState { message }) => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    generation = self.generation,
                    %message,
                    "could not start shared connection, assuming it is already started"
                );
            }
            Err(error) => return Err(error),
        }
        self.started = true;
        Ok(())
    }

    /// Pauses delivery on the shared connection, if there is one.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when the connection cannot be stopped.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        if let Some(connection) = &self.connection
            && self.started
        {
            connection.stop()?;
        }
        self.started = false;
        Ok(())
    }

    /// Closes and forgets the shared connection.
    pub fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!(
                target: LIFECYCLE_TARGET,
                generation = self.generation,
                "shared connection released"
            );
        }
        self.started = false;
    }

    /// Replaces the shared connection, restarting the replacement when the
    /// old one had been started.
    ///
    /// # Errors
    ///
    /// Returns the error raised while establishing or starting the
    /// replacement. The old connection is released either way.
    pub fn refresh(&mut self) -> Result<Arc<dyn Connection>, TransportError> {
        let restart = self.started;
        self.release();
        let connection = self.establish()?;
        if restart {
            self.start()?;
        }
        Ok(connection)
    }

    /// The current connection, if one is established.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.clone()
    }

    /// Number of connections established so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` once the current connection has been started.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

impl fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectionLifecycle")
            .field("connected", &self.connection.is_some())
            .field("started", &self.started)
            .field("generation", &self.generation)
            .finish()
    }
}
