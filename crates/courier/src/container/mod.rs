//! Server-side listener container.
//!
//! A [`ListenerContainer`] attaches `concurrent_consumers` sessions to the
//! request destination over one shared connection. Each consumer runs on its
//! own thread and either dispatches requests itself or queues them for a
//! bounded worker pool. When the provider reports the shared connection
//! broken, the container discards every consumer and worker, asks its
//! [`ConnectionLifecycle`] for a replacement connection and attaches a fresh
//! set of consumers. Registered services and settings are untouched by
//! recovery.

mod consumer;
mod processor;
mod settings;
mod state;
mod workers;

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use courier_config::{Config, ConfigError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use self::consumer::{ConsumerSet, Delivery};
use self::processor::RequestProcessor;
use self::workers::WorkerPool;
use crate::codec::{Codec, JsonCodec};
use crate::dispatch::ServiceDispatcher;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::lifecycle::ConnectionLifecycle;
use crate::registry::ServiceRegistry;
use crate::telemetry::ThreadRole;
use crate::transport::{
    Connection, ConnectionFactory, Destination, FailureListener, TransportError,
};

pub use self::settings::{ContainerSettings, DEFAULT_POLL_INTERVAL};
pub use self::state::ContainerState;

pub(crate) const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");

/// Errors raised while starting, stopping or recovering a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The settings cannot be run.
    #[error("invalid container settings: {source}")]
    InvalidSettings {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// The shared connection could not be established or started.
    #[error("shared connection unavailable: {source}")]
    Connection {
        /// Provider error.
        #[source]
        source: TransportError,
    },
    /// A consumer or worker session could not be created.
    #[error("failed to create session for {role} {index}: {source}")]
    Session {
        /// `consumer` or `worker`.
        role: &'static str,
        /// Position of the session in its pool.
        index: usize,
        /// Provider error.
        #[source]
        source: TransportError,
    },
    /// A consumer or worker thread could not be spawned.
    #[error("failed to spawn thread {thread}: {source}")]
    Spawn {
        /// Name of the thread.
        thread: String,
        /// Operating system error.
        #[source]
        source: io::Error,
    },
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} a container that is {state}")]
    InvalidState {
        /// Operation that was refused.
        operation: &'static str,
        /// State the container was in.
        state: ContainerState,
    },
}

impl From<TransportError> for ContainerError {
    fn from(source: TransportError) -> Self {
        Self::Connection { source }
    }
}

/// Pool of consumers serving requests for a [`ServiceRegistry`].
pub struct ListenerContainer {
    inner: Arc<ContainerInner>,
}

impl ListenerContainer {
    /// Starts building a container that dispatches through `dispatcher`.
    #[must_use]
    pub fn builder(
        factory: Arc<dyn ConnectionFactory>,
        dispatcher: ServiceDispatcher,
    ) -> ContainerBuilder {
        ContainerBuilder {
            factory,
            dispatcher,
            settings: ContainerSettings::default(),
            codec: Arc::new(JsonCodec),
            reporter: Arc::new(StructuredHealthReporter::new()),
        }
    }

    /// Builds a container serving `registry` with settings taken from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidSettings`] when the configured
    /// settings cannot be run.
    pub fn from_config(
        factory: Arc<dyn ConnectionFactory>,
        registry: ServiceRegistry,
        config: &Config,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, ContainerError> {
        Self::builder(factory, ServiceDispatcher::new(Arc::new(registry)))
            .settings(ContainerSettings::from_config(config))
            .reporter(reporter)
            .build()
    }

    /// Establishes the shared connection, attaches the consumers and starts
    /// delivery. Starting a running container does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidState`] while starting or
    /// recovering, and any connection, session or spawn error. A failed
    /// start leaves the container uninitialized with nothing attached.
    pub fn start(&self) -> Result<(), ContainerError> {
        let inner = &self.inner;
        let mut core = inner.lock_core();
        match core.state {
            ContainerState::Running => return Ok(()),
            ContainerState::Uninitialized | ContainerState::Stopped => {}
            state @ (ContainerState::Starting | ContainerState::Recovering) => {
                return Err(ContainerError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }

        core.state = ContainerState::Starting;
        inner.reporter.container_starting(
            inner.settings.request_destination(),
            inner.settings.concurrent_consumers(),
        );
        let attached = inner.bring_up(&mut core, false);

        match attached {
            Ok(()) => {
                core.state = ContainerState::Running;
                info!(
                    target: CONTAINER_TARGET,
                    destination = inner.settings.request_destination(),
                    consumers = inner.settings.concurrent_consumers(),
                    workers = inner.settings.worker_threads(),
                    "listener container started"
                );
                inner
                    .reporter
                    .container_running(core.consumers.active(), core.lifecycle.generation());
                Ok(())
            }
            Err(start_error) => {
                core.detach();
                core.lifecycle.release();
                core.state = ContainerState::Uninitialized;
                inner.reporter.container_start_failed(&start_error);
                Err(start_error)
            }
        }
    }

    /// Detaches every consumer and worker and releases the shared
    /// connection. Stopping a stopped container does nothing.
    pub fn stop(&self) {
        let mut core = self.inner.lock_core();
        match core.state {
            ContainerState::Stopped => return,
            ContainerState::Uninitialized => {
                core.state = ContainerState::Stopped;
                return;
            }
            _ => {}
        }
        core.detach();
        if let Err(stop_error) = core.lifecycle.stop() {
            debug!(
                target: CONTAINER_TARGET,
                error = %stop_error,
                "failed to stop delivery before release"
            );
        }
        core.lifecycle.release();
        core.state = ContainerState::Stopped;
        info!(target: CONTAINER_TARGET, "listener container stopped");
        self.inner.reporter.container_stopped();
    }

    /// Replaces the shared connection and every consumer.
    ///
    /// Recovery runs on its own when the provider reports a failure; this
    /// entry point retries after a failed recovery.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidState`] unless the container is
    /// running or recovering, and the error that prevented recovery
    /// otherwise.
    pub fn recover(&self) -> Result<(), ContainerError> {
        let mut core = self.inner.lock_core();
        match core.state {
            ContainerState::Running | ContainerState::Recovering => {}
            state => {
                return Err(ContainerError::InvalidState {
                    operation: "recover",
                    state,
                });
            }
        }
        self.inner.recover(&mut core)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContainerState {
        self.inner.lock_core().state
    }

    /// Number of consumer threads currently attached.
    #[must_use]
    pub fn active_consumers(&self) -> usize {
        self.inner.lock_core().consumers.active()
    }

    /// Number of shared connections established so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock_core().lifecycle.generation()
    }

    /// Settings the container runs with.
    #[must_use]
    pub fn settings(&self) -> &ContainerSettings {
        &self.inner.settings
    }
}

impl Drop for ListenerContainer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ListenerContainer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock_core();
        formatter
            .debug_struct("ListenerContainer")
            .field("settings", &self.inner.settings)
            .field("state", &core.state)
            .field("lifecycle", &core.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ListenerContainer`].
pub struct ContainerBuilder {
    factory: Arc<dyn ConnectionFactory>,
    dispatcher: ServiceDispatcher,
    settings: ContainerSettings,
    codec: Arc<dyn Codec>,
    reporter: Arc<dyn HealthReporter>,
}

impl ContainerBuilder {
    /// Replaces the default settings.
    #[must_use]
    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the JSON codec.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replaces the tracing health reporter.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Validates the settings and builds an unstarted container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidSettings`] when the settings cannot
    /// be run.
    pub fn build(self) -> Result<ListenerContainer, ContainerError> {
        self.settings
            .validate()
            .map_err(|source| ContainerError::InvalidSettings { source })?;
        let core = ContainerCore {
            state: ContainerState::Uninitialized,
            lifecycle: ConnectionLifecycle::new(self.factory),
            consumers: ConsumerSet::new(),
            pool: None,
        };
        Ok(ListenerContainer {
            inner: Arc::new(ContainerInner {
                settings: self.settings,
                processor: Arc::new(RequestProcessor::new(self.dispatcher, self.codec)),
                reporter: self.reporter,
                core: Mutex::new(core),
            }),
        })
    }
}

struct ContainerInner {
    settings: ContainerSettings,
    processor: Arc<RequestProcessor>,
    reporter: Arc<dyn HealthReporter>,
    core: Mutex<ContainerCore>,
}

/// State mutated only under the container lock.
struct ContainerCore {
    state: ContainerState,
    lifecycle: ConnectionLifecycle,
    consumers: ConsumerSet,
    pool: Option<WorkerPool>,
}

impl ContainerCore {
    /// Stops consumers before workers so no consumer is left holding the
    /// queue the workers drain.
    fn detach(&mut self) {
        self.consumers.shutdown();
        self.consumers = ConsumerSet::new();
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

impl ContainerInner {
    fn lock_core(&self) -> MutexGuard<'_, ContainerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establishes, or with `refresh` replaces, the shared connection,
    /// attaches consumers to it and starts delivery.
    fn bring_up(
        self: &Arc<Self>,
        core: &mut ContainerCore,
        refresh: bool,
    ) -> Result<(), ContainerError> {
        let connection = if refresh {
            core.lifecycle.refresh()?
        } else {
            core.lifecycle.establish()?
        };
        self.attach(core, connection.as_ref())?;
        core.lifecycle.start()?;
        Ok(())
    }

    /// Registers the failure listener and creates the consumers and workers
    /// for `connection`.
    fn attach(
        self: &Arc<Self>,
        core: &mut ContainerCore,
        connection: &dyn Connection,
    ) -> Result<(), ContainerError> {
        connection.set_failure_listener(Arc::new(RecoveryListener {
            container: Arc::downgrade(self),
            generation: core.lifecycle.generation(),
        }));

        let delivery = if self.settings.worker_threads() == 0 {
            Delivery::Inline(Arc::clone(&self.processor))
        } else {
            let (pool, queue) = WorkerPool::spawn(
                connection,
                &self.processor,
                self.settings.worker_threads(),
                self.settings.worker_queue_capacity(),
            )?;
            core.pool = Some(pool);
            Delivery::Pooled(queue)
        };

        let destination = Destination::queue(self.settings.request_destination());
        for index in 0..self.settings.concurrent_consumers() {
            let session = connection
                .create_session()
                .map_err(|source| ContainerError::Session {
                    role: ThreadRole::Consumer.as_str(),
                    index,
                    source,
                })?;
            core.consumers.spawn(
                session,
                destination.clone(),
                self.settings.poll_interval(),
                delivery.clone(),
            )?;
        }
        Ok(())
    }

    /// Handles a failure notification for the connection of `generation`.
    fn connection_failed(self: &Arc<Self>, failure: &TransportError, generation: u64) {
        let mut core = self.lock_core();
        if core.state != ContainerState::Running || core.lifecycle.generation() != generation {
            debug!(
                target: CONTAINER_TARGET,
                generation,
                current_generation = core.lifecycle.generation(),
                state = %core.state,
                "ignoring failure of a connection that is no longer in use"
            );
            return;
        }
        warn!(
            target: CONTAINER_TARGET,
            generation,
            error = %failure,
            "shared connection failed, refreshing"
        );
        self.reporter.transport_failed(failure, generation);
        // Failures are reported to the health reporter inside `recover`.
        let _ = self.recover(&mut core);
    }

    fn recover(self: &Arc<Self>, core: &mut ContainerCore) -> Result<(), ContainerError> {
        core.state = ContainerState::Recovering;
        core.detach();

        let rebuilt = self.bring_up(core, true);

        match rebuilt {
            Ok(()) => {
                core.state = ContainerState::Running;
                info!(
                    target: CONTAINER_TARGET,
                    generation = core.lifecycle.generation(),
                    consumers = core.consumers.active(),
                    "listener container recovered"
                );
                self.reporter
                    .recovery_succeeded(core.consumers.active(), core.lifecycle.generation());
                Ok(())
            }
            Err(recovery_error) => {
                core.detach();
                core.lifecycle.release();
                error!(
                    target: CONTAINER_TARGET,
                    error = %recovery_error,
                    "non-recoverable failure while refreshing the shared connection, \
                     no consumers are attached until recovery is retried"
                );
                self.reporter.recovery_failed(&recovery_error);
                Err(recovery_error)
            }
        }
    }
}

/// Routes failure notifications for one connection generation back to its
/// container.
struct RecoveryListener {
    container: Weak<ContainerInner>,
    generation: u64,
}

impl FailureListener for RecoveryListener {
    fn on_failure(&self, error: &TransportError) {
        if let Some(container) = self.container.upgrade() {
            container.connection_failed(error, self.generation);
        }
    }
}

#[cfg(test)]
mod tests;
