//! Runtime bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use courier_config::{Config, ConfigError};

use crate::client::RpcClient;
use crate::container::{ContainerError, ListenerContainer};
use crate::health::HealthReporter;
use crate::registry::ServiceRegistry;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::ConnectionFactory;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the runtime configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, the configuration file, `COURIER_*`
/// environment variables and command-line flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but cannot be run.
    #[error("invalid configuration: {source}")]
    Validation {
        /// First problem found.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
///
/// Wires listener containers and clients from the resolved configuration,
/// sharing the bootstrap's health reporter.
pub struct Courier {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Courier {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds an unstarted listener container serving `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidSettings`] when the configured
    /// settings cannot be run.
    pub fn listener_container(
        &self,
        factory: Arc<dyn ConnectionFactory>,
        registry: ServiceRegistry,
    ) -> Result<ListenerContainer, ContainerError> {
        ListenerContainer::from_config(factory, registry, &self.config, Arc::clone(&self.reporter))
    }

    /// Builds a client sending to the configured request destination.
    #[must_use]
    pub fn client(&self, factory: Arc<dyn ConnectionFactory>) -> RpcClient {
        RpcClient::from_config(factory, &self.config)
    }
}

/// Bootstraps the runtime using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration cannot be loaded or
/// validated, or when telemetry cannot be installed. Each failure is also
/// reported through `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Courier, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.validate() {
        let error = BootstrapError::Validation { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Courier {
        config,
        telemetry,
        reporter,
    })
}
