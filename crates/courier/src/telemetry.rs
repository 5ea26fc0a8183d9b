//! Process-wide tracing setup.
//!
//! Events from the listener container run on named consumer and worker
//! threads, so every formatted event carries the thread that produced it and
//! a reader can follow one consumer through a recovery. The configured
//! `log_filter` is extended with floors for the container, correlation and
//! health targets: lifecycle transitions and late replies stay visible under
//! a quiet global filter unless the filter names those targets itself.

use std::io::{self, IsTerminal};

use courier_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

static INSTALLED: OnceCell<Installed> = OnceCell::new();

/// Minimum levels kept for Courier targets the configured filter leaves out.
const TARGET_FLOORS: &[(&str, LevelFilter)] = &[
    (concat!(env!("CARGO_PKG_NAME"), "::container"), LevelFilter::INFO),
    (concat!(env!("CARGO_PKG_NAME"), "::health"), LevelFilter::INFO),
    (concat!(env!("CARGO_PKG_NAME"), "::correlation"), LevelFilter::WARN),
];

/// Threads the listener container spawns, named so log lines identify them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadRole {
    Consumer,
    Worker,
}

impl ThreadRole {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Worker => "worker",
        }
    }

    /// Thread name for the `index`th thread of this role.
    pub(crate) fn thread_name(self, index: usize) -> String {
        format!("{}-{}-{index}", env!("CARGO_PKG_NAME"), self.as_str())
    }
}

#[derive(Debug)]
struct Installed {
    filter: String,
    format: LogFormat,
}

/// Describes the subscriber installed for this process.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    installed: &'static Installed,
}

impl TelemetryHandle {
    /// Filter directives in force, floors included.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.installed.filter
    }

    /// Output format in force.
    #[must_use]
    pub fn format(&self) -> LogFormat {
        self.installed.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter expression did not parse.
    #[error("invalid log filter {filter:?}: {message}")]
    Filter {
        /// Directives that were rejected, floors included.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on the first call.
///
/// Only the first configuration takes effect; later calls return a handle
/// describing the subscriber that is already installed.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter` and
/// [`TelemetryError::Subscriber`] when a subscriber was installed outside
/// this module.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config))
        .map(|installed| TelemetryHandle { installed })
}

fn install(config: &Config) -> Result<Installed, TelemetryError> {
    let directives = with_target_floors(config.log_filter());
    let filter = EnvFilter::try_new(&directives).map_err(|error| TelemetryError::Filter {
        filter: directives.clone(),
        message: error.to_string(),
    })?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());
    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(subscriber.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(subscriber.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;

    Ok(Installed {
        filter: directives,
        format: config.log_format(),
    })
}

/// Appends a floor directive for each Courier target the filter leaves to
/// its global level when that level is quieter than the floor.
fn with_target_floors(configured: &str) -> String {
    let directives: Vec<&str> = configured
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .collect();
    let global = directives
        .iter()
        .filter(|directive| !directive.contains(['=', '[']))
        .filter_map(|directive| directive.parse::<LevelFilter>().ok())
        .max()
        .unwrap_or(LevelFilter::OFF);

    let mut composed: Vec<String> = directives.iter().map(|&d| d.to_owned()).collect();
    for &(target, floor) in TARGET_FLOORS {
        let named = directives
            .iter()
            .any(|directive| directive.split(['=', '[']).next() == Some(target));
        if !named && global < floor {
            composed.push(format!("{target}={}", floor.to_string().to_ascii_lowercase()));
        }
    }
    composed.join(",")
}
