//! Listener container states.

use std::fmt;

/// Position of a listener container in its lifecycle.
///
/// `Uninitialized → Starting → Running`, then `Running → Recovering` when the
/// shared connection fails and back to `Running` once recovery succeeds.
/// `Stopped` is only entered through [`super::ListenerContainer::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Built but never started.
    Uninitialized,
    /// Attaching consumers to a fresh connection.
    Starting,
    /// Consumers are receiving requests.
    Running,
    /// The connection failed and is being, or could not be, rebuilt.
    Recovering,
    /// Shut down; the connection and every session are released.
    Stopped,
}

impl ContainerState {
    /// Lower-case label used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Recovering => "recovering",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
