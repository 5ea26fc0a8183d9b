//! Service binding keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator placed between the interface name and a non-empty version.
pub const VERSION_SEPARATOR: char = '-';

/// Identity of a service binding: an interface name plus an optional version.
///
/// An empty version denotes the default, unversioned binding. Keys compare on
/// both parts, so `("a-b", "")` and `("a", "b")` remain distinct even though
/// their rendered forms coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingKey {
    interface_name: String,
    version: String,
}

impl BindingKey {
    /// Builds a key, trimming surrounding whitespace from the version.
    #[must_use]
    pub fn new(interface_name: impl Into<String>, version: impl Into<String>) -> Self {
        let raw_version: String = version.into();
        Self {
            interface_name: interface_name.into(),
            version: raw_version.trim().to_owned(),
        }
    }

    /// Builds the key for the default, unversioned binding.
    #[must_use]
    pub fn unversioned(interface_name: impl Into<String>) -> Self {
        Self::new(interface_name, String::new())
    }

    /// Fully-qualified interface name.
    #[must_use]
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Version label; empty for the default binding.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns `true` for the default, unversioned binding.
    #[must_use]
    pub fn is_unversioned(&self) -> bool {
        self.version.is_empty()
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            formatter.write_str(&self.interface_name)
        } else {
            write!(
                formatter,
                "{}{VERSION_SEPARATOR}{}",
                self.interface_name, self.version
            )
        }
    }
}
