//! Sample hello service used by the demo binary and the behaviour suites.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::registry::{InvocationError, MethodTable, RegistryError, ServiceRegistry};

/// Interface name the hello service is bound under.
pub const HELLO_SERVICE: &str = "demo.HelloService";

/// Parameter descriptor of a string argument.
pub const STRING_TYPE: &str = "string";

/// Parameter descriptor of a [`Person`] argument.
pub const PERSON_TYPE: &str = "demo.Person";

/// Argument of the structured `hello` overload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl Person {
    /// Builds a person.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// Hello service implementation reporting `label` from `version()`.
///
/// Exposes `hello(string)`, `hello(demo.Person)` and `version()`.
#[must_use]
pub fn hello_service(label: &str) -> MethodTable {
    let label = label.to_owned();
    MethodTable::new()
        .with_unary("hello", STRING_TYPE, |name: String| {
            Ok::<_, InvocationError>(format!("REQ+{name}"))
        })
        .with_unary("hello", PERSON_TYPE, |person: Person| {
            Ok::<_, InvocationError>(format!("REQ+{}_{}", person.first_name, person.last_name))
        })
        .with_method("version", &[], move |_| Ok(json!(label.as_str())))
}

/// Registry with the default hello binding and a `v2` binding.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateBinding`] if a binding is taken twice.
pub fn hello_registry() -> Result<ServiceRegistry, RegistryError> {
    ServiceRegistry::new()
        .with_service(HELLO_SERVICE, "", Arc::new(hello_service("default")))?
        .with_service(HELLO_SERVICE, "v2", Arc::new(hello_service("v2")))
}
