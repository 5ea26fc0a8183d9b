//! The invocation capability implemented by services.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use courier_types::{RemoteError, RemoteErrorKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A service able to invoke its methods by name and parameter signature.
pub trait ServiceHandler: Send + Sync {
    /// Invokes `method` with `parameters`, whose declared types are listed
    /// in `signature`.
    fn invoke(
        &self,
        method: &str,
        signature: &[String],
        parameters: Vec<Value>,
    ) -> Result<Value, InvocationError>;
}

/// Errors raised by a [`ServiceHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// No method matches the name and signature.
    #[error("no method {method}({})", .signature.join(", "))]
    MethodNotFound {
        /// Requested method name.
        method: String,
        /// Requested parameter signature.
        signature: Vec<String>,
    },
    /// The parameters could not be converted to the declared types.
    #[error("invalid arguments for {method}: {message}")]
    InvalidArguments {
        /// Method being invoked.
        method: String,
        /// Conversion failure.
        message: String,
    },
    /// The method body failed.
    #[error("{message}")]
    Failed {
        /// Name of the error type the method raised, if known.
        type_name: Option<String>,
        /// Failure description.
        message: String,
    },
}

impl InvocationError {
    /// Builds a [`InvocationError::MethodNotFound`].
    pub fn method_not_found(method: impl Into<String>, signature: &[String]) -> Self {
        Self::MethodNotFound {
            method: method.into(),
            signature: signature.to_vec(),
        }
    }

    /// Builds a [`InvocationError::InvalidArguments`].
    pub fn invalid_arguments(method: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.to_string(),
        }
    }

    /// Builds an untyped [`InvocationError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            type_name: None,
            message: message.into(),
        }
    }

    /// Captures an error raised by a method body, keeping its type name.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: StdError,
    {
        Self::Failed {
            type_name: Some(std::any::type_name::<E>().to_owned()),
            message: error.to_string(),
        }
    }

    /// Converts the error into the form shipped back to callers.
    #[must_use]
    pub fn into_remote(self) -> RemoteError {
        match self {
            Self::MethodNotFound { method, signature } => {
                RemoteError::method_not_found(&method, &signature)
            }
            error @ Self::InvalidArguments { .. } => {
                RemoteError::new(RemoteErrorKind::InvalidArguments, error.to_string())
            }
            Self::Failed { type_name, message } => RemoteError {
                kind: RemoteErrorKind::Invocation,
                message,
                type_name,
            },
        }
    }
}

type Method = Box<dyn Fn(Vec<Value>) -> Result<Value, InvocationError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    name: String,
    signature: Vec<String>,
}

/// A [`ServiceHandler`] assembled from explicitly registered methods.
///
/// Methods are matched on their exact name and parameter signature, so
/// overloads such as `hello(string)` and `hello(Person)` coexist.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<MethodKey, Method>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method operating on raw JSON parameters. A later
    /// registration with the same name and signature replaces the earlier.
    #[must_use]
    pub fn with_method<F>(mut self, name: &str, signature: &[&str], method: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        let key = MethodKey {
            name: name.to_owned(),
            signature: signature.iter().map(|part| (*part).to_owned()).collect(),
        };
        self.methods.insert(key, Box::new(method));
        self
    }

    /// Registers a single-parameter method with typed argument and result.
    #[must_use]
    pub fn with_unary<A, R, F>(self, name: &str, descriptor: &str, method: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> Result<R, InvocationError> + Send + Sync + 'static,
    {
        let method_name = name.to_owned();
        self.with_method(name, &[descriptor], move |parameters| {
            let [parameter]: [Value; 1] = parameters.try_into().map_err(|rest: Vec<Value>| {
                InvocationError::invalid_arguments(
                    method_name.as_str(),
                    format!("expected 1 parameter, got {}", rest.len()),
                )
            })?;
            let argument: A = serde_json::from_value(parameter)
                .map_err(|error| InvocationError::invalid_arguments(method_name.as_str(), error))?;
            let result = method(argument)?;
            serde_json::to_value(result).map_err(|error| InvocationError::from_error(&error))
        })
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` when no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl ServiceHandler for MethodTable {
    fn invoke(
        &self,
        method: &str,
        signature: &[String],
        parameters: Vec<Value>,
    ) -> Result<Value, InvocationError> {
        let key = MethodKey {
            name: method.to_owned(),
            signature: signature.to_vec(),
        };
        let body = self
            .methods
            .get(&key)
            .ok_or_else(|| InvocationError::method_not_found(method, signature))?;
        body(parameters)
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<String> = self
            .methods
            .keys()
            .map(|key| format!("{}({})", key.name, key.signature.join(", ")))
            .collect();
        methods.sort();
        formatter
            .debug_struct("MethodTable")
            .field("methods", &methods)
            .finish()
    }
}
