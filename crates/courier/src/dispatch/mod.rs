//! Dispatch of decoded calls onto registered services.
//!
//! [`ServiceDispatcher::dispatch`] is total: every outcome, including an
//! unknown binding, a signature mismatch or a panicking handler, becomes a
//! well-formed [`ResultEnvelope`] so a faulty call can never take down the
//! consumer that received it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use courier_types::{BindingKey, CallEnvelope, RemoteError, RemoteErrorKind, ResultEnvelope};
use tracing::{debug, warn};

use crate::registry::ServiceRegistry;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Resolves calls against a registry and invokes the bound handler.
#[derive(Debug, Clone)]
pub struct ServiceDispatcher {
    registry: Arc<ServiceRegistry>,
}

impl ServiceDispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Registry consulted for bindings.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Invokes the method named by `call` and captures its outcome.
    #[must_use]
    pub fn dispatch(&self, call: CallEnvelope) -> ResultEnvelope {
        let CallEnvelope {
            request_id,
            interface_name,
            service_version,
            method_name,
            parameter_signature,
            parameters,
        } = call;
        let key = BindingKey::new(interface_name, service_version);

        let Some(handler) = self.registry.resolve_key(&key) else {
            debug!(
                target: DISPATCH_TARGET,
                request_id = %request_id,
                service = %key,
                "no binding for service"
            );
            return ResultEnvelope::failure(request_id, RemoteError::service_not_found(&key));
        };

        if parameter_signature.len() != parameters.len() {
            let error = RemoteError::new(
                RemoteErrorKind::InvalidArguments,
                format!(
                    "{method_name} declares {} parameters but {} were supplied",
                    parameter_signature.len(),
                    parameters.len()
                ),
            );
            return ResultEnvelope::failure(request_id, error);
        }

        debug!(
            target: DISPATCH_TARGET,
            request_id = %request_id,
            service = %key,
            method = %method_name,
            "dispatching call"
        );
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(&method_name, &parameter_signature, parameters)
        }));

        match outcome {
            Ok(Ok(value)) => ResultEnvelope::success(request_id, value),
            Ok(Err(error)) => {
                debug!(
                    target: DISPATCH_TARGET,
                    request_id = %request_id,
                    service = %key,
                    method = %method_name,
                    %error,
                    "service method failed"
                );
                ResultEnvelope::failure(request_id, error.into_remote())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    target: DISPATCH_TARGET,
                    request_id = %request_id,
                    service = %key,
                    method = %method_name,
                    panic = %message,
                    "service method panicked"
                );
                let error =
                    RemoteError::new(RemoteErrorKind::Invocation, message).with_type_name("panic");
                ResultEnvelope::failure(request_id, error)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "service method panicked".to_owned()
    }
}
