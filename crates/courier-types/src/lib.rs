//! Wire-level data model shared by Courier clients and listener containers.
//!
//! A remote call travels as a [`CallEnvelope`] on the request destination and
//! comes back as a [`ResultEnvelope`] on the caller's reply destination. The
//! envelopes carry opaque JSON values so the transport and the dispatch path
//! never need to know the concrete argument or result types of a service.
//!
//! Failures raised on the server are shipped back as data: a
//! [`RemoteError`] rides inside the [`ResultEnvelope`] and keeps its
//! [`RemoteErrorKind`] and message across the codec boundary.

mod binding;
mod envelope;
mod error;

pub use self::binding::{BindingKey, VERSION_SEPARATOR};
pub use self::envelope::{CallEnvelope, Outcome, ResultEnvelope};
pub use self::error::{RemoteError, RemoteErrorKind};
