//! Per-message request handling shared by consumers and workers.

use std::sync::Arc;

use courier_types::{RemoteError, RemoteErrorKind, ResultEnvelope};
use tracing::{debug, error, warn};

use super::CONTAINER_TARGET;
use crate::codec::Codec;
use crate::dispatch::ServiceDispatcher;
use crate::transport::{Message, OutboundMessage, Session};

/// Decodes a request, dispatches it and writes the reply.
pub(crate) struct RequestProcessor {
    dispatcher: ServiceDispatcher,
    codec: Arc<dyn Codec>,
}

impl RequestProcessor {
    pub(crate) fn new(dispatcher: ServiceDispatcher, codec: Arc<dyn Codec>) -> Self {
        Self { dispatcher, codec }
    }

    /// Handles one inbound request, replying on `session`.
    ///
    /// Failures are logged and never propagated: a bad message must not take
    /// the consumer down.
    pub(crate) fn process(&self, session: &mut dyn Session, message: Message) {
        let outcome = match self.codec.decode_call(&message.body) {
            Ok(call) => {
                debug!(
                    target: CONTAINER_TARGET,
                    message_id = %message.id,
                    request_id = %call.request_id,
                    "request received"
                );
                self.dispatcher.dispatch(call)
            }
            Err(decode_error) => {
                warn!(
                    target: CONTAINER_TARGET,
                    message_id = %message.id,
                    error = %decode_error,
                    "request could not be decoded"
                );
                ResultEnvelope::failure(
                    String::new(),
                    RemoteError::malformed_request(decode_error.to_string()),
                )
            }
        };

        let Some(reply_to) = message.reply_to.as_ref() else {
            warn!(
                target: CONTAINER_TARGET,
                message_id = %message.id,
                request_id = %outcome.request_id,
                "request names no reply destination, dropping the result"
            );
            return;
        };

        let Some(body) = self.encode(&outcome) else {
            return;
        };
        let reply = OutboundMessage::new(body)
            .with_correlation_id(message.reply_correlation())
            .with_priority(message.priority)
            .with_time_to_live(message.remaining_time_to_live());
        if let Err(send_error) = session.send(reply_to, reply) {
            warn!(
                target: CONTAINER_TARGET,
                message_id = %message.id,
                request_id = %outcome.request_id,
                reply_to = %reply_to,
                error = %send_error,
                "failed to send reply"
            );
        }
    }

    /// Encodes `outcome`, falling back to an error envelope when the result
    /// itself cannot be encoded.
    fn encode(&self, outcome: &ResultEnvelope) -> Option<Vec<u8>> {
        let encode_error = match self.codec.encode_result(outcome) {
            Ok(body) => return Some(body),
            Err(encode_error) => encode_error,
        };
        warn!(
            target: CONTAINER_TARGET,
            request_id = %outcome.request_id,
            error = %encode_error,
            "result could not be encoded, replying with an error"
        );
        let fallback = ResultEnvelope::failure(
            outcome.request_id.clone(),
            RemoteError::new(
                RemoteErrorKind::Invocation,
                format!("result could not be encoded: {encode_error}"),
            ),
        );
        match self.codec.encode_result(&fallback) {
            Ok(body) => Some(body),
            Err(fallback_error) => {
                error!(
                    target: CONTAINER_TARGET,
                    request_id = %outcome.request_id,
                    error = %fallback_error,
                    "error reply could not be encoded, caller will time out"
                );
                None
            }
        }
    }
}
