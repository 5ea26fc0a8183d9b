//! Envelope codecs.
//!
//! A [`Codec`] turns envelopes into message bodies and back. [`JsonCodec`]
//! is the default and writes the camelCase JSON shape defined by
//! `courier-types`.

use courier_types::{CallEnvelope, ResultEnvelope};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope could not be serialised.
    #[error("failed to encode {shape}: {source}")]
    Encode {
        /// Envelope being encoded.
        shape: &'static str,
        /// Serialiser error.
        #[source]
        source: serde_json::Error,
    },
    /// The body was not valid for the expected envelope.
    #[error("failed to decode {shape}: {source}")]
    Decode {
        /// Envelope being decoded.
        shape: &'static str,
        /// Deserialiser error.
        #[source]
        source: serde_json::Error,
    },
    /// The body decoded to a value of the wrong type altogether.
    #[error("unsupported payload: expected {expected} object but found {found}")]
    UnsupportedPayload {
        /// Envelope that was expected.
        expected: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },
}

/// Serialises envelopes to and from message bodies.
pub trait Codec: Send + Sync {
    /// Encodes an outbound call.
    fn encode_call(&self, call: &CallEnvelope) -> Result<Vec<u8>, CodecError>;

    /// Decodes an inbound call.
    fn decode_call(&self, body: &[u8]) -> Result<CallEnvelope, CodecError>;

    /// Encodes a result.
    fn encode_result(&self, result: &ResultEnvelope) -> Result<Vec<u8>, CodecError>;

    /// Decodes a result.
    fn decode_result(&self, body: &[u8]) -> Result<ResultEnvelope, CodecError>;
}

const CALL_SHAPE: &str = "call envelope";
const RESULT_SHAPE: &str = "result envelope";

/// JSON codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn encode<T: Serialize>(shape: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|source| CodecError::Encode { shape, source })
    }

    fn decode<T: DeserializeOwned>(shape: &'static str, body: &[u8]) -> Result<T, CodecError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|source| CodecError::Decode { shape, source })?;
        if !value.is_object() {
            return Err(CodecError::UnsupportedPayload {
                expected: shape,
                found: json_type_name(&value),
            });
        }
        serde_json::from_value(value).map_err(|source| CodecError::Decode { shape, source })
    }
}

impl Codec for JsonCodec {
    fn encode_call(&self, call: &CallEnvelope) -> Result<Vec<u8>, CodecError> {
        Self::encode(CALL_SHAPE, call)
    }

    fn decode_call(&self, body: &[u8]) -> Result<CallEnvelope, CodecError> {
        Self::decode(CALL_SHAPE, body)
    }

    fn encode_result(&self, result: &ResultEnvelope) -> Result<Vec<u8>, CodecError> {
        Self::encode(RESULT_SHAPE, result)
    }

    fn decode_result(&self, body: &[u8]) -> Result<ResultEnvelope, CodecError> {
        Self::decode(RESULT_SHAPE, body)
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
