use thiserror::Error;

/// Errors raised while decoding a wire payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not a valid protobuf record.
    #[error("failed to decode {event}: {source}")]
    Decode {
        event: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    /// The payload decoded but a required field is empty.
    #[error("{event} is missing required field '{field}'")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}
