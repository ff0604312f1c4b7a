//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Bytes are not valid CBOR, or not the expected CBOR shape.
    #[error("malformed encoding: {reason}")]
    Malformed {
        /// What went wrong.
        reason: String,
    },

    /// A required field is absent.
    #[error("missing field: {field}")]
    MissingField {
        /// Field name as it appears on the wire.
        field: &'static str,
    },

    /// A field is present but has the wrong type or an unknown value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Serialization failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Underlying serializer error.
        reason: String,
    },
}
