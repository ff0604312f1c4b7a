//! Session error types.

use murmur_core::{CodecError, RegistryError, StoreError};
use murmur_proto::{ConversationId, MessageId};
use thiserror::Error;

/// Errors surfaced by [`ChatSession`](crate::ChatSession) operations.
///
/// Every variant is raised before any state is mutated or any network call
/// is made. Transport and broadcast failures never appear here: they are
/// logged and the local effect stands.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Operation needs an identity but `init` has not run.
    #[error("session not initialized")]
    NotInitialized,

    /// Malformed conversation creation parameters.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What is wrong.
        reason: String,
    },

    /// No conversation with this id.
    #[error("conversation not found: {conversation_id}")]
    ConversationNotFound {
        /// The unknown id.
        conversation_id: ConversationId,
    },

    /// Revocation of a message sent by someone else.
    #[error("cannot revoke message {message_id}: sent by {sender}")]
    PermissionDenied {
        /// Target message id.
        message_id: MessageId,
        /// Its actual sender.
        sender: String,
    },

    /// A payload failed decryption or verification.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Which check failed.
        reason: String,
    },

    /// Outgoing message could not be encoded.
    #[error("encode failed: {reason}")]
    Encode {
        /// Underlying encoder error.
        reason: String,
    },

    /// Identity persistence failed.
    #[error("identity store: {0}")]
    IdentityStore(#[from] StoreError),
}

impl From<RegistryError> for ClientError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::InvalidArgument { reason } => Self::InvalidArgument { reason },
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Authentication { reason } => Self::Authentication { reason },
            CodecError::MissingPayload => {
                Self::Authentication { reason: "message has no payload".to_string() }
            },
            CodecError::Encode { reason } => Self::Encode { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_maps_to_invalid_argument() {
        let error: ClientError = RegistryError::InvalidArgument { reason: "x".into() }.into();
        assert!(matches!(error, ClientError::InvalidArgument { reason } if reason == "x"));
    }

    #[test]
    fn codec_errors_map_to_authentication() {
        let error: ClientError = CodecError::MissingPayload.into();
        assert!(matches!(error, ClientError::Authentication { .. }));

        let error: ClientError = CodecError::Authentication { reason: "mac mismatch".into() }.into();
        assert_eq!(error.to_string(), "authentication failed: mac mismatch");
    }
}
