//! Client error types.

use subtext_proto::{DecodingError, EncodingError};
use thiserror::Error;
use uuid::Uuid;

use crate::api_error::{ApiError, ApiErrorKind};

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server answered with a non-2xx status.
    #[error("server error: {0}")]
    Api(#[from] ApiError),

    /// HTTP request could not be completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint is not a Subtext instance.
    #[error("no Subtext instance at {url}")]
    NotSubtext {
        /// URL that was probed.
        url: String,
    },

    /// Operation is only allowed on the logged-in user.
    #[error("operation requires the logged-in user, got {user_id}")]
    NotSelf {
        /// The user the operation was attempted on.
        user_id: Uuid,
    },

    /// Response body or headers did not have the expected shape.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Description of the problem.
        reason: String,
    },

    /// Message content cannot be decoded.
    #[error("content decoding failed: {0}")]
    Decode(#[from] DecodingError),

    /// Message content cannot be encoded.
    #[error("content encoding failed: {0}")]
    Encode(#[from] EncodingError),

    /// Content has no canonical type tag and none was supplied.
    #[error("content needs an explicit type tag")]
    MissingTypeTag,

    /// Message was listed without its payload.
    #[error("message {message_id} has no payload loaded")]
    MissingPayload {
        /// The message whose payload is absent.
        message_id: Uuid,
    },

    /// OpenPGP subprocess failed.
    #[error("encryption failed: {reason}")]
    Encryption {
        /// Description of the failure.
        reason: String,
    },
}

impl ClientError {
    /// Returns true if this error is fatal (retrying will not help).
    ///
    /// Transport failures and 5xx responses are transient. Everything else is
    /// a property of the request or the data.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) => false,
            Self::Api(e) => !e.is_server_error(),

            Self::NotSubtext { .. }
            | Self::NotSelf { .. }
            | Self::InvalidResponse { .. }
            | Self::Decode(_)
            | Self::Encode(_)
            | Self::MissingTypeTag
            | Self::MissingPayload { .. }
            | Self::Encryption { .. } => true,
        }
    }

    /// Server error kind, if this is a server-reported error.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse { reason: err.to_string() }
    }
}
