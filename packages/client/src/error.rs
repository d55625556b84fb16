//! Error types for the Kadai client.

use std::time::Duration;

use kadai_shared::{
    policy::PolicyViolation,
    protocol::{Action, CodecError},
};
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered `connect` with an error (e.g. empty userId)
    #[error("Connection rejected by server: {0}")]
    Rejected(String),

    /// Socket could not be opened, or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    /// `error` response to a request
    #[error("Server error: {0}")]
    Server(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Rejected by the client-side upload policy before sending
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("File error on '{path}': {message}")]
    File { path: String, message: String },

    #[error("Invalid file data in response: {0}")]
    Decode(String),

    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse { expected: Action, actual: Action },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
