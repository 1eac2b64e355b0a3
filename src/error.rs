//! Error types for the KV cloud client

use thiserror::Error;

use crate::envelope::ValueType;

/// Errors that can occur when building envelopes or talking to the store
#[derive(Error, Debug)]
pub enum Error {
    /// The value type cannot be stored in the requested shape (bytes as an array)
    #[error("Invalid value shape: {0} values cannot be stored as an array")]
    InvalidValueShape(ValueType),

    /// The envelope discriminator does not map to a supported value type
    #[error("Unknown value type indicator: {0}")]
    UnknownValueType(i32),

    /// NaN or infinite float, which has no JSON representation
    #[error("Non-finite {0} value cannot be stored")]
    NonFiniteFloat(ValueType),

    /// Key or user identifier is unusable
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The process-wide client was used before `init_client`
    #[error("Client not initialized: call init_client first")]
    NotInitialized,

    /// The process-wide client was initialized twice
    #[error("Client already initialized")]
    AlreadyInitialized,

    /// Client configuration is incomplete or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Server answered with a non-success status
    #[error("Server error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, lossily decoded
        message: String,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Byte payload is not valid base64
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    Tls(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Returns true for failures of the network round trip or of decoding its
    /// response. These are logged and swallowed by the typed accessors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Status { .. }
                | Error::Connection(_)
                | Error::Timeout(_)
                | Error::Json(_)
                | Error::Tls(_)
                | Error::InvalidUrl(_)
                | Error::InvalidRequest(_)
        )
    }
}

/// Why a fetch produced no envelope
///
/// The typed getters flatten `NotFound` and `Transport` into `None`; this type keeps
/// them apart for callers that need to tell an absent key from an outage.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Server reported that the key does not exist
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Request failed or the response could not be decoded
    #[error("Transport failure: {0}")]
    Transport(#[source] Error),

    /// Logical error on the caller's side or in the stored data
    #[error(transparent)]
    Invalid(Error),
}

impl From<Error> for FetchError {
    fn from(e: Error) -> Self {
        if e.is_transport() {
            FetchError::Transport(e)
        } else {
            FetchError::Invalid(e)
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
