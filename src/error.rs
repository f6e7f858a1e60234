//! Error types for the webhook.
//!
//! Errors are grouped by where they surface: protocol and object decoding,
//! namespace policy lookups, response encoding, and process startup.

use thiserror::Error;

/// Error type for webhook operations
#[derive(Error, Debug)]
pub enum Error {
    /// The AdmissionReview envelope was malformed or of an unexpected type
    #[error("invalid AdmissionReview: {0}")]
    InvalidReview(String),

    /// The admission request carried no object to admit
    #[error("admission request has no object")]
    MissingObject,

    /// The admitted object could not be decoded as a Pod
    #[error("could not decode pod: {0}")]
    ObjectDecode(#[source] serde_json::Error),

    /// Missing required field in request
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Fetching the namespace from the cluster failed
    #[error("failed to get namespace {namespace}: {source}")]
    NamespaceLookup {
        namespace: String,
        #[source]
        source: kube::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Listener or serve loop failure
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NamespaceLookup {
                source: kube::Error::Api(e),
                ..
            } => e.code == 404,
            _ => false,
        }
    }

    /// Whether the error is a protocol-level failure, i.e. no request UID
    /// could be established.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::InvalidReview(_))
    }
}

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, Error>;
