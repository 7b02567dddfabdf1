//! Error types for the storgate proxy

use thiserror::Error;

/// Errors raised by the notification and export paths. A bucket with no
/// stored configuration is not represented here: "not found" means zero
/// subscribers and is signaled by `Ok(None)` from the config store.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A stored subscription document failed to parse.
    #[error("malformed notification document: {reason}")]
    MalformedDocument {
        /// Why the document could not be parsed
        reason: String,
    },
    /// An admin user-record body failed to parse.
    #[error("malformed user record: {reason}")]
    MalformedUserRecord {
        /// Why the body could not be parsed
        reason: String,
    },
    /// A queue or index backend could not be reached.
    #[error("upstream store unavailable: {reason}")]
    UpstreamUnavailable {
        /// The backend failure details
        reason: String,
    },
    /// Appending an event to a target queue failed.
    #[error("publish to target {target} failed: {reason}")]
    PublishFailed {
        /// The target queue key (service:id:name)
        target: String,
        /// The append failure details
        reason: String,
    },
    /// Backing object-store operation failed.
    #[error("object store error: {reason}")]
    Backend {
        /// The store failure details
        reason: String,
    },
}

/// Result type alias using ProxyError as the error type.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// S3-style API error codes returned to clients of the subscription API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Request is authorized and well-formed
    None,
    /// Credentials were rejected
    AccessDenied,
    /// Request signature did not validate
    SignatureDoesNotMatch,
    /// Request body was not a valid subscription document
    MalformedNotificationDocument,
    /// Generic internal failure
    InternalError,
    /// A backend did not answer in time
    GatewayTimeout,
}

impl ApiErrorCode {
    /// HTTP status code carried by the error response.
    pub fn http_status(&self) -> u16 {
        match self {
            ApiErrorCode::None => 200,
            ApiErrorCode::AccessDenied => 403,
            ApiErrorCode::SignatureDoesNotMatch => 403,
            ApiErrorCode::MalformedNotificationDocument => 400,
            ApiErrorCode::InternalError => 500,
            ApiErrorCode::GatewayTimeout => 504,
        }
    }

    /// Wire name of the error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiErrorCode::None => "",
            ApiErrorCode::AccessDenied => "AccessDenied",
            ApiErrorCode::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            ApiErrorCode::MalformedNotificationDocument => "MalformedNotificationDocument",
            ApiErrorCode::InternalError => "InternalError",
            ApiErrorCode::GatewayTimeout => "GatewayTimeout",
        }
    }
}

impl ProxyError {
    /// Maps a path-internal error to the API error code surfaced to clients.
    pub fn api_error_code(&self) -> ApiErrorCode {
        match self {
            ProxyError::MalformedDocument { .. } => ApiErrorCode::MalformedNotificationDocument,
            ProxyError::MalformedUserRecord { .. } => ApiErrorCode::InternalError,
            ProxyError::UpstreamUnavailable { .. } => ApiErrorCode::GatewayTimeout,
            ProxyError::PublishFailed { .. } => ApiErrorCode::InternalError,
            ProxyError::Backend { .. } => ApiErrorCode::InternalError,
        }
    }
}
