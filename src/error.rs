//! Error types for the CircleCI provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// HTTP status codes that are worth another attempt.
pub const RETRYABLE_STATUS_CODES: [u16; 4] = [429, 500, 502, 503];

/// A non-2xx response from the CircleCI API.
///
/// `message` holds the `message` field of the JSON error body when the API
/// returned one that could be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {}", .message.as_deref().unwrap_or("no error message returned"))]
pub struct ApiError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Error message reported by the API, if any.
    pub message: Option<String>,
}

impl ApiError {
    /// Create an API error from a status code and optional message.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// Build an error from a raw error response body.
    ///
    /// The body is expected to be `{"message": "..."}`. Anything else yields
    /// an error carrying only the status code.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            message: String,
        }

        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .map(|b| b.message);
        Self { status, message }
    }

    /// Whether the API reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the status code is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_STATUS_CODES.contains(&self.status)
    }
}

/// Errors that can occur while managing CircleCI resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider or resource is missing required configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The API answered with a non-2xx status.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A transient failure persisted until the retry budget ran out.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// The operation being retried.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<ProviderError>,
    },

    /// The request never produced an HTTP response.
    #[error("Transport error during {method} {path}: {source}")]
    Transport {
        /// HTTP method of the failed request.
        method: String,
        /// Request path, without query string.
        path: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation not implemented for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) => msg,
            Self::Validation(msg) => msg,
            Self::NotFound(msg) => msg,
            Self::AlreadyExists(msg) => msg,
            Self::Api(err) => err
                .message
                .as_deref()
                .unwrap_or("no error message returned"),
            Self::RetriesExhausted { source, .. } => source.message(),
            Self::Transport { .. } => "transport error (see Debug output)",
            Self::Serialization(_) => "serialization error (see Debug output)",
            Self::UnknownResource(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Unimplemented(msg) => msg,
        }
    }

    /// HTTP status of the underlying API error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the API reported a 404 for this call.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_not_found())
    }

    /// Whether the retry policy should attempt the call again.
    ///
    /// Only API errors with a transient status qualify. Transport errors are
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_retryable())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let summary = match &err {
            ProviderError::Configuration(_) => "Invalid provider configuration",
            ProviderError::Validation(_) => "Invalid value",
            ProviderError::NotFound(_) => "Resource not found",
            ProviderError::AlreadyExists(_) => "Resource already exists",
            ProviderError::Api(_) | ProviderError::RetriesExhausted { .. } => {
                "CircleCI API request failed"
            }
            ProviderError::Transport { .. } => "Could not reach CircleCI",
            ProviderError::Serialization(_) => "Unexpected payload",
            ProviderError::UnknownResource(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::Unimplemented(_) => "Unsupported request",
        };
        Diagnostic::error(summary).with_detail(err.to_string())
    }
}
