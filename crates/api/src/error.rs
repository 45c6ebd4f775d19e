use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Missing or empty {field} - unable to continue")]
    MissingConfig { field: &'static str },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unable to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ApiError::AuthenticationFailed { .. } => {
                Some("Verify your API key and secret using: assembla auth test")
            }
            ApiError::MissingConfig { .. } => {
                Some("Configure a profile using: assembla auth login")
            }
            ApiError::RateLimitExceeded { .. } => Some("Wait before sending more requests"),
            ApiError::NotFound { .. } => Some("Check the space id and ticket number"),
            ApiError::BadRequest { .. } => Some("Review the ticket fields"),
            ApiError::Attachment { .. } => Some("Check that the file exists and is readable"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
