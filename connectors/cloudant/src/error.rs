use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudantError {
    #[error("IAM token exchange failed: HTTP {status} - {body}")]
    TokenExchange { status: StatusCode, body: String },

    #[error("Authentication rejected by document store: HTTP {status} - {body}")]
    Unauthorized { status: StatusCode, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Document store returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Write to {0} was acknowledged without a revision")]
    MissingRevision(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Document store URL cannot be used as a base: {0}")]
    InvalidBaseUrl(String),
}

impl CloudantError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudantError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudantError::Conflict(_))
    }
}
