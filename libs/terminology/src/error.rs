//! Error types for the terminology engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed concept: {0}")]
    MalformedConcept(String),

    #[error("CodeSystem contains circular reference around code {code}")]
    CycleDetected { code: String },

    #[error(
        "Can not create multiple code systems with URI \"{uri}\", already have one with resource ID: {existing_resource_id}"
    )]
    DuplicateUri {
        uri: String,
        existing_resource_id: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status the surrounding REST layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) | Error::MalformedConcept(_) | Error::CycleDetected { .. } => {
                400
            }
            Error::DuplicateUri { .. } => 409,
            Error::Database(_) | Error::Migration(_) | Error::Internal(_) | Error::Other(_) => 500,
        }
    }

    /// Record an error leaving the engine: server-side failures at error level,
    /// rejected requests at debug level.
    pub fn log(&self) {
        if self.is_client_error() {
            tracing::debug!("Request rejected: {}", self);
        } else {
            tracing::error!("Internal error: {}", self);
        }
    }

    /// OperationOutcome issue code for this error
    pub fn issue_code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) | Error::MalformedConcept(_) | Error::CycleDetected { .. } => {
                "invalid"
            }
            Error::DuplicateUri { .. } => "conflict",
            _ => "exception",
        }
    }

    /// Whether the caller can correct the request and retry
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRequest(_)
                | Error::MalformedConcept(_)
                | Error::CycleDetected { .. }
                | Error::DuplicateUri { .. }
        )
    }
}
