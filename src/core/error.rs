//! Error taxonomy shared by the ledger, the scheduler and the price sync engine.

use rusqlite::ErrorCode;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classified failure of a single quote source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The source throttled us (HTTP 429). Worth retrying after a pause.
    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    /// Network failure, non-success status or no price for the ticker.
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// The source answered but the payload could not be used.
    #[error("Malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },
}

impl ProviderError {
    pub fn rate_limited(provider: &str) -> Self {
        Self::RateLimited {
            provider: provider.to_string(),
        }
    }

    pub fn unavailable(provider: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Only rate limiting is transient; everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Storage busy: {0}")]
    StorageContention(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, Self::StorageContention(_))
    }

    pub fn is_retryable_provider(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_retryable())
    }

    /// Transient conditions the caller should retry later, as opposed to hard failures.
    pub fn retry_later(&self) -> bool {
        matches!(self, Self::StorageContention(_) | Self::Timeout(_)) || self.is_retryable_provider()
    }

    /// Contention that outlived its retries is reported as a persistent fault.
    pub fn into_storage_failure(self) -> Self {
        match self {
            Self::StorageContention(msg) => {
                Self::StorageFailure(format!("still busy after retries: {msg}"))
            }
            other => other,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::StorageContention(err.to_string())
            }
            _ => Self::StorageFailure(err.to_string()),
        }
    }
}
