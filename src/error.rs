use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the worker process
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("Referral error: {0}")]
    Referral(#[from] ReferralError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by the reward workflow and its collaborators
#[derive(Error, Debug)]
pub enum ReferralError {
    #[error("Referral conflict: {0}")]
    Conflict(String),

    #[error("Link store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Eligibility oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Reward dispatch failed for referrer {referrer_id} (link {link_id}): {reason}")]
    Dispatch {
        referrer_id: Uuid,
        link_id: i64,
        reason: String,
    },

    #[error("Reward commit failed: {0}")]
    Commit(#[source] Box<ReferralError>),
}

impl ReferralError {
    /// Whether the scheduler may re-run the whole pass right away.
    ///
    /// Read-phase store failures and oracle outages leave no trace in the
    /// store. A failed commit ends the tick; the next tick starts fresh.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReferralError::Store(_) | ReferralError::OracleUnavailable(_) => true,
            ReferralError::Conflict(_)
            | ReferralError::Dispatch { .. }
            | ReferralError::Commit(_) => false,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let codes: Vec<String> = errors.iter().map(|e| e.code.to_string()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::Config(format!("Validation failed: {}", details))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Internal(format!("HTTP client error: {:?}", error))
    }
}

/// Result type alias for the worker process
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for the reward workflow
pub type ReferralResult<T> = Result<T, ReferralError>;
