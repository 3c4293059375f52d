use thiserror::Error;

use crate::api::nordigen::ApiError;
use crate::config::ConfigError;
use crate::services::normalizer::NormalizeError;

/// Top-level error for every command, folding the per-layer error types.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provider API error: {0}")]
    Api(#[from] ApiError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("failed to send email: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to build email: {0}")]
    Email(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
}
