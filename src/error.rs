use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Failures of the secret store.
///
/// `Get` never leaks infrastructure detail: backends collapse `Database`
/// failures into `NotAvailable` before returning to the caller. `Store`
/// surfaces them unchanged.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret can't be empty")]
    InvalidContent,
    #[error("invalid expireAfterViews, the value should be positive")]
    InvalidViewCount,
    #[error("invalid expireAfter, the value should be 0 or higher")]
    InvalidTtl,
    #[error("secret not found")]
    NotFound,
    #[error("secret is not available")]
    NotAvailable,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] MigrateError),
}

impl SecretError {
    /// True for errors the caller can fix by changing its input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidContent | Self::InvalidViewCount | Self::InvalidTtl
        )
    }

    /// True for errors that only mean the handle can no longer be read.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound | Self::NotAvailable)
    }
}
