mod memory;
mod postgres;

use async_trait::async_trait;

use crate::error::SecretError;
use crate::models::Secret;

pub type StorageResult<T> = Result<T, SecretError>;

/// Contract shared by every secret backend.
#[async_trait]
pub trait SecretStorage: Send + Sync {
    /// Validates the input, records a new secret and returns it with its handle.
    async fn store(
        &self,
        content: &str,
        requested_views: i32,
        ttl_minutes: i64,
    ) -> StorageResult<Secret>;

    /// Consumes one view of the secret behind `handle`.
    ///
    /// Fails with `NotFound` for unknown handles and `NotAvailable` for
    /// expired or exhausted ones; an unavailable secret is removed.
    async fn get(&self, handle: &str) -> StorageResult<Secret>;

    /// Removes every unavailable secret and returns the removed handles.
    async fn purge_unavailable(&self) -> StorageResult<Vec<String>>;

    /// Checks that the backend can serve requests.
    async fn ping(&self) -> StorageResult<()>;
}

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
