use crate::config::{Config, StorageBackend};
use crate::storage::{MemoryStorage, PostgresStorage, SecretStorage, StorageResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn SecretStorage>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> StorageResult<Self> {
        let storage: Arc<dyn SecretStorage> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Postgres => {
                let postgres_storage =
                    PostgresStorage::new(&config.database, &config.storage).await?;
                Arc::new(postgres_storage)
            }
        };

        tracing::info!(backend = ?config.storage.backend, "storage initialised");

        Ok(Self::with_storage(storage, config))
    }

    pub fn with_storage(storage: Arc<dyn SecretStorage>, config: Config) -> Self {
        Self { storage, config }
    }
}
