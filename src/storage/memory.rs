use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

use crate::error::SecretError;
use crate::models::{self, Secret};
use crate::storage::{SecretStorage, StorageResult};

/// One stored secret plus the lock that serialises its view decrements.
struct Record {
    handle: String,
    content: String,
    created_at: OffsetDateTime,
    expires_at: Option<OffsetDateTime>,
    /// Only written while `lock` is held; may be read without it.
    remaining_views: AtomicI32,
    lock: Mutex<()>,
}

impl Record {
    fn from_secret(secret: &Secret) -> Self {
        Self {
            handle: secret.handle.clone(),
            content: secret.content.clone(),
            created_at: secret.created_at,
            expires_at: secret.expires_at,
            remaining_views: AtomicI32::new(secret.remaining_views),
            lock: Mutex::new(()),
        }
    }

    fn is_available(&self, now: OffsetDateTime) -> bool {
        models::is_available(
            self.expires_at,
            self.remaining_views.load(Ordering::Acquire),
            now,
        )
    }

    fn snapshot(&self, remaining_views: i32) -> Secret {
        Secret {
            handle: self.handle.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            remaining_views,
        }
    }

    /// Takes one view if the record is still available once the lock is held.
    fn take_view(&self) -> Option<Secret> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_available(OffsetDateTime::now_utc()) {
            return None;
        }
        let remaining = self.remaining_views.load(Ordering::Acquire) - 1;
        self.remaining_views.store(remaining, Ordering::Release);
        Some(self.snapshot(remaining))
    }
}

/// Process-local backend: a concurrent map of handle to record, each record
/// guarded by its own lock so distinct handles never contend.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    values: Arc<DashMap<String, Arc<Record>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, available or not.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.values.contains_key(handle)
    }

    /// Removes `record` if it is still the one stored under its handle.
    /// Safe to call from any number of callers at once.
    fn evict(&self, record: &Arc<Record>) {
        if self
            .values
            .remove_if(&record.handle, |_, stored| Arc::ptr_eq(stored, record))
            .is_some()
        {
            tracing::debug!(handle = %record.handle, "evicted secret");
        }
    }
}

#[async_trait]
impl SecretStorage for MemoryStorage {
    async fn store(
        &self,
        content: &str,
        requested_views: i32,
        ttl_minutes: i64,
    ) -> StorageResult<Secret> {
        let secret = Secret::new(content, requested_views, ttl_minutes)?;
        self.values
            .insert(secret.handle.clone(), Arc::new(Record::from_secret(&secret)));

        tracing::debug!(handle = %secret.handle, "stored secret");
        Ok(secret)
    }

    async fn get(&self, handle: &str) -> StorageResult<Secret> {
        // Clone the Arc out so no map shard guard is held while locking or evicting.
        let record = self
            .values
            .get(handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SecretError::NotFound)?;

        // Unlocked check is only a shortcut for records that are already gone;
        // the decision to hand out a view is made under the record lock.
        let taken = if record.is_available(OffsetDateTime::now_utc()) {
            record.take_view()
        } else {
            None
        };

        match taken {
            Some(secret) => {
                if secret.remaining_views == 0 {
                    self.evict(&record);
                }
                Ok(secret)
            }
            None => {
                self.evict(&record);
                Err(SecretError::NotAvailable)
            }
        }
    }

    async fn purge_unavailable(&self) -> StorageResult<Vec<String>> {
        let now = OffsetDateTime::now_utc();
        let mut purged = Vec::new();
        self.values.retain(|handle, record| {
            let keep = record.is_available(now);
            if !keep {
                purged.push(handle.clone());
            }
            keep
        });
        Ok(purged)
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn store_then_get_decrements() {
        let storage = MemoryStorage::new();
        let stored = storage.store("secret", 2, 10).await.unwrap();

        let got = storage.get(&stored.handle).await.unwrap();
        assert_eq!(got.handle, stored.handle);
        assert_eq!(got.content, "secret");
        assert_eq!(got.remaining_views, 1);
        assert!(storage.contains(&stored.handle));
    }

    #[tokio::test]
    async fn last_view_evicts_eagerly() {
        let storage = MemoryStorage::new();
        let stored = storage.store("secret", 1, 0).await.unwrap();

        let got = storage.get(&stored.handle).await.unwrap();
        assert_eq!(got.remaining_views, 0);
        assert!(storage.is_empty());

        assert!(matches!(
            storage.get(&stored.handle).await,
            Err(SecretError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get("deadbeef").await,
            Err(SecretError::NotFound)
        ));
    }

    #[tokio::test]
    async fn expired_secret_is_evicted_on_read() {
        let storage = MemoryStorage::new();
        let mut secret = Secret::new("secret", 5, 10).unwrap();
        secret.expires_at = Some(OffsetDateTime::now_utc() - time::Duration::minutes(1));
        storage
            .values
            .insert(secret.handle.clone(), Arc::new(Record::from_secret(&secret)));

        assert!(matches!(
            storage.get(&secret.handle).await,
            Err(SecretError::NotAvailable)
        ));
        assert!(!storage.contains(&secret.handle));
    }

    #[tokio::test]
    async fn validation_errors_store_nothing() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.store("", 5, 10).await,
            Err(SecretError::InvalidContent)
        ));
        assert!(matches!(
            storage.store("x", 0, 10).await,
            Err(SecretError::InvalidViewCount)
        ));
        assert!(matches!(
            storage.store("x", 5, -1).await,
            Err(SecretError::InvalidTtl)
        ));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_available_secrets() {
        let storage = MemoryStorage::new();
        let live = storage.store("live", 3, 0).await.unwrap();

        let mut expired = Secret::new("expired", 3, 10).unwrap();
        expired.expires_at = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        storage
            .values
            .insert(expired.handle.clone(), Arc::new(Record::from_secret(&expired)));

        let purged = storage.purge_unavailable().await.unwrap();
        assert_eq!(purged, vec![expired.handle.clone()]);
        assert!(storage.contains(&live.handle));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_gets_hand_out_exactly_the_stored_views() {
        const VIEWS: i32 = 100;
        const CALLERS: usize = 10_000;

        let storage = MemoryStorage::new();
        let stored = storage.store("secret", VIEWS, 100).await.unwrap();
        let successes = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            let storage = storage.clone();
            let handle = stored.handle.clone();
            let successes = Arc::clone(&successes);
            tasks.push(tokio::spawn(async move {
                match storage.get(&handle).await {
                    Ok(secret) => {
                        assert_eq!(secret.handle, handle);
                        assert!(secret.remaining_views >= 0);
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => assert!(e.is_gone(), "unexpected error: {e}"),
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), VIEWS as usize);
        assert!(storage.is_empty());
    }
}
