use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::SecretError;

/// A stored secret. `handle`, `content`, `created_at` and `expires_at` never
/// change after creation; only `remaining_views` goes down.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Secret {
    pub handle: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// `None` means the secret never expires by time.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub remaining_views: i32,
}

impl Secret {
    /// Builds a new secret with a fresh handle.
    ///
    /// Checks run in a fixed order: content, then view count, then TTL.
    /// A `ttl_minutes` of zero means the secret only expires by views.
    pub fn new(content: &str, requested_views: i32, ttl_minutes: i64) -> Result<Self, SecretError> {
        if content.is_empty() {
            return Err(SecretError::InvalidContent);
        }
        if requested_views < 1 {
            return Err(SecretError::InvalidViewCount);
        }
        if ttl_minutes < 0 {
            return Err(SecretError::InvalidTtl);
        }

        let created_at = truncate_to_micros(OffsetDateTime::now_utc());
        let expires_at = if ttl_minutes == 0 {
            None
        } else {
            let ttl = ttl_minutes
                .checked_mul(60)
                .map(Duration::seconds)
                .ok_or(SecretError::InvalidTtl)?;
            Some(created_at.checked_add(ttl).ok_or(SecretError::InvalidTtl)?)
        };

        Ok(Self {
            handle: generate_handle(),
            content: content.to_owned(),
            created_at,
            expires_at,
            remaining_views: requested_views,
        })
    }

    pub fn is_available(&self) -> bool {
        self.is_available_at(OffsetDateTime::now_utc())
    }

    pub fn is_available_at(&self, now: OffsetDateTime) -> bool {
        is_available(self.expires_at, self.remaining_views, now)
    }
}

/// Availability rule shared by every backend: not expired and at least one view left.
pub(crate) fn is_available(
    expires_at: Option<OffsetDateTime>,
    remaining_views: i32,
    now: OffsetDateTime,
) -> bool {
    expires_at.map_or(true, |at| at > now) && remaining_views > 0
}

/// Drops sub-microsecond precision so values survive a `TIMESTAMPTZ` round trip.
fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
    at - Duration::nanoseconds(i64::from(at.nanosecond() % 1_000))
}

/// 128 random bits from the OS RNG, hex encoded.
pub fn generate_handle() -> String {
    Uuid::new_v4().simple().to_string()
}
