use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::Secret;

/// Form body of `POST /secret`. Numbers arrive as text and are parsed by the
/// handler so malformed values map to "Invalid input".
#[derive(Debug, Deserialize)]
pub struct StoreSecretForm {
    #[serde(default)]
    pub secret: String,
    #[serde(rename = "expireAfterViews", default)]
    pub expire_after_views: String,
    #[serde(rename = "expireAfter", default)]
    pub expire_after: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretResponse {
    pub hash: String,
    pub secret_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub remaining_views: i32,
}

impl From<Secret> for SecretResponse {
    fn from(secret: Secret) -> Self {
        Self {
            hash: secret.handle,
            secret_text: secret.content,
            created_at: secret.created_at,
            expires_at: secret.expires_at,
            remaining_views: secret.remaining_views,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub storage: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub version: String,
}
