use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use curriculum_core::model::{
    AccessError, AccessStatus, CategoryCompletion, CategoryScores, ClassId, UserClassAccess,
    UserId,
};
use serde::{Deserialize, Serialize};

use crate::repository::{KeyValueStore, StorageError};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "user_class_access";

/// Default bound on a single store call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted shape of a `UserClassAccess`.
///
/// This is the JSON wire format of the per-user blob; the domain type stays
/// free of storage concerns and is rebuilt through `from_persisted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub user_id: UserId,
    pub class_id: ClassId,
    pub status: AccessStatus,
    pub current_score: u32,
    pub max_score: u32,
    pub completion_percentage: f64,
    pub category_scores: CategoryScores,
    pub category_completion: CategoryCompletion,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub achievements: Vec<String>,
    pub is_active: bool,
}

impl AccessRecord {
    #[must_use]
    pub fn from_access(access: &UserClassAccess) -> Self {
        Self {
            user_id: access.user_id().clone(),
            class_id: access.class_id().clone(),
            status: access.status(),
            current_score: access.current_score(),
            max_score: access.max_score(),
            completion_percentage: access.completion_percentage(),
            category_scores: access.category_scores().clone(),
            category_completion: access.category_completion().clone(),
            unlocked_at: access.unlocked_at(),
            completed_at: access.completed_at(),
            achievements: access.achievements().to_vec(),
            is_active: access.is_active(),
        }
    }

    /// Convert the record back into a domain `UserClassAccess`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidPersistedState` if the stored values are inconsistent.
    pub fn into_access(self) -> Result<UserClassAccess, AccessError> {
        UserClassAccess::from_persisted(
            self.user_id,
            self.class_id,
            self.status,
            self.current_score,
            self.max_score,
            self.completion_percentage,
            self.category_scores,
            self.category_completion,
            self.unlocked_at,
            self.completed_at,
            self.achievements,
            self.is_active,
        )
    }
}

/// Serialize a user's records into the persisted JSON array.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_access_list(records: &[UserClassAccess]) -> Result<String, StorageError> {
    let rows: Vec<AccessRecord> = records.iter().map(AccessRecord::from_access).collect();
    serde_json::to_string(&rows).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Parse and validate a persisted JSON array for `user_id`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON, unknown enum
/// values, inconsistent records, records owned by another user, a class
/// that appears twice, or more than one active class.
pub fn decode_access_list(
    user_id: &UserId,
    json: &str,
) -> Result<Vec<UserClassAccess>, StorageError> {
    let rows: Vec<AccessRecord> =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;

    let mut records: Vec<UserClassAccess> = Vec::with_capacity(rows.len());
    for row in rows {
        if &row.user_id != user_id {
            return Err(StorageError::Serialization(format!(
                "record for user {} stored under user {user_id}",
                row.user_id
            )));
        }
        if records.iter().any(|r| r.class_id() == &row.class_id) {
            return Err(StorageError::Serialization(format!(
                "duplicate record for class {}",
                row.class_id
            )));
        }
        let access = row
            .into_access()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        records.push(access);
    }

    let active = records.iter().filter(|r| r.is_active()).count();
    if active > 1 {
        return Err(StorageError::Serialization(format!(
            "{active} records marked active for user {user_id}"
        )));
    }
    Ok(records)
}

/// Reads and writes a user's whole access list as one namespaced blob.
///
/// Every backend call is bounded by `timeout`.
#[derive(Clone)]
pub struct AccessStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
    timeout: Duration,
}

impl AccessStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `"<namespace>_<user_id>"`
    #[must_use]
    pub fn key_for(&self, user_id: &UserId) -> String {
        format!("{}_{}", self.namespace, user_id)
    }

    /// Load every record for the user; empty if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unreadable blobs and
    /// `StorageError::Connection`/`Timeout` for backend failures.
    pub async fn load(&self, user_id: &UserId) -> Result<Vec<UserClassAccess>, StorageError> {
        let key = self.key_for(user_id);
        let raw = self.bounded(self.backend.get(&key)).await?;
        match raw {
            Some(json) => decode_access_list(user_id, &json),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the user's stored list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding fails or the backend write fails or times out.
    pub async fn save(
        &self,
        user_id: &UserId,
        records: &[UserClassAccess],
    ) -> Result<(), StorageError> {
        let key = self.key_for(user_id);
        let json = encode_access_list(records)?;
        self.bounded(self.backend.set(&key, json)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "access store call timed out");
                Err(StorageError::Timeout(self.timeout))
            }
        }
    }
}
