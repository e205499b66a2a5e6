//! Shared error types for the services crate.

use thiserror::Error;

use curriculum_core::CatalogError;
use curriculum_core::model::{AccessError, ClassId};
use storage::StorageError;

/// Errors emitted by `ProgressionEngine`.
///
/// "Nothing stored yet" is not an error: list reads return an empty vector.
/// `NotFound` is reserved for lookups of a specific record or class.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("stored progress could not be read: {0}")]
    Deserialization(String),
    #[error("progress store unavailable: {0}")]
    TransientIo(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("class {0} is locked")]
    ClassLocked(ClassId),
}

impl ProgressionError {
    /// `true` when retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ProgressionError::TransientIo(_))
    }
}

impl From<StorageError> for ProgressionError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            ProgressionError::TransientIo(err.to_string())
        } else {
            ProgressionError::Deserialization(err.to_string())
        }
    }
}

impl From<CatalogError> for ProgressionError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => ProgressionError::NotFound(format!("class {id}")),
            other => ProgressionError::InvalidInput(other.to_string()),
        }
    }
}

impl From<AccessError> for ProgressionError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::ClassLocked(id) => ProgressionError::ClassLocked(id),
            AccessError::InvalidPersistedState(msg) => ProgressionError::Deserialization(msg),
            other => ProgressionError::InvalidInput(other.to_string()),
        }
    }
}

/// Errors emitted while reading `EngineConfig` from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("namespace cannot be empty")]
    EmptyNamespace,
    #[error("invalid store timeout (milliseconds): {raw}")]
    InvalidTimeout { raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_core::model::Category;
    use std::time::Duration;

    #[test]
    fn storage_errors_split_into_transient_and_deserialization() {
        let err = ProgressionError::from(StorageError::Timeout(Duration::from_secs(5)));
        assert!(err.is_transient());

        let err = ProgressionError::from(StorageError::Serialization("bad json".into()));
        assert!(matches!(err, ProgressionError::Deserialization(_)));
    }

    #[test]
    fn access_errors_keep_their_meaning() {
        let id = ClassId::new("grade3_math").unwrap();
        let err = ProgressionError::from(AccessError::ClassLocked(id.clone()));
        assert!(matches!(err, ProgressionError::ClassLocked(locked) if locked == id));

        let err = ProgressionError::from(AccessError::CategoryNotOffered {
            class_id: id,
            category: Category::Calculus,
        });
        assert!(matches!(err, ProgressionError::InvalidInput(_)));
    }
}
