use std::sync::Arc;

use curriculum_core::model::{
    AccessStatus, Category, ClassId, GradeLevel, ProgressChange, UserClassAccess, UserId,
};
use curriculum_core::{ClassCatalog, Clock};
use storage::{AccessStore, KeyValueStore};
use tracing::{debug, info, warn};

use super::overview::ProgressOverview;
use crate::config::EngineConfig;
use crate::error::ProgressionError;
use crate::locks::UserLocks;

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Decides which classes a learner can reach and tracks their progress.
///
/// Every mutation reads the user's whole record list, changes it, and writes
/// it back while holding that user's lock. Reads take no lock.
#[derive(Clone)]
pub struct ProgressionEngine {
    catalog: Arc<ClassCatalog>,
    store: AccessStore,
    locks: Arc<UserLocks>,
    clock: Clock,
}

impl ProgressionEngine {
    #[must_use]
    pub fn new(catalog: Arc<ClassCatalog>, store: AccessStore, clock: Clock) -> Self {
        Self {
            catalog,
            store,
            locks: Arc::new(UserLocks::new()),
            clock,
        }
    }

    /// Build an engine over `backend` using the namespace and timeout from `config`.
    #[must_use]
    pub fn from_config(
        catalog: Arc<ClassCatalog>,
        backend: Arc<dyn KeyValueStore>,
        config: &EngineConfig,
        clock: Clock,
    ) -> Self {
        let store = AccessStore::new(backend)
            .with_namespace(config.namespace.clone())
            .with_timeout(config.store_timeout);
        Self::new(catalog, store, clock)
    }

    #[must_use]
    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    /// Create one record per catalog class for a newly registered learner.
    ///
    /// The first class at `selected` (catalog order) becomes the active class;
    /// other classes at that level start unlocked, everything else locked.
    /// Overwrites any prior state, so callers must only invoke this at
    /// registration.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::NotFound` if the catalog has no class at
    /// `selected`, or a storage-derived error if persistence fails.
    pub async fn initialize_user_class_access(
        &self,
        user_id: &UserId,
        selected: GradeLevel,
    ) -> Result<Vec<UserClassAccess>, ProgressionError> {
        let primary = self
            .catalog
            .classes_at_level(selected)
            .next()
            .map(|class| class.id().clone())
            .ok_or_else(|| ProgressionError::NotFound(format!("no class at level {selected}")))?;

        let _guard = self.locks.acquire(user_id).await;

        match self.store.load(user_id).await {
            Ok(previous) if !previous.is_empty() => {
                warn!(
                    %user_id,
                    records = previous.len(),
                    "re-initializing user; prior progress is discarded"
                );
            }
            Ok(_) => {}
            Err(err) if err.is_transient() => return Err(err.into()),
            Err(err) => {
                warn!(%user_id, error = %err, "overwriting unreadable access records");
            }
        }

        let now = self.clock.now();
        let records: Vec<UserClassAccess> = self
            .catalog
            .available_classes()
            .iter()
            .map(|class| {
                let (status, is_active) = if class.id() == &primary {
                    (AccessStatus::Active, true)
                } else if class.level() == selected {
                    (AccessStatus::Unlocked, false)
                } else {
                    (AccessStatus::Locked, false)
                };
                UserClassAccess::for_registration(user_id.clone(), class, status, is_active, now)
            })
            .collect();

        self.store.save(user_id, &records).await?;
        info!(%user_id, level = %selected, active_class = %primary, "initialized class access");
        Ok(records)
    }

    /// All records for the user, empty if the user was never initialized.
    ///
    /// # Errors
    ///
    /// Returns `Deserialization` for unreadable stored data and `TransientIo`
    /// for backend failures.
    pub async fn get_user_class_access(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserClassAccess>, ProgressionError> {
        let records = self.store.load(user_id).await?;
        debug!(%user_id, records = records.len(), "loaded class access");
        Ok(records)
    }

    /// The user's record for one class.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::NotFound` if the user has no record for `class_id`.
    pub async fn get_user_class(
        &self,
        user_id: &UserId,
        class_id: &ClassId,
    ) -> Result<UserClassAccess, ProgressionError> {
        let records = self.store.load(user_id).await?;
        records
            .into_iter()
            .find(|record| record.class_id() == class_id)
            .ok_or_else(|| not_found_record(user_id, class_id))
    }

    /// The single record with `is_active == true`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::NotFound` if the user has no active class.
    pub async fn get_user_active_class(
        &self,
        user_id: &UserId,
    ) -> Result<UserClassAccess, ProgressionError> {
        let records = self.store.load(user_id).await?;
        records
            .into_iter()
            .find(UserClassAccess::is_active)
            .ok_or_else(|| ProgressionError::NotFound(format!("active class for user {user_id}")))
    }

    /// Whether the user may move into `target`.
    ///
    /// Evaluates a single prerequisite hop and never writes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::NotFound` for an unknown class or a missing
    /// record, or a storage-derived error.
    pub async fn can_upgrade_to_class(
        &self,
        user_id: &UserId,
        target: &ClassId,
    ) -> Result<bool, ProgressionError> {
        let records = self.store.load(user_id).await?;
        self.is_eligible(user_id, &records, target)
    }

    /// Make `target` the active class if the user is eligible.
    ///
    /// Returns `Ok(false)` without touching storage when ineligible. On success
    /// any previously active class is demoted to unlocked with its progress kept.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressionEngine::can_upgrade_to_class`], plus write failures.
    pub async fn upgrade_to_class(
        &self,
        user_id: &UserId,
        target: &ClassId,
    ) -> Result<bool, ProgressionError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut records = self.store.load(user_id).await?;

        if !self.is_eligible(user_id, &records, target)? {
            info!(%user_id, class_id = %target, "upgrade rejected: prerequisite not met");
            return Ok(false);
        }

        let now = self.clock.now();
        let mut previous = None;
        for record in &mut records {
            if record.class_id() == target {
                record.activate(now);
            } else if record.is_active() {
                previous = Some(record.class_id().clone());
                record.demote();
            }
        }

        self.store.save(user_id, &records).await?;
        info!(
            %user_id,
            class_id = %target,
            previous = previous.as_ref().map(ClassId::as_str),
            "upgraded active class"
        );
        Ok(true)
    }

    /// Record the result of a learning activity for one category.
    ///
    /// Overwrites the category's score and completion flag, recomputes totals,
    /// and completes the class once both thresholds are met. Returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown class or record, `ClassLocked` for a
    /// locked class, `InvalidInput` for an unoffered category or a score above
    /// the category maximum, or a storage-derived error.
    pub async fn update_class_progress(
        &self,
        user_id: &UserId,
        class_id: &ClassId,
        category: Category,
        score: u32,
        completed: bool,
    ) -> Result<UserClassAccess, ProgressionError> {
        let class = self.catalog.get_class(class_id)?;

        let _guard = self.locks.acquire(user_id).await;
        let mut records = self.store.load(user_id).await?;
        let record = records
            .iter_mut()
            .find(|record| record.class_id() == class_id)
            .ok_or_else(|| not_found_record(user_id, class_id))?;

        let change = record
            .apply_category_result(class, category, score, completed, self.clock.now())
            .map_err(|err| {
                warn!(%user_id, %class_id, %category, score, error = %err, "progress update rejected");
                ProgressionError::from(err)
            })?;
        let updated = record.clone();

        self.store.save(user_id, &records).await?;

        debug!(
            %user_id,
            %class_id,
            %category,
            score,
            total = updated.current_score(),
            completion = updated.completion_percentage(),
            "recorded category result"
        );
        if change == ProgressChange::Completed {
            info!(%user_id, %class_id, score = updated.current_score(), "class completed");
        }
        Ok(updated)
    }

    /// Locked classes the user could upgrade into right now, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns a storage-derived error if the records cannot be read.
    pub async fn get_unlockable_classes(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ClassId>, ProgressionError> {
        let records = self.store.load(user_id).await?;
        let mut unlockable = Vec::new();
        for class in self.catalog.available_classes() {
            let locked = records
                .iter()
                .any(|record| record.class_id() == class.id() && record.is_locked());
            if locked && self.is_eligible(user_id, &records, class.id())? {
                unlockable.push(class.id().clone());
            }
        }
        Ok(unlockable)
    }

    /// Status counts and score totals across the user's records.
    ///
    /// # Errors
    ///
    /// Returns a storage-derived error if the records cannot be read.
    pub async fn get_progress_overview(
        &self,
        user_id: &UserId,
    ) -> Result<ProgressOverview, ProgressionError> {
        let records = self.store.load(user_id).await?;
        Ok(ProgressOverview::from_records(&records))
    }

    fn is_eligible(
        &self,
        user_id: &UserId,
        records: &[UserClassAccess],
        target: &ClassId,
    ) -> Result<bool, ProgressionError> {
        let target_class = self.catalog.get_class(target)?;
        let target_access =
            find_record(records, target).ok_or_else(|| not_found_record(user_id, target))?;

        if !target_access.is_locked() {
            return Ok(true);
        }
        let Some(prerequisite_id) = target_class.prerequisite_class() else {
            return Ok(true);
        };

        let prerequisite = find_record(records, prerequisite_id)
            .ok_or_else(|| not_found_record(user_id, prerequisite_id))?;
        Ok(prerequisite.status() == AccessStatus::Completed
            && prerequisite.current_score() >= target_class.required_score())
    }
}

fn find_record<'a>(
    records: &'a [UserClassAccess],
    class_id: &ClassId,
) -> Option<&'a UserClassAccess> {
    records.iter().find(|record| record.class_id() == class_id)
}

fn not_found_record(user_id: &UserId, class_id: &ClassId) -> ProgressionError {
    ProgressionError::NotFound(format!("class {class_id} for user {user_id}"))
}
