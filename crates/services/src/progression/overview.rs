use curriculum_core::model::{AccessStatus, ClassId, UserClassAccess};
use serde::Serialize;

/// Roll-up of a learner's records across the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub total_classes: usize,
    pub locked: usize,
    pub unlocked: usize,
    pub active: usize,
    pub completed: usize,
    pub active_class: Option<ClassId>,
    pub total_score: u64,
    pub total_max_score: u64,
    pub achievements: usize,
}

impl ProgressOverview {
    #[must_use]
    pub fn from_records(records: &[UserClassAccess]) -> Self {
        let mut overview = Self {
            total_classes: records.len(),
            ..Self::default()
        };

        for record in records {
            match record.status() {
                AccessStatus::Locked => overview.locked += 1,
                AccessStatus::Unlocked => overview.unlocked += 1,
                AccessStatus::Active => overview.active += 1,
                AccessStatus::Completed => overview.completed += 1,
            }
            if record.is_active() {
                overview.active_class = Some(record.class_id().clone());
            }
            overview.total_score += u64::from(record.current_score());
            overview.total_max_score += u64::from(record.max_score());
            overview.achievements += record.achievements().len();
        }

        overview
    }
}
