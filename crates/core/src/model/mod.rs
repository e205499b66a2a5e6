mod access;
mod category;
mod class_def;
mod grade;
mod ids;

pub use access::{
    AccessError, AccessStatus, CategoryCompletion, CategoryScores, ProgressChange,
    UserClassAccess,
};
pub use category::{Category, Difficulty, ParseCategoryError};
pub use class_def::{ClassDefinition, ClassDefinitionDraft, ClassDefinitionError};
pub use grade::{GradeLevel, ParseGradeError};
pub use ids::{ClassId, IdError, UserId};
