use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown grade level: {0}")]
pub struct ParseGradeError(pub String);

/// Ordinal school grade, Pre-K through Grade 12.
///
/// Variants are declared in ascending order so the derived `Ord` follows the
/// school progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeLevel {
    PreK,
    Kindergarten,
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
    Grade6,
    Grade7,
    Grade8,
    Grade9,
    Grade10,
    Grade11,
    Grade12,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 14] = [
        GradeLevel::PreK,
        GradeLevel::Kindergarten,
        GradeLevel::Grade1,
        GradeLevel::Grade2,
        GradeLevel::Grade3,
        GradeLevel::Grade4,
        GradeLevel::Grade5,
        GradeLevel::Grade6,
        GradeLevel::Grade7,
        GradeLevel::Grade8,
        GradeLevel::Grade9,
        GradeLevel::Grade10,
        GradeLevel::Grade11,
        GradeLevel::Grade12,
    ];

    /// Position in the progression, `PreK` = 0 through `Grade12` = 13.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            GradeLevel::PreK => 0,
            GradeLevel::Kindergarten => 1,
            GradeLevel::Grade1 => 2,
            GradeLevel::Grade2 => 3,
            GradeLevel::Grade3 => 4,
            GradeLevel::Grade4 => 5,
            GradeLevel::Grade5 => 6,
            GradeLevel::Grade6 => 7,
            GradeLevel::Grade7 => 8,
            GradeLevel::Grade8 => 9,
            GradeLevel::Grade9 => 10,
            GradeLevel::Grade10 => 11,
            GradeLevel::Grade11 => 12,
            GradeLevel::Grade12 => 13,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GradeLevel::PreK => "Pre-K",
            GradeLevel::Kindergarten => "Kindergarten",
            GradeLevel::Grade1 => "Grade 1",
            GradeLevel::Grade2 => "Grade 2",
            GradeLevel::Grade3 => "Grade 3",
            GradeLevel::Grade4 => "Grade 4",
            GradeLevel::Grade5 => "Grade 5",
            GradeLevel::Grade6 => "Grade 6",
            GradeLevel::Grade7 => "Grade 7",
            GradeLevel::Grade8 => "Grade 8",
            GradeLevel::Grade9 => "Grade 9",
            GradeLevel::Grade10 => "Grade 10",
            GradeLevel::Grade11 => "Grade 11",
            GradeLevel::Grade12 => "Grade 12",
        }
    }

    /// Stable snake_case key, identical to the serialized form.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            GradeLevel::PreK => "pre_k",
            GradeLevel::Kindergarten => "kindergarten",
            GradeLevel::Grade1 => "grade1",
            GradeLevel::Grade2 => "grade2",
            GradeLevel::Grade3 => "grade3",
            GradeLevel::Grade4 => "grade4",
            GradeLevel::Grade5 => "grade5",
            GradeLevel::Grade6 => "grade6",
            GradeLevel::Grade7 => "grade7",
            GradeLevel::Grade8 => "grade8",
            GradeLevel::Grade9 => "grade9",
            GradeLevel::Grade10 => "grade10",
            GradeLevel::Grade11 => "grade11",
            GradeLevel::Grade12 => "grade12",
        }
    }

    /// The grade directly below this one, if any.
    #[must_use]
    pub fn previous(self) -> Option<GradeLevel> {
        let idx = usize::from(self.ordinal());
        idx.checked_sub(1).map(|prev| Self::ALL[prev])
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GradeLevel {
    type Err = ParseGradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.key() == needle)
            .ok_or_else(|| ParseGradeError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_declaration_order() {
        for (idx, level) in GradeLevel::ALL.iter().enumerate() {
            assert_eq!(usize::from(level.ordinal()), idx);
        }
        assert!(GradeLevel::PreK < GradeLevel::Grade12);
    }

    #[test]
    fn key_matches_serde_name() {
        for level in GradeLevel::ALL {
            let json = serde_json::to_string(&level).unwrap();
            assert_eq!(json, format!("\"{}\"", level.key()));
        }
    }

    #[test]
    fn parses_keys() {
        assert_eq!("grade1".parse::<GradeLevel>().unwrap(), GradeLevel::Grade1);
        assert_eq!(" Pre_K ".parse::<GradeLevel>().unwrap(), GradeLevel::PreK);
        assert!("grade13".parse::<GradeLevel>().is_err());
    }

    #[test]
    fn previous_grade() {
        assert_eq!(GradeLevel::PreK.previous(), None);
        assert_eq!(GradeLevel::Grade1.previous(), Some(GradeLevel::Kindergarten));
    }
}
