use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct ParseCategoryError(pub String);

/// Subject-matter grouping inside a class.
///
/// Closed set; unknown names are rejected when persisted data or catalog
/// files are deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Counting,
    Arithmetic,
    Geometry,
    Measurement,
    WordProblems,
    Fractions,
    Decimals,
    Algebra,
    DataAnalysis,
    Probability,
    Statistics,
    Trigonometry,
    Calculus,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Counting,
        Category::Arithmetic,
        Category::Geometry,
        Category::Measurement,
        Category::WordProblems,
        Category::Fractions,
        Category::Decimals,
        Category::Algebra,
        Category::DataAnalysis,
        Category::Probability,
        Category::Statistics,
        Category::Trigonometry,
        Category::Calculus,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Category::Counting => "counting",
            Category::Arithmetic => "arithmetic",
            Category::Geometry => "geometry",
            Category::Measurement => "measurement",
            Category::WordProblems => "word_problems",
            Category::Fractions => "fractions",
            Category::Decimals => "decimals",
            Category::Algebra => "algebra",
            Category::DataAnalysis => "data_analysis",
            Category::Probability => "probability",
            Category::Statistics => "statistics",
            Category::Trigonometry => "trigonometry",
            Category::Calculus => "calculus",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.key() == needle)
            .ok_or_else(|| ParseCategoryError(s.to_owned()))
    }
}

/// Difficulty of the questions a class serves for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Easy,
    Medium,
    Hard,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Advanced => "advanced",
        };
        f.write_str(s)
    }
}
