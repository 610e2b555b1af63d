use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
}

/// Inclusive lower bounds, checked top-down. Anything below the last bound is F.
const THRESHOLDS: [(f64, LetterGrade); 11] = [
    (97.0, LetterGrade::APlus),
    (93.0, LetterGrade::A),
    (89.0, LetterGrade::AMinus),
    (84.0, LetterGrade::BPlus),
    (80.0, LetterGrade::B),
    (76.0, LetterGrade::BMinus),
    (73.0, LetterGrade::CPlus),
    (70.0, LetterGrade::C),
    (67.0, LetterGrade::CMinus),
    (64.0, LetterGrade::DPlus),
    (60.0, LetterGrade::D),
];

/// Point value table used when turning letters into GPA contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpaScale {
    /// A+ and A both earn 4.0.
    #[default]
    Standard,
    /// A+ earns 4.3.
    Plus,
}

impl GpaScale {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "plus" => Some(Self::Plus),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Plus => "plus",
        }
    }
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 12] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::F,
    ];

    /// Maps a final percentage onto the plus/minus scale.
    ///
    /// Out-of-range input is not clamped: anything >= 97 is A+, anything below 60
    /// (negative values and NaN included) is F.
    pub fn from_percentage(percentage: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(bound, _)| percentage >= *bound)
            .map(|(_, grade)| *grade)
            .unwrap_or(LetterGrade::F)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::F => "F",
        }
    }

    pub fn grade_points(self, scale: GpaScale) -> f64 {
        match self {
            Self::APlus => match scale {
                GpaScale::Standard => 4.0,
                GpaScale::Plus => 4.3,
            },
            Self::A => 4.0,
            Self::AMinus => 3.7,
            Self::BPlus => 3.3,
            Self::B => 3.0,
            Self::BMinus => 2.7,
            Self::CPlus => 2.3,
            Self::C => 2.0,
            Self::CMinus => 1.7,
            Self::DPlus => 1.3,
            Self::D => 1.0,
            Self::F => 0.0,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown letter grade: {0:?}")]
pub struct UnknownLetterGrade(pub String);

impl FromStr for LetterGrade {
    type Err = UnknownLetterGrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_uppercase();
        LetterGrade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == t)
            .ok_or_else(|| UnknownLetterGrade(s.to_string()))
    }
}
