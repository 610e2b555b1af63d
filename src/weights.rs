use serde::Serialize;
use thiserror::Error;

/// Weights are held in hundredths of a percent so the sum check is exact.
pub const FULL_WEIGHT_HUNDREDTHS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradeWeights {
    pub course_id: String,
    pub assignments_hundredths: i64,
    pub quizzes_hundredths: i64,
    pub exams_hundredths: i64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    #[error("{field} weight must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} weight must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} weight must not exceed 100 (got {value})")]
    AboveFull { field: &'static str, value: f64 },
    #[error("{field} weight supports at most two decimal places (got {value})")]
    TooPrecise { field: &'static str, value: f64 },
    #[error("weights must sum to 100 (got {sum})")]
    SumNot100 { sum: f64 },
}

impl WeightsError {
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::NotFinite { field } => serde_json::json!({ "field": field }),
            Self::Negative { field, value }
            | Self::AboveFull { field, value }
            | Self::TooPrecise { field, value } => {
                serde_json::json!({ "field": field, "value": value })
            }
            Self::SumNot100 { sum } => serde_json::json!({ "sum": sum }),
        }
    }
}

fn to_hundredths(field: &'static str, value: f64) -> Result<i64, WeightsError> {
    if !value.is_finite() {
        return Err(WeightsError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(WeightsError::Negative { field, value });
    }
    if value > 100.0 {
        return Err(WeightsError::AboveFull { field, value });
    }
    let scaled = value * 100.0;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return Err(WeightsError::TooPrecise { field, value });
    }
    Ok(rounded as i64)
}

impl CourseGradeWeights {
    /// Builds a validated weight set from the percentages a caller typed in.
    pub fn from_percentages(
        course_id: impl Into<String>,
        assignments: f64,
        quizzes: f64,
        exams: f64,
    ) -> Result<Self, WeightsError> {
        let weights = Self {
            course_id: course_id.into(),
            assignments_hundredths: to_hundredths("assignments", assignments)?,
            quizzes_hundredths: to_hundredths("quizzes", quizzes)?,
            exams_hundredths: to_hundredths("exams", exams)?,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// `None` if the components overflow, which only corrupt stored rows can produce.
    pub fn sum_hundredths(&self) -> Option<i64> {
        self.assignments_hundredths
            .checked_add(self.quizzes_hundredths)?
            .checked_add(self.exams_hundredths)
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for (field, value) in [
            ("assignments", self.assignments_hundredths),
            ("quizzes", self.quizzes_hundredths),
            ("exams", self.exams_hundredths),
        ] {
            if value < 0 {
                return Err(WeightsError::Negative {
                    field,
                    value: value as f64 / 100.0,
                });
            }
            if value > FULL_WEIGHT_HUNDREDTHS {
                return Err(WeightsError::AboveFull {
                    field,
                    value: value as f64 / 100.0,
                });
            }
        }
        let sum = self.sum_hundredths().unwrap_or(i64::MAX);
        if sum != FULL_WEIGHT_HUNDREDTHS {
            return Err(WeightsError::SumNot100 {
                sum: sum as f64 / 100.0,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn assignments(&self) -> f64 {
        self.assignments_hundredths as f64 / 100.0
    }

    pub fn quizzes(&self) -> f64 {
        self.quizzes_hundredths as f64 / 100.0
    }

    pub fn exams(&self) -> f64 {
        self.exams_hundredths as f64 / 100.0
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "courseId": self.course_id,
            "assignments": self.assignments(),
            "quizzes": self.quizzes(),
            "exams": self.exams(),
            "valid": self.is_valid(),
        })
    }
}
