use crate::letter::LetterGrade;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeState {
    Ungraded,
    Calculated,
    Overridden,
}

/// Grade columns stored against one enrollment.
///
/// The calculated pair is rewritten by every recompute. `override_grade` is only
/// touched by explicit instructor actions, so a recompute can never erase it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnrollmentGrade {
    pub calculated_percentage: Option<f64>,
    pub calculated_grade: Option<LetterGrade>,
    pub override_grade: Option<LetterGrade>,
    pub override_at: Option<String>,
}

impl EnrollmentGrade {
    pub fn current_grade(&self) -> Option<LetterGrade> {
        self.override_grade.or(self.calculated_grade)
    }

    pub fn is_overridden(&self) -> bool {
        self.current_grade() != self.calculated_grade
    }

    pub fn state(&self) -> GradeState {
        if self.is_overridden() {
            GradeState::Overridden
        } else if self.calculated_grade.is_some() {
            GradeState::Calculated
        } else {
            GradeState::Ungraded
        }
    }

    pub fn recalculated(&self, percentage: Option<f64>) -> Self {
        Self {
            calculated_percentage: percentage,
            calculated_grade: percentage.map(LetterGrade::from_percentage),
            override_grade: self.override_grade,
            override_at: self.override_at.clone(),
        }
    }

    pub fn with_override(&self, grade: LetterGrade, at: String) -> Self {
        Self {
            override_grade: Some(grade),
            override_at: Some(at),
            ..self.clone()
        }
    }

    pub fn without_override(&self) -> Self {
        Self {
            override_grade: None,
            override_at: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFinalGrade {
    pub student_id: String,
    pub course_id: String,
    pub state: GradeState,
    pub calculated_percentage: Option<f64>,
    pub calculated_grade: Option<LetterGrade>,
    pub current_grade: Option<LetterGrade>,
    pub is_overridden: bool,
    pub override_at: Option<String>,
}

impl StudentFinalGrade {
    pub fn from_enrollment(course_id: &str, student_id: &str, g: &EnrollmentGrade) -> Self {
        Self {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            state: g.state(),
            calculated_percentage: g.calculated_percentage,
            calculated_grade: g.calculated_grade,
            current_grade: g.current_grade(),
            is_overridden: g.is_overridden(),
            override_at: g.override_at.clone(),
        }
    }
}
