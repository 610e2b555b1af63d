use crate::letter::LetterGrade;
use crate::weights::CourseGradeWeights;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Assignment,
    Quiz,
    Exam,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 3] = [
        ScoreCategory::Assignment,
        ScoreCategory::Quiz,
        ScoreCategory::Exam,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignment" => Some(Self::Assignment),
            "quiz" => Some(Self::Quiz),
            "exam" => Some(Self::Exam),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Quiz => "quiz",
            Self::Exam => "exam",
        }
    }

    pub fn weight_in(self, weights: &CourseGradeWeights) -> f64 {
        match self {
            Self::Assignment => weights.assignments(),
            Self::Quiz => weights.quizzes(),
            Self::Exam => weights.exams(),
        }
    }
}

/// State of an assignment submission or exam grade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Submitted,
    Graded,
}

impl ScoreStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "timed_out" => Some(Self::TimedOut),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedItem {
    pub item_id: String,
    pub total_points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizAttempt {
    pub score: Option<f64>,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<rusqlite::Error> for CalcError {
    fn from(e: rusqlite::Error) -> Self {
        CalcError::new("db_query_failed", e.to_string())
    }
}

/// Read side the grade calculation needs. The workspace database implements it;
/// tests use in-memory fakes.
pub trait GradeSource {
    fn grade_weights(&self, course_id: &str) -> Result<Option<CourseGradeWeights>, CalcError>;

    fn graded_items(
        &self,
        course_id: &str,
        category: ScoreCategory,
    ) -> Result<Vec<GradedItem>, CalcError>;

    /// Earned points for an assignment or exam, `None` while ungraded.
    fn student_score(&self, item_id: &str, student_id: &str) -> Result<Option<f64>, CalcError>;

    fn attempts(&self, item_id: &str, student_id: &str) -> Result<Vec<QuizAttempt>, CalcError>;
}

/// Presentation rounding: `Int(10^d * x + 0.5) / 10^d`.
pub fn round_off(x: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    ((factor * x) + 0.5).floor() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryAverage {
    pub earned: f64,
    pub possible: f64,
    pub graded_count: usize,
    pub item_count: usize,
}

impl CategoryAverage {
    /// `None` means "no data yet", which is different from 0%.
    pub fn percentage(&self) -> Option<f64> {
        if self.graded_count == 0 || self.possible <= 0.0 {
            return None;
        }
        Some(100.0 * self.earned / self.possible)
    }
}

/// Sum-of-points reduction. Each entry is `(total_points, earned)`; ungraded
/// entries are left out of both sides of the ratio.
pub fn sum_of_points<I>(entries: I) -> CategoryAverage
where
    I: IntoIterator<Item = (f64, Option<f64>)>,
{
    let mut avg = CategoryAverage::default();
    for (total_points, earned) in entries {
        avg.item_count += 1;
        let Some(earned) = earned else {
            continue;
        };
        avg.graded_count += 1;
        avg.earned += earned;
        avg.possible += total_points;
    }
    avg
}

/// Highest score among completed attempts. Attempt order does not matter.
pub fn best_attempt(attempts: &[QuizAttempt]) -> Option<f64> {
    attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Completed)
        .filter_map(|a| a.score)
        .fold(None, |best: Option<f64>, s| match best {
            Some(b) if b >= s => Some(b),
            _ => Some(s),
        })
}

pub fn category_average<S: GradeSource + ?Sized>(
    source: &S,
    course_id: &str,
    category: ScoreCategory,
    student_id: &str,
) -> Result<CategoryAverage, CalcError> {
    let items = source.graded_items(course_id, category)?;
    let mut entries: Vec<(f64, Option<f64>)> = Vec::with_capacity(items.len());
    for item in &items {
        let earned = match category {
            ScoreCategory::Quiz => best_attempt(&source.attempts(&item.item_id, student_id)?),
            ScoreCategory::Assignment | ScoreCategory::Exam => {
                source.student_score(&item.item_id, student_id)?
            }
        };
        entries.push((item.total_points, earned));
    }
    Ok(sum_of_points(entries))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: ScoreCategory,
    pub weight: f64,
    pub percentage: Option<f64>,
    pub earned: f64,
    pub possible: f64,
    pub graded_count: usize,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGrade {
    pub percentage: f64,
    pub letter: LetterGrade,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalGradeOutcome {
    /// The course has no weight configuration yet.
    NotConfigured,
    /// Weights exist but no weighted category has a graded item.
    NoData { categories: Vec<CategoryBreakdown> },
    Graded(FinalGrade),
}

impl FinalGradeOutcome {
    pub fn percentage(&self) -> Option<f64> {
        match self {
            Self::Graded(g) => Some(g.percentage),
            _ => None,
        }
    }

    pub fn letter(&self) -> Option<LetterGrade> {
        match self {
            Self::Graded(g) => Some(g.letter),
            _ => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::NoData { .. } => "no_data",
            Self::Graded(_) => "graded",
        }
    }

    pub fn categories(&self) -> &[CategoryBreakdown] {
        match self {
            Self::NotConfigured => &[],
            Self::NoData { categories } => categories,
            Self::Graded(g) => &g.categories,
        }
    }
}

/// Weighted mean over the categories that have data, renormalized so the present
/// weights count as the whole 100%. A missing category is never treated as 0%.
pub fn renormalized_percentage(categories: &[CategoryBreakdown]) -> Option<f64> {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    for c in categories {
        let Some(pct) = c.percentage else {
            continue;
        };
        if c.weight <= 0.0 {
            continue;
        }
        weighted_sum += pct * c.weight;
        total_weight += c.weight;
    }
    if total_weight > 0.0 {
        Some(weighted_sum / total_weight)
    } else {
        None
    }
}

pub fn compute_final_grade<S: GradeSource + ?Sized>(
    source: &S,
    course_id: &str,
    student_id: &str,
) -> Result<FinalGradeOutcome, CalcError> {
    let Some(weights) = source.grade_weights(course_id)? else {
        return Ok(FinalGradeOutcome::NotConfigured);
    };

    let mut categories: Vec<CategoryBreakdown> = Vec::with_capacity(ScoreCategory::ALL.len());
    for category in ScoreCategory::ALL {
        let avg = category_average(source, course_id, category, student_id)?;
        categories.push(CategoryBreakdown {
            category,
            weight: category.weight_in(&weights),
            percentage: avg.percentage(),
            earned: avg.earned,
            possible: avg.possible,
            graded_count: avg.graded_count,
            item_count: avg.item_count,
        });
    }

    match renormalized_percentage(&categories) {
        Some(percentage) => Ok(FinalGradeOutcome::Graded(FinalGrade {
            percentage,
            letter: LetterGrade::from_percentage(percentage),
            categories,
        })),
        None => Ok(FinalGradeOutcome::NoData { categories }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryClassAverage {
    pub category: ScoreCategory,
    pub class_avg: f64,
    pub student_count: usize,
}

/// Mean category percentage across students, counting only students with data in
/// that category.
pub fn class_category_averages(outcomes: &[FinalGradeOutcome]) -> Vec<CategoryClassAverage> {
    let mut out = Vec::new();
    for category in ScoreCategory::ALL {
        let mut sum = 0.0_f64;
        let mut count = 0_usize;
        for o in outcomes {
            let pct = o
                .categories()
                .iter()
                .find(|c| c.category == category)
                .and_then(|c| c.percentage);
            if let Some(p) = pct {
                sum += p;
                count += 1;
            }
        }
        if count > 0 {
            out.push(CategoryClassAverage {
                category,
                class_avg: sum / (count as f64),
                student_count: count,
            });
        }
    }
    out
}
