use crate::calc::CalcError;
use crate::letter::{GpaScale, LetterGrade};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    InProgress,
    Completed,
    Failed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "dropped" => Some(Self::Dropped),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }

    pub fn counts_toward_gpa(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One enrollment as the store reports it, eligible or not.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub course_code: String,
    pub course_name: String,
    pub credits: i64,
    #[serde(default)]
    pub grade: Option<String>,
    pub semester: String,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub course_code: String,
    pub course_name: String,
    pub credits: i64,
    pub grade: LetterGrade,
    pub semester: String,
}

pub trait TranscriptSource {
    fn completed_enrollments(&self, student_id: &str) -> Result<Vec<EnrollmentRecord>, CalcError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub gpa: f64,
    pub total_credits: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub entries: Vec<TranscriptEntry>,
    pub gpa: f64,
    pub total_credits: i64,
    pub skipped: usize,
}

/// Completed or failed enrollments with a grade that parses as a letter.
/// Returns the eligible entries and how many graded-but-unparseable rows were dropped.
pub fn eligible_entries(records: &[EnrollmentRecord]) -> (Vec<TranscriptEntry>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0_usize;
    for r in records {
        if !r.status.counts_toward_gpa() {
            continue;
        }
        let Some(raw) = r.grade.as_deref().map(str::trim).filter(|g| !g.is_empty()) else {
            continue;
        };
        match raw.parse::<LetterGrade>() {
            Ok(grade) => entries.push(TranscriptEntry {
                course_code: r.course_code.clone(),
                course_name: r.course_name.clone(),
                credits: r.credits,
                grade,
                semester: r.semester.clone(),
            }),
            Err(e) => {
                tracing::warn!(
                    course_code = %r.course_code,
                    semester = %r.semester,
                    "skipping transcript row: {e}"
                );
                skipped += 1;
            }
        }
    }
    (entries, skipped)
}

pub fn compute_gpa(entries: &[TranscriptEntry], scale: GpaScale) -> GpaSummary {
    let mut points = 0.0_f64;
    let mut total_credits = 0_i64;
    for e in entries {
        points += e.grade.grade_points(scale) * (e.credits as f64);
        total_credits += e.credits;
    }
    let gpa = if total_credits > 0 {
        points / (total_credits as f64)
    } else {
        0.0
    };
    GpaSummary { gpa, total_credits }
}

/// Newest semester first (plain string comparison), then course code.
pub fn sort_for_display(entries: &mut [TranscriptEntry]) {
    entries.sort_by(|a, b| match b.semester.cmp(&a.semester) {
        Ordering::Equal => a.course_code.cmp(&b.course_code),
        other => other,
    });
}

pub fn build_transcript<S: TranscriptSource + ?Sized>(
    source: &S,
    student_id: &str,
    scale: GpaScale,
) -> Result<Transcript, CalcError> {
    let records = source.completed_enrollments(student_id)?;
    let (mut entries, skipped) = eligible_entries(&records);
    let summary = compute_gpa(&entries, scale);
    sort_for_display(&mut entries);
    Ok(Transcript {
        entries,
        gpa: summary.gpa,
        total_credits: summary.total_credits,
        skipped,
    })
}
