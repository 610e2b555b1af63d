use crate::calc::{
    compute_final_grade, AttemptStatus, CalcError, GradeSource, GradedItem, QuizAttempt,
    ScoreCategory,
};
use crate::letter::LetterGrade;
use crate::overrides::EnrollmentGrade;
use crate::transcript::{EnrollmentRecord, EnrollmentStatus, TranscriptSource};
use crate::weights::CourseGradeWeights;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            semester TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            student_no TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'in_progress',
            calculated_percentage REAL,
            calculated_grade TEXT,
            override_grade TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(course_id, student_id)
        )",
        [],
    )?;
    // Workspaces created before overrides were timestamped lack this column.
    ensure_enrollments_override_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_weights(
            course_id TEXT PRIMARY KEY,
            assignments_weight INTEGER NOT NULL,
            quizzes_weight INTEGER NOT NULL,
            exams_weight INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS gradable_items(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            category TEXT NOT NULL CHECK(category IN ('assignment', 'quiz', 'exam')),
            title TEXT NOT NULL,
            total_points REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_gradable_items_course ON gradable_items(course_id, category)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS item_scores(
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            points_earned REAL,
            status TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(item_id) REFERENCES gradable_items(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(item_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_item_scores_student ON item_scores(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_attempts(
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            attempt_no INTEGER NOT NULL,
            score REAL,
            status TEXT NOT NULL,
            FOREIGN KEY(item_id) REFERENCES gradable_items(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(item_id, student_id, attempt_no)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_pair ON quiz_attempts(item_id, student_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_enrollments_override_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "override_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN override_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn save_grade_weights(
    conn: &Connection,
    weights: &CourseGradeWeights,
) -> Result<(), CalcError> {
    weights
        .validate()
        .map_err(|e| CalcError::new("validation_failed", e.to_string()).with_details(e.details()))?;
    conn.execute(
        "INSERT INTO grade_weights(course_id, assignments_weight, quizzes_weight, exams_weight, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(course_id) DO UPDATE SET
           assignments_weight = excluded.assignments_weight,
           quizzes_weight = excluded.quizzes_weight,
           exams_weight = excluded.exams_weight,
           updated_at = excluded.updated_at",
        (
            &weights.course_id,
            weights.assignments_hundredths,
            weights.quizzes_hundredths,
            weights.exams_hundredths,
            chrono::Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;
    Ok(())
}

/// The workspace database seen through the calculation's read contracts.
#[derive(Debug, Clone, Copy)]
pub struct DbGradeSource<'a> {
    pub conn: &'a Connection,
}

impl GradeSource for DbGradeSource<'_> {
    fn grade_weights(&self, course_id: &str) -> Result<Option<CourseGradeWeights>, CalcError> {
        let row: Option<(i64, i64, i64)> = self
            .conn
            .query_row(
                "SELECT assignments_weight, quizzes_weight, exams_weight
                 FROM grade_weights WHERE course_id = ?",
                [course_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        let Some((a, q, e)) = row else {
            return Ok(None);
        };
        let weights = CourseGradeWeights {
            course_id: course_id.to_string(),
            assignments_hundredths: a,
            quizzes_hundredths: q,
            exams_hundredths: e,
        };
        weights.validate().map_err(|err| {
            CalcError::new("validation_failed", format!("stored weights are invalid: {err}"))
                .with_details(err.details())
        })?;
        Ok(Some(weights))
    }

    fn graded_items(
        &self,
        course_id: &str,
        category: ScoreCategory,
    ) -> Result<Vec<GradedItem>, CalcError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, total_points FROM gradable_items
             WHERE course_id = ? AND category = ?
             ORDER BY sort_order",
        )?;
        let items = stmt
            .query_map((course_id, category.as_str()), |r| {
                Ok(GradedItem {
                    item_id: r.get(0)?,
                    total_points: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn student_score(&self, item_id: &str, student_id: &str) -> Result<Option<f64>, CalcError> {
        let v: Option<Option<f64>> = self
            .conn
            .query_row(
                "SELECT points_earned FROM item_scores WHERE item_id = ? AND student_id = ?",
                (item_id, student_id),
                |r| r.get(0),
            )
            .optional()?;
        Ok(v.flatten())
    }

    fn attempts(&self, item_id: &str, student_id: &str) -> Result<Vec<QuizAttempt>, CalcError> {
        let mut stmt = self.conn.prepare(
            "SELECT score, status FROM quiz_attempts
             WHERE item_id = ? AND student_id = ?
             ORDER BY attempt_no",
        )?;
        let rows = stmt
            .query_map((item_id, student_id), |r| {
                Ok((r.get::<_, Option<f64>>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for (score, status) in rows {
            match AttemptStatus::parse(&status) {
                Some(status) => out.push(QuizAttempt { score, status }),
                None => tracing::warn!(
                    item_id,
                    student_id,
                    status = %status,
                    "ignoring attempt with unknown status"
                ),
            }
        }
        Ok(out)
    }
}

impl TranscriptSource for DbGradeSource<'_> {
    fn completed_enrollments(&self, student_id: &str) -> Result<Vec<EnrollmentRecord>, CalcError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.code, c.name, c.credits, c.semester, e.status,
                    e.override_grade, e.calculated_grade
             FROM enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE e.student_id = ?",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<String>>(5)?,
                    r.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (code, name, credits, semester, status, override_grade, calculated_grade) in rows {
            let Some(status) = EnrollmentStatus::parse(&status) else {
                tracing::warn!(
                    course_code = %code,
                    status = %status,
                    "ignoring enrollment with unknown status"
                );
                continue;
            };
            out.push(EnrollmentRecord {
                course_code: code,
                course_name: name,
                credits,
                grade: override_grade.or(calculated_grade),
                semester,
                status,
            });
        }
        Ok(out)
    }
}

fn parse_stored_letter(raw: Option<String>) -> Option<LetterGrade> {
    let raw = raw?;
    match raw.parse::<LetterGrade>() {
        Ok(g) => Some(g),
        Err(e) => {
            tracing::warn!("ignoring stored grade: {e}");
            None
        }
    }
}

/// `None` when the student is not enrolled in the course.
pub fn enrollment_grade_get(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
) -> Result<Option<EnrollmentGrade>, CalcError> {
    let row: Option<(Option<f64>, Option<String>, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT calculated_percentage, calculated_grade, override_grade, override_at
             FROM enrollments WHERE course_id = ? AND student_id = ?",
            (course_id, student_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    Ok(row.map(|(pct, calc, ovr, at)| EnrollmentGrade {
        calculated_percentage: pct,
        calculated_grade: parse_stored_letter(calc),
        override_grade: parse_stored_letter(ovr),
        override_at: at,
    }))
}

pub fn enrollment_grade_put(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
    grade: &EnrollmentGrade,
) -> Result<(), CalcError> {
    conn.execute(
        "UPDATE enrollments SET
           calculated_percentage = ?,
           calculated_grade = ?,
           override_grade = ?,
           override_at = ?
         WHERE course_id = ? AND student_id = ?",
        (
            grade.calculated_percentage,
            grade.calculated_grade.map(|g| g.as_str()),
            grade.override_grade.map(|g| g.as_str()),
            grade.override_at.as_deref(),
            course_id,
            student_id,
        ),
    )
    .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;
    Ok(())
}

/// Recomputes the calculated grade for one enrollment, leaving any override alone.
pub fn refresh_enrollment_grade(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
) -> Result<Option<EnrollmentGrade>, CalcError> {
    let Some(existing) = enrollment_grade_get(conn, course_id, student_id)? else {
        return Ok(None);
    };
    let outcome = compute_final_grade(&DbGradeSource { conn }, course_id, student_id)?;
    let updated = existing.recalculated(outcome.percentage());
    if updated.calculated_percentage != existing.calculated_percentage
        || updated.calculated_grade != existing.calculated_grade
    {
        calculated_grade_put(conn, course_id, student_id, &updated)?;
    }
    Ok(Some(updated))
}

/// Writes only the calculated pair. Override columns belong to instructor actions,
/// including stored values this build cannot parse.
fn calculated_grade_put(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
    grade: &EnrollmentGrade,
) -> Result<(), CalcError> {
    conn.execute(
        "UPDATE enrollments SET calculated_percentage = ?, calculated_grade = ?
         WHERE course_id = ? AND student_id = ?",
        (
            grade.calculated_percentage,
            grade.calculated_grade.map(|g| g.as_str()),
            course_id,
            student_id,
        ),
    )
    .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;
    Ok(())
}

/// Persists the weights and recomputes the course in one transaction.
pub fn save_grade_weights_and_refresh(
    conn: &Connection,
    weights: &CourseGradeWeights,
) -> Result<usize, CalcError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| CalcError::new("db_tx_failed", e.to_string()))?;
    save_grade_weights(&tx, weights)?;
    let recalculated = refresh_course_grades(&tx, &weights.course_id)?;
    tx.commit()
        .map_err(|e| CalcError::new("db_commit_failed", e.to_string()))?;
    Ok(recalculated)
}

/// Deletes the item (scores and attempts cascade) and recomputes its course in one
/// transaction.
pub fn delete_item_and_refresh(
    conn: &Connection,
    item_id: &str,
    course_id: &str,
) -> Result<usize, CalcError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| CalcError::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM gradable_items WHERE id = ?", [item_id])
        .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;
    let recalculated = refresh_course_grades(&tx, course_id)?;
    tx.commit()
        .map_err(|e| CalcError::new("db_commit_failed", e.to_string()))?;
    Ok(recalculated)
}

pub fn enrolled_student_ids(conn: &Connection, course_id: &str) -> Result<Vec<String>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT e.student_id FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.course_id = ?
         ORDER BY s.last_name, s.first_name, s.id",
    )?;
    let ids = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn refresh_course_grades(conn: &Connection, course_id: &str) -> Result<usize, CalcError> {
    let student_ids = enrolled_student_ids(conn, course_id)?;
    for sid in &student_ids {
        refresh_enrollment_grade(conn, course_id, sid)?;
    }
    tracing::info!(course_id, enrollments = student_ids.len(), "recalculated course grades");
    Ok(student_ids.len())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRef {
    pub course_id: String,
    pub category: ScoreCategory,
    pub total_points: f64,
}

pub fn item_ref(conn: &Connection, item_id: &str) -> Result<Option<ItemRef>, CalcError> {
    let row: Option<(String, String, f64)> = conn
        .query_row(
            "SELECT course_id, category, total_points FROM gradable_items WHERE id = ?",
            [item_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((course_id, category, total_points)) = row else {
        return Ok(None);
    };
    let category = ScoreCategory::parse(&category).ok_or_else(|| {
        CalcError::new("db_query_failed", format!("unknown item category: {category}"))
    })?;
    Ok(Some(ItemRef {
        course_id,
        category,
        total_points,
    }))
}
