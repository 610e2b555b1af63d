use crate::calc::{
    class_category_averages, compute_final_grade, round_off, CategoryBreakdown, FinalGradeOutcome,
};
use crate::db::{self, DbGradeSource};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::{require_course, require_enrollment, require_student};
use crate::ipc::handlers::setup::grading_settings;
use crate::ipc::helpers::{required_f64, required_id, required_str};
use crate::ipc::types::{AppState, Request};
use crate::letter::LetterGrade;
use crate::overrides::{EnrollmentGrade, StudentFinalGrade};
use rusqlite::Connection;
use serde_json::{json, Value};

fn breakdown_json(categories: &[CategoryBreakdown], decimals: u32) -> Vec<Value> {
    categories
        .iter()
        .map(|c| {
            let mut v = json!(c);
            v["displayPercentage"] = json!(c.percentage.map(|p| round_off(p, decimals)));
            v
        })
        .collect()
}

fn outcome_json(outcome: &FinalGradeOutcome, decimals: u32) -> Value {
    json!({
        "percentage": outcome.percentage(),
        "displayPercentage": outcome.percentage().map(|p| round_off(p, decimals)),
        "letter": outcome.letter(),
        "reason": outcome.reason(),
        "categories": breakdown_json(outcome.categories(), decimals),
    })
}

fn stored_grade(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
) -> Result<EnrollmentGrade, HandlerErr> {
    db::enrollment_grade_get(conn, course_id, student_id)?.ok_or_else(|| {
        HandlerErr::not_found(
            "student is not enrolled in course",
            json!({ "courseId": course_id, "studentId": student_id }),
        )
    })
}

fn handle_grades_final(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;
    require_course(conn, &course_id)?;
    require_student(conn, &student_id)?;
    let settings = grading_settings(conn)?;

    let outcome = compute_final_grade(&DbGradeSource { conn }, &course_id, &student_id)?;
    let mut result = outcome_json(&outcome, settings.display_decimals);
    result["courseId"] = json!(course_id);
    result["studentId"] = json!(student_id);
    Ok(result)
}

fn handle_grades_letter(params: &Value) -> Result<Value, HandlerErr> {
    let percentage = required_f64(params, "percentage")?;
    Ok(json!({ "letter": LetterGrade::from_percentage(percentage) }))
}

fn handle_grades_status(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;
    let g = stored_grade(conn, &course_id, &student_id)?;
    Ok(json!(StudentFinalGrade::from_enrollment(&course_id, &student_id, &g)))
}

fn handle_override_set(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;
    let raw = required_str(params, "grade")?;
    let grade = raw.parse::<LetterGrade>().map_err(|e| HandlerErr {
        code: "bad_params".to_string(),
        message: e.to_string(),
        details: Some(json!({ "grade": raw })),
    })?;
    require_enrollment(conn, &course_id, &student_id)?;

    let current = stored_grade(conn, &course_id, &student_id)?;
    let updated = current.with_override(grade, chrono::Utc::now().to_rfc3339());
    db::enrollment_grade_put(conn, &course_id, &student_id, &updated)?;
    tracing::info!(
        course_id = %course_id,
        student_id = %student_id,
        grade = grade.as_str(),
        calculated = ?updated.calculated_grade.map(|g| g.as_str()),
        "grade override set"
    );
    Ok(json!(StudentFinalGrade::from_enrollment(&course_id, &student_id, &updated)))
}

fn handle_override_clear(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;

    let current = stored_grade(conn, &course_id, &student_id)?;
    let updated = current.without_override();
    // Always written so a stored override this build cannot read is cleared too.
    db::enrollment_grade_put(conn, &course_id, &student_id, &updated)?;
    tracing::info!(course_id = %course_id, student_id = %student_id, "grade override cleared");
    Ok(json!(StudentFinalGrade::from_enrollment(&course_id, &student_id, &updated)))
}

fn handle_grades_recalculate(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    require_course(conn, &course_id)?;
    let recalculated = db::refresh_course_grades(conn, &course_id)?;
    Ok(json!({ "ok": true, "recalculated": recalculated }))
}

fn handle_course_summary(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    require_course(conn, &course_id)?;
    let settings = grading_settings(conn)?;
    let decimals = settings.display_decimals;

    let source = DbGradeSource { conn };
    let student_ids = db::enrolled_student_ids(conn, &course_id)?;
    let mut students = Vec::with_capacity(student_ids.len());
    let mut outcomes = Vec::with_capacity(student_ids.len());
    for sid in &student_ids {
        let outcome = compute_final_grade(&source, &course_id, sid)?;
        let g = stored_grade(conn, &course_id, sid)?;
        let mut row = json!(StudentFinalGrade::from_enrollment(&course_id, sid, &g));
        row["displayPercentage"] = json!(outcome.percentage().map(|p| round_off(p, decimals)));
        row["reason"] = json!(outcome.reason());
        students.push(row);
        outcomes.push(outcome);
    }

    let class_averages: Vec<Value> = class_category_averages(&outcomes)
        .into_iter()
        .map(|a| {
            json!({
                "category": a.category,
                "classAvg": round_off(a.class_avg, decimals),
                "studentCount": a.student_count,
            })
        })
        .collect();
    let graded: Vec<f64> = outcomes.iter().filter_map(|o| o.percentage()).collect();
    let course_avg = if graded.is_empty() {
        None
    } else {
        Some(round_off(graded.iter().sum::<f64>() / graded.len() as f64, decimals))
    };

    Ok(json!({
        "courseId": course_id,
        "students": students,
        "classAverages": class_averages,
        "courseAverage": course_avg,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.final" => handle_grades_final(state, &req.params),
        "grades.letter" => handle_grades_letter(&req.params),
        "grades.status" => handle_grades_status(state, &req.params),
        "grades.override.set" => handle_override_set(state, &req.params),
        "grades.override.clear" => handle_override_clear(state, &req.params),
        "grades.recalculate" => handle_grades_recalculate(state, &req.params),
        "grades.courseSummary" => handle_course_summary(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
