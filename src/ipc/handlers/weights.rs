use crate::calc::GradeSource;
use crate::db::{self, DbGradeSource};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::require_course;
use crate::ipc::helpers::{required_f64, required_id};
use crate::ipc::types::{AppState, Request};
use crate::weights::CourseGradeWeights;
use serde_json::{json, Value};

fn handle_weights_get(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    require_course(conn, &course_id)?;

    let weights = DbGradeSource { conn }.grade_weights(&course_id)?;
    Ok(json!({ "weights": weights.map(|w| w.to_json()) }))
}

fn handle_weights_save(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let assignments = required_f64(params, "assignments")?;
    let quizzes = required_f64(params, "quizzes")?;
    let exams = required_f64(params, "exams")?;
    require_course(conn, &course_id)?;

    let weights = CourseGradeWeights::from_percentages(&course_id, assignments, quizzes, exams)?;
    let recalculated = db::save_grade_weights_and_refresh(conn, &weights)?;
    tracing::info!(
        course_id = %course_id,
        assignments = weights.assignments(),
        quizzes = weights.quizzes(),
        exams = weights.exams(),
        recalculated,
        "grade weights saved"
    );
    Ok(json!({ "weights": weights.to_json(), "recalculated": recalculated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "weights.get" => handle_weights_get(state, &req.params),
        "weights.save" => handle_weights_save(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
