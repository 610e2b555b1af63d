use crate::db::DbGradeSource;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::require_student;
use crate::ipc::handlers::setup::grading_settings;
use crate::ipc::helpers::{optional_str, required_id};
use crate::ipc::types::{AppState, Request};
use crate::letter::GpaScale;
use crate::transcript::{build_transcript, compute_gpa, eligible_entries, EnrollmentRecord};
use serde_json::{json, Value};

/// Explicit `gpaScale` param, else the workspace setting, else the default scale.
fn resolve_scale(state: &AppState, params: &Value) -> Result<GpaScale, HandlerErr> {
    if let Some(raw) = optional_str(params, "gpaScale")? {
        return GpaScale::parse(&raw).ok_or_else(|| HandlerErr {
            code: "bad_params".to_string(),
            message: "gpaScale must be one of: standard, plus".to_string(),
            details: Some(json!({ "gpaScale": raw })),
        });
    }
    match state.db.as_ref() {
        Some(conn) => Ok(grading_settings(conn)?.gpa_scale),
        None => Ok(GpaScale::default()),
    }
}

fn handle_transcript_get(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let student_id = required_id(params, "studentId")?;
    require_student(conn, &student_id)?;
    let scale = resolve_scale(state, params)?;

    let transcript = build_transcript(&DbGradeSource { conn }, &student_id, scale)?;
    let mut result = json!(transcript);
    result["studentId"] = json!(student_id);
    result["gpaScale"] = json!(scale.as_str());
    Ok(result)
}

fn handle_transcript_gpa(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("entries") else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let records: Vec<EnrollmentRecord> =
        serde_json::from_value(raw.clone()).map_err(|e| HandlerErr {
            code: "bad_params".to_string(),
            message: format!("invalid entries: {e}"),
            details: None,
        })?;
    if let Some(r) = records.iter().find(|r| r.credits < 0) {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "credits must be >= 0".to_string(),
            details: Some(json!({ "courseCode": r.course_code, "credits": r.credits })),
        });
    }
    let scale = resolve_scale(state, params)?;

    let (entries, skipped) = eligible_entries(&records);
    let summary = compute_gpa(&entries, scale);
    Ok(json!({
        "gpa": summary.gpa,
        "totalCredits": summary.total_credits,
        "counted": entries.len(),
        "skipped": skipped,
        "gpaScale": scale.as_str(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "transcript.get" => handle_transcript_get(state, &req.params),
        "transcript.gpa" => handle_transcript_gpa(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
