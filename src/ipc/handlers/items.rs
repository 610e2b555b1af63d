use crate::calc::{AttemptStatus, ScoreCategory, ScoreStatus};
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::{require_course, require_enrollment};
use crate::ipc::helpers::{new_id, nullable_f64, required_f64, required_id, required_str};
use crate::ipc::types::{AppState, Request};
use crate::overrides::StudentFinalGrade;
use rusqlite::Connection;
use serde_json::{json, Value};

fn parse_category(raw: &str) -> Result<ScoreCategory, HandlerErr> {
    ScoreCategory::parse(raw).ok_or_else(|| HandlerErr {
        code: "bad_params".to_string(),
        message: "category must be one of: assignment, quiz, exam".to_string(),
        details: Some(json!({ "category": raw })),
    })
}

fn require_item(conn: &Connection, item_id: &str) -> Result<db::ItemRef, HandlerErr> {
    db::item_ref(conn, item_id)?
        .ok_or_else(|| HandlerErr::not_found("item not found", json!({ "itemId": item_id })))
}

fn check_points(value: f64, total_points: f64) -> Result<(), HandlerErr> {
    if value < 0.0 {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "negative scores are not allowed".to_string(),
            details: Some(json!({ "value": value })),
        });
    }
    if value > total_points {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "score must not exceed the item's total points".to_string(),
            details: Some(json!({ "value": value, "totalPoints": total_points })),
        });
    }
    Ok(())
}

/// Recompute after a score write and hand back the enrollment's grade view.
fn refreshed_grade(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
) -> Result<Value, HandlerErr> {
    let grade = db::refresh_enrollment_grade(conn, course_id, student_id)?;
    Ok(grade
        .map(|g| json!(StudentFinalGrade::from_enrollment(course_id, student_id, &g)))
        .unwrap_or(Value::Null))
}

fn handle_items_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let category = parse_category(&required_str(params, "category")?)?;
    let title = required_str(params, "title")?;
    let total_points = required_f64(params, "totalPoints")?;
    if total_points <= 0.0 {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "totalPoints must be > 0".to_string(),
            details: Some(json!({ "totalPoints": total_points })),
        });
    }
    require_course(conn, &course_id)?;

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM gradable_items WHERE course_id = ?",
            [&course_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let item_id = new_id();
    conn.execute(
        "INSERT INTO gradable_items(id, course_id, category, title, total_points, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &item_id,
            &course_id,
            category.as_str(),
            &title,
            total_points,
            next_sort,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "itemId": item_id, "sortOrder": next_sort }))
}

fn handle_items_list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let category = match params.get("category").and_then(|v| v.as_str()) {
        Some(raw) => Some(parse_category(raw)?),
        None => None,
    };
    require_course(conn, &course_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, category, title, total_points, sort_order FROM gradable_items
             WHERE course_id = ?1 AND (?2 IS NULL OR category = ?2)
             ORDER BY sort_order",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let items = stmt
        .query_map((&course_id, category.map(|c| c.as_str())), |r| {
            Ok(json!({
                "itemId": r.get::<_, String>(0)?,
                "category": r.get::<_, String>(1)?,
                "title": r.get::<_, String>(2)?,
                "totalPoints": r.get::<_, f64>(3)?,
                "sortOrder": r.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "items": items }))
}

fn handle_items_delete(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let item_id = required_id(params, "itemId")?;
    let item = require_item(conn, &item_id)?;

    let recalculated = db::delete_item_and_refresh(conn, &item_id, &item.course_id)?;
    Ok(json!({ "ok": true, "recalculated": recalculated }))
}

fn handle_scores_record(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let item_id = required_id(params, "itemId")?;
    let student_id = required_id(params, "studentId")?;
    let points_earned = nullable_f64(params, "pointsEarned")?;
    let status = match params.get("status").and_then(|v| v.as_str()) {
        Some(raw) => ScoreStatus::parse(raw).ok_or_else(|| HandlerErr {
            code: "bad_params".to_string(),
            message: "status must be one of: submitted, graded".to_string(),
            details: Some(json!({ "status": raw })),
        })?,
        None if points_earned.is_some() => ScoreStatus::Graded,
        None => ScoreStatus::Submitted,
    };

    let item = require_item(conn, &item_id)?;
    if item.category == ScoreCategory::Quiz {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "quiz scores are recorded as attempts".to_string(),
            details: Some(json!({ "itemId": item_id })),
        });
    }
    if let Some(v) = points_earned {
        check_points(v, item.total_points)?;
    }
    require_enrollment(conn, &item.course_id, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "INSERT INTO item_scores(id, item_id, student_id, points_earned, status, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(item_id, student_id) DO UPDATE SET
           points_earned = excluded.points_earned,
           status = excluded.status,
           updated_at = excluded.updated_at",
        (
            new_id(),
            &item_id,
            &student_id,
            points_earned,
            status.as_str(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed".to_string(),
        message: e.to_string(),
        details: Some(json!({ "table": "item_scores" })),
    })?;

    let grade = refreshed_grade(&tx, &item.course_id, &student_id)?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "grade": grade }))
}

fn handle_attempts_record(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let item_id = required_id(params, "itemId")?;
    let student_id = required_id(params, "studentId")?;
    let score = nullable_f64(params, "score")?;
    let raw_status = required_str(params, "status")?;
    let Some(status) = AttemptStatus::parse(&raw_status) else {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "status must be one of: in_progress, completed, timed_out".to_string(),
            details: Some(json!({ "status": raw_status })),
        });
    };

    let item = require_item(conn, &item_id)?;
    if item.category != ScoreCategory::Quiz {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "attempts can only be recorded for quizzes".to_string(),
            details: Some(json!({ "itemId": item_id, "category": item.category.as_str() })),
        });
    }
    if let Some(v) = score {
        check_points(v, item.total_points)?;
    }
    require_enrollment(conn, &item.course_id, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let attempt_no: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(attempt_no), 0) + 1 FROM quiz_attempts
             WHERE item_id = ? AND student_id = ?",
            (&item_id, &student_id),
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    tx.execute(
        "INSERT INTO quiz_attempts(id, item_id, student_id, attempt_no, score, status)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            new_id(),
            &item_id,
            &student_id,
            attempt_no,
            score,
            status.as_str(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed".to_string(),
        message: e.to_string(),
        details: Some(json!({ "table": "quiz_attempts" })),
    })?;

    let grade = refreshed_grade(&tx, &item.course_id, &student_id)?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "attemptNo": attempt_no, "grade": grade }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "items.create" => handle_items_create(state, &req.params),
        "items.list" => handle_items_list(state, &req.params),
        "items.delete" => handle_items_delete(state, &req.params),
        "scores.record" => handle_scores_record(state, &req.params),
        "attempts.record" => handle_attempts_record(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
