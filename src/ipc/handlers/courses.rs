use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{new_id, optional_str, required_i64_min, required_id, required_str};
use crate::ipc::types::{AppState, Request};
use crate::overrides::StudentFinalGrade;
use crate::transcript::EnrollmentStatus;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};

pub fn course_exists(conn: &Connection, course_id: &str) -> Result<bool, HandlerErr> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(found.is_some())
}

pub fn require_course(conn: &Connection, course_id: &str) -> Result<(), HandlerErr> {
    if !course_exists(conn, course_id)? {
        return Err(HandlerErr::not_found(
            "course not found",
            json!({ "courseId": course_id }),
        ));
    }
    Ok(())
}

pub fn require_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if found.is_none() {
        return Err(HandlerErr::not_found(
            "student not found",
            json!({ "studentId": student_id }),
        ));
    }
    Ok(())
}

pub fn require_enrollment(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
) -> Result<(), HandlerErr> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND student_id = ?",
            (course_id, student_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if found.is_none() {
        return Err(HandlerErr::not_found(
            "student is not enrolled in course",
            json!({ "courseId": course_id, "studentId": student_id }),
        ));
    }
    Ok(())
}

fn handle_courses_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let code = required_str(params, "code")?;
    let name = required_str(params, "name")?;
    let credits = required_i64_min(params, "credits", 0)?;
    let semester = required_str(params, "semester")?;

    let course_id = new_id();
    conn.execute(
        "INSERT INTO courses(id, code, name, credits, semester) VALUES(?, ?, ?, ?, ?)",
        (&course_id, &code, &name, credits, &semester),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    tracing::info!(course_id = %course_id, code = %code, "course created");
    Ok(json!({ "courseId": course_id }))
}

fn handle_courses_list(state: &AppState) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let mut stmt = conn
        .prepare(
            "SELECT id, code, name, credits, semester FROM courses
             ORDER BY semester DESC, code",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let courses = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "code": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "credits": r.get::<_, i64>(3)?,
                "semester": r.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "courses": courses }))
}

fn handle_students_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let last_name = required_str(params, "lastName")?;
    let first_name = required_str(params, "firstName")?;
    let student_no = optional_str(params, "studentNo")?.filter(|s| !s.is_empty());

    let student_id = new_id();
    conn.execute(
        "INSERT INTO students(id, last_name, first_name, student_no) VALUES(?, ?, ?, ?)",
        (&student_id, &last_name, &first_name, &student_no),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "studentId": student_id }))
}

fn handle_students_list(state: &AppState) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let mut stmt = conn
        .prepare(
            "SELECT id, last_name, first_name, student_no FROM students
             ORDER BY last_name, first_name, id",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let students = stmt
        .query_map([], |r| {
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "displayName": format!("{}, {}", last, first),
                "studentNo": r.get::<_, Option<String>>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "students": students }))
}

fn handle_enrollments_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;
    require_course(conn, &course_id)?;
    require_student(conn, &student_id)?;

    let enrollment_id = new_id();
    let inserted = conn
        .execute(
            "INSERT INTO enrollments(id, course_id, student_id, status)
             VALUES(?, ?, ?, 'in_progress')
             ON CONFLICT(course_id, student_id) DO NOTHING",
            (&enrollment_id, &course_id, &student_id),
        )
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    if inserted == 0 {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "student is already enrolled in course".to_string(),
            details: Some(json!({ "courseId": course_id, "studentId": student_id })),
        });
    }

    // Scores may already exist from an earlier enrollment of the same pair.
    let grade = db::refresh_enrollment_grade(conn, &course_id, &student_id)?;
    let status = grade
        .map(|g| StudentFinalGrade::from_enrollment(&course_id, &student_id, &g))
        .map(|s| json!(s))
        .unwrap_or(Value::Null);
    Ok(json!({ "enrollmentId": enrollment_id, "grade": status }))
}

fn handle_enrollments_list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    require_course(conn, &course_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.student_id, s.last_name, s.first_name, e.status
             FROM enrollments e
             JOIN students s ON s.id = e.student_id
             WHERE e.course_id = ?
             ORDER BY s.last_name, s.first_name, s.id",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let rows = stmt
        .query_map([&course_id], |r| {
            let last: String = r.get(2)?;
            let first: String = r.get(3)?;
            Ok(json!({
                "enrollmentId": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "displayName": format!("{}, {}", last, first),
                "status": r.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "enrollments": rows }))
}

fn handle_enrollments_set_status(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let course_id = required_id(params, "courseId")?;
    let student_id = required_id(params, "studentId")?;
    let raw = required_str(params, "status")?;
    let Some(status) = EnrollmentStatus::parse(&raw) else {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "status must be one of: in_progress, completed, failed, dropped".to_string(),
            details: Some(json!({ "status": raw })),
        });
    };
    require_enrollment(conn, &course_id, &student_id)?;

    conn.execute(
        "UPDATE enrollments SET status = ? WHERE course_id = ? AND student_id = ?",
        (status.as_str(), &course_id, &student_id),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "status": status.as_str() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "courses.create" => handle_courses_create(state, &req.params),
        "courses.list" => handle_courses_list(state),
        "students.create" => handle_students_create(state, &req.params),
        "students.list" => handle_students_list(state),
        "enrollments.create" => handle_enrollments_create(state, &req.params),
        "enrollments.list" => handle_enrollments_list(state, &req.params),
        "enrollments.setStatus" => handle_enrollments_set_status(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
