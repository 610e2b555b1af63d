#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error code of a request that is expected to fail.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> (String, Value) {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or_else(|| json!({}));
    let code = error
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    (code, error)
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

pub fn f64_field(v: &Value, key: &str) -> f64 {
    v.get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
}

/// A selected workspace holding one course and one enrolled student.
pub struct Seeded {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    pub workspace: PathBuf,
    pub course_id: String,
    pub student_id: String,
}

impl Seeded {
    pub fn ok(&mut self, id: &str, method: &str, params: Value) -> Value {
        request_ok(&mut self.stdin, &mut self.reader, id, method, params)
    }

    pub fn err(&mut self, id: &str, method: &str, params: Value) -> (String, Value) {
        request_err(&mut self.stdin, &mut self.reader, id, method, params)
    }

    pub fn add_item(&mut self, id: &str, category: &str, title: &str, total_points: f64) -> String {
        let created = self.ok(
            id,
            "items.create",
            json!({
                "courseId": self.course_id,
                "category": category,
                "title": title,
                "totalPoints": total_points,
            }),
        );
        str_field(&created, "itemId")
    }

    pub fn score(&mut self, id: &str, item_id: &str, points: Value) -> Value {
        let student_id = self.student_id.clone();
        self.ok(
            id,
            "scores.record",
            json!({ "itemId": item_id, "studentId": student_id, "pointsEarned": points }),
        )
    }

    pub fn attempt(&mut self, id: &str, item_id: &str, score: f64, status: &str) -> Value {
        let student_id = self.student_id.clone();
        self.ok(
            id,
            "attempts.record",
            json!({ "itemId": item_id, "studentId": student_id, "score": score, "status": status }),
        )
    }

    pub fn final_grade(&mut self, id: &str) -> Value {
        let params = json!({ "courseId": self.course_id, "studentId": self.student_id });
        self.ok(id, "grades.final", params)
    }
}

pub fn seeded_course(prefix: &str) -> Seeded {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "seed-2",
        "courses.create",
        json!({ "code": "CS101", "name": "Intro to Computing", "credits": 3, "semester": "2025-FA" }),
    );
    let course_id = str_field(&course, "courseId");
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "seed-3",
        "students.create",
        json!({ "lastName": "Lovelace", "firstName": "Ada" }),
    );
    let student_id = str_field(&student, "studentId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "seed-4",
        "enrollments.create",
        json!({ "courseId": course_id, "studentId": student_id }),
    );
    Seeded {
        child,
        stdin,
        reader,
        workspace,
        course_id,
        student_id,
    }
}
