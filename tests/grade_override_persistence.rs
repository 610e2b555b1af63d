mod test_support;

use serde_json::json;
use test_support::{request_ok, seeded_course, spawn_sidecar};

#[test]
fn override_survives_rescoring_and_restart() {
    let mut s = seeded_course("gradebook-override");
    let course_id = s.course_id.clone();
    let student_id = s.student_id.clone();
    let pair = json!({ "courseId": course_id, "studentId": student_id });

    let ungraded = s.ok("1", "grades.status", pair.clone());
    assert_eq!(ungraded["state"].as_str(), Some("ungraded"));

    let _ = s.ok(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 100, "quizzes": 0, "exams": 0 }),
    );
    let a1 = s.add_item("3", "assignment", "Project", 10.0);
    let scored = s.score("4", &a1, json!(9));
    assert_eq!(scored["grade"]["calculatedGrade"].as_str(), Some("A-"));

    let (code, _) = s.err(
        "5",
        "grades.override.set",
        json!({ "courseId": course_id, "studentId": student_id, "grade": "E" }),
    );
    assert_eq!(code, "bad_params");

    let overridden = s.ok(
        "6",
        "grades.override.set",
        json!({ "courseId": course_id, "studentId": student_id, "grade": "a" }),
    );
    assert_eq!(overridden["currentGrade"].as_str(), Some("A"));
    assert_eq!(overridden["calculatedGrade"].as_str(), Some("A-"));
    assert_eq!(overridden["isOverridden"].as_bool(), Some(true));
    assert_eq!(overridden["state"].as_str(), Some("overridden"));
    assert!(overridden["overrideAt"].as_str().is_some());

    // Rescoring and reweighting recompute the calculated grade only.
    let rescored = s.score("7", &a1, json!(5));
    assert_eq!(rescored["grade"]["calculatedGrade"].as_str(), Some("F"));
    assert_eq!(rescored["grade"]["currentGrade"].as_str(), Some("A"));
    let _ = s.ok(
        "8",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 100, "quizzes": 0, "exams": 0 }),
    );
    let _ = s.ok("9", "grades.recalculate", json!({ "courseId": course_id }));

    let _ = s.child.kill();
    let _ = s.child.wait();

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "workspace.select",
        json!({ "path": s.workspace.to_string_lossy() }),
    );
    let reopened = request_ok(&mut stdin, &mut reader, "11", "grades.status", pair.clone());
    assert_eq!(reopened["state"].as_str(), Some("overridden"));
    assert_eq!(reopened["currentGrade"].as_str(), Some("A"));
    assert_eq!(reopened["calculatedGrade"].as_str(), Some("F"));
    assert_eq!(reopened["calculatedPercentage"].as_f64(), Some(50.0));

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "grades.override.clear",
        pair.clone(),
    );
    assert_eq!(cleared["currentGrade"].as_str(), Some("F"));
    assert_eq!(cleared["state"].as_str(), Some("calculated"));
    assert_eq!(cleared["isOverridden"].as_bool(), Some(false));
    assert!(cleared["overrideAt"].is_null());
}

#[test]
fn override_feeds_the_transcript() {
    let mut s = seeded_course("gradebook-override-transcript");
    let course_id = s.course_id.clone();
    let student_id = s.student_id.clone();
    let _ = s.ok(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 100, "quizzes": 0, "exams": 0 }),
    );
    let a1 = s.add_item("2", "assignment", "Final project", 100.0);
    let _ = s.score("3", &a1, json!(72));
    let _ = s.ok(
        "4",
        "enrollments.setStatus",
        json!({ "courseId": course_id, "studentId": student_id, "status": "completed" }),
    );

    let before = s.ok("5", "transcript.get", json!({ "studentId": student_id }));
    assert_eq!(before["entries"][0]["grade"].as_str(), Some("C"));
    assert_eq!(before["gpa"].as_f64(), Some(2.0));

    let _ = s.ok(
        "6",
        "grades.override.set",
        json!({ "courseId": course_id, "studentId": student_id, "grade": "B" }),
    );
    let after = s.ok("7", "transcript.get", json!({ "studentId": student_id }));
    assert_eq!(after["entries"][0]["grade"].as_str(), Some("B"));
    assert_eq!(after["gpa"].as_f64(), Some(3.0));
    assert_eq!(after["totalCredits"].as_i64(), Some(3));

    let (code, _) = s.err(
        "8",
        "grades.override.set",
        json!({
            "courseId": course_id,
            "studentId": "0b8f3a2e-5d1c-4f7a-9e6b-2c4d8a1f3e5b",
            "grade": "B"
        }),
    );
    assert_eq!(code, "not_found");
}
