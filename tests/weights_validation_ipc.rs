mod test_support;

use serde_json::{json, Value};
use test_support::{f64_field, seeded_course};

#[test]
fn weights_must_sum_to_exactly_100() {
    let mut s = seeded_course("gradebook-weights-sum");
    let course_id = s.course_id.clone();

    let empty = s.ok("1", "weights.get", json!({ "courseId": course_id }));
    assert_eq!(empty.get("weights"), Some(&Value::Null));

    let (code, error) = s.err(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 33.33, "quizzes": 33.33, "exams": 33.33 }),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["sum"].as_f64(), Some(99.99));

    let (code, _) = s.err(
        "3",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 60, "quizzes": 30, "exams": 20 }),
    );
    assert_eq!(code, "validation_failed");

    let saved = s.ok(
        "4",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 33.3, "quizzes": 33.3, "exams": 33.4 }),
    );
    assert_eq!(saved["recalculated"].as_i64(), Some(1));

    let got = s.ok("5", "weights.get", json!({ "courseId": course_id }));
    let w = &got["weights"];
    assert_eq!(f64_field(w, "assignments"), 33.3);
    assert_eq!(f64_field(w, "quizzes"), 33.3);
    assert_eq!(f64_field(w, "exams"), 33.4);
}

#[test]
fn negative_and_overly_precise_weights_are_rejected() {
    let mut s = seeded_course("gradebook-weights-reject");
    let course_id = s.course_id.clone();

    let (code, error) = s.err(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": -10, "quizzes": 60, "exams": 50 }),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["field"].as_str(), Some("assignments"));

    let (code, error) = s.err(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 33.333, "quizzes": 33.333, "exams": 33.334 }),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["field"].as_str(), Some("assignments"));

    let (code, _) = s.err(
        "3",
        "weights.save",
        json!({ "courseId": course_id, "assignments": "fifty", "quizzes": 25, "exams": 25 }),
    );
    assert_eq!(code, "bad_params");

    // Nothing invalid was persisted.
    let got = s.ok("4", "weights.get", json!({ "courseId": course_id }));
    assert_eq!(got.get("weights"), Some(&Value::Null));
}

#[test]
fn saving_weights_replaces_previous_set() {
    let mut s = seeded_course("gradebook-weights-replace");
    let course_id = s.course_id.clone();
    let _ = s.ok(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 100, "quizzes": 0, "exams": 0 }),
    );
    let _ = s.ok(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 20, "quizzes": 30, "exams": 50 }),
    );
    let got = s.ok("3", "weights.get", json!({ "courseId": course_id }));
    assert_eq!(f64_field(&got["weights"], "assignments"), 20.0);
    assert_eq!(f64_field(&got["weights"], "exams"), 50.0);
}

#[test]
fn weights_above_100_are_rejected_before_summing() {
    let mut s = seeded_course("gradebook-weights-huge");
    let course_id = s.course_id.clone();

    let (code, error) = s.err(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 1e300, "quizzes": 1e300, "exams": 100.02 }),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["field"].as_str(), Some("assignments"));

    let (code, error) = s.err(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 0, "quizzes": 0, "exams": 100.01 }),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["field"].as_str(), Some("exams"));

    let got = s.ok("3", "weights.get", json!({ "courseId": course_id }));
    assert_eq!(got.get("weights"), Some(&Value::Null));
}
