mod test_support;

use serde_json::{json, Value};
use test_support::{f64_field, seeded_course};

#[test]
fn final_grade_moves_from_not_configured_to_graded() {
    let mut s = seeded_course("gradebook-final-renorm");
    let course_id = s.course_id.clone();

    let fresh = s.final_grade("1");
    assert_eq!(fresh["reason"].as_str(), Some("not_configured"));
    assert_eq!(fresh.get("percentage"), Some(&Value::Null));
    assert_eq!(fresh.get("letter"), Some(&Value::Null));

    let _ = s.ok(
        "2",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 30, "quizzes": 20, "exams": 50 }),
    );
    let a1 = s.add_item("3", "assignment", "Homework 1", 20.0);
    let e1 = s.add_item("4", "exam", "Midterm", 100.0);

    let nothing = s.final_grade("5");
    assert_eq!(nothing["reason"].as_str(), Some("no_data"));
    assert_eq!(nothing.get("percentage"), Some(&Value::Null));

    // Only assignments have data: they stand in for the whole grade.
    let _ = s.score("6", &a1, json!(17));
    let one = s.final_grade("7");
    assert_eq!(one["reason"].as_str(), Some("graded"));
    assert_eq!(f64_field(&one, "percentage"), 85.0);
    assert_eq!(one["letter"].as_str(), Some("B+"));
    let quiz = &one["categories"][1];
    assert_eq!(quiz["category"].as_str(), Some("quiz"));
    assert_eq!(quiz.get("percentage"), Some(&Value::Null));

    let _ = s.score("8", &e1, json!(72));
    let both = s.final_grade("9");
    // (85 * 30 + 72 * 50) / 80
    assert_eq!(f64_field(&both, "percentage"), 76.875);
    assert_eq!(f64_field(&both, "displayPercentage"), 76.9);
    assert_eq!(both["letter"].as_str(), Some("B-"));

    // An ungraded item changes nothing.
    let a2 = s.add_item("10", "assignment", "Homework 2", 50.0);
    let _ = s.score("11", &a2, Value::Null);
    let same = s.final_grade("12");
    assert_eq!(f64_field(&same, "percentage"), 76.875);

    let status = s.ok(
        "13",
        "grades.status",
        json!({ "courseId": course_id, "studentId": s.student_id.clone() }),
    );
    assert_eq!(status["state"].as_str(), Some("calculated"));
    assert_eq!(status["calculatedGrade"].as_str(), Some("B-"));
    assert_eq!(status["currentGrade"].as_str(), Some("B-"));
    assert_eq!(status["isOverridden"].as_bool(), Some(false));
}

#[test]
fn zero_points_is_a_real_zero() {
    let mut s = seeded_course("gradebook-final-zero");
    let course_id = s.course_id.clone();
    let _ = s.ok(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 50, "quizzes": 0, "exams": 50 }),
    );
    let a1 = s.add_item("2", "assignment", "Homework 1", 10.0);
    let _ = s.score("3", &a1, json!(0));
    let g = s.final_grade("4");
    assert_eq!(g["reason"].as_str(), Some("graded"));
    assert_eq!(f64_field(&g, "percentage"), 0.0);
    assert_eq!(g["letter"].as_str(), Some("F"));
}

#[test]
fn display_rounding_follows_grading_settings() {
    let mut s = seeded_course("gradebook-final-display");
    let course_id = s.course_id.clone();
    let _ = s.ok(
        "1",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 100, "quizzes": 0, "exams": 0 }),
    );
    let a1 = s.add_item("2", "assignment", "Essay", 8.0);
    let _ = s.score("3", &a1, json!(7));

    let g = s.final_grade("4");
    assert_eq!(f64_field(&g, "percentage"), 87.5);
    assert_eq!(f64_field(&g, "displayPercentage"), 87.5);

    let _ = s.ok(
        "5",
        "setup.update",
        json!({ "section": "grading", "patch": { "displayDecimals": 0 } }),
    );
    let g = s.final_grade("6");
    assert_eq!(f64_field(&g, "displayPercentage"), 88.0);
    // Rounding is presentation only.
    assert_eq!(f64_field(&g, "percentage"), 87.5);
    assert_eq!(g["letter"].as_str(), Some("B+"));

    let (code, _) = s.err(
        "7",
        "setup.update",
        json!({ "section": "grading", "patch": { "displayDecimals": 7 } }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn letter_mapping_boundaries_over_ipc() {
    let mut s = seeded_course("gradebook-final-letters");
    let cases = [
        (97.0, "A+"),
        (96.99, "A"),
        (93.0, "A"),
        (92.9, "A-"),
        (84.0, "B+"),
        (60.0, "D"),
        (59.99, "F"),
        (0.0, "F"),
    ];
    for (i, (pct, expected)) in cases.iter().enumerate() {
        let got = s.ok(&format!("l{}", i), "grades.letter", json!({ "percentage": pct }));
        assert_eq!(got["letter"].as_str(), Some(*expected), "{}", pct);
    }
}

#[test]
fn course_summary_reports_class_averages() {
    let mut s = seeded_course("gradebook-final-summary");
    let course_id = s.course_id.clone();
    let other = s.ok(
        "1",
        "students.create",
        json!({ "lastName": "Babbage", "firstName": "Charles" }),
    );
    let other_id = other["studentId"].as_str().expect("studentId").to_string();
    let _ = s.ok(
        "2",
        "enrollments.create",
        json!({ "courseId": course_id, "studentId": other_id }),
    );
    let _ = s.ok(
        "3",
        "weights.save",
        json!({ "courseId": course_id, "assignments": 50, "quizzes": 0, "exams": 50 }),
    );
    let a1 = s.add_item("4", "assignment", "Homework 1", 10.0);
    let _ = s.score("5", &a1, json!(10));
    let _ = s.ok(
        "6",
        "scores.record",
        json!({ "itemId": a1, "studentId": other_id, "pointsEarned": 5 }),
    );

    let summary = s.ok("7", "grades.courseSummary", json!({ "courseId": course_id }));
    let students = summary["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);
    // Ordered by last name.
    assert_eq!(students[0]["studentId"].as_str(), Some(other_id.as_str()));
    assert_eq!(students[0]["currentGrade"].as_str(), Some("F"));
    assert_eq!(students[1]["currentGrade"].as_str(), Some("A+"));

    let averages = summary["classAverages"].as_array().expect("classAverages");
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0]["category"].as_str(), Some("assignment"));
    assert_eq!(f64_field(&averages[0], "classAvg"), 75.0);
    assert_eq!(averages[0]["studentCount"].as_i64(), Some(2));
    assert_eq!(f64_field(&summary, "courseAverage"), 75.0);
}
