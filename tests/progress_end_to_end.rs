mod test_support;

use serde_json::json;
use test_support::spawn_with_workspace;

#[test]
fn percentage_average_ignores_ungraded_rows() {
    let mut sc = spawn_with_workspace("classroomd-progress-e2e");
    let teacher = sc.create_user("t@school.test", "Teacher", "teacher");
    let s1 = sc.create_user("s1@school.test", "Ada", "student");
    let s2 = sc.create_user("s2@school.test", "Bo", "student");

    sc.sign_in(&teacher);
    let class_id = sc.create_class("Physics");
    sc.enroll(&class_id, &s1);
    sc.enroll(&class_id, &s2);
    let a1 = sc.create_assignment(&class_id, "Lab 1", None, 50.0);
    let a2 = sc.create_assignment(&class_id, "Lab 2", None, 100.0);

    let res = sc.record_score(&a1, &s1, 40.0);
    assert_eq!(res["submission"]["status"].as_str(), Some("graded"));
    assert_eq!(res["progress"]["totalAssignments"], json!(2));
    assert_eq!(res["progress"]["completedAssignments"], json!(1));
    assert_eq!(res["progress"]["averageScore"].as_f64(), Some(80.0));
    assert_eq!(res["progress"]["currentGrade"].as_str(), Some("B"));

    // A submitted but ungraded row counts toward neither completion nor average.
    sc.sign_in(&s1);
    sc.request_ok("submissions.submit", json!({ "assignmentId": a2, "submissionText": "done" }));
    let row = sc.request_ok("progress.recompute", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(row["progress"]["completedAssignments"], json!(1));
    assert_eq!(row["progress"]["averageScore"].as_f64(), Some(80.0));
    assert_eq!(row["progress"]["currentGrade"].as_str(), Some("B"));

    sc.sign_in(&teacher);
    sc.record_score(&a1, &s2, 50.0);
    let res = sc.record_score(&a2, &s2, 90.0);
    assert_eq!(res["progress"]["averageScore"].as_f64(), Some(95.0));
    assert_eq!(res["progress"]["currentGrade"].as_str(), Some("A"));

    let rank = sc.request_ok("progress.ranking", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(rank["ranking"], json!({ "rank": 2, "total": 2 }));
    let rank = sc.request_ok("progress.ranking", json!({ "studentId": s2, "classId": class_id }));
    assert_eq!(rank["ranking"], json!({ "rank": 1, "total": 2 }));

    let avgs = sc.request_ok("progress.classAverages", json!({ "classId": class_id }));
    let avgs = avgs["averages"].as_array().expect("averages").clone();
    assert_eq!(avgs.len(), 2);
    assert_eq!(avgs[0]["studentId"].as_str(), Some(s1.as_str()));
    assert_eq!(avgs[0]["name"].as_str(), Some("Ada"));
    assert_eq!(avgs[0]["averageScore"].as_f64(), Some(80.0));
    assert_eq!(avgs[1]["averageScore"].as_f64(), Some(95.0));
    assert_eq!(avgs[1]["totalAssignments"], json!(2));

    // Raw points, not percentages.
    let avg = sc.request_ok("progress.assignmentAverage", json!({ "assignmentId": a1 }));
    assert_eq!(avg["average"].as_f64(), Some(45.0));

    sc.sign_in(&s1);
    assert_eq!(
        sc.request_err("progress.get", json!({ "studentId": s2, "classId": class_id })),
        "forbidden"
    );
    let own = sc.request_ok("progress.get", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(own["progress"]["currentGrade"].as_str(), Some("B"));
}

#[test]
fn empty_inputs_yield_zeroes_and_f() {
    let mut sc = spawn_with_workspace("classroomd-progress-empty");
    let teacher = sc.create_user("t@school.test", "Teacher", "teacher");
    let student = sc.create_user("s@school.test", "Cy", "student");
    sc.sign_in(&teacher);
    let empty_class = sc.create_class("Empty");
    sc.enroll(&empty_class, &student);

    let row = sc.request_ok(
        "progress.recompute",
        json!({ "studentId": student, "classId": empty_class }),
    );
    assert_eq!(row["progress"]["totalAssignments"], json!(0));
    assert_eq!(row["progress"]["completedAssignments"], json!(0));
    assert_eq!(row["progress"]["averageScore"].as_f64(), Some(0.0));
    assert_eq!(row["progress"]["currentGrade"].as_str(), Some("F"));

    sc.create_assignment(&empty_class, "Essay", Some("2026-05-01"), 20.0);
    let all = sc.request_ok("progress.recomputeClass", json!({ "classId": empty_class }));
    let rows = all["progress"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["totalAssignments"], json!(1));
    assert_eq!(rows[0]["averageScore"].as_f64(), Some(0.0));

    let none = sc.request_ok(
        "progress.ranking",
        json!({ "studentId": "not-enrolled", "classId": empty_class }),
    );
    assert!(none["ranking"].is_null());
}

#[test]
fn rounding_and_grade_boundaries_come_through_the_wire() {
    let mut sc = spawn_with_workspace("classroomd-progress-rounding");
    let teacher = sc.create_user("t@school.test", "Teacher", "teacher");
    let student = sc.create_user("s@school.test", "Di", "student");
    sc.sign_in(&teacher);
    let class_id = sc.create_class("Rounding");
    sc.enroll(&class_id, &student);
    let a = sc.create_assignment(&class_id, "Nine", None, 9.0);

    // 5/9 = 55.555.. -> 55.56, below every threshold.
    let res = sc.record_score(&a, &student, 5.0);
    assert_eq!(res["progress"]["averageScore"].as_f64(), Some(55.56));
    assert_eq!(res["progress"]["currentGrade"].as_str(), Some("F"));

    // Re-grading overwrites: 9/9 = 100.
    let res = sc.record_score(&a, &student, 9.0);
    assert_eq!(res["progress"]["averageScore"].as_f64(), Some(100.0));
    assert_eq!(res["progress"]["currentGrade"].as_str(), Some("A"));

    // Exactly 90 is an A.
    let b = sc.create_assignment(&class_id, "Ten", None, 10.0);
    let res = sc.record_score(&b, &student, 8.0);
    assert_eq!(res["progress"]["averageScore"].as_f64(), Some(90.0));
    assert_eq!(res["progress"]["currentGrade"].as_str(), Some("A"));
}

#[test]
fn ranking_counts_only_active_members_of_the_class() {
    let mut sc = spawn_with_workspace("classroomd-progress-members");
    let teacher = sc.create_user("t@school.test", "Teacher", "teacher");
    let s1 = sc.create_user("s1@school.test", "Ed", "student");
    let s2 = sc.create_user("s2@school.test", "Fay", "student");
    let outsider = sc.create_user("out@school.test", "Gil", "student");

    sc.sign_in(&teacher);
    let class_id = sc.create_class("Chemistry");
    sc.enroll(&class_id, &s1);
    sc.enroll(&class_id, &s2);
    let a = sc.create_assignment(&class_id, "Quiz", None, 10.0);
    sc.record_score(&a, &s1, 5.0);
    sc.record_score(&a, &s2, 9.0);
    let rank = sc.request_ok("progress.ranking", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(rank["ranking"], json!({ "rank": 2, "total": 2 }));

    // Nobody outside the class can plant a progress row in it.
    assert_eq!(
        sc.request_err("progress.recompute", json!({ "studentId": teacher, "classId": class_id })),
        "forbidden"
    );
    sc.sign_in(&outsider);
    assert_eq!(
        sc.request_err("progress.recompute", json!({ "studentId": outsider, "classId": class_id })),
        "forbidden"
    );

    sc.sign_in(&teacher);
    let rank = sc.request_ok("progress.ranking", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(rank["ranking"], json!({ "rank": 2, "total": 2 }));

    // A dropped student leaves both the ranking and the class averages.
    sc.request_ok(
        "enrollments.setStatus",
        json!({ "classId": class_id, "studentId": s2, "status": "dropped" }),
    );
    let rank = sc.request_ok("progress.ranking", json!({ "studentId": s1, "classId": class_id }));
    assert_eq!(rank["ranking"], json!({ "rank": 1, "total": 1 }));
    let avgs = sc.request_ok("progress.classAverages", json!({ "classId": class_id }));
    assert_eq!(avgs["averages"].as_array().map(|a| a.len()), Some(1));
}
