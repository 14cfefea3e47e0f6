
use serde_json::json;
use test_support::*;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("coach-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "health", json!({}));
    assert!(health.get("version").is_some());

    open_workspace(&mut stdin, &mut reader, &workspace);
    let admin = bootstrap_admin(&mut stdin, &mut reader);

    let teacher_id = create_user(
        &mut stdin,
        &mut reader,
        &admin,
        "teacher",
        "t@example.com",
        "Smoke Teacher",
    );
    let student_id = create_user(
        &mut stdin,
        &mut reader,
        &admin,
        "student",
        "s@example.com",
        "Smoke Student",
    );
    let parent_id = create_user(
        &mut stdin,
        &mut reader,
        &admin,
        "parent",
        "p@example.com",
        "Smoke Parent",
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.pendingUsers",
        json!({ "token": admin }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.teachers",
        json!({ "token": admin }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.students",
        json!({ "token": admin }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.parents",
        json!({ "token": admin }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.matches.create",
        json!({ "token": admin, "studentId": student_id, "teacherId": teacher_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.matches.list",
        json!({ "token": admin }),
    );
    let relation = request_ok(
        &mut stdin,
        &mut reader,
        "admin.relations.create",
        json!({ "token": admin, "parentId": parent_id, "studentId": student_id }),
    );
    let relation_id = relation
        .get("relationId")
        .and_then(|v| v.as_str())
        .expect("relationId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.relations.list",
        json!({ "token": admin }),
    );

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "admin.subjects.create",
        json!({ "token": admin, "name": "Mathematics", "examType": "TYT" }),
    );
    let subject_id = subject
        .get("subject")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("subject id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.topics.create",
        json!({ "token": admin, "subjectId": subject_id, "name": "Derivatives" }),
    );

    let teacher = login(&mut stdin, &mut reader, "t@example.com");
    let student = login(&mut stdin, &mut reader, "s@example.com");
    let parent = login(&mut stdin, &mut reader, "p@example.com");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "subjects.list",
        json!({ "token": teacher }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "topics.list",
        json!({ "token": teacher, "subjectId": subject_id }),
    );

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.students",
        json!({ "token": teacher }),
    );
    assert_eq!(
        students
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let entry = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.entries.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "examType": "TYT",
            "subject": "Mathematics",
            "totalQuestions": 40,
            "correctAnswers": 30,
            "wrongAnswers": 6,
            "emptyAnswers": 4
        }),
    );
    assert_eq!(entry.get("netScore").and_then(|v| v.as_f64()), Some(28.0));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.entries.list",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let analysis = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.analyses.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "examType": "TYT",
            "examName": "Trial 1",
            "examDate": "2026-02-01",
            "subjects": [
                { "name": "Mathematics", "correct": 30, "wrong": 6, "net": 28.0 },
                { "name": "Physics", "correct": 10, "wrong": 3, "net": 9.0 }
            ]
        }),
    );
    assert_eq!(analysis.get("totalNet").and_then(|v| v.as_f64()), Some(37.0));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.analyses.list",
        json!({ "token": teacher, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.analyses.summary",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.tracking.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "resourceName": "Workbook A",
            "subject": "Mathematics",
            "topic": "Derivatives"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.tracking.list",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let assignment = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.assignments.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "title": "Solve 50 derivative questions",
            "description": "From workbook A, chapter 3",
            "subject": "Mathematics",
            "dueDate": "2026-02-10"
        }),
    );
    let assignment_id = assignment
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignmentId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.assignments.list",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.studySchedule.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "dayOfWeek": 1,
            "startTime": "18:00",
            "endTime": "20:00",
            "subject": "Mathematics",
            "topic": "Derivatives"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.studySchedule.list",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let weekly = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.weeklySchedules.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "weekStartDate": "2026-02-02",
            "scheduleItems": [
                {
                    "day": 1,
                    "startTime": "09:00",
                    "endTime": "11:00",
                    "subject": "Mathematics",
                    "activityType": "study"
                }
            ]
        }),
    );
    assert_eq!(
        weekly.get("weekEndDate").and_then(|v| v.as_str()),
        Some("2026-02-08")
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.weeklySchedules.list",
        json!({ "token": teacher, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.suggestedSchedule",
        json!({ "token": teacher, "studentId": student_id }),
    );

    let resource = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.resources.create",
        json!({
            "token": teacher,
            "studentId": student_id,
            "resourceName": "Workbook A",
            "subject": "Mathematics",
            "topics": [
                { "name": "Derivatives", "status": "not_started" },
                { "name": "Integrals", "status": "not_started" }
            ]
        }),
    );
    let resource_id = resource
        .get("resourceId")
        .and_then(|v| v.as_str())
        .expect("resourceId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.resources.list",
        json!({ "token": teacher, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher.resources.topicStatus",
        json!({
            "token": teacher,
            "resourceId": resource_id,
            "topicName": "Derivatives",
            "status": "in_progress"
        }),
    );

    let my_teacher = request_ok(
        &mut stdin,
        &mut reader,
        "student.myTeacher",
        json!({ "token": student }),
    );
    assert_eq!(
        my_teacher
            .get("teacher")
            .and_then(|t| t.get("id"))
            .and_then(|v| v.as_str()),
        Some(teacher_id.as_str())
    );
    let _ = request_ok(&mut stdin, &mut reader, "student.myEntries", json!({ "token": student }));
    let _ = request_ok(&mut stdin, &mut reader, "student.myAnalyses", json!({ "token": student }));
    let _ = request_ok(&mut stdin, &mut reader, "student.myTracking", json!({ "token": student }));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student.myAssignments",
        json!({ "token": student }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student.assignmentComplete",
        json!({ "token": student, "assignmentId": assignment_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student.myStudySchedule",
        json!({ "token": student }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student.myWeeklySchedules",
        json!({ "token": student }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "student.myResources", json!({ "token": student }));

    let children = request_ok(
        &mut stdin,
        &mut reader,
        "parent.children",
        json!({ "token": parent }),
    );
    assert_eq!(
        children
            .get("children")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "parent.childEntries",
        json!({ "token": parent, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "parent.childAnalyses",
        json!({ "token": parent, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "parent.childResources",
        json!({ "token": parent, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "parent.childWeeklySchedules",
        json!({ "token": parent, "studentId": student_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "parent.childAssignments",
        json!({ "token": parent, "studentId": student_id }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "statistics.overview",
        json!({ "token": parent, "studentId": student_id }),
    );

    let notifications = request_ok(
        &mut stdin,
        &mut reader,
        "notifications.list",
        json!({ "token": student }),
    );
    let first_notification = notifications
        .get("notifications")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|n| n.get("id"))
        .and_then(|v| v.as_str())
        .expect("student has notifications")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "notifications.markRead",
        json!({ "token": student, "notificationId": first_notification }),
    );

    let reports = request_ok(
        &mut stdin,
        &mut reader,
        "admin.reports",
        json!({ "token": admin }),
    );
    assert_eq!(
        reports
            .get("reports")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.users.update",
        json!({ "token": admin, "userId": student_id, "patch": { "school": "Central High" } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.relations.delete",
        json!({ "token": admin, "relationId": relation_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.users.delete",
        json!({ "token": admin, "userId": parent_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
