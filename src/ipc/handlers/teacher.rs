use rusqlite::Connection;
use serde_json::json;

use crate::calc;
use crate::db;
use crate::ipc::helpers::{
    db_insert, db_query, db_update, get_exam_type, get_optional_str, get_required_i64,
    get_required_str, list_assignments, list_exam_analyses, list_question_entries,
    list_resource_tracking, list_resources_with_topics, list_study_schedules,
    list_weekly_schedules, load_resource_with_topics, new_id, push_notification, require_role,
    user_from_row, with_db, HandlerErr, USER_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, SubjectLine, TopicStatus};

fn students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM users
             WHERE id IN (SELECT student_id FROM matches WHERE teacher_id = ?)
             ORDER BY rowid",
            USER_COLUMNS
        ))
        .map_err(db_query)?;
    let students = stmt
        .query_map([&auth.user_id], user_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    let students: Vec<serde_json::Value> = students.iter().map(|u| u.public()).collect();
    Ok(json!({ "students": students }))
}

fn entries_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let exam_type = get_exam_type(params, "examType")?;
    let subject = get_required_str(params, "subject")?;
    let total_questions = get_required_i64(params, "totalQuestions")?;
    let correct = get_required_i64(params, "correctAnswers")?;
    let wrong = get_required_i64(params, "wrongAnswers")?;
    let empty = get_required_i64(params, "emptyAnswers")?;
    let notes = get_optional_str(params, "notes");

    let net_score = calc::compute_net(correct, wrong);
    let id = new_id();
    conn.execute(
        "INSERT INTO question_entries(id, student_id, teacher_id, exam_type, subject,
             total_questions, correct_answers, wrong_answers, empty_answers, net_score,
             date, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            exam_type.as_str(),
            subject,
            total_questions,
            correct,
            wrong,
            empty,
            net_score,
            db::now_iso(),
            notes,
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "entryId": id, "netScore": net_score }))
}

fn entries_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let entries = list_question_entries(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "entries": entries }))
}

fn analyses_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let exam_type = get_exam_type(params, "examType")?;
    let exam_name = get_required_str(params, "examName")?;
    let exam_date = get_required_str(params, "examDate")?;
    let notes = get_optional_str(params, "notes");
    let subjects: Vec<SubjectLine> = params
        .get("subjects")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing subjects"))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| HandlerErr::bad_params(format!("bad subjects: {}", e)))
        })?;

    // The stored total is the sum of the per-subject nets as submitted.
    let total_net: f64 = subjects.iter().map(|s| s.net).sum();
    let subjects_json =
        serde_json::to_string(&subjects).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO exam_analyses(id, student_id, teacher_id, exam_type, exam_name,
             exam_date, subjects, total_net, notes, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            exam_type.as_str(),
            exam_name,
            exam_date,
            subjects_json,
            total_net,
            notes,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "analysisId": id, "totalNet": total_net }))
}

fn analyses_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let analyses = list_exam_analyses(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "analyses": analyses }))
}

fn analyses_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let analyses = list_exam_analyses(conn, &student_id, Some(&auth.user_id))?;
    let summary = match calc::exam_analysis_summary(&analyses) {
        Some(summary) => serde_json::to_value(summary)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?,
        None => json!({}),
    };
    Ok(json!({ "analyses": analyses, "summary": summary }))
}

fn tracking_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let resource_name = get_required_str(params, "resourceName")?;
    let subject = get_required_str(params, "subject")?;
    let topic = get_required_str(params, "topic")?;
    let status = get_optional_str(params, "status").unwrap_or_else(|| "not_started".to_string());
    let completed_date = get_optional_str(params, "completedDate");

    let id = new_id();
    conn.execute(
        "INSERT INTO resource_tracking(id, student_id, teacher_id, resource_name, subject,
             topic, status, completed_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            resource_name,
            subject,
            topic,
            status,
            completed_date,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "trackingId": id }))
}

fn tracking_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let tracking = list_resource_tracking(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "tracking": tracking }))
}

fn assignments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let title = get_required_str(params, "title")?;
    let description = get_required_str(params, "description")?;
    let subject = get_required_str(params, "subject")?;
    let due_date = get_required_str(params, "dueDate")?;

    let id = new_id();
    conn.execute(
        "INSERT INTO assignments(id, student_id, teacher_id, title, description, subject,
             due_date, status, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            title,
            description,
            subject,
            due_date,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;

    push_notification(
        conn,
        &student_id,
        "New assignment",
        &format!("You have a new assignment: {}", title),
        "assignment",
    )?;
    Ok(json!({ "assignmentId": id }))
}

fn assignments_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let assignments = list_assignments(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "assignments": assignments }))
}

fn study_schedule_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let day_of_week = get_required_i64(params, "dayOfWeek")?;
    let start_time = get_required_str(params, "startTime")?;
    let end_time = get_required_str(params, "endTime")?;
    let subject = get_required_str(params, "subject")?;
    let topic = get_required_str(params, "topic")?;

    let id = new_id();
    conn.execute(
        "INSERT INTO study_schedules(id, student_id, teacher_id, day_of_week, start_time,
             end_time, subject, topic, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            day_of_week,
            start_time,
            end_time,
            subject,
            topic,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "scheduleId": id }))
}

fn study_schedule_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let schedules = list_study_schedules(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "schedules": schedules }))
}

fn week_end_date(week_start: &str) -> Result<String, HandlerErr> {
    let start = chrono::NaiveDate::parse_from_str(week_start, "%Y-%m-%d")
        .map_err(|e| HandlerErr::bad_params(format!("bad weekStartDate: {}", e)))?;
    Ok((start + chrono::Days::new(6)).format("%Y-%m-%d").to_string())
}

fn weekly_schedules_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let week_start = get_required_str(params, "weekStartDate")?;
    let week_end = week_end_date(&week_start)?;
    let items = params
        .get("scheduleItems")
        .filter(|v| v.is_array())
        .ok_or_else(|| HandlerErr::bad_params("missing scheduleItems"))?;
    let is_suggested = params
        .get("isSuggested")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let items_json =
        serde_json::to_string(items).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO weekly_schedules(id, student_id, teacher_id, week_start_date,
             week_end_date, schedule_items, is_suggested, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, 1, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            week_start,
            week_end,
            items_json,
            is_suggested as i64,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "scheduleId": id, "weekEndDate": week_end }))
}

fn weekly_schedules_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let schedules = list_weekly_schedules(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "schedules": schedules }))
}

/// Builds a plan from the student's entries across all teachers, not
/// just the caller's, so the suggestion sees the whole picture.
fn suggested_schedule(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let entries = list_question_entries(conn, &student_id, None)?;
    let suggestion = calc::suggest_weekly_schedule(&entries);
    serde_json::to_value(suggestion).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn resources_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let resource_name = get_required_str(params, "resourceName")?;
    let subject = get_required_str(params, "subject")?;
    let topics = params
        .get("topics")
        .filter(|v| v.is_array())
        .ok_or_else(|| HandlerErr::bad_params("missing topics"))?;
    // Round-trip through the typed form so bad statuses are rejected
    // at creation instead of surfacing later as read errors.
    let topics: Vec<crate::model::TopicItem> = serde_json::from_value(topics.clone())
        .map_err(|e| HandlerErr::bad_params(format!("bad topics: {}", e)))?;
    let topics_json =
        serde_json::to_string(&topics).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO resources_with_topics(id, student_id, teacher_id, resource_name,
             subject, topics, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            student_id,
            auth.user_id,
            resource_name,
            subject,
            topics_json,
            db::now_iso(),
        ],
    )
    .map_err(db_insert)?;
    Ok(json!({ "resourceId": id }))
}

fn resources_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Teacher)?;
    let student_id = get_required_str(params, "studentId")?;
    let resources = list_resources_with_topics(conn, &student_id, Some(&auth.user_id))?;
    Ok(json!({ "resources": resources }))
}

fn resources_topic_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Teacher)?;
    let resource_id = get_required_str(params, "resourceId")?;
    let topic_name = get_required_str(params, "topicName")?;
    let status_raw = get_required_str(params, "status")?;
    let status = TopicStatus::parse(&status_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown topic status: {}", status_raw)))?;

    let mut resource = load_resource_with_topics(conn, &resource_id)?
        .ok_or_else(|| HandlerErr::not_found("resource not found"))?;
    if !calc::set_topic_status(&mut resource.topics, &topic_name, status) {
        return Err(HandlerErr::not_found("topic not found"));
    }

    let topics_json = serde_json::to_string(&resource.topics)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    conn.execute(
        "UPDATE resources_with_topics SET topics = ? WHERE id = ?",
        (&topics_json, &resource_id),
    )
    .map_err(db_update)?;
    Ok(json!({ "resourceId": resource_id, "topics": resource.topics }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teacher.students" => Some(with_db(state, req, students)),
        "teacher.entries.create" => Some(with_db(state, req, entries_create)),
        "teacher.entries.list" => Some(with_db(state, req, entries_list)),
        "teacher.analyses.create" => Some(with_db(state, req, analyses_create)),
        "teacher.analyses.list" => Some(with_db(state, req, analyses_list)),
        "teacher.analyses.summary" => Some(with_db(state, req, analyses_summary)),
        "teacher.tracking.create" => Some(with_db(state, req, tracking_create)),
        "teacher.tracking.list" => Some(with_db(state, req, tracking_list)),
        "teacher.assignments.create" => Some(with_db(state, req, assignments_create)),
        "teacher.assignments.list" => Some(with_db(state, req, assignments_list)),
        "teacher.studySchedule.create" => Some(with_db(state, req, study_schedule_create)),
        "teacher.studySchedule.list" => Some(with_db(state, req, study_schedule_list)),
        "teacher.weeklySchedules.create" => Some(with_db(state, req, weekly_schedules_create)),
        "teacher.weeklySchedules.list" => Some(with_db(state, req, weekly_schedules_list)),
        "teacher.suggestedSchedule" => Some(with_db(state, req, suggested_schedule)),
        "teacher.resources.create" => Some(with_db(state, req, resources_create)),
        "teacher.resources.list" => Some(with_db(state, req, resources_list)),
        "teacher.resources.topicStatus" => Some(with_db(state, req, resources_topic_status)),
        _ => None,
    }
}
