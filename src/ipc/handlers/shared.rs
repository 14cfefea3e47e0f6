use rusqlite::Connection;
use serde_json::json;

use crate::calc;
use crate::ipc::helpers::{
    authenticate, count_exam_analyses, db_query, db_update, get_required_str,
    list_question_entries, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn subjects_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    authenticate(conn, params)?;
    let mut stmt = conn
        .prepare("SELECT id, name, exam_type, created_at FROM subjects ORDER BY rowid")
        .map_err(db_query)?;
    let subjects = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "examType": r.get::<_, String>(2)?,
                "createdAt": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(json!({ "subjects": subjects }))
}

fn topics_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    authenticate(conn, params)?;
    let subject_id = get_required_str(params, "subjectId")?;
    let mut stmt = conn
        .prepare(
            "SELECT id, subject_id, name, created_at FROM topics
             WHERE subject_id = ? ORDER BY rowid",
        )
        .map_err(db_query)?;
    let topics = stmt
        .query_map([&subject_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "subjectId": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "createdAt": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(json!({ "topics": topics }))
}

/// Overview across all of a student's entries regardless of which
/// teacher recorded them. Any authenticated caller may ask; row-level
/// scoping happens in the role namespaces.
fn statistics_overview(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    authenticate(conn, params)?;
    let student_id = get_required_str(params, "studentId")?;
    let entries = list_question_entries(conn, &student_id, None)?;
    let analyses_count = count_exam_analyses(conn, &student_id)?;
    let overview = calc::statistics_overview(&entries, analyses_count);
    serde_json::to_value(overview).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn notifications_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = authenticate(conn, params)?;
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, title, message, kind, read, created_at
             FROM notifications WHERE user_id = ?
             ORDER BY created_at DESC LIMIT 100",
        )
        .map_err(db_query)?;
    let notifications = stmt
        .query_map([&auth.user_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "userId": r.get::<_, String>(1)?,
                "title": r.get::<_, String>(2)?,
                "message": r.get::<_, String>(3)?,
                "kind": r.get::<_, String>(4)?,
                "read": r.get::<_, i64>(5)? != 0,
                "createdAt": r.get::<_, String>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(json!({ "notifications": notifications }))
}

fn notifications_mark_read(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = authenticate(conn, params)?;
    let notification_id = get_required_str(params, "notificationId")?;
    let changed = conn
        .execute(
            "UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?",
            (&notification_id, &auth.user_id),
        )
        .map_err(db_update)?;
    if changed == 0 {
        return Err(HandlerErr::not_found("notification not found"));
    }
    Ok(json!({ "notificationId": notification_id, "read": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_db(state, req, subjects_list)),
        "topics.list" => Some(with_db(state, req, topics_list)),
        "statistics.overview" => Some(with_db(state, req, statistics_overview)),
        "notifications.list" => Some(with_db(state, req, notifications_list)),
        "notifications.markRead" => Some(with_db(state, req, notifications_mark_read)),
        _ => None,
    }
}
