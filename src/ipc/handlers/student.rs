use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use crate::ipc::helpers::{
    db_query, db_update, get_required_str, list_assignments, list_exam_analyses,
    list_question_entries, list_resource_tracking, list_resources_with_topics,
    list_study_schedules, list_weekly_schedules, load_user, require_role, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;

fn my_teacher(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let teacher_id: Option<String> = conn
        .query_row(
            "SELECT teacher_id FROM matches WHERE student_id = ? ORDER BY rowid LIMIT 1",
            [&auth.user_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_query)?;
    let teacher = match teacher_id {
        Some(id) => load_user(conn, &id)?.map(|u| u.public()),
        None => None,
    };
    Ok(json!({ "teacher": teacher }))
}

fn my_entries(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let entries = list_question_entries(conn, &auth.user_id, None)?;
    Ok(json!({ "entries": entries }))
}

fn my_analyses(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let analyses = list_exam_analyses(conn, &auth.user_id, None)?;
    Ok(json!({ "analyses": analyses }))
}

fn my_tracking(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let tracking = list_resource_tracking(conn, &auth.user_id, None)?;
    Ok(json!({ "tracking": tracking }))
}

fn my_assignments(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let assignments = list_assignments(conn, &auth.user_id, None)?;
    Ok(json!({ "assignments": assignments }))
}

fn assignment_complete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    // Scoped to the caller's own rows; another student's id is simply
    // not found.
    let changed = conn
        .execute(
            "UPDATE assignments SET status = 'completed' WHERE id = ? AND student_id = ?",
            (&assignment_id, &auth.user_id),
        )
        .map_err(db_update)?;
    if changed == 0 {
        return Err(HandlerErr::not_found("assignment not found"));
    }
    Ok(json!({ "assignmentId": assignment_id, "status": "completed" }))
}

fn my_study_schedule(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let schedules = list_study_schedules(conn, &auth.user_id, None)?;
    Ok(json!({ "schedules": schedules }))
}

fn my_weekly_schedules(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let schedules = list_weekly_schedules(conn, &auth.user_id, None)?;
    Ok(json!({ "schedules": schedules }))
}

fn my_resources(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Student)?;
    let resources = list_resources_with_topics(conn, &auth.user_id, None)?;
    Ok(json!({ "resources": resources }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.myTeacher" => Some(with_db(state, req, my_teacher)),
        "student.myEntries" => Some(with_db(state, req, my_entries)),
        "student.myAnalyses" => Some(with_db(state, req, my_analyses)),
        "student.myTracking" => Some(with_db(state, req, my_tracking)),
        "student.myAssignments" => Some(with_db(state, req, my_assignments)),
        "student.assignmentComplete" => Some(with_db(state, req, assignment_complete)),
        "student.myStudySchedule" => Some(with_db(state, req, my_study_schedule)),
        "student.myWeeklySchedules" => Some(with_db(state, req, my_weekly_schedules)),
        "student.myResources" => Some(with_db(state, req, my_resources)),
        _ => None,
    }
}
