use rusqlite::Connection;
use serde_json::json;

use crate::ipc::helpers::{
    db_query, get_required_str, list_assignments, list_exam_analyses, list_question_entries,
    list_resources_with_topics, list_weekly_schedules, relation_exists, require_role,
    user_from_row, with_db, AuthUser, HandlerErr, USER_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;

/// Every child-scoped read goes through this gate; a student the parent
/// is not linked to is forbidden, not merely empty.
fn require_linked_child(
    conn: &Connection,
    auth: &AuthUser,
    params: &serde_json::Value,
) -> Result<String, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !relation_exists(conn, &auth.user_id, &student_id)? {
        return Err(HandlerErr::forbidden(
            "not authorized to view this student's data",
        ));
    }
    Ok(student_id)
}

fn children(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM users
             WHERE id IN (SELECT student_id FROM parent_student_relations WHERE parent_id = ?)
             ORDER BY rowid",
            USER_COLUMNS
        ))
        .map_err(db_query)?;
    let children = stmt
        .query_map([&auth.user_id], user_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    let children: Vec<serde_json::Value> = children.iter().map(|u| u.public()).collect();
    Ok(json!({ "children": children }))
}

fn child_entries(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let student_id = require_linked_child(conn, &auth, params)?;
    let entries = list_question_entries(conn, &student_id, None)?;
    Ok(json!({ "entries": entries }))
}

fn child_analyses(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let student_id = require_linked_child(conn, &auth, params)?;
    let analyses = list_exam_analyses(conn, &student_id, None)?;
    Ok(json!({ "analyses": analyses }))
}

fn child_resources(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let student_id = require_linked_child(conn, &auth, params)?;
    let resources = list_resources_with_topics(conn, &student_id, None)?;
    Ok(json!({ "resources": resources }))
}

fn child_weekly_schedules(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let student_id = require_linked_child(conn, &auth, params)?;
    let schedules = list_weekly_schedules(conn, &student_id, None)?;
    Ok(json!({ "schedules": schedules }))
}

fn child_assignments(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let auth = require_role(conn, params, Role::Parent)?;
    let student_id = require_linked_child(conn, &auth, params)?;
    let assignments = list_assignments(conn, &student_id, None)?;
    Ok(json!({ "assignments": assignments }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "parent.children" => Some(with_db(state, req, children)),
        "parent.childEntries" => Some(with_db(state, req, child_entries)),
        "parent.childAnalyses" => Some(with_db(state, req, child_analyses)),
        "parent.childResources" => Some(with_db(state, req, child_resources)),
        "parent.childWeeklySchedules" => Some(with_db(state, req, child_weekly_schedules)),
        "parent.childAssignments" => Some(with_db(state, req, child_assignments)),
        _ => None,
    }
}
