use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use crate::db;
use crate::ipc::handlers::auth::insert_user;
use crate::ipc::helpers::{
    db_insert, db_query, db_update, get_exam_type, get_optional_str, get_required_str, load_user,
    new_id, push_notification, require_role, user_from_row, with_db, HandlerErr, USER_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ApprovalStatus, Role};

fn list_users_where(
    conn: &Connection,
    where_clause: &str,
    binds: &[&str],
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM users WHERE {} ORDER BY rowid",
            USER_COLUMNS, where_clause
        ))
        .map_err(db_query)?;
    let users = stmt
        .query_map(rusqlite::params_from_iter(binds), user_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(users.iter().map(|u| u.public()).collect())
}

fn pending_users(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let users = list_users_where(conn, "approval_status = ?", &["pending"])?;
    Ok(json!({ "users": users }))
}

fn set_approval(
    conn: &Connection,
    params: &serde_json::Value,
    status: ApprovalStatus,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let user_id = get_required_str(params, "userId")?;
    let changed = conn
        .execute(
            "UPDATE users SET approval_status = ?, updated_at = ? WHERE id = ?",
            (status.as_str(), db::now_iso(), &user_id),
        )
        .map_err(db_update)?;
    if changed == 0 {
        return Err(HandlerErr::not_found("user not found"));
    }

    if status == ApprovalStatus::Approved {
        let user = load_user(conn, &user_id)?
            .ok_or_else(|| HandlerErr::not_found("user not found"))?;
        push_notification(
            conn,
            &user_id,
            "Account approved",
            &format!(
                "Welcome {}! Your account has been approved and you can now sign in.",
                user.full_name
            ),
            "approval",
        )?;
    }
    Ok(json!({ "userId": user_id, "approvalStatus": status }))
}

fn users_by_role(
    conn: &Connection,
    params: &serde_json::Value,
    role: Role,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let users = list_users_where(
        conn,
        "role = ? AND approval_status = ?",
        &[role.as_str(), "approved"],
    )?;
    Ok(json!({ "users": users }))
}

fn users_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    // Admin-created accounts skip the approval queue.
    let user = insert_user(conn, params, ApprovalStatus::Approved)?;
    Ok(json!({ "user": user }))
}

const PATCHABLE_FIELDS: [(&str, &str); 7] = [
    ("fullName", "full_name"),
    ("school", "school"),
    ("grade", "grade"),
    ("birthDate", "birth_date"),
    ("phone", "phone"),
    ("address", "address"),
    ("goal", "goal"),
];

fn users_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let user_id = get_required_str(params, "userId")?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch object"))?;

    let mut sets: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    for (key, column) in PATCHABLE_FIELDS {
        if let Some(value) = patch.get(key).and_then(|v| v.as_str()) {
            sets.push(format!("{} = ?", column));
            binds.push(value.to_string());
        }
    }
    if sets.is_empty() {
        return Err(HandlerErr::bad_params("no data to update"));
    }
    sets.push("updated_at = ?".to_string());
    binds.push(db::now_iso());
    binds.push(user_id.clone());

    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
    conn.execute(&sql, rusqlite::params_from_iter(binds))
        .map_err(db_update)?;

    let user =
        load_user(conn, &user_id)?.ok_or_else(|| HandlerErr::not_found("user not found"))?;
    Ok(json!({ "user": user.public() }))
}

fn users_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let user_id = get_required_str(params, "userId")?;
    // User-scoped rows (sessions, matches, relations, recorded data)
    // go with the user via ON DELETE CASCADE.
    let deleted = conn
        .execute("DELETE FROM users WHERE id = ?", [&user_id])
        .map_err(db_update)?;
    if deleted == 0 {
        return Err(HandlerErr::not_found("user not found"));
    }
    Ok(json!({ "userId": user_id }))
}

fn matches_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let student =
        load_user(conn, &student_id)?.ok_or_else(|| HandlerErr::not_found("student not found"))?;
    let teacher =
        load_user(conn, &teacher_id)?.ok_or_else(|| HandlerErr::not_found("teacher not found"))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO matches(id, student_id, teacher_id, created_at) VALUES(?, ?, ?, ?)",
        (&id, &student_id, &teacher_id, db::now_iso()),
    )
    .map_err(db_insert)?;

    push_notification(
        conn,
        &student_id,
        "New teacher assigned",
        &format!("{} was assigned as your teacher.", teacher.full_name),
        "assignment",
    )?;
    push_notification(
        conn,
        &teacher_id,
        "New student assigned",
        &format!("{} was assigned as your student.", student.full_name),
        "assignment",
    )?;

    Ok(json!({ "matchId": id }))
}

fn matches_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let mut stmt = conn
        .prepare("SELECT id, student_id, teacher_id, created_at FROM matches ORDER BY rowid")
        .map_err(db_query)?;
    let matches = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "teacherId": r.get::<_, String>(2)?,
                "createdAt": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(json!({ "matches": matches }))
}

fn relations_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let parent_id = get_required_str(params, "parentId")?;
    let student_id = get_required_str(params, "studentId")?;
    let relation_type =
        get_optional_str(params, "relationType").unwrap_or_else(|| "parent".to_string());

    let parent = load_user(conn, &parent_id)?
        .filter(|u| u.role == Role::Parent)
        .ok_or_else(|| HandlerErr::not_found("parent not found"))?;
    let student = load_user(conn, &student_id)?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM parent_student_relations WHERE parent_id = ? AND student_id = ?",
            (&parent_id, &student_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(db_query)?;
    if exists.is_some() {
        return Err(HandlerErr::bad_params("relation already exists"));
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO parent_student_relations(id, parent_id, student_id, relation_type, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&id, &parent_id, &student_id, &relation_type, db::now_iso()),
    )
    .map_err(db_insert)?;

    push_notification(
        conn,
        &parent_id,
        "Student linked",
        &format!("A parent-student link with {} was created.", student.full_name),
        "relation",
    )?;
    push_notification(
        conn,
        &student_id,
        "Parent linked",
        &format!("{} was added as your parent.", parent.full_name),
        "relation",
    )?;

    Ok(json!({ "relationId": id }))
}

fn relations_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let mut stmt = conn
        .prepare(
            "SELECT id, parent_id, student_id, relation_type, created_at
             FROM parent_student_relations ORDER BY rowid",
        )
        .map_err(db_query)?;
    let relations = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "parentId": r.get::<_, String>(1)?,
                "studentId": r.get::<_, String>(2)?,
                "relationType": r.get::<_, String>(3)?,
                "createdAt": r.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;
    Ok(json!({ "relations": relations }))
}

fn relations_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let relation_id = get_required_str(params, "relationId")?;
    let deleted = conn
        .execute(
            "DELETE FROM parent_student_relations WHERE id = ?",
            [&relation_id],
        )
        .map_err(db_update)?;
    if deleted == 0 {
        return Err(HandlerErr::not_found("relation not found"));
    }
    Ok(json!({ "relationId": relation_id }))
}

fn count_where(
    conn: &Connection,
    sql: &str,
    binds: (&str, &str),
) -> Result<i64, HandlerErr> {
    conn.query_row(sql, binds, |r| r.get(0)).map_err(db_query)
}

/// One row per teacher-student match with entry and assignment counts,
/// the admin's cross-platform activity view.
fn reports(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let mut stmt = conn
        .prepare("SELECT student_id, teacher_id FROM matches ORDER BY rowid")
        .map_err(db_query)?;
    let pairs: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query)?;

    let mut reports = Vec::new();
    for (student_id, teacher_id) in pairs {
        let student = load_user(conn, &student_id)?;
        let teacher = load_user(conn, &teacher_id)?;
        let entries = count_where(
            conn,
            "SELECT COUNT(*) FROM question_entries WHERE student_id = ? AND teacher_id = ?",
            (student_id.as_str(), teacher_id.as_str()),
        )?;
        let assignments = count_where(
            conn,
            "SELECT COUNT(*) FROM assignments WHERE student_id = ? AND teacher_id = ?",
            (student_id.as_str(), teacher_id.as_str()),
        )?;
        let completed: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM assignments
                 WHERE student_id = ? AND teacher_id = ? AND status = 'completed'",
                (&student_id, &teacher_id),
                |r| r.get(0),
            )
            .map_err(db_query)?;
        reports.push(json!({
            "student": student.map(|u| u.public()),
            "teacher": teacher.map(|u| u.public()),
            "totalQuestionEntries": entries,
            "totalAssignments": assignments,
            "completedAssignments": completed,
        }));
    }
    Ok(json!({ "reports": reports }))
}

fn subjects_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let name = get_required_str(params, "name")?;
    let exam_type = get_exam_type(params, "examType")?;
    let id = new_id();
    let now = db::now_iso();
    conn.execute(
        "INSERT INTO subjects(id, name, exam_type, created_at) VALUES(?, ?, ?, ?)",
        (&id, &name, exam_type.as_str(), &now),
    )
    .map_err(db_insert)?;
    Ok(json!({
        "subject": { "id": id, "name": name, "examType": exam_type, "createdAt": now }
    }))
}

fn topics_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(conn, params, Role::Admin)?;
    let subject_id = get_required_str(params, "subjectId")?;
    let name = get_required_str(params, "name")?;
    let id = new_id();
    let now = db::now_iso();
    conn.execute(
        "INSERT INTO topics(id, subject_id, name, created_at) VALUES(?, ?, ?, ?)",
        (&id, &subject_id, &name, &now),
    )
    .map_err(db_insert)?;
    Ok(json!({
        "topic": { "id": id, "subjectId": subject_id, "name": name, "createdAt": now }
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.pendingUsers" => Some(with_db(state, req, pending_users)),
        "admin.approveUser" => Some(with_db(state, req, |c, p| {
            set_approval(c, p, ApprovalStatus::Approved)
        })),
        "admin.rejectUser" => Some(with_db(state, req, |c, p| {
            set_approval(c, p, ApprovalStatus::Rejected)
        })),
        "admin.teachers" => Some(with_db(state, req, |c, p| {
            users_by_role(c, p, Role::Teacher)
        })),
        "admin.students" => Some(with_db(state, req, |c, p| {
            users_by_role(c, p, Role::Student)
        })),
        "admin.parents" => Some(with_db(state, req, |c, p| {
            users_by_role(c, p, Role::Parent)
        })),
        "admin.users.create" => Some(with_db(state, req, users_create)),
        "admin.users.update" => Some(with_db(state, req, users_update)),
        "admin.users.delete" => Some(with_db(state, req, users_delete)),
        "admin.matches.create" => Some(with_db(state, req, matches_create)),
        "admin.matches.list" => Some(with_db(state, req, matches_list)),
        "admin.relations.create" => Some(with_db(state, req, relations_create)),
        "admin.relations.list" => Some(with_db(state, req, relations_list)),
        "admin.relations.delete" => Some(with_db(state, req, relations_delete)),
        "admin.reports" => Some(with_db(state, req, reports)),
        "admin.subjects.create" => Some(with_db(state, req, subjects_create)),
        "admin.topics.create" => Some(with_db(state, req, topics_create)),
        _ => None,
    }
}
