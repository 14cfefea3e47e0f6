use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db;
use crate::ipc::helpers::{
    authenticate, db_insert, db_query, get_optional_str, get_required_str, load_user, new_id,
    user_from_row, with_db, HandlerErr, USER_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ApprovalStatus, Role};

fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    format!("sha256${salt}${digest:x}")
}

fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some("sha256"), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    format!("{digest:x}") == expected
}

fn email_taken(conn: &Connection, email: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM users WHERE email = ?", [email], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_query)
}

/// Inserts a user row. Split out so admin.users.create can reuse it
/// with a pre-approved status.
pub fn insert_user(
    conn: &Connection,
    params: &serde_json::Value,
    approval_status: ApprovalStatus,
) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    let full_name = get_required_str(params, "fullName")?;
    let role_raw = get_required_str(params, "role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role_raw)))?;

    if email_taken(conn, &email)? {
        return Err(HandlerErr::new("email_taken", "email already registered"));
    }

    let id = new_id();
    let now = db::now_iso();
    conn.execute(
        "INSERT INTO users(id, email, password_hash, full_name, role, approval_status,
                           school, grade, birth_date, phone, address, goal,
                           created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            email,
            hash_password(&password),
            full_name,
            role.as_str(),
            approval_status.as_str(),
            get_optional_str(params, "school"),
            get_optional_str(params, "grade"),
            get_optional_str(params, "birthDate"),
            get_optional_str(params, "phone"),
            get_optional_str(params, "address"),
            get_optional_str(params, "goal"),
            now,
            now,
        ],
    )
    .map_err(db_insert)?;

    let user = load_user(conn, &id)?
        .ok_or_else(|| HandlerErr::new("db_query_failed", "user vanished after insert"))?;
    Ok(user.public())
}

fn register(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    // Self-registration lands in the pending queue, except the very
    // first account when it is an admin: a fresh workspace needs one
    // approver before anyone else can get in.
    let user_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .map_err(db_query)?;
    let role = get_optional_str(params, "role");
    let status = if user_count == 0 && role.as_deref() == Some("admin") {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };
    let user = insert_user(conn, params, status)?;
    log::debug!("registered {} user {}", status.as_str(), user["id"]);
    Ok(json!({ "user": user }))
}

fn login(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;

    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            [&email],
            user_from_row,
        )
        .optional()
        .map_err(db_query)?;
    let Some(user) = user else {
        return Err(HandlerErr::new("invalid_credentials", "invalid credentials"));
    };
    if !verify_password(&password, &user.password_hash) {
        return Err(HandlerErr::new("invalid_credentials", "invalid credentials"));
    }
    if user.approval_status != ApprovalStatus::Approved {
        return Err(HandlerErr::new("pending_approval", "account pending approval"));
    }

    let token = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessions(token, user_id, created_at) VALUES(?, ?, ?)",
        (&token, &user.id, db::now_iso()),
    )
    .map_err(db_insert)?;

    Ok(json!({ "token": token, "user": user.public() }))
}

fn me(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let auth = authenticate(conn, params)?;
    let user = load_user(conn, &auth.user_id)?
        .ok_or_else(|| HandlerErr::not_found("user not found"))?;
    Ok(json!({ "user": user.public() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(with_db(state, req, register)),
        "auth.login" => Some(with_db(state, req, login)),
        "auth.me" => Some(with_db(state, req, me)),
        _ => None,
    }
}
