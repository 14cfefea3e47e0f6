use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::ipc::error::err;
use crate::model::{
    ApprovalStatus, ExamAnalysis, ExamType, QuestionEntry, ResourceWithTopics, Role, SubjectLine,
    TopicItem, User,
};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn db_query(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

pub fn db_insert(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_insert_failed", e.to_string())
}

pub fn db_update(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_update_failed", e.to_string())
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_exam_type(params: &serde_json::Value, key: &str) -> Result<ExamType, HandlerErr> {
    let raw = get_required_str(params, key)?;
    ExamType::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown exam type: {}", raw)))
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

/// Resolves the caller's session token to a user identity. The caller
/// supplies collections already scoped to this identity downstream.
pub fn authenticate(conn: &Connection, params: &serde_json::Value) -> Result<AuthUser, HandlerErr> {
    let token = params
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("unauthorized", "missing token"))?;

    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT users.id, users.role
             FROM sessions JOIN users ON users.id = sessions.user_id
             WHERE sessions.token = ?",
            [token],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(db_query)?;
    let Some((user_id, role_raw)) = row else {
        return Err(HandlerErr::new("unauthorized", "invalid token"));
    };
    let role = Role::parse(&role_raw)
        .ok_or_else(|| HandlerErr::new("db_query_failed", "corrupt role value"))?;
    Ok(AuthUser { user_id, role })
}

pub fn require_role(
    conn: &Connection,
    params: &serde_json::Value,
    role: Role,
) -> Result<AuthUser, HandlerErr> {
    let auth = authenticate(conn, params)?;
    if auth.role != role {
        return Err(HandlerErr::forbidden(format!(
            "{} access required",
            role.as_str()
        )));
    }
    Ok(auth)
}

fn bad_column<E: Into<Box<dyn std::error::Error + Send + Sync>>>(
    idx: usize,
    msg: E,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

pub fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = r.get(4)?;
    let status_raw: String = r.get(5)?;
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        password_hash: r.get(2)?,
        full_name: r.get(3)?,
        role: Role::parse(&role_raw)
            .ok_or_else(|| bad_column(4, format!("unknown role: {role_raw}")))?,
        approval_status: ApprovalStatus::parse(&status_raw)
            .ok_or_else(|| bad_column(5, format!("unknown approval status: {status_raw}")))?,
        school: r.get(6)?,
        grade: r.get(7)?,
        birth_date: r.get(8)?,
        phone: r.get(9)?,
        address: r.get(10)?,
        goal: r.get(11)?,
        created_at: r.get(12)?,
        updated_at: r.get(13)?,
    })
}

pub const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, approval_status, \
     school, grade, birth_date, phone, address, goal, created_at, updated_at";

pub fn load_user(conn: &Connection, user_id: &str) -> Result<Option<User>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [user_id],
        user_from_row,
    )
    .optional()
    .map_err(db_query)
}

fn question_entry_from_row(r: &Row<'_>) -> rusqlite::Result<QuestionEntry> {
    let exam_type_raw: String = r.get(3)?;
    Ok(QuestionEntry {
        id: r.get(0)?,
        student_id: r.get(1)?,
        teacher_id: r.get(2)?,
        exam_type: ExamType::parse(&exam_type_raw)
            .ok_or_else(|| bad_column(3, format!("unknown exam type: {exam_type_raw}")))?,
        subject: r.get(4)?,
        total_questions: r.get(5)?,
        correct_answers: r.get(6)?,
        wrong_answers: r.get(7)?,
        empty_answers: r.get(8)?,
        net_score: r.get(9)?,
        date: r.get(10)?,
        notes: r.get(11)?,
    })
}

const QUESTION_ENTRY_COLUMNS: &str = "id, student_id, teacher_id, exam_type, subject, \
     total_questions, correct_answers, wrong_answers, empty_answers, net_score, date, notes";

/// Entries in insertion order (rowid), which is the chronological order
/// the aggregation core relies on. `teacher_id = None` returns the
/// student's entries across all teachers.
pub fn list_question_entries(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<QuestionEntry>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM question_entries
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    QUESTION_ENTRY_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), question_entry_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM question_entries WHERE student_id = ? ORDER BY rowid",
                    QUESTION_ENTRY_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], question_entry_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

fn exam_analysis_from_row(r: &Row<'_>) -> rusqlite::Result<ExamAnalysis> {
    let exam_type_raw: String = r.get(3)?;
    let subjects_raw: String = r.get(6)?;
    let subjects: Vec<SubjectLine> =
        serde_json::from_str(&subjects_raw).map_err(|e| bad_column(6, e.to_string()))?;
    Ok(ExamAnalysis {
        id: r.get(0)?,
        student_id: r.get(1)?,
        teacher_id: r.get(2)?,
        exam_type: ExamType::parse(&exam_type_raw)
            .ok_or_else(|| bad_column(3, format!("unknown exam type: {exam_type_raw}")))?,
        exam_name: r.get(4)?,
        exam_date: r.get(5)?,
        subjects,
        total_net: r.get(7)?,
        notes: r.get(8)?,
        created_at: r.get(9)?,
    })
}

const EXAM_ANALYSIS_COLUMNS: &str = "id, student_id, teacher_id, exam_type, exam_name, \
     exam_date, subjects, total_net, notes, created_at";

pub fn list_exam_analyses(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<ExamAnalysis>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM exam_analyses
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    EXAM_ANALYSIS_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), exam_analysis_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM exam_analyses WHERE student_id = ? ORDER BY rowid",
                    EXAM_ANALYSIS_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], exam_analysis_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

pub fn count_exam_analyses(conn: &Connection, student_id: &str) -> Result<usize, HandlerErr> {
    conn.query_row(
        "SELECT COUNT(*) FROM exam_analyses WHERE student_id = ?",
        [student_id],
        |r| r.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(db_query)
}

fn resource_from_row(r: &Row<'_>) -> rusqlite::Result<ResourceWithTopics> {
    let topics_raw: String = r.get(5)?;
    let topics: Vec<TopicItem> =
        serde_json::from_str(&topics_raw).map_err(|e| bad_column(5, e.to_string()))?;
    Ok(ResourceWithTopics {
        id: r.get(0)?,
        student_id: r.get(1)?,
        teacher_id: r.get(2)?,
        resource_name: r.get(3)?,
        subject: r.get(4)?,
        topics,
        created_at: r.get(6)?,
    })
}

const RESOURCE_COLUMNS: &str =
    "id, student_id, teacher_id, resource_name, subject, topics, created_at";

pub fn list_resources_with_topics(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<ResourceWithTopics>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM resources_with_topics
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    RESOURCE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), resource_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM resources_with_topics WHERE student_id = ? ORDER BY rowid",
                    RESOURCE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], resource_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

pub fn load_resource_with_topics(
    conn: &Connection,
    resource_id: &str,
) -> Result<Option<ResourceWithTopics>, HandlerErr> {
    conn.query_row(
        &format!(
            "SELECT {} FROM resources_with_topics WHERE id = ?",
            RESOURCE_COLUMNS
        ),
        [resource_id],
        resource_from_row,
    )
    .optional()
    .map_err(db_query)
}

fn assignment_json(r: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentId": r.get::<_, String>(1)?,
        "teacherId": r.get::<_, String>(2)?,
        "title": r.get::<_, String>(3)?,
        "description": r.get::<_, String>(4)?,
        "subject": r.get::<_, String>(5)?,
        "dueDate": r.get::<_, String>(6)?,
        "status": r.get::<_, String>(7)?,
        "createdAt": r.get::<_, String>(8)?,
    }))
}

const ASSIGNMENT_COLUMNS: &str =
    "id, student_id, teacher_id, title, description, subject, due_date, status, created_at";

pub fn list_assignments(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM assignments
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    ASSIGNMENT_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), assignment_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM assignments WHERE student_id = ? ORDER BY rowid",
                    ASSIGNMENT_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], assignment_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

fn weekly_schedule_json(r: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let items_raw: String = r.get(5)?;
    let items: serde_json::Value =
        serde_json::from_str(&items_raw).map_err(|e| bad_column(5, e.to_string()))?;
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentId": r.get::<_, String>(1)?,
        "teacherId": r.get::<_, String>(2)?,
        "weekStartDate": r.get::<_, String>(3)?,
        "weekEndDate": r.get::<_, String>(4)?,
        "scheduleItems": items,
        "isSuggested": r.get::<_, i64>(6)? != 0,
        "isActive": r.get::<_, i64>(7)? != 0,
        "createdAt": r.get::<_, String>(8)?,
    }))
}

const WEEKLY_SCHEDULE_COLUMNS: &str = "id, student_id, teacher_id, week_start_date, \
     week_end_date, schedule_items, is_suggested, is_active, created_at";

/// Newest week first, matching the original listing order.
pub fn list_weekly_schedules(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM weekly_schedules
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY week_start_date DESC",
                    WEEKLY_SCHEDULE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), weekly_schedule_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM weekly_schedules
                     WHERE student_id = ?
                     ORDER BY week_start_date DESC",
                    WEEKLY_SCHEDULE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], weekly_schedule_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

fn study_schedule_json(r: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentId": r.get::<_, String>(1)?,
        "teacherId": r.get::<_, String>(2)?,
        "dayOfWeek": r.get::<_, i64>(3)?,
        "startTime": r.get::<_, String>(4)?,
        "endTime": r.get::<_, String>(5)?,
        "subject": r.get::<_, String>(6)?,
        "topic": r.get::<_, String>(7)?,
        "createdAt": r.get::<_, String>(8)?,
    }))
}

const STUDY_SCHEDULE_COLUMNS: &str =
    "id, student_id, teacher_id, day_of_week, start_time, end_time, subject, topic, created_at";

pub fn list_study_schedules(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM study_schedules
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    STUDY_SCHEDULE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), study_schedule_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM study_schedules WHERE student_id = ? ORDER BY rowid",
                    STUDY_SCHEDULE_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], study_schedule_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

fn tracking_json(r: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentId": r.get::<_, String>(1)?,
        "teacherId": r.get::<_, String>(2)?,
        "resourceName": r.get::<_, String>(3)?,
        "subject": r.get::<_, String>(4)?,
        "topic": r.get::<_, String>(5)?,
        "status": r.get::<_, String>(6)?,
        "completedDate": r.get::<_, Option<String>>(7)?,
        "createdAt": r.get::<_, String>(8)?,
    }))
}

const TRACKING_COLUMNS: &str = "id, student_id, teacher_id, resource_name, subject, topic, \
     status, completed_date, created_at";

pub fn list_resource_tracking(
    conn: &Connection,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    match teacher_id {
        Some(teacher_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM resource_tracking
                     WHERE student_id = ? AND teacher_id = ?
                     ORDER BY rowid",
                    TRACKING_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map((student_id, teacher_id), tracking_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM resource_tracking WHERE student_id = ? ORDER BY rowid",
                    TRACKING_COLUMNS
                ))
                .map_err(db_query)?;
            stmt.query_map([student_id], tracking_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(db_query)
        }
    }
}

pub fn relation_exists(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
) -> Result<bool, HandlerErr> {
    conn.query_row(
        "SELECT 1 FROM parent_student_relations WHERE parent_id = ? AND student_id = ?",
        (parent_id, student_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
    .map_err(db_query)
}

/// Runs a handler body against the open workspace database and wraps
/// the outcome in the wire envelope.
pub fn with_db(
    state: &crate::ipc::types::AppState,
    req: &crate::ipc::types::Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => crate::ipc::error::ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn push_notification(
    conn: &Connection,
    user_id: &str,
    title: &str,
    message: &str,
    kind: &str,
) -> Result<(), HandlerErr> {
    conn.execute(
        "INSERT INTO notifications(id, user_id, title, message, kind, read, created_at)
         VALUES(?, ?, ?, ?, ?, 0, ?)",
        (new_id(), user_id, title, message, kind, db::now_iso()),
    )
    .map_err(db_insert)?;
    Ok(())
}
