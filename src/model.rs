use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            _ => None,
        }
    }
}

/// Lifecycle gate for registered accounts; only approved accounts may
/// log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ApprovalStatus> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExamType {
    Tyt,
    Ayt,
    Lgs,
    Kpss,
}

impl ExamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::Tyt => "TYT",
            ExamType::Ayt => "AYT",
            ExamType::Lgs => "LGS",
            ExamType::Kpss => "KPSS",
        }
    }

    pub fn parse(s: &str) -> Option<ExamType> {
        match s {
            "TYT" => Some(ExamType::Tyt),
            "AYT" => Some(ExamType::Ayt),
            "LGS" => Some(ExamType::Lgs),
            "KPSS" => Some(ExamType::Kpss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TopicStatus {
    pub fn parse(s: &str) -> Option<TopicStatus> {
        match s {
            "not_started" => Some(TopicStatus::NotStarted),
            "in_progress" => Some(TopicStatus::InProgress),
            "completed" => Some(TopicStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub goal: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Profile view safe to hand to any caller; never includes the
    /// password hash.
    pub fn public(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "email": self.email,
            "fullName": self.full_name,
            "role": self.role,
            "approvalStatus": self.approval_status,
            "school": self.school,
            "grade": self.grade,
            "birthDate": self.birth_date,
            "phone": self.phone,
            "address": self.address,
            "goal": self.goal,
            "createdAt": self.created_at,
        })
    }
}

/// One practice session's question counts for a single subject.
/// `net_score` is fixed at creation time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub exam_type: ExamType,
    pub subject: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub empty_answers: i64,
    pub net_score: f64,
    pub date: String,
    pub notes: Option<String>,
}

/// Per-subject line inside an exam analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectLine {
    pub name: String,
    pub correct: i64,
    pub wrong: i64,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnalysis {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub exam_type: ExamType,
    pub exam_name: String,
    pub exam_date: String,
    pub subjects: Vec<SubjectLine>,
    pub total_net: f64,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicItem {
    pub name: String,
    pub status: TopicStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceWithTopics {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub resource_name: String,
    pub subject: String,
    pub topics: Vec<TopicItem>,
    pub created_at: String,
}

/// One suggested block in a weekly plan. Produced transiently by the
/// suggestion engine and also embedded (as JSON) in stored weekly
/// schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub day: i64,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub topic: Option<String>,
    pub resource: Option<String>,
    pub activity_type: String,
    pub notes: Option<String>,
}
