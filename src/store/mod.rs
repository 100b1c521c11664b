mod sqlite;

pub use sqlite::{AssignmentPatch, NewAssignment, NewClass, NewUser, SqliteStore, UserPatch};

use crate::model::{
    Assignment, ClassRow, Enrollment, EnrollmentStatus, ProgressRow, ScoreRow, Submission,
    SubmissionStatus, User,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct StoreError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(what: &str) -> Self {
        Self::new("not_found", format!("{what} not found"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::new("db_query_failed", e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// `Some(vec![])` on any list filter matches nothing.
#[derive(Debug, Clone, Default)]
pub struct ScoreFilter {
    pub student_ids: Option<Vec<String>>,
    pub assignment_ids: Option<Vec<String>>,
    pub class_id: Option<String>,
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub ids: Option<Vec<String>>,
    pub class_ids: Option<Vec<String>>,
    /// Inclusive lower bound on due date; undated assignments never match.
    pub due_from: Option<String>,
    pub limit: Option<usize>,
}

impl AssignmentFilter {
    pub fn for_class(class_id: &str) -> Self {
        Self {
            class_ids: Some(vec![class_id.to_string()]),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub student_id: Option<String>,
    pub class_ids: Option<Vec<String>>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressFilter {
    pub student_id: Option<String>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub student_id: String,
    pub class_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFields {
    pub total_assignments: i64,
    pub completed_assignments: i64,
    pub average_score: f64,
    pub current_grade: String,
    pub last_updated: String,
}

/// Read/write contract the progress and dashboard services are written
/// against. Every call is independent: nothing here opens a transaction that
/// spans more than one call.
pub trait ClassroomStore {
    fn read_scores(&self, filter: &ScoreFilter) -> StoreResult<Vec<ScoreRow>>;

    /// Ordered by due date ascending, undated assignments last.
    fn read_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;

    /// Insert or overwrite the row keyed by (student_id, class_id).
    fn upsert_progress(&self, key: &ProgressKey, fields: &ProgressFields) -> StoreResult<ProgressRow>;

    fn read_enrollments(&self, filter: &EnrollmentFilter) -> StoreResult<Vec<Enrollment>>;

    /// Rows come back in first-insert order.
    fn read_progress(&self, filter: &ProgressFilter) -> StoreResult<Vec<ProgressRow>>;

    fn classes_by_teacher(&self, teacher_id: &str) -> StoreResult<Vec<ClassRow>>;

    fn classes_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ClassRow>>;

    /// Graded submissions of one student, most recently graded first.
    fn recent_graded_submissions(&self, student_id: &str, limit: usize) -> StoreResult<Vec<Submission>>;

    fn get_user(&self, id: &str) -> StoreResult<Option<User>>;

    fn users_by_ids(&self, ids: &[String]) -> StoreResult<Vec<User>>;
}
