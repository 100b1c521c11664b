use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    HeadTeacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::HeadTeacher => "head_teacher",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            // "admin" is what older profiles carried for the same role.
            "head_teacher" | "headteacher" | "admin" => Some(Role::HeadTeacher),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Late,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Late => "late",
            SubmissionStatus::Graded => "graded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" | "pending" => Some(SubmissionStatus::Draft),
            "submitted" => Some(SubmissionStatus::Submitted),
            "late" => Some(SubmissionStatus::Late),
            "graded" => Some(SubmissionStatus::Graded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Inactive,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Inactive => "inactive",
            EnrollmentStatus::Dropped => "dropped",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(EnrollmentStatus::Active),
            "inactive" => Some(EnrollmentStatus::Inactive),
            "dropped" => Some(EnrollmentStatus::Dropped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub class_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub grade_level: Option<String>,
    pub academic_year: String,
    pub teacher_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub class_id: String,
    pub student_id: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub total_points: f64,
    pub assignment_type: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub submission_text: Option<String>,
    pub attachment_url: Option<String>,
    pub status: SubmissionStatus,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: Option<String>,
    pub graded_by: Option<String>,
    pub graded_at: Option<String>,
    pub updated_at: String,
}

/// Cached per-(student, class) summary. Always re-derivable from submissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRow {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub total_assignments: i64,
    pub completed_assignments: i64,
    pub average_score: f64,
    pub current_grade: String,
    pub last_updated: String,
}

/// Minimal score projection the aggregator works on.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub student_id: String,
    pub assignment_id: String,
    pub score: Option<f64>,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPoints {
    pub id: String,
    pub max_points: f64,
}

impl From<&Assignment> for AssignmentPoints {
    fn from(a: &Assignment) -> Self {
        AssignmentPoints {
            id: a.id.clone(),
            max_points: a.total_points,
        }
    }
}
