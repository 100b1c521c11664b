use super::{
    AssignmentFilter, ClassroomStore, EnrollmentFilter, ProgressFields, ProgressFilter,
    ProgressKey, ScoreFilter, StoreError, StoreResult,
};
use crate::model::{
    Assignment, ClassRow, Enrollment, EnrollmentStatus, ProgressRow, Role, ScoreRow, Submission,
    SubmissionStatus, User,
};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

const USER_COLS: &str = "id, email, name, role, class_id, created_at, updated_at";
const CLASS_COLS: &str =
    "id, name, description, subject, grade_level, academic_year, teacher_id, created_at, updated_at";
const ASSIGNMENT_COLS: &str = "id, class_id, title, description, due_date, total_points, assignment_type, created_at, updated_at";
const SUBMISSION_COLS: &str = "id, assignment_id, student_id, submission_text, attachment_url, status, grade, feedback, submitted_at, graded_by, graded_at, updated_at";
const PROGRESS_COLS: &str = "id, student_id, class_id, total_assignments, completed_assignments, average_score, current_grade, last_updated";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub class_id: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub grade_level: Option<String>,
    pub academic_year: String,
    pub teacher_id: String,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub class_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub total_points: f64,
    pub assignment_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
    pub total_points: Option<f64>,
    pub assignment_type: Option<String>,
}

#[derive(Default)]
struct WhereClause {
    parts: Vec<String>,
    binds: Vec<Value>,
    matches_nothing: bool,
}

impl WhereClause {
    fn eq(&mut self, column: &str, v: &str) {
        self.parts.push(format!("{column} = ?"));
        self.binds.push(Value::Text(v.to_string()));
    }

    fn cmp(&mut self, column: &str, op: &str, v: &str) {
        self.parts.push(format!("{column} {op} ?"));
        self.binds.push(Value::Text(v.to_string()));
    }

    fn in_list(&mut self, column: &str, ids: &[String]) {
        if ids.is_empty() {
            self.matches_nothing = true;
            return;
        }
        let placeholders = std::iter::repeat("?")
            .take(ids.len())
            .collect::<Vec<_>>()
            .join(",");
        self.parts.push(format!("{column} IN ({placeholders})"));
        for id in ids {
            self.binds.push(Value::Text(id.clone()));
        }
    }

    fn sql(&self) -> String {
        if self.parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.parts.join(" AND "))
        }
    }
}

fn bad_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StoreError::new("bad_row", message)),
    )
}

fn opt_text(v: Option<String>) -> Value {
    v.map(Value::Text).unwrap_or(Value::Null)
}

fn insert_err(table: &str, e: rusqlite::Error) -> StoreError {
    StoreError::new("db_insert_failed", e.to_string()).with_details(json!({ "table": table }))
}

fn update_err(table: &str, e: rusqlite::Error) -> StoreError {
    StoreError::new("db_update_failed", e.to_string()).with_details(json!({ "table": table }))
}

fn map_user(r: &Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = r.get(3)?;
    let Some(role) = Role::parse(&role_raw) else {
        return Err(bad_column(3, format!("unknown role: {role_raw}")));
    };
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        name: r.get(2)?,
        role,
        class_id: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

fn map_class(r: &Row<'_>) -> rusqlite::Result<ClassRow> {
    Ok(ClassRow {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        subject: r.get(3)?,
        grade_level: r.get(4)?,
        academic_year: r.get(5)?,
        teacher_id: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn map_assignment(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        due_date: r.get(4)?,
        total_points: r.get(5)?,
        assignment_type: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn parse_status(idx: usize, raw: String) -> rusqlite::Result<SubmissionStatus> {
    SubmissionStatus::parse(&raw).ok_or_else(|| bad_column(idx, format!("unknown status: {raw}")))
}

fn map_submission(r: &Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: r.get(0)?,
        assignment_id: r.get(1)?,
        student_id: r.get(2)?,
        submission_text: r.get(3)?,
        attachment_url: r.get(4)?,
        status: parse_status(5, r.get(5)?)?,
        grade: r.get(6)?,
        feedback: r.get(7)?,
        submitted_at: r.get(8)?,
        graded_by: r.get(9)?,
        graded_at: r.get(10)?,
        updated_at: r.get(11)?,
    })
}

fn map_progress(r: &Row<'_>) -> rusqlite::Result<ProgressRow> {
    Ok(ProgressRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        total_assignments: r.get(3)?,
        completed_assignments: r.get(4)?,
        average_score: r.get(5)?,
        current_grade: r.get(6)?,
        last_updated: r.get(7)?,
    })
}

fn map_enrollment(r: &Row<'_>) -> rusqlite::Result<Enrollment> {
    let raw: String = r.get(2)?;
    let Some(status) = EnrollmentStatus::parse(&raw) else {
        return Err(bad_column(2, format!("unknown enrollment status: {raw}")));
    };
    Ok(Enrollment {
        class_id: r.get(0)?,
        student_id: r.get(1)?,
        status,
        enrolled_at: r.get(3)?,
    })
}

/// Store over a borrowed connection. Wrapping a `Transaction` works the same
/// way since it derefs to `Connection`.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_all<T>(
        &self,
        sql: &str,
        binds: Vec<Value>,
        f: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), f)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- users ---

    pub fn insert_user(&self, new: &NewUser, now: &str) -> StoreResult<User> {
        let id = Uuid::new_v4().to_string();
        let class_id = match new.role {
            Role::Student => new.class_id.clone(),
            _ => None,
        };
        self.conn
            .execute(
                "INSERT INTO users(id, email, name, role, class_id, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (&id, &new.email, &new.name, new.role.as_str(), &class_id, now, now),
            )
            .map_err(|e| insert_err("users", e))?;
        self.get_user(&id)?
            .ok_or_else(|| StoreError::not_found("user"))
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE email = ?");
        Ok(self.conn.query_row(&sql, [email], map_user).optional()?)
    }

    pub fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let mut w = WhereClause::default();
        if let Some(role) = role {
            w.eq("role", role.as_str());
        }
        let sql = format!("SELECT {USER_COLS} FROM users{} ORDER BY name", w.sql());
        self.query_all(&sql, w.binds, map_user)
    }

    pub fn students_by_class(&self, class_id: &str) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLS} FROM users WHERE role = 'student' AND class_id = ? ORDER BY name"
        );
        self.query_all(&sql, vec![Value::Text(class_id.to_string())], map_user)
    }

    pub fn update_user(&self, id: &str, patch: &UserPatch, now: &str) -> StoreResult<Option<User>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.email {
            sets.push("email = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.name {
            sets.push("name = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = patch.role {
            sets.push("role = ?");
            binds.push(Value::Text(v.as_str().to_string()));
        }
        if let Some(v) = &patch.class_id {
            sets.push("class_id = ?");
            binds.push(opt_text(v.clone()));
        }
        sets.push("updated_at = ?");
        binds.push(Value::Text(now.to_string()));
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds))
            .map_err(|e| update_err("users", e))?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_user(id)
    }

    // --- classes ---

    pub fn insert_class(&self, new: &NewClass, now: &str) -> StoreResult<ClassRow> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO classes(id, name, description, subject, grade_level, academic_year, teacher_id, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &new.name,
                    &new.description,
                    &new.subject,
                    &new.grade_level,
                    &new.academic_year,
                    &new.teacher_id,
                    now,
                    now,
                ),
            )
            .map_err(|e| insert_err("classes", e))?;
        self.get_class(&id)?
            .ok_or_else(|| StoreError::not_found("class"))
    }

    pub fn get_class(&self, id: &str) -> StoreResult<Option<ClassRow>> {
        let sql = format!("SELECT {CLASS_COLS} FROM classes WHERE id = ?");
        Ok(self.conn.query_row(&sql, [id], map_class).optional()?)
    }

    pub fn list_classes(&self) -> StoreResult<Vec<ClassRow>> {
        let sql = format!("SELECT {CLASS_COLS} FROM classes ORDER BY name");
        self.query_all(&sql, Vec::new(), map_class)
    }

    /// Dependent enrollments, assignments, submissions and progress rows go
    /// with it through the foreign-key cascade.
    pub fn delete_class(&self, id: &str) -> StoreResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM classes WHERE id = ?", [id])
            .map_err(|e| {
                StoreError::new("db_delete_failed", e.to_string())
                    .with_details(json!({ "table": "classes" }))
            })?;
        Ok(n > 0)
    }

    // --- enrollments ---

    pub fn upsert_enrollment(
        &self,
        class_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
        now: &str,
    ) -> StoreResult<Enrollment> {
        self.conn
            .execute(
                "INSERT INTO class_enrollments(class_id, student_id, status, enrolled_at)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(class_id, student_id) DO UPDATE SET
                   status = excluded.status",
                (class_id, student_id, status.as_str(), now),
            )
            .map_err(|e| insert_err("class_enrollments", e))?;
        let row = self
            .conn
            .query_row(
                "SELECT class_id, student_id, status, enrolled_at
                 FROM class_enrollments
                 WHERE class_id = ? AND student_id = ?",
                (class_id, student_id),
                map_enrollment,
            )?;
        Ok(row)
    }

    pub fn set_enrollment_status(
        &self,
        class_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
    ) -> StoreResult<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE class_enrollments SET status = ? WHERE class_id = ? AND student_id = ?",
                (status.as_str(), class_id, student_id),
            )
            .map_err(|e| update_err("class_enrollments", e))?;
        Ok(n > 0)
    }

    // --- assignments ---

    pub fn insert_assignment(&self, new: &NewAssignment, now: &str) -> StoreResult<Assignment> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO assignments(id, class_id, title, description, due_date, total_points, assignment_type, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &new.class_id,
                    &new.title,
                    &new.description,
                    &new.due_date,
                    new.total_points,
                    &new.assignment_type,
                    now,
                    now,
                ),
            )
            .map_err(|e| insert_err("assignments", e))?;
        self.get_assignment(&id)?
            .ok_or_else(|| StoreError::not_found("assignment"))
    }

    pub fn get_assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        let sql = format!("SELECT {ASSIGNMENT_COLS} FROM assignments WHERE id = ?");
        Ok(self.conn.query_row(&sql, [id], map_assignment).optional()?)
    }

    pub fn update_assignment(
        &self,
        id: &str,
        patch: &AssignmentPatch,
        now: &str,
    ) -> StoreResult<Option<Assignment>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.title {
            sets.push("title = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.description {
            sets.push("description = ?");
            binds.push(opt_text(v.clone()));
        }
        if let Some(v) = &patch.due_date {
            sets.push("due_date = ?");
            binds.push(opt_text(v.clone()));
        }
        if let Some(v) = patch.total_points {
            sets.push("total_points = ?");
            binds.push(Value::Real(v));
        }
        if let Some(v) = &patch.assignment_type {
            sets.push("assignment_type = ?");
            binds.push(Value::Text(v.clone()));
        }
        sets.push("updated_at = ?");
        binds.push(Value::Text(now.to_string()));
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE assignments SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds))
            .map_err(|e| update_err("assignments", e))?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_assignment(id)
    }

    // --- submissions ---

    pub fn get_submission(&self, id: &str) -> StoreResult<Option<Submission>> {
        let sql = format!("SELECT {SUBMISSION_COLS} FROM submissions WHERE id = ?");
        Ok(self.conn.query_row(&sql, [id], map_submission).optional()?)
    }

    pub fn find_submission(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> StoreResult<Option<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLS} FROM submissions WHERE assignment_id = ? AND student_id = ?"
        );
        Ok(self
            .conn
            .query_row(&sql, (assignment_id, student_id), map_submission)
            .optional()?)
    }

    /// Writes every mutable column; (assignment_id, student_id) is the conflict key.
    pub fn save_submission(&self, s: &Submission) -> StoreResult<Submission> {
        self.conn
            .execute(
                "INSERT INTO submissions(id, assignment_id, student_id, submission_text, attachment_url, status, grade, feedback, submitted_at, graded_by, graded_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(assignment_id, student_id) DO UPDATE SET
                   submission_text = excluded.submission_text,
                   attachment_url = excluded.attachment_url,
                   status = excluded.status,
                   grade = excluded.grade,
                   feedback = excluded.feedback,
                   submitted_at = excluded.submitted_at,
                   graded_by = excluded.graded_by,
                   graded_at = excluded.graded_at,
                   updated_at = excluded.updated_at",
                (
                    &s.id,
                    &s.assignment_id,
                    &s.student_id,
                    &s.submission_text,
                    &s.attachment_url,
                    s.status.as_str(),
                    s.grade,
                    &s.feedback,
                    &s.submitted_at,
                    &s.graded_by,
                    &s.graded_at,
                    &s.updated_at,
                ),
            )
            .map_err(|e| insert_err("submissions", e))?;
        self.find_submission(&s.assignment_id, &s.student_id)?
            .ok_or_else(|| StoreError::not_found("submission"))
    }

    pub fn submissions_for_assignment(&self, assignment_id: &str) -> StoreResult<Vec<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLS} FROM submissions WHERE assignment_id = ? ORDER BY submitted_at IS NULL, submitted_at"
        );
        self.query_all(&sql, vec![Value::Text(assignment_id.to_string())], map_submission)
    }

    pub fn submissions_for_student(&self, student_id: &str) -> StoreResult<Vec<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLS} FROM submissions WHERE student_id = ? ORDER BY updated_at DESC"
        );
        self.query_all(&sql, vec![Value::Text(student_id.to_string())], map_submission)
    }
}

impl ClassroomStore for SqliteStore<'_> {
    fn read_scores(&self, filter: &ScoreFilter) -> StoreResult<Vec<ScoreRow>> {
        let mut w = WhereClause::default();
        if let Some(ids) = &filter.student_ids {
            w.in_list("s.student_id", ids);
        }
        if let Some(ids) = &filter.assignment_ids {
            w.in_list("s.assignment_id", ids);
        }
        if let Some(class_id) = &filter.class_id {
            w.eq("a.class_id", class_id);
        }
        if let Some(status) = filter.status {
            w.eq("s.status", status.as_str());
        }
        if w.matches_nothing {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT s.student_id, s.assignment_id, s.grade, s.status
             FROM submissions s
             JOIN assignments a ON a.id = s.assignment_id{}
             ORDER BY s.rowid",
            w.sql()
        );
        self.query_all(&sql, w.binds, |r| {
            Ok(ScoreRow {
                student_id: r.get(0)?,
                assignment_id: r.get(1)?,
                score: r.get(2)?,
                status: parse_status(3, r.get(3)?)?,
            })
        })
    }

    fn read_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let mut w = WhereClause::default();
        if let Some(ids) = &filter.ids {
            w.in_list("id", ids);
        }
        if let Some(ids) = &filter.class_ids {
            w.in_list("class_id", ids);
        }
        if let Some(from) = &filter.due_from {
            w.cmp("due_date", ">=", from);
        }
        if w.matches_nothing {
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "SELECT {ASSIGNMENT_COLS} FROM assignments{} ORDER BY due_date IS NULL, due_date, created_at",
            w.sql()
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.query_all(&sql, w.binds, map_assignment)
    }

    fn upsert_progress(&self, key: &ProgressKey, fields: &ProgressFields) -> StoreResult<ProgressRow> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO student_progress(id, student_id, class_id, total_assignments, completed_assignments, average_score, current_grade, last_updated)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(student_id, class_id) DO UPDATE SET
                   total_assignments = excluded.total_assignments,
                   completed_assignments = excluded.completed_assignments,
                   average_score = excluded.average_score,
                   current_grade = excluded.current_grade,
                   last_updated = excluded.last_updated",
                (
                    &id,
                    &key.student_id,
                    &key.class_id,
                    fields.total_assignments,
                    fields.completed_assignments,
                    fields.average_score,
                    &fields.current_grade,
                    &fields.last_updated,
                ),
            )
            .map_err(|e| insert_err("student_progress", e))?;
        let sql = format!(
            "SELECT {PROGRESS_COLS} FROM student_progress WHERE student_id = ? AND class_id = ?"
        );
        let row = self
            .conn
            .query_row(&sql, (&key.student_id, &key.class_id), map_progress)?;
        Ok(row)
    }

    fn read_enrollments(&self, filter: &EnrollmentFilter) -> StoreResult<Vec<Enrollment>> {
        let mut w = WhereClause::default();
        if let Some(sid) = &filter.student_id {
            w.eq("student_id", sid);
        }
        if let Some(ids) = &filter.class_ids {
            w.in_list("class_id", ids);
        }
        if let Some(status) = filter.status {
            w.eq("status", status.as_str());
        }
        if w.matches_nothing {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT class_id, student_id, status, enrolled_at FROM class_enrollments{} ORDER BY rowid",
            w.sql()
        );
        self.query_all(&sql, w.binds, map_enrollment)
    }

    fn read_progress(&self, filter: &ProgressFilter) -> StoreResult<Vec<ProgressRow>> {
        let mut w = WhereClause::default();
        if let Some(sid) = &filter.student_id {
            w.eq("student_id", sid);
        }
        if let Some(cid) = &filter.class_id {
            w.eq("class_id", cid);
        }
        let sql = format!(
            "SELECT {PROGRESS_COLS} FROM student_progress{} ORDER BY rowid",
            w.sql()
        );
        self.query_all(&sql, w.binds, map_progress)
    }

    fn classes_by_teacher(&self, teacher_id: &str) -> StoreResult<Vec<ClassRow>> {
        let sql = format!(
            "SELECT {CLASS_COLS} FROM classes WHERE teacher_id = ? ORDER BY created_at DESC"
        );
        self.query_all(&sql, vec![Value::Text(teacher_id.to_string())], map_class)
    }

    fn classes_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ClassRow>> {
        let mut w = WhereClause::default();
        w.in_list("id", ids);
        if w.matches_nothing {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {CLASS_COLS} FROM classes{} ORDER BY name", w.sql());
        self.query_all(&sql, w.binds, map_class)
    }

    fn recent_graded_submissions(&self, student_id: &str, limit: usize) -> StoreResult<Vec<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLS} FROM submissions
             WHERE student_id = ? AND status = 'graded'
             ORDER BY graded_at DESC
             LIMIT {limit}"
        );
        self.query_all(&sql, vec![Value::Text(student_id.to_string())], map_submission)
    }

    fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?");
        Ok(self.conn.query_row(&sql, [id], map_user).optional()?)
    }

    fn users_by_ids(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let mut w = WhereClause::default();
        w.in_list("id", ids);
        if w.matches_nothing {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {USER_COLS} FROM users{} ORDER BY name", w.sql());
        self.query_all(&sql, w.binds, map_user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    const NOW: &str = "2026-01-10T09:00:00.000Z";

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        conn
    }

    fn seed_class(store: &SqliteStore<'_>) -> (User, ClassRow) {
        let teacher = store
            .insert_user(
                &NewUser {
                    email: "t@school.test".into(),
                    name: "Teacher".into(),
                    role: Role::Teacher,
                    class_id: None,
                },
                NOW,
            )
            .expect("teacher");
        let class = store
            .insert_class(
                &NewClass {
                    name: "Algebra".into(),
                    description: None,
                    subject: "Math".into(),
                    grade_level: Some("9".into()),
                    academic_year: "2025-2026".into(),
                    teacher_id: teacher.id.clone(),
                },
                NOW,
            )
            .expect("class");
        (teacher, class)
    }

    fn new_assignment(class_id: &str, title: &str, due: Option<&str>) -> NewAssignment {
        NewAssignment {
            class_id: class_id.to_string(),
            title: title.to_string(),
            description: None,
            due_date: due.map(|d| d.to_string()),
            total_points: 10.0,
            assignment_type: "homework".into(),
        }
    }

    #[test]
    fn progress_upsert_overwrites_on_pair_key() {
        let conn = memory_conn();
        let store = SqliteStore::new(&conn);
        let (_, class) = seed_class(&store);
        let student = store
            .insert_user(
                &NewUser {
                    email: "s@school.test".into(),
                    name: "Student".into(),
                    role: Role::Student,
                    class_id: None,
                },
                NOW,
            )
            .expect("student");
        let key = ProgressKey {
            student_id: student.id.clone(),
            class_id: class.id.clone(),
        };
        let mut fields = ProgressFields {
            total_assignments: 2,
            completed_assignments: 1,
            average_score: 80.0,
            current_grade: "B".into(),
            last_updated: NOW.into(),
        };
        let first = store.upsert_progress(&key, &fields).expect("insert");
        fields.average_score = 91.5;
        fields.current_grade = "A".into();
        let second = store.upsert_progress(&key, &fields).expect("update");

        assert_eq!(first.id, second.id);
        assert_eq!(second.average_score, 91.5);
        let rows = store
            .read_progress(&ProgressFilter {
                class_id: Some(class.id.clone()),
                ..ProgressFilter::default()
            })
            .expect("read");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn assignments_sort_undated_last_and_respect_limit() {
        let conn = memory_conn();
        let store = SqliteStore::new(&conn);
        let (_, class) = seed_class(&store);
        store
            .insert_assignment(&new_assignment(&class.id, "undated", None), NOW)
            .expect("a");
        store
            .insert_assignment(
                &new_assignment(&class.id, "later", Some("2026-02-01T00:00:00.000Z")),
                NOW,
            )
            .expect("b");
        store
            .insert_assignment(
                &new_assignment(&class.id, "sooner", Some("2026-01-15T00:00:00.000Z")),
                NOW,
            )
            .expect("c");

        let all = store
            .read_assignments(&AssignmentFilter::for_class(&class.id))
            .expect("read");
        let titles: Vec<&str> = all.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["sooner", "later", "undated"]);

        let upcoming = store
            .read_assignments(&AssignmentFilter {
                class_ids: Some(vec![class.id.clone()]),
                due_from: Some("2026-01-20T00:00:00.000Z".into()),
                limit: Some(5),
                ..AssignmentFilter::default()
            })
            .expect("read");
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, "later");
    }

    #[test]
    fn empty_id_lists_match_nothing() {
        let conn = memory_conn();
        let store = SqliteStore::new(&conn);
        let (_, class) = seed_class(&store);
        store
            .insert_assignment(&new_assignment(&class.id, "hw", None), NOW)
            .expect("a");
        let none = store
            .read_assignments(&AssignmentFilter {
                class_ids: Some(Vec::new()),
                ..AssignmentFilter::default()
            })
            .expect("read");
        assert!(none.is_empty());
        let scores = store
            .read_scores(&ScoreFilter {
                assignment_ids: Some(Vec::new()),
                ..ScoreFilter::default()
            })
            .expect("read");
        assert!(scores.is_empty());
    }

    #[test]
    fn score_reads_filter_by_class_through_assignments() {
        let conn = memory_conn();
        let store = SqliteStore::new(&conn);
        let (teacher, algebra) = seed_class(&store);
        let geometry = store
            .insert_class(
                &NewClass {
                    name: "Geometry".into(),
                    description: None,
                    subject: "Math".into(),
                    grade_level: None,
                    academic_year: "2025-2026".into(),
                    teacher_id: teacher.id.clone(),
                },
                NOW,
            )
            .expect("second class");
        let student = store
            .insert_user(
                &NewUser {
                    email: "s@school.test".into(),
                    name: "Student".into(),
                    role: Role::Student,
                    class_id: None,
                },
                NOW,
            )
            .expect("student");
        for (class_id, grade) in [(&algebra.id, 7.0), (&geometry.id, 4.0)] {
            let a = store
                .insert_assignment(&new_assignment(class_id, "hw", None), NOW)
                .expect("assignment");
            store
                .save_submission(&Submission {
                    id: Uuid::new_v4().to_string(),
                    assignment_id: a.id,
                    student_id: student.id.clone(),
                    submission_text: None,
                    attachment_url: None,
                    status: SubmissionStatus::Graded,
                    grade: Some(grade),
                    feedback: None,
                    submitted_at: Some(NOW.into()),
                    graded_by: Some(teacher.id.clone()),
                    graded_at: Some(NOW.into()),
                    updated_at: NOW.into(),
                })
                .expect("submission");
        }

        let rows = store
            .read_scores(&ScoreFilter {
                student_ids: Some(vec![student.id.clone()]),
                class_id: Some(geometry.id.clone()),
                ..ScoreFilter::default()
            })
            .expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, Some(4.0));
        let all = store
            .read_scores(&ScoreFilter::default())
            .expect("read all");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn deleting_a_class_cascades() {
        let conn = memory_conn();
        let store = SqliteStore::new(&conn);
        let (_, class) = seed_class(&store);
        store
            .insert_assignment(&new_assignment(&class.id, "hw", None), NOW)
            .expect("a");
        assert!(store.delete_class(&class.id).expect("delete"));
        let left = store
            .read_assignments(&AssignmentFilter::default())
            .expect("read");
        assert!(left.is_empty());
        assert!(!store.delete_class(&class.id).expect("second delete"));
    }
}
