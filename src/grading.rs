use crate::model::{Assignment, EnrollmentStatus, ProgressRow, Role, Submission, SubmissionStatus};
use crate::progress;
use crate::session::Session;
use crate::store::{ClassroomStore, EnrollmentFilter, SqliteStore, StoreError, StoreResult};
use crate::timefmt::{format_ts, parse_due_date};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct WorkInput {
    pub submission_text: Option<String>,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GradeInput {
    pub grade: f64,
    pub feedback: Option<String>,
}

fn invalid_state(current: SubmissionStatus, action: &str) -> StoreError {
    StoreError::new(
        "invalid_state",
        format!("cannot {action} a {} submission", current.as_str()),
    )
    .with_details(json!({ "status": current.as_str() }))
}

/// Student-side transition. `graded` is terminal; `late` stands in for
/// `submitted` when the due date has passed.
pub fn status_after_submit(
    current: Option<SubmissionStatus>,
    past_due: bool,
) -> StoreResult<SubmissionStatus> {
    match current {
        Some(SubmissionStatus::Graded) => Err(invalid_state(SubmissionStatus::Graded, "submit")),
        _ if past_due => Ok(SubmissionStatus::Late),
        _ => Ok(SubmissionStatus::Submitted),
    }
}

pub fn status_after_draft(current: Option<SubmissionStatus>) -> StoreResult<SubmissionStatus> {
    match current {
        None | Some(SubmissionStatus::Draft) => Ok(SubmissionStatus::Draft),
        Some(other) => Err(invalid_state(other, "save a draft over")),
    }
}

pub fn validate_grade(grade: f64) -> StoreResult<()> {
    if !grade.is_finite() || grade < 0.0 {
        return Err(StoreError::new("bad_params", "grade must be a finite number >= 0")
            .with_details(json!({ "grade": grade })));
    }
    Ok(())
}

fn load_assignment(store: &SqliteStore<'_>, assignment_id: &str) -> StoreResult<Assignment> {
    store
        .get_assignment(assignment_id)?
        .ok_or_else(|| StoreError::not_found("assignment"))
}

fn require_enrolled(
    store: &SqliteStore<'_>,
    student_id: &str,
    class_id: &str,
    status: Option<EnrollmentStatus>,
) -> StoreResult<()> {
    let rows = store.read_enrollments(&EnrollmentFilter {
        student_id: Some(student_id.to_string()),
        class_ids: Some(vec![class_id.to_string()]),
        status,
    })?;
    if rows.is_empty() {
        return Err(StoreError::forbidden("student is not enrolled in this class"));
    }
    Ok(())
}

fn fresh_submission(assignment_id: &str, student_id: &str, now: &str) -> Submission {
    Submission {
        id: Uuid::new_v4().to_string(),
        assignment_id: assignment_id.to_string(),
        student_id: student_id.to_string(),
        submission_text: None,
        attachment_url: None,
        status: SubmissionStatus::Draft,
        grade: None,
        feedback: None,
        submitted_at: None,
        graded_by: None,
        graded_at: None,
        updated_at: now.to_string(),
    }
}

pub fn save_draft(
    store: &SqliteStore<'_>,
    session: &Session,
    assignment_id: &str,
    work: &WorkInput,
    now: DateTime<Utc>,
) -> StoreResult<Submission> {
    session.require_role(&[Role::Student])?;
    let assignment = load_assignment(store, assignment_id)?;
    require_enrolled(store, session.user_id(), &assignment.class_id, Some(EnrollmentStatus::Active))?;

    let now_s = format_ts(now);
    let existing = store.find_submission(assignment_id, session.user_id())?;
    let status = status_after_draft(existing.as_ref().map(|s| s.status))?;
    let mut row = existing.unwrap_or_else(|| fresh_submission(assignment_id, session.user_id(), &now_s));
    row.status = status;
    row.submission_text = work.submission_text.clone();
    row.attachment_url = work.attachment_url.clone();
    row.updated_at = now_s;
    store.save_submission(&row)
}

pub fn submit(
    store: &SqliteStore<'_>,
    session: &Session,
    assignment_id: &str,
    work: &WorkInput,
    now: DateTime<Utc>,
) -> StoreResult<Submission> {
    session.require_role(&[Role::Student])?;
    let assignment = load_assignment(store, assignment_id)?;
    require_enrolled(store, session.user_id(), &assignment.class_id, Some(EnrollmentStatus::Active))?;

    let past_due = assignment
        .due_date
        .as_deref()
        .and_then(parse_due_date)
        .map(|due| now > due)
        .unwrap_or(false);
    let now_s = format_ts(now);
    let existing = store.find_submission(assignment_id, session.user_id())?;
    let status = status_after_submit(existing.as_ref().map(|s| s.status), past_due)?;

    let mut row = existing.unwrap_or_else(|| fresh_submission(assignment_id, session.user_id(), &now_s));
    row.status = status;
    if work.submission_text.is_some() {
        row.submission_text = work.submission_text.clone();
    }
    if work.attachment_url.is_some() {
        row.attachment_url = work.attachment_url.clone();
    }
    row.submitted_at = Some(now_s.clone());
    row.updated_at = now_s;
    let saved = store.save_submission(&row)?;
    tracing::info!(
        assignment_id,
        student_id = session.user_id(),
        status = saved.status.as_str(),
        "submission received"
    );
    Ok(saved)
}

fn apply_grade(
    store: &SqliteStore<'_>,
    grader: &Session,
    assignment: &Assignment,
    mut row: Submission,
    input: &GradeInput,
    now: DateTime<Utc>,
) -> StoreResult<(Submission, ProgressRow)> {
    validate_grade(input.grade)?;
    let now_s = format_ts(now);
    row.status = SubmissionStatus::Graded;
    row.grade = Some(input.grade);
    row.feedback = input.feedback.clone();
    row.graded_by = Some(grader.user_id().to_string());
    row.graded_at = Some(now_s.clone());
    row.updated_at = now_s.clone();
    let saved = store.save_submission(&row)?;
    let progress =
        progress::recompute_student_progress(store, &saved.student_id, &assignment.class_id, &now_s)?;
    tracing::info!(
        submission_id = %saved.id,
        graded_by = grader.user_id(),
        grade = input.grade,
        "submission graded"
    );
    Ok((saved, progress))
}

/// Grades an existing submission from any state. Re-grading overwrites
/// grade, feedback and the grader stamp.
pub fn grade_submission(
    store: &SqliteStore<'_>,
    grader: &Session,
    submission_id: &str,
    input: &GradeInput,
    now: DateTime<Utc>,
) -> StoreResult<(Submission, ProgressRow)> {
    let Some(row) = store.get_submission(submission_id)? else {
        return Err(StoreError::not_found("submission"));
    };
    let assignment = load_assignment(store, &row.assignment_id)?;
    grader.require_class_owner(store, &assignment.class_id)?;
    apply_grade(store, grader, &assignment, row, input, now)
}

/// Direct score entry keyed on (assignment, student); creates the row when the
/// student never submitted.
pub fn record_score(
    store: &SqliteStore<'_>,
    grader: &Session,
    assignment_id: &str,
    student_id: &str,
    input: &GradeInput,
    now: DateTime<Utc>,
) -> StoreResult<(Submission, ProgressRow)> {
    let assignment = load_assignment(store, assignment_id)?;
    grader.require_class_owner(store, &assignment.class_id)?;
    require_enrolled(store, student_id, &assignment.class_id, None)?;
    let row = match store.find_submission(assignment_id, student_id)? {
        Some(row) => row,
        None => fresh_submission(assignment_id, student_id, &format_ts(now)),
    };
    apply_grade(store, grader, &assignment, row, input, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_transitions() {
        assert_eq!(status_after_submit(None, false).expect("new"), SubmissionStatus::Submitted);
        assert_eq!(
            status_after_submit(Some(SubmissionStatus::Draft), true).expect("late"),
            SubmissionStatus::Late
        );
        assert_eq!(
            status_after_submit(Some(SubmissionStatus::Submitted), false).expect("resubmit"),
            SubmissionStatus::Submitted
        );
        let e = status_after_submit(Some(SubmissionStatus::Graded), false).expect_err("terminal");
        assert_eq!(e.code, "invalid_state");
    }

    #[test]
    fn drafts_only_before_submission() {
        assert!(status_after_draft(None).is_ok());
        assert!(status_after_draft(Some(SubmissionStatus::Draft)).is_ok());
        for s in [SubmissionStatus::Submitted, SubmissionStatus::Late, SubmissionStatus::Graded] {
            assert_eq!(status_after_draft(Some(s)).expect_err("locked").code, "invalid_state");
        }
    }

    #[test]
    fn grades_must_be_finite_and_non_negative() {
        assert!(validate_grade(0.0).is_ok());
        assert!(validate_grade(120.0).is_ok());
        assert!(validate_grade(-1.0).is_err());
        assert!(validate_grade(f64::NAN).is_err());
        assert!(validate_grade(f64::INFINITY).is_err());
    }
}
