use crate::grading::{self, GradeInput, WorkInput};
use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, in_transaction, optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Submission;
use crate::store::{ClassroomStore, SqliteStore, StoreError, StoreResult};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionWithStudent {
    #[serde(flatten)]
    submission: Submission,
    student_name: Option<String>,
}

fn work_input(params: &Value) -> StoreResult<WorkInput> {
    Ok(WorkInput {
        submission_text: optional_str(params, "submissionText")?,
        attachment_url: optional_str(params, "attachmentUrl")?,
    })
}

fn grade_input(params: &Value) -> StoreResult<GradeInput> {
    Ok(GradeInput {
        grade: required_f64(params, "grade")?,
        feedback: optional_str(params, "feedback")?,
    })
}

fn submissions_save_draft(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let work = work_input(&req.params)?;
    let submission = in_transaction(conn, |store| {
        grading::save_draft(store, session, &assignment_id, &work, Utc::now())
    })?;
    Ok(json!({ "submission": submission }))
}

fn submissions_submit(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let work = work_input(&req.params)?;
    let submission = in_transaction(conn, |store| {
        grading::submit(store, session, &assignment_id, &work, Utc::now())
    })?;
    Ok(json!({ "submission": submission }))
}

fn submissions_grade(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let submission_id = required_str(&req.params, "submissionId")?;
    let input = grade_input(&req.params)?;
    let (submission, progress) = in_transaction(conn, |store| {
        grading::grade_submission(store, session, &submission_id, &input, Utc::now())
    })?;
    Ok(json!({ "submission": submission, "progress": progress }))
}

/// Direct score entry by the class teacher, keyed on (assignment, student).
fn scores_upsert(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let input = grade_input(&req.params)?;
    let (submission, progress) = in_transaction(conn, |store| {
        grading::record_score(store, session, &assignment_id, &student_id, &input, Utc::now())
    })?;
    Ok(json!({ "submission": submission, "progress": progress }))
}

fn submissions_list_for_assignment(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let store = SqliteStore::new(conn);
    let Some(assignment) = store.get_assignment(&assignment_id)? else {
        return Err(StoreError::not_found("assignment"));
    };
    session.require_class_owner(&store, &assignment.class_id)?;

    let rows = store.submissions_for_assignment(&assignment_id)?;
    let ids: Vec<String> = rows.iter().map(|s| s.student_id.clone()).collect();
    let names: HashMap<String, String> = store
        .users_by_ids(&ids)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let submissions: Vec<SubmissionWithStudent> = rows
        .into_iter()
        .map(|submission| SubmissionWithStudent {
            student_name: names.get(&submission.student_id).cloned(),
            submission,
        })
        .collect();
    Ok(json!({ "submissions": submissions }))
}

fn submissions_list_for_student(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let student_id =
        optional_str(&req.params, "studentId")?.unwrap_or_else(|| session.user_id().to_string());
    if !session.is_staff() {
        session.require_self_or_head(&student_id)?;
    }
    let submissions = SqliteStore::new(conn).submissions_for_student(&student_id)?;
    Ok(json!({ "submissions": submissions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "submissions.saveDraft" => submissions_save_draft(state, req),
        "submissions.submit" => submissions_submit(state, req),
        "submissions.grade" => submissions_grade(state, req),
        "submissions.listForAssignment" => submissions_list_for_assignment(state, req),
        "submissions.listForStudent" => submissions_list_for_student(state, req),
        "scores.upsert" => scores_upsert(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
