use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, in_transaction, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::progress;
use crate::session::Session;
use crate::store::{ClassroomStore, SqliteStore, StoreError, StoreResult};
use crate::timefmt::now_ts;
use serde_json::{json, Value};

/// A student reads their own numbers; staff read students of classes they
/// can see.
fn require_student_view<S>(session: &Session, store: &S, student_id: &str, class_id: &str) -> StoreResult<()>
where
    S: ClassroomStore + ?Sized,
{
    if session.user_id() == student_id {
        return Ok(());
    }
    session.require_role(&[Role::Teacher, Role::HeadTeacher])?;
    session.require_class_access(store, class_id)
}

fn student_and_class(params: &Value) -> StoreResult<(String, String)> {
    Ok((required_str(params, "studentId")?, required_str(params, "classId")?))
}

fn progress_get(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let (student_id, class_id) = student_and_class(&req.params)?;
    let store = SqliteStore::new(conn);
    require_student_view(session, &store, &student_id, &class_id)?;
    let row = progress::student_progress(&store, &student_id, &class_id)?;
    Ok(json!({ "progress": row }))
}

fn progress_recompute(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let (student_id, class_id) = student_and_class(&req.params)?;
    let row = in_transaction(conn, |store| {
        require_student_view(session, store, &student_id, &class_id)?;
        progress::recompute_student_progress(store, &student_id, &class_id, &now_ts())
    })?;
    Ok(json!({ "progress": row }))
}

fn progress_recompute_class(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let rows = in_transaction(conn, |store| {
        session.require_class_owner(store, &class_id)?;
        progress::recompute_class_progress(store, &class_id, &now_ts())
    })?;
    Ok(json!({ "progress": rows }))
}

fn progress_ranking(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let (student_id, class_id) = student_and_class(&req.params)?;
    let store = SqliteStore::new(conn);
    require_student_view(session, &store, &student_id, &class_id)?;
    let ranking = progress::student_ranking(&store, &student_id, &class_id)?;
    Ok(json!({ "ranking": ranking }))
}

fn progress_class_averages(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    session.require_class_owner(&store, &class_id)?;
    let averages = progress::class_averages(&store, &class_id)?;
    Ok(json!({ "averages": averages }))
}

fn progress_assignment_average(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let store = SqliteStore::new(conn);
    let Some(assignment) = store.get_assignment(&assignment_id)? else {
        return Err(StoreError::not_found("assignment"));
    };
    session.require_class_access(&store, &assignment.class_id)?;
    let average = progress::assignment_average(&store, &assignment_id)?;
    Ok(json!({ "average": average }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "progress.get" => progress_get(state, req),
        "progress.recompute" => progress_recompute(state, req),
        "progress.recomputeClass" => progress_recompute_class(state, req),
        "progress.ranking" => progress_ranking(state, req),
        "progress.classAverages" => progress_class_averages(state, req),
        "progress.assignmentAverage" => progress_assignment_average(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
