use crate::dashboard;
use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, now_param, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{SqliteStore, StoreResult};
use serde_json::{json, Value};

fn dashboard_teacher(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let teacher_id =
        optional_str(&req.params, "teacherId")?.unwrap_or_else(|| session.user_id().to_string());
    let view = dashboard::compose_teacher_dashboard(&SqliteStore::new(conn), session, &teacher_id)?;
    Ok(json!(view))
}

fn dashboard_student(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let student_id =
        optional_str(&req.params, "studentId")?.unwrap_or_else(|| session.user_id().to_string());
    let now = now_param(&req.params)?;
    let view =
        dashboard::compose_student_dashboard(&SqliteStore::new(conn), session, &student_id, now)?;
    Ok(json!(view))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "dashboard.teacher" => dashboard_teacher(state, req),
        "dashboard.student" => dashboard_student(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
