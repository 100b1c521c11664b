use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, optional_enum, optional_str, required_enum, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{EnrollmentStatus, Role};
use crate::store::{ClassroomStore, EnrollmentFilter, SqliteStore, StoreError, StoreResult};
use crate::timefmt::now_ts;
use serde_json::{json, Value};

fn enrollments_enroll(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let status = optional_enum(&req.params, "status", EnrollmentStatus::parse)?
        .unwrap_or(EnrollmentStatus::Active);

    let store = SqliteStore::new(conn);
    session.require_class_owner(&store, &class_id)?;
    match store.get_user(&student_id)? {
        Some(u) if u.role == Role::Student => {}
        Some(_) => {
            return Err(StoreError::new("bad_params", "only students can be enrolled")
                .with_details(json!({ "param": "studentId" })))
        }
        None => return Err(StoreError::not_found("student")),
    }
    let enrollment = store.upsert_enrollment(&class_id, &student_id, status, &now_ts())?;
    tracing::info!(class_id = %class_id, student_id = %student_id, status = status.as_str(), "enrollment saved");
    Ok(json!({ "enrollment": enrollment }))
}

fn enrollments_set_status(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let status = required_enum(&req.params, "status", EnrollmentStatus::parse)?;

    let store = SqliteStore::new(conn);
    session.require_class_owner(&store, &class_id)?;
    if !store.set_enrollment_status(&class_id, &student_id, status)? {
        return Err(StoreError::not_found("enrollment"));
    }
    Ok(json!({ "ok": true, "status": status }))
}

/// Lists by class (anyone with access to the class) or by student (the
/// student themself or staff).
fn enrollments_list(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = optional_str(&req.params, "classId")?;
    let student_id = optional_str(&req.params, "studentId")?;
    let status = optional_enum(&req.params, "status", EnrollmentStatus::parse)?;
    let store = SqliteStore::new(conn);

    if let Some(cid) = &class_id {
        session.require_class_access(&store, cid)?;
    }
    match &student_id {
        Some(sid) if !session.is_staff() => session.require_self_or_head(sid)?,
        Some(_) => {}
        None if class_id.is_none() => {
            return Err(StoreError::new("bad_params", "classId or studentId is required"))
        }
        None => {}
    }

    let enrollments = store.read_enrollments(&EnrollmentFilter {
        student_id,
        class_ids: class_id.map(|c| vec![c]),
        status,
    })?;
    Ok(json!({ "enrollments": enrollments }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "enrollments.enroll" => enrollments_enroll(state, req),
        "enrollments.setStatus" => enrollments_set_status(state, req),
        "enrollments.list" => enrollments_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
