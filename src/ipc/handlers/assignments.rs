use crate::calc::DEFAULT_MAX_POINTS;
use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, optional_f64, optional_str, patch_due_date, patch_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{
    AssignmentFilter, AssignmentPatch, ClassroomStore, NewAssignment, SqliteStore, StoreError,
    StoreResult,
};
use crate::timefmt::now_ts;
use serde_json::{json, Value};

const DEFAULT_ASSIGNMENT_TYPE: &str = "homework";

/// Zero is accepted and later scored against the default maximum.
fn total_points(params: &Value) -> StoreResult<Option<f64>> {
    let v = optional_f64(params, "totalPoints")?;
    if let Some(p) = v {
        if p < 0.0 {
            return Err(StoreError::new("bad_params", "totalPoints must be >= 0")
                .with_details(json!({ "param": "totalPoints" })));
        }
    }
    Ok(v)
}

fn assignments_create(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let title = required_str(&req.params, "title")?.trim().to_string();
    let due_date = patch_due_date(&req.params)?.flatten();
    let total_points = total_points(&req.params)?.unwrap_or(DEFAULT_MAX_POINTS);
    let assignment_type = optional_str(&req.params, "assignmentType")?
        .unwrap_or_else(|| DEFAULT_ASSIGNMENT_TYPE.to_string());

    let store = SqliteStore::new(conn);
    session.require_class_owner(&store, &class_id)?;
    let assignment = store.insert_assignment(
        &NewAssignment {
            class_id,
            title,
            description: optional_str(&req.params, "description")?,
            due_date,
            total_points,
            assignment_type,
        },
        &now_ts(),
    )?;
    tracing::info!(assignment_id = %assignment.id, class_id = %assignment.class_id, "assignment created");
    Ok(json!({ "assignment": assignment }))
}

fn assignments_update(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let assignment_id = required_str(&req.params, "assignmentId")?;
    let patch = AssignmentPatch {
        title: optional_str(&req.params, "title")?,
        description: patch_str(&req.params, "description")?,
        due_date: patch_due_date(&req.params)?,
        total_points: total_points(&req.params)?,
        assignment_type: optional_str(&req.params, "assignmentType")?,
    };

    let store = SqliteStore::new(conn);
    let Some(existing) = store.get_assignment(&assignment_id)? else {
        return Err(StoreError::not_found("assignment"));
    };
    session.require_class_owner(&store, &existing.class_id)?;
    let Some(assignment) = store.update_assignment(&assignment_id, &patch, &now_ts())? else {
        return Err(StoreError::not_found("assignment"));
    };
    Ok(json!({ "assignment": assignment }))
}

fn assignments_list(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    session.require_class_access(&store, &class_id)?;
    let assignments = store.read_assignments(&AssignmentFilter::for_class(&class_id))?;
    Ok(json!({ "assignments": assignments }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "assignments.create" => assignments_create(state, req),
        "assignments.update" => assignments_update(state, req),
        "assignments.list" => assignments_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
