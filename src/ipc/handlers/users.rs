use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, optional_enum, optional_str, patch_str, required_enum, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store::{ClassroomStore, NewUser, SqliteStore, StoreError, StoreResult, UserPatch};
use crate::timefmt::now_ts;
use serde_json::{json, Value};

/// Sign-up. Needs no session: this is how the first profiles get created.
fn users_create(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let email = required_str(&req.params, "email")?.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(StoreError::new("bad_params", "email must contain @")
            .with_details(json!({ "param": "email" })));
    }
    let name = required_str(&req.params, "name")?.trim().to_string();
    let role = required_enum(&req.params, "role", Role::parse)?;
    let class_id = optional_str(&req.params, "classId")?;

    let store = SqliteStore::new(conn);
    if store.get_user_by_email(&email)?.is_some() {
        return Err(StoreError::new("bad_params", "email already registered")
            .with_details(json!({ "param": "email" })));
    }
    let user = store.insert_user(
        &NewUser {
            email,
            name,
            role,
            class_id,
        },
        &now_ts(),
    )?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(json!({ "user": user }))
}

fn users_get(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    state.sessions.require()?;
    let user_id = required_str(&req.params, "userId")?;
    let user = SqliteStore::new(conn).get_user(&user_id)?;
    Ok(json!({ "user": user }))
}

fn users_list(state: &mut AppState, _req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    state.sessions.require()?.require_role(&[Role::HeadTeacher])?;
    let users = SqliteStore::new(conn).list_users(None)?;
    Ok(json!({ "users": users }))
}

fn users_by_role(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    state
        .sessions
        .require()?
        .require_role(&[Role::Teacher, Role::HeadTeacher])?;
    let role = required_enum(&req.params, "role", Role::parse)?;
    let users = SqliteStore::new(conn).list_users(Some(role))?;
    Ok(json!({ "users": users }))
}

/// Students whose profile names this class as their home class.
fn users_students_by_class(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    session.require_class_access(&store, &class_id)?;
    let students = store.students_by_class(&class_id)?;
    Ok(json!({ "students": students }))
}

fn users_update(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let user_id = required_str(&req.params, "userId")?;
    session.require_self_or_head(&user_id)?;

    let role = optional_enum(&req.params, "role", Role::parse)?;
    if role.is_some() {
        session.require_role(&[Role::HeadTeacher])?;
    }
    let email = optional_str(&req.params, "email")?.map(|e| e.trim().to_ascii_lowercase());
    if let Some(e) = &email {
        if !e.contains('@') {
            return Err(StoreError::new("bad_params", "email must contain @")
                .with_details(json!({ "param": "email" })));
        }
    }
    let patch = UserPatch {
        email,
        name: optional_str(&req.params, "name")?,
        role,
        class_id: patch_str(&req.params, "classId")?,
    };
    let is_self = session.user_id() == user_id;

    let store = SqliteStore::new(conn);
    let Some(user) = store.update_user(&user_id, &patch, &now_ts())? else {
        return Err(StoreError::not_found("user"));
    };
    if is_self {
        state.sessions.refresh(&store)?;
    }
    Ok(json!({ "user": user }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "users.create" => users_create(state, req),
        "users.get" => users_get(state, req),
        "users.list" => users_list(state, req),
        "users.byRole" => users_by_role(state, req),
        "users.studentsByClass" => users_students_by_class(state, req),
        "users.update" => users_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
