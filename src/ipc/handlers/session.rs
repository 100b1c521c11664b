use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{SqliteStore, StoreResult};
use crate::timefmt::now_ts;
use serde_json::{json, Value};

fn session_open(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let user_id = required_str(&req.params, "userId")?;
    let conn = db_conn(state.db.as_ref())?;
    let store = SqliteStore::new(conn);
    let session = state.sessions.open(&store, &user_id, &now_ts())?;
    Ok(json!({ "session": session }))
}

fn session_get(state: &mut AppState, _req: &Request) -> StoreResult<Value> {
    Ok(json!({ "session": state.sessions.current() }))
}

fn session_close(state: &mut AppState, _req: &Request) -> StoreResult<Value> {
    Ok(json!({ "closed": state.sessions.close() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "session.open" => session_open(state, req),
        "session.get" => session_get(state, req),
        "session.close" => session_close(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
