use super::types::Request;
use crate::store::{StoreError, StoreResult};
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: StoreError) -> serde_json::Value {
    err(id, &e.code, e.message, e.details)
}

/// Wraps a handler outcome in the response envelope.
pub fn respond(req: &Request, result: StoreResult<serde_json::Value>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(id = %req.id, method = %req.method, code = %e.code, "{}", e.message);
            store_err(&req.id, e)
        }
    }
}
