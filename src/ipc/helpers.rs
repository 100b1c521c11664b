use crate::store::{SqliteStore, StoreError, StoreResult};
use crate::timefmt::{format_ts, parse_due_date, parse_instant};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};

fn bad_params(message: impl Into<String>, key: &str) -> StoreError {
    StoreError::new("bad_params", message).with_details(json!({ "param": key }))
}

pub fn db_conn(db: Option<&Connection>) -> StoreResult<&Connection> {
    db.ok_or_else(|| StoreError::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &Value, key: &str) -> StoreResult<String> {
    match optional_str(params, key)? {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(bad_params(format!("{key} must not be empty"), key)),
        None => Err(bad_params(format!("missing {key}"), key)),
    }
}

/// Absent and `null` both read as `None`.
pub fn optional_str(params: &Value, key: &str) -> StoreResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(bad_params(format!("{key} must be a string"), key)),
    }
}

/// Patch semantics: absent leaves the column alone, `null` clears it.
pub fn patch_str(params: &Value, key: &str) -> StoreResult<Option<Option<String>>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(bad_params(format!("{key} must be a string or null"), key)),
    }
}

pub fn optional_f64(params: &Value, key: &str) -> StoreResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|x| x.is_finite())
            .map(Some)
            .ok_or_else(|| bad_params(format!("{key} must be a number"), key)),
    }
}

pub fn required_f64(params: &Value, key: &str) -> StoreResult<f64> {
    optional_f64(params, key)?.ok_or_else(|| bad_params(format!("missing {key}"), key))
}

/// Parses an enum-valued param through the type's own `parse`.
pub fn optional_enum<T>(
    params: &Value,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> StoreResult<Option<T>> {
    let Some(raw) = optional_str(params, key)? else {
        return Ok(None);
    };
    parse(&raw)
        .map(Some)
        .ok_or_else(|| bad_params(format!("invalid {key}: {raw}"), key))
}

pub fn required_enum<T>(params: &Value, key: &str, parse: fn(&str) -> Option<T>) -> StoreResult<T> {
    optional_enum(params, key, parse)?.ok_or_else(|| bad_params(format!("missing {key}"), key))
}

/// Due dates accept RFC 3339 or a bare `YYYY-MM-DD` and are stored
/// normalised to UTC so they compare as text.
pub fn patch_due_date(params: &Value) -> StoreResult<Option<Option<String>>> {
    match patch_str(params, "dueDate")? {
        Some(Some(raw)) => match parse_due_date(&raw) {
            Some(due) => Ok(Some(Some(format_ts(due)))),
            None => Err(bad_params(format!("invalid dueDate: {raw}"), "dueDate")),
        },
        other => Ok(other),
    }
}

/// Evaluation instant for time-relative queries; defaults to the wall clock.
pub fn now_param(params: &Value) -> StoreResult<DateTime<Utc>> {
    match optional_str(params, "now")? {
        None => Ok(Utc::now()),
        Some(raw) => {
            parse_instant(&raw).ok_or_else(|| bad_params(format!("invalid now: {raw}"), "now"))
        }
    }
}

/// Runs `f` against a store bound to one transaction. Any error drops the
/// transaction, which rolls it back.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&SqliteStore<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::new("db_tx_failed", e.to_string()))?;
    let out = f(&SqliteStore::new(&tx))?;
    tx.commit()
        .map_err(|e| StoreError::new("db_tx_failed", e.to_string()))?;
    Ok(out)
}
