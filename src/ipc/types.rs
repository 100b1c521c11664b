use std::path::PathBuf;

use crate::session::SessionManager;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            sessions: SessionManager::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
