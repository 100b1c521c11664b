mod calc;
mod config;
mod dashboard;
mod db;
mod grading;
mod ipc;
mod logging;
mod model;
mod progress;
mod session;
mod store;
mod timefmt;

use clap::Parser;
use session::SessionEvent;
use std::io::{self, BufRead, Write};

fn main() {
    dotenv::dotenv().ok();
    let config = config::Config::parse();
    logging::init_tracing(&config);

    let mut state = ipc::AppState::new();
    if let Some(path) = config.workspace.as_deref() {
        // On failure the sidecar keeps running without a workspace.
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), "configured workspace not opened: {e:#}");
        }
    }

    let session_log = state.sessions.subscribe(|event| match event {
        SessionEvent::SignedIn(s) => {
            tracing::info!(user_id = s.user_id(), role = s.role().as_str(), "session opened")
        }
        SessionEvent::SignedOut { user_id } => tracing::info!(user_id = %user_id, "session closed"),
    });
    tracing::debug!(listeners = state.sessions.subscriber_count(), "ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                tracing::warn!("unparseable request: {e}");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    state.sessions.close();
    state.sessions.unsubscribe(session_log);
    tracing::info!("stdin closed, shutting down");
}
