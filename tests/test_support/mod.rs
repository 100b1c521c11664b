#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running `classroomd` with its pipes. Killed on drop.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .env_remove("CLASSROOMD_WORKSPACE")
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 1,
    }
}

/// Spawns a sidecar with a fresh workspace already selected.
pub fn spawn_with_workspace(prefix: &str) -> Sidecar {
    let mut sc = spawn_sidecar();
    let ws = temp_dir(prefix);
    sc.request_ok("workspace.select", json!({ "path": ws.to_string_lossy() }));
    sc
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id.to_string();
        self.next_id += 1;
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Returns the error code of a request that must fail.
    pub fn request_err(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn create_user(&mut self, email: &str, name: &str, role: &str) -> String {
        let res = self.request_ok(
            "users.create",
            json!({ "email": email, "name": name, "role": role }),
        );
        res["user"]["id"].as_str().expect("user id").to_string()
    }

    pub fn sign_in(&mut self, user_id: &str) {
        self.request_ok("session.open", json!({ "userId": user_id }));
    }

    /// Creates a class owned by the signed-in teacher.
    pub fn create_class(&mut self, name: &str) -> String {
        let res = self.request_ok(
            "classes.create",
            json!({ "name": name, "subject": "General", "academicYear": "2025-2026" }),
        );
        res["class"]["id"].as_str().expect("class id").to_string()
    }

    pub fn create_assignment(
        &mut self,
        class_id: &str,
        title: &str,
        due_date: Option<&str>,
        total_points: f64,
    ) -> String {
        let res = self.request_ok(
            "assignments.create",
            json!({
                "classId": class_id,
                "title": title,
                "dueDate": due_date,
                "totalPoints": total_points,
            }),
        );
        res["assignment"]["id"].as_str().expect("assignment id").to_string()
    }

    pub fn enroll(&mut self, class_id: &str, student_id: &str) {
        self.request_ok(
            "enrollments.enroll",
            json!({ "classId": class_id, "studentId": student_id }),
        );
    }

    pub fn record_score(&mut self, assignment_id: &str, student_id: &str, grade: f64) -> Value {
        self.request_ok(
            "scores.upsert",
            json!({ "assignmentId": assignment_id, "studentId": student_id, "grade": grade }),
        )
    }
}
