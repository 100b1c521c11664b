use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "classroom.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            class_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            subject TEXT NOT NULL DEFAULT '',
            grade_level TEXT,
            academic_year TEXT NOT NULL DEFAULT '',
            teacher_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_enrollments(
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY(class_id, student_id),
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON class_enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT,
            total_points REAL NOT NULL DEFAULT 100,
            assignment_type TEXT NOT NULL DEFAULT 'homework',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class_due ON assignments(class_id, due_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            submission_text TEXT,
            attachment_url TEXT,
            status TEXT NOT NULL,
            grade REAL,
            feedback TEXT,
            submitted_at TEXT,
            graded_by TEXT,
            graded_at TEXT,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES users(id) ON DELETE CASCADE,
            UNIQUE(assignment_id, student_id)
        )",
        [],
    )?;
    ensure_submissions_attachment_url(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(assignment_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_progress(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            total_assignments INTEGER NOT NULL,
            completed_assignments INTEGER NOT NULL,
            average_score REAL NOT NULL,
            current_grade TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE,
            UNIQUE(student_id, class_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_progress_class ON student_progress(class_id)",
        [],
    )?;

    Ok(())
}

// Workspaces created before attachments were supported lack the column.
fn ensure_submissions_attachment_url(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "submissions", "attachment_url")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE submissions ADD COLUMN attachment_url TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "submissions", "attachment_url").expect("pragma"));
        assert!(table_has_column(&conn, "student_progress", "current_grade").expect("pragma"));
    }
}
