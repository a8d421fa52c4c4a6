use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("school.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates every table the sidecar knows about. Column names follow the
/// desktop front end (camelCase foreign keys), which reads rows verbatim.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_room(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            gradeId INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(gradeId) REFERENCES grade(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_room_grade ON class_room(gradeId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS T_student(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lastName TEXT NOT NULL,
            firstName TEXT NOT NULL,
            birthDate TEXT,
            gradeId INTEGER NOT NULL,
            classRoomId INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY(gradeId) REFERENCES grade(id),
            FOREIGN KEY(classRoomId) REFERENCES class_room(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_grade ON T_student(gradeId)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_class_room ON T_student(classRoomId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS professor(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lastName TEXT NOT NULL,
            firstName TEXT NOT NULL,
            email TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            coefficient REAL NOT NULL DEFAULT 1,
            gradeId INTEGER NOT NULL,
            professorId INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY(gradeId) REFERENCES grade(id),
            FOREIGN KEY(professorId) REFERENCES professor(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_grade ON course(gradeId)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_professor ON course(professorId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS note(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value REAL NOT NULL,
            studentId INTEGER NOT NULL,
            courseId INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(studentId) REFERENCES T_student(id),
            FOREIGN KEY(courseId) REFERENCES course(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_note_student ON note(studentId)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_note_course ON note(courseId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payment(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            paidOn TEXT,
            studentId INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(studentId) REFERENCES T_student(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payment_student ON payment(studentId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scholarship(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            amount REAL NOT NULL,
            studentId INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(studentId) REFERENCES T_student(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scholarship_student ON scholarship(studentId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day TEXT NOT NULL,
            present INTEGER NOT NULL,
            studentId INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(studentId) REFERENCES T_student(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(studentId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS homework(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            dueOn TEXT,
            courseId INTEGER,
            classRoomId INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY(courseId) REFERENCES course(id),
            FOREIGN KEY(classRoomId) REFERENCES class_room(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_homework_course ON homework(courseId)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_homework_class_room ON homework(classRoomId)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
