use crate::model::{Attendance, AttendanceStatus, ClassLog, ClassRecord, StudentRecord};
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "classdiary.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_logs(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            content TEXT NOT NULL,
            activities TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_logs_class ON class_logs(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendances(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            lesson_number INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'present',
            justification TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendances_class_date ON attendances(class_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendances_student ON attendances(student_id)",
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

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s).with_context(|| {
            format!("settings value for {} is not valid json", key)
        })?)),
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

fn parse_date_column(idx: usize, raw: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_status_column(idx: usize, raw: String) -> rusqlite::Result<AttendanceStatus> {
    raw.parse::<AttendanceStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e),
        )
    })
}

// Insertion order (rowid) is the order every collection is exposed in.
pub fn load_classes(conn: &Connection) -> anyhow::Result<Vec<ClassRecord>> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassRecord {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_students(conn: &Connection) -> anyhow::Result<Vec<StudentRecord>> {
    let mut stmt = conn.prepare("SELECT id, class_id, name FROM students ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(StudentRecord {
                id: r.get(0)?,
                class_id: r.get(1)?,
                name: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_class_logs(conn: &Connection) -> anyhow::Result<Vec<ClassLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, date, content, activities, created_at
         FROM class_logs
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassLog {
                id: r.get(0)?,
                class_id: r.get(1)?,
                date: parse_date_column(2, r.get(2)?)?,
                content: r.get(3)?,
                activities: r.get(4)?,
                created_at: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_attendances(conn: &Connection) -> anyhow::Result<Vec<Attendance>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, class_id, date, lesson_number, status, justification
         FROM attendances
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Attendance {
                id: r.get(0)?,
                student_id: r.get(1)?,
                class_id: r.get(2)?,
                date: parse_date_column(3, r.get(3)?)?,
                lesson_number: r.get(4)?,
                status: parse_status_column(5, r.get(5)?)?,
                justification: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_class(conn: &Connection, class: &ClassRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)",
        (&class.id, &class.name),
    )?;
    Ok(())
}

pub fn insert_student(conn: &Connection, student: &StudentRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(id, class_id, name) VALUES(?, ?, ?)",
        (&student.id, &student.class_id, &student.name),
    )?;
    Ok(())
}

pub fn upsert_class_log(conn: &Connection, log: &ClassLog) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO class_logs(id, class_id, date, content, activities, created_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           class_id = excluded.class_id,
           date = excluded.date,
           content = excluded.content,
           activities = excluded.activities,
           created_at = excluded.created_at",
        params![
            log.id,
            log.class_id,
            log.date.format("%Y-%m-%d").to_string(),
            log.content,
            log.activities,
            log.created_at
        ],
    )
    .with_context(|| format!("failed to save class log {}", log.id))?;
    Ok(())
}

pub fn upsert_attendance(conn: &Connection, record: &Attendance) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendances(id, student_id, class_id, date, lesson_number, status, justification)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           student_id = excluded.student_id,
           class_id = excluded.class_id,
           date = excluded.date,
           lesson_number = excluded.lesson_number,
           status = excluded.status,
           justification = excluded.justification",
        params![
            record.id,
            record.student_id,
            record.class_id,
            record.date.format("%Y-%m-%d").to_string(),
            record.lesson_number,
            record.status.as_str(),
            record.justification
        ],
    )
    .with_context(|| format!("failed to save attendance {}", record.id))?;
    Ok(())
}

pub fn student_in_class(conn: &Connection, class_id: &str, student_id: &str) -> anyhow::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM students WHERE class_id = ? AND id = ?",
            (class_id, student_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}
