//! Class diary: lesson content plus a same-day roll-call for one class.

pub mod commit;
pub mod derive;
pub mod session;
pub mod view;

use crate::db;
use crate::model::Tab;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::warn;

pub const SETUP_KEY: &str = "setup.diary";
const LESSON_NUMBERS: RangeInclusive<i64> = 1..=12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select a class first")]
    NoClassSelected,
    #[error("lesson content must not be empty")]
    EmptyContent,
    #[error("date must be YYYY-MM-DD, got '{0}'")]
    InvalidDate(String),
    #[error("class not found: {0}")]
    UnknownClass(String),
    #[error("student is not on the current roster: {0}")]
    UnknownStudent(String),
    #[error("student {student_id} does not belong to class {class_id}")]
    StudentNotInClass {
        student_id: String,
        class_id: String,
    },
    #[error("{0}")]
    InvalidStatus(String),
}

impl ValidationError {
    /// Form field the error points at.
    pub fn field(&self) -> &'static str {
        match self {
            Self::NoClassSelected | Self::UnknownClass(_) => "classId",
            Self::EmptyContent => "content",
            Self::InvalidDate(_) => "date",
            Self::UnknownStudent(_) | Self::StudentNotInClass { .. } => "studentId",
            Self::InvalidStatus(_) => "status",
        }
    }
}

#[derive(Debug, Error)]
pub enum DiaryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store write failed: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiarySetup {
    pub lesson_number: i64,
    pub default_tab: Tab,
}

impl Default for DiarySetup {
    fn default() -> Self {
        Self {
            lesson_number: 1,
            default_tab: Tab::Register,
        }
    }
}

impl DiarySetup {
    /// Reads the stored setup. Stored fields that no longer validate keep
    /// their defaults.
    pub fn read(conn: &Connection) -> anyhow::Result<Self> {
        let mut setup = Self::default();
        if let Some(saved) = db::settings_get_json(conn, SETUP_KEY)? {
            if let Some(obj) = saved.as_object() {
                for (k, v) in obj {
                    let _ = setup.apply_field(k, v);
                }
            }
        }
        Ok(setup)
    }

    /// Like [`DiarySetup::read`], falling back to defaults when the settings
    /// table can't be read.
    pub fn load(conn: &Connection) -> Self {
        Self::read(conn).unwrap_or_else(|e| {
            warn!(error = %e, "diary setup unreadable, using defaults");
            Self::default()
        })
    }

    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            self.apply_field(k, v)?;
        }
        Ok(())
    }

    fn apply_field(&mut self, key: &str, v: &Value) -> Result<(), String> {
        match key {
            "lessonNumber" => {
                let n = v
                    .as_i64()
                    .ok_or_else(|| format!("{} must be integer", key))?;
                if !LESSON_NUMBERS.contains(&n) {
                    return Err(format!(
                        "{} must be in {}..={}",
                        key,
                        LESSON_NUMBERS.start(),
                        LESSON_NUMBERS.end()
                    ));
                }
                self.lesson_number = n;
            }
            "defaultTab" => {
                let raw = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
                self.default_tab = Tab::parse(raw)
                    .ok_or_else(|| "defaultTab must be one of: register, history".to_string())?;
            }
            _ => return Err(format!("unknown diary field: {}", key)),
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "lessonNumber": self.lesson_number,
            "defaultTab": self.default_tab,
        })
    }
}
