use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub class_id: String,
    pub name: String,
}

/// One lesson-day entry for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassLog {
    pub id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub activities: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub lesson_number: i64,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl Attendance {
    /// Attendance ids are keyed by student, date and lesson, so a second
    /// roll-call for the same lesson replaces the first one at the store.
    /// Lesson 1 keeps the bare `att-{student}-{date}` form.
    pub fn record_id(student_id: &str, date: NaiveDate, lesson_number: i64) -> String {
        let day = date.format("%Y-%m-%d");
        if lesson_number == 1 {
            format!("att-{}-{}", student_id, day)
        } else {
            format!("att-{}-{}-L{}", student_id, day, lesson_number)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    // Accepts the older Portuguese roll-call codes and single-letter codes too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "presente" | "p" => Ok(Self::Present),
            "absent" | "falta" | "a" => Ok(Self::Absent),
            "late" | "atraso" | "l" => Ok(Self::Late),
            other => Err(format!(
                "unknown attendance status '{}' (expected present, absent or late)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Register,
    History,
}

impl Tab {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "register" => Some(Self::Register),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}
