use super::derive;
use super::ValidationError;
use crate::model::{AttendanceStatus, Tab};
use crate::store::Snapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Editing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPatch {
    pub date: Option<String>,
    pub content: Option<String>,
    pub activities: Option<String>,
}

impl FormPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.content.is_none() && self.activities.is_none()
    }
}

/// Transient state of one diary entry being written.
///
/// The roll-call always holds exactly one status per student on the roster
/// of the selected class. Re-selecting the class, or a store change that
/// alters that roster, resets every student to present and drops manual
/// overrides.
#[derive(Debug, Clone)]
pub struct DiarySession {
    class_id: Option<String>,
    date: String,
    content: String,
    activities: String,
    roll_call: HashMap<String, AttendanceStatus>,
    roster_ids: Vec<String>,
    tab: Tab,
    phase: Phase,
}

impl DiarySession {
    pub fn new(today: NaiveDate, tab: Tab) -> Self {
        Self {
            class_id: None,
            date: today.format("%Y-%m-%d").to_string(),
            content: String::new(),
            activities: String::new(),
            roll_call: HashMap::new(),
            roster_ids: Vec::new(),
            tab,
            phase: Phase::Idle,
        }
    }

    pub fn class_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn activities(&self) -> &str {
        &self.activities
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn roll_call(&self) -> &HashMap<String, AttendanceStatus> {
        &self.roll_call
    }

    /// Missing entries read as present.
    pub fn status_of(&self, student_id: &str) -> AttendanceStatus {
        self.roll_call
            .get(student_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn select_class(&mut self, class_id: &str, snapshot: &Snapshot) -> Result<(), ValidationError> {
        if snapshot.class(class_id).is_none() {
            return Err(ValidationError::UnknownClass(class_id.to_string()));
        }
        self.class_id = Some(class_id.to_string());
        self.reset_roll_call(snapshot);
        Ok(())
    }

    /// Re-derives the roster after a store change. Returns true when the
    /// roster moved and the roll-call was reset.
    pub fn sync(&mut self, snapshot: &Snapshot) -> bool {
        let Some(class_id) = self.class_id.as_deref() else {
            return false;
        };
        let unchanged = derive::roster(&snapshot.students, class_id)
            .iter()
            .map(|s| s.id.as_str())
            .eq(self.roster_ids.iter().map(|s| s.as_str()));
        if unchanged {
            return false;
        }
        self.reset_roll_call(snapshot);
        true
    }

    fn reset_roll_call(&mut self, snapshot: &Snapshot) {
        let Some(class_id) = self.class_id.as_deref() else {
            return;
        };
        let roster = derive::roster(&snapshot.students, class_id);
        self.roster_ids = roster.iter().map(|s| s.id.clone()).collect();
        self.roll_call = self
            .roster_ids
            .iter()
            .map(|id| (id.clone(), AttendanceStatus::Present))
            .collect();
        debug!(class_id = %class_id, students = self.roster_ids.len(), "roll-call reset");
    }

    pub fn apply(&mut self, patch: FormPatch) {
        if patch.is_empty() {
            return;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(activities) = patch.activities {
            self.activities = activities;
        }
        self.phase = Phase::Editing;
    }

    pub fn set_attendance(
        &mut self,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), ValidationError> {
        match self.roll_call.get_mut(student_id) {
            Some(slot) => {
                *slot = status;
                self.phase = Phase::Editing;
                Ok(())
            }
            None => Err(ValidationError::UnknownStudent(student_id.to_string())),
        }
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Post-commit reset. Date and class stay for the next entry.
    pub fn finish_commit(&mut self) {
        self.content.clear();
        self.activities.clear();
        self.tab = Tab::History;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassRecord, StudentRecord};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("date")
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            classes: vec![
                ClassRecord { id: "c1".into(), name: "C1".into() },
                ClassRecord { id: "c2".into(), name: "C2".into() },
            ],
            students: vec![
                StudentRecord { id: "s1".into(), class_id: "c1".into(), name: "S1".into() },
                StudentRecord { id: "s2".into(), class_id: "c1".into(), name: "S2".into() },
                StudentRecord { id: "s9".into(), class_id: "c2".into(), name: "S9".into() },
            ],
            ..Snapshot::default()
        }
    }

    #[test]
    fn select_class_marks_whole_roster_present() {
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snapshot()).expect("select");
        assert_eq!(session.roll_call().len(), 2);
        assert!(session
            .roll_call()
            .values()
            .all(|s| *s == AttendanceStatus::Present));
        assert!(!session.roll_call().contains_key("s9"));
    }

    #[test]
    fn selecting_unknown_class_changes_nothing() {
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snapshot()).expect("select");
        let err = session.select_class("nope", &snapshot()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownClass("nope".into()));
        assert_eq!(session.class_id(), Some("c1"));
        assert_eq!(session.roll_call().len(), 2);
    }

    #[test]
    fn set_attendance_touches_only_one_student() {
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snapshot()).expect("select");
        session
            .set_attendance("s2", AttendanceStatus::Absent)
            .expect("set");
        assert_eq!(session.status_of("s2"), AttendanceStatus::Absent);
        assert_eq!(session.status_of("s1"), AttendanceStatus::Present);
        assert_eq!(session.phase(), Phase::Editing);

        session.set_attendance("s2", AttendanceStatus::Late).expect("set");
        assert_eq!(session.status_of("s2"), AttendanceStatus::Late);
        assert_eq!(session.roll_call().len(), 2);
    }

    #[test]
    fn off_roster_student_is_rejected() {
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snapshot()).expect("select");
        assert!(session.set_attendance("s9", AttendanceStatus::Late).is_err());
        assert!(!session.roll_call().contains_key("s9"));
    }

    #[test]
    fn roster_change_resets_overrides_but_other_changes_do_not() {
        let mut snap = snapshot();
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snap).expect("select");
        session.set_attendance("s1", AttendanceStatus::Late).expect("set");

        // A student joining another class leaves this roster alone.
        snap.students.push(StudentRecord {
            id: "s10".into(),
            class_id: "c2".into(),
            name: "S10".into(),
        });
        assert!(!session.sync(&snap));
        assert_eq!(session.status_of("s1"), AttendanceStatus::Late);

        snap.students.push(StudentRecord {
            id: "s3".into(),
            class_id: "c1".into(),
            name: "S3".into(),
        });
        assert!(session.sync(&snap));
        assert_eq!(session.roll_call().len(), 3);
        assert_eq!(session.status_of("s1"), AttendanceStatus::Present);
    }

    #[test]
    fn finish_commit_keeps_date_and_class() {
        let mut session = DiarySession::new(today(), Tab::Register);
        session.select_class("c1", &snapshot()).expect("select");
        session.apply(FormPatch {
            date: Some("2024-03-04".into()),
            content: Some("Fractions".into()),
            activities: Some("Worksheet".into()),
        });
        session.finish_commit();
        assert_eq!(session.content(), "");
        assert_eq!(session.activities(), "");
        assert_eq!(session.date(), "2024-03-04");
        assert_eq!(session.class_id(), Some("c1"));
        assert_eq!(session.tab(), Tab::History);
        assert_eq!(session.phase(), Phase::Idle);
    }
}
