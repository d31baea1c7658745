use super::session::DiarySession;
use super::{derive, DiarySetup, ValidationError};
use crate::model::{Attendance, ClassLog};
use crate::store::Snapshot;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

/// One diary log plus the roll-call taken with it. Written as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub log: ClassLog,
    pub attendances: Vec<Attendance>,
}

pub fn parse_entry_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Validates the form and packages it. Pure: nothing is written.
pub fn build_entry(
    session: &DiarySession,
    snapshot: &Snapshot,
    setup: &DiarySetup,
    now: DateTime<Utc>,
) -> Result<DiaryEntry, ValidationError> {
    let Some(class_id) = session.class_id() else {
        return Err(ValidationError::NoClassSelected);
    };
    if session.content().trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let date = parse_entry_date(session.date())?;
    if snapshot.class(class_id).is_none() {
        return Err(ValidationError::UnknownClass(class_id.to_string()));
    }

    let log = ClassLog {
        id: Uuid::new_v4().to_string(),
        class_id: class_id.to_string(),
        date,
        content: session.content().to_string(),
        activities: session.activities().to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let attendances = derive::roster(&snapshot.students, class_id)
        .into_iter()
        .map(|student| Attendance {
            id: Attendance::record_id(&student.id, date, setup.lesson_number),
            student_id: student.id.clone(),
            class_id: class_id.to_string(),
            date,
            lesson_number: setup.lesson_number,
            status: session.status_of(&student.id),
            justification: None,
        })
        .collect();

    Ok(DiaryEntry { log, attendances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, ClassRecord, StudentRecord, Tab};
    use crate::diary::session::FormPatch;

    fn snapshot() -> Snapshot {
        Snapshot {
            classes: vec![ClassRecord { id: "c1".into(), name: "C1".into() }],
            students: vec![
                StudentRecord { id: "s1".into(), class_id: "c1".into(), name: "S1".into() },
                StudentRecord { id: "s2".into(), class_id: "c1".into(), name: "S2".into() },
            ],
            ..Snapshot::default()
        }
    }

    fn session() -> DiarySession {
        let today = NaiveDate::from_ymd_opt(2024, 2, 28).expect("date");
        let mut s = DiarySession::new(today, Tab::Register);
        s.select_class("c1", &snapshot()).expect("select");
        s
    }

    #[test]
    fn builds_log_and_roll_call_for_whole_roster() {
        let mut s = session();
        s.set_attendance("s2", AttendanceStatus::Absent).expect("set");
        s.apply(FormPatch {
            date: Some("2024-03-01".into()),
            content: Some("Intro to fractions".into()),
            activities: None,
        });

        let entry = build_entry(&s, &snapshot(), &DiarySetup::default(), Utc::now()).expect("entry");
        assert_eq!(entry.log.class_id, "c1");
        assert_eq!(entry.log.date.to_string(), "2024-03-01");
        assert_eq!(entry.log.content, "Intro to fractions");

        let rows: Vec<(&str, AttendanceStatus)> = entry
            .attendances
            .iter()
            .map(|a| (a.student_id.as_str(), a.status))
            .collect();
        assert_eq!(
            rows,
            vec![("s1", AttendanceStatus::Present), ("s2", AttendanceStatus::Absent)]
        );
        assert!(entry.attendances.iter().all(|a| a.lesson_number == 1));
        assert!(entry.attendances.iter().all(|a| a.justification.is_none()));
    }

    #[test]
    fn lesson_number_comes_from_setup() {
        let mut s = session();
        s.apply(FormPatch {
            content: Some("Lab".into()),
            ..FormPatch::default()
        });
        let setup = DiarySetup {
            lesson_number: 3,
            ..DiarySetup::default()
        };
        let entry = build_entry(&s, &snapshot(), &setup, Utc::now()).expect("entry");
        assert!(entry.attendances.iter().all(|a| a.lesson_number == 3));
    }

    #[test]
    fn rejects_missing_class_blank_content_and_bad_date() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 28).expect("date");
        let unselected = DiarySession::new(today, Tab::Register);
        assert_eq!(
            build_entry(&unselected, &snapshot(), &DiarySetup::default(), Utc::now()),
            Err(ValidationError::NoClassSelected)
        );

        let mut s = session();
        s.apply(FormPatch {
            content: Some("   ".into()),
            ..FormPatch::default()
        });
        assert_eq!(
            build_entry(&s, &snapshot(), &DiarySetup::default(), Utc::now()),
            Err(ValidationError::EmptyContent)
        );

        s.apply(FormPatch {
            date: Some("01/03/2024".into()),
            content: Some("Fractions".into()),
            ..FormPatch::default()
        });
        assert_eq!(
            build_entry(&s, &snapshot(), &DiarySetup::default(), Utc::now()),
            Err(ValidationError::InvalidDate("01/03/2024".into()))
        );
    }

    #[test]
    fn each_build_gets_a_fresh_log_id_but_stable_attendance_ids() {
        let mut s = session();
        s.apply(FormPatch {
            content: Some("Fractions".into()),
            ..FormPatch::default()
        });
        let a = build_entry(&s, &snapshot(), &DiarySetup::default(), Utc::now()).expect("a");
        let b = build_entry(&s, &snapshot(), &DiarySetup::default(), Utc::now()).expect("b");
        assert_ne!(a.log.id, b.log.id);
        let ids = |e: &DiaryEntry| e.attendances.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
