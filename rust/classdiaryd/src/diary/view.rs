use super::commit::{build_entry, DiaryEntry};
use super::derive;
use super::session::{DiarySession, FormPatch, Phase};
use super::{DiaryError, DiarySetup, ValidationError};
use crate::model::{AttendanceStatus, ClassLog, Tab};
use crate::store::{Snapshot, Store, Subscription};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use tracing::{info, warn};

/// A mounted diary screen: one session kept in step with the store.
///
/// The session is never borrowed across a store write, so the change
/// listener can always take it.
pub struct DiaryView {
    session: Rc<RefCell<DiarySession>>,
    _subscription: Subscription,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollCallRow {
    pub student_id: String,
    pub name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryState {
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub date: String,
    pub content: String,
    pub activities: String,
    pub tab: Tab,
    pub phase: Phase,
    pub roll_call: Vec<RollCallRow>,
}

impl DiaryView {
    /// Mounts on `class_id`, or on the first class of the store when none is
    /// given.
    pub fn mount(
        store: &Store,
        class_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let setup = DiarySetup::load(store.conn());
        let snapshot = store.snapshot();
        let mut session = DiarySession::new(today, setup.default_tab);
        let initial = class_id
            .map(str::to_string)
            .or_else(|| snapshot.classes.first().map(|c| c.id.clone()));
        if let Some(id) = initial {
            session.select_class(&id, &snapshot)?;
        }

        let session = Rc::new(RefCell::new(session));
        let listener_session = Rc::clone(&session);
        let subscription = store.subscribe(move |snap| {
            match listener_session.try_borrow_mut() {
                Ok(mut s) => {
                    if s.sync(snap) {
                        info!(class_id = ?s.class_id(), "roster changed, roll-call reset");
                    }
                }
                Err(_) => warn!("diary session busy during store change; roster not re-derived"),
            }
        });

        Ok(Self {
            session,
            _subscription: subscription,
        })
    }

    pub fn session(&self) -> Ref<'_, DiarySession> {
        self.session.borrow()
    }

    pub fn select_class(&self, store: &Store, class_id: &str) -> Result<(), ValidationError> {
        self.session
            .borrow_mut()
            .select_class(class_id, &store.snapshot())
    }

    pub fn edit(&self, patch: FormPatch) {
        self.session.borrow_mut().apply(patch);
    }

    pub fn set_attendance(
        &self,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), ValidationError> {
        self.session.borrow_mut().set_attendance(student_id, status)
    }

    pub fn set_tab(&self, tab: Tab) {
        self.session.borrow_mut().set_tab(tab);
    }

    /// Validates, writes log and roll-call in one store transaction, then
    /// clears the form. On a failed write the form is left as it was.
    pub fn save(&self, store: &Store) -> Result<DiaryEntry, DiaryError> {
        let setup = DiarySetup::load(store.conn());
        let entry = {
            let session = self.session.borrow();
            build_entry(&session, &store.snapshot(), &setup, Utc::now())?
        };
        store.commit_diary_entry(&entry).map_err(DiaryError::Store)?;
        self.session.borrow_mut().finish_commit();
        Ok(entry)
    }

    /// History of the selected class, or of `class_id` when given.
    pub fn history(&self, snapshot: &Snapshot, class_id: Option<&str>) -> Vec<ClassLog> {
        let session = self.session.borrow();
        let Some(class_id) = class_id.or(session.class_id()) else {
            return Vec::new();
        };
        derive::history(&snapshot.class_logs, class_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn state(&self, snapshot: &Snapshot) -> DiaryState {
        let session = self.session.borrow();
        let class_id = session.class_id().map(str::to_string);
        let class_name = class_id
            .as_deref()
            .and_then(|id| snapshot.class(id))
            .map(|c| c.name.clone());
        let roll_call = match class_id.as_deref() {
            Some(id) => derive::roster(&snapshot.students, id)
                .into_iter()
                .map(|s| RollCallRow {
                    student_id: s.id.clone(),
                    name: s.name.clone(),
                    status: session.status_of(&s.id),
                })
                .collect(),
            None => Vec::new(),
        };
        DiaryState {
            class_id,
            class_name,
            date: session.date().to_string(),
            content: session.content().to_string(),
            activities: session.activities().to_string(),
            tab: session.tab(),
            phase: session.phase(),
            roll_call,
        }
    }
}
