//! Observable shared store.
//!
//! The store owns the workspace connection and an in-memory snapshot of every
//! collection. Writes go to SQLite first, then the affected collections are
//! reloaded and every subscriber is notified synchronously with the new
//! snapshot. Subscriptions are RAII guards: dropping one unsubscribes.

use crate::db;
use crate::diary::commit::DiaryEntry;
use crate::model::{Attendance, ClassLog, ClassRecord, StudentRecord};
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub classes: Vec<ClassRecord>,
    pub students: Vec<StudentRecord>,
    pub class_logs: Vec<ClassLog>,
    pub attendances: Vec<Attendance>,
}

impl Snapshot {
    pub fn class(&self, class_id: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.id == class_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Classes,
    Students,
    ClassLogs,
    Attendances,
}

type Listener = Rc<dyn Fn(&Snapshot)>;
type ListenerList = RefCell<Vec<(u64, Listener)>>;

/// Guard returned by [`Store::subscribe`].
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().retain(|(id, _)| *id != self.id);
            debug!(subscription = self.id, "store subscription released");
        }
    }
}

pub struct Store {
    conn: Connection,
    snapshot: RefCell<Rc<Snapshot>>,
    listeners: Rc<ListenerList>,
    next_listener_id: Cell<u64>,
}

impl Store {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_schema(&conn)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        let snapshot = Snapshot {
            classes: db::load_classes(&conn)?,
            students: db::load_students(&conn)?,
            class_logs: db::load_class_logs(&conn)?,
            attendances: db::load_attendances(&conn)?,
        };
        Ok(Self {
            conn,
            snapshot: RefCell::new(Rc::new(snapshot)),
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener_id: Cell::new(1),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read-only view of every collection as of the last committed change.
    pub fn snapshot(&self) -> Rc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self, listener: impl Fn(&Snapshot) + 'static) -> Subscription {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        let listener: Listener = Rc::new(listener);
        self.listeners.borrow_mut().push((id, listener));
        debug!(subscription = id, "store subscription added");
        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn create_class(&self, name: &str) -> anyhow::Result<ClassRecord> {
        let class = ClassRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        db::insert_class(&self.conn, &class)?;
        self.publish(&[Collection::Classes]);
        Ok(class)
    }

    pub fn create_student(&self, class_id: &str, name: &str) -> anyhow::Result<StudentRecord> {
        if self.snapshot().class(class_id).is_none() {
            return Err(anyhow!("class not found: {}", class_id));
        }
        let student = StudentRecord {
            id: Uuid::new_v4().to_string(),
            class_id: class_id.to_string(),
            name: name.to_string(),
        };
        db::insert_student(&self.conn, &student)?;
        self.publish(&[Collection::Students]);
        Ok(student)
    }

    /// Upsert by id.
    pub fn save_class_log(&self, log: &ClassLog) -> anyhow::Result<()> {
        db::upsert_class_log(&self.conn, log)?;
        self.publish(&[Collection::ClassLogs]);
        Ok(())
    }

    /// Upsert by id, all records or none.
    pub fn save_attendances(&self, records: &[Attendance]) -> anyhow::Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start attendance batch")?;
        for record in records {
            check_attendance_membership(&tx, record)?;
            db::upsert_attendance(&tx, record)?;
        }
        tx.commit().context("failed to commit attendance batch")?;
        self.publish(&[Collection::Attendances]);
        Ok(())
    }

    /// Writes the diary log and its attendance batch in one transaction and
    /// notifies subscribers once.
    pub fn commit_diary_entry(&self, entry: &DiaryEntry) -> anyhow::Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start diary commit")?;
        db::upsert_class_log(&tx, &entry.log)?;
        for record in &entry.attendances {
            check_attendance_membership(&tx, record)?;
            db::upsert_attendance(&tx, record)?;
        }
        tx.commit().context("failed to commit diary entry")?;
        info!(
            log_id = %entry.log.id,
            class_id = %entry.log.class_id,
            attendance_count = entry.attendances.len(),
            "diary entry committed"
        );
        self.publish(&[Collection::ClassLogs, Collection::Attendances]);
        Ok(())
    }

    /// Runs after a write has committed, so a failed reload is logged and the
    /// previous snapshot stays published; the write itself stands.
    fn publish(&self, changed: &[Collection]) {
        let next = match self.reload(changed) {
            Ok(next) => next,
            Err(e) => {
                error!(?changed, error = %e, "snapshot reload failed after commit");
                return;
            }
        };
        let next = Rc::new(next);
        *self.snapshot.borrow_mut() = Rc::clone(&next);

        // Listeners may drop their own subscription while running.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        debug!(?changed, listeners = listeners.len(), "store changed");
        for listener in listeners {
            listener(&next);
        }
    }

    fn reload(&self, changed: &[Collection]) -> anyhow::Result<Snapshot> {
        let mut next = Snapshot::clone(&self.snapshot());
        for collection in changed {
            match collection {
                Collection::Classes => next.classes = db::load_classes(&self.conn)?,
                Collection::Students => next.students = db::load_students(&self.conn)?,
                Collection::ClassLogs => next.class_logs = db::load_class_logs(&self.conn)?,
                Collection::Attendances => next.attendances = db::load_attendances(&self.conn)?,
            }
        }
        Ok(next)
    }
}

fn check_attendance_membership(conn: &Connection, record: &Attendance) -> anyhow::Result<()> {
    if !db::student_in_class(conn, &record.class_id, &record.student_id)? {
        return Err(anyhow!(
            "student {} does not belong to class {}",
            record.student_id,
            record.class_id
        ));
    }
    Ok(())
}
