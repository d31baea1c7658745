use crate::model::{ClassLog, StudentRecord};

/// Students of `class_id`, in the order the store holds them.
pub fn roster<'a>(students: &'a [StudentRecord], class_id: &str) -> Vec<&'a StudentRecord> {
    students.iter().filter(|s| s.class_id == class_id).collect()
}

/// Logs of `class_id`, newest date first. Entries sharing a date keep the
/// order the store holds them in.
pub fn history<'a>(logs: &'a [ClassLog], class_id: &str) -> Vec<&'a ClassLog> {
    let mut out: Vec<&ClassLog> = logs.iter().filter(|l| l.class_id == class_id).collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}
