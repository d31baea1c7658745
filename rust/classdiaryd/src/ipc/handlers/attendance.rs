use crate::diary::commit::parse_entry_date;
use crate::diary::{DiarySetup, ValidationError};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_opt_string, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Attendance, AttendanceStatus};
use crate::store::{Snapshot, Store};
use serde_json::json;

fn attendance_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = match parse_opt_string(params.get("date"))
        .map_err(|m| HandlerErr::bad_params(format!("date {}", m)))?
    {
        Some(raw) => Some(parse_entry_date(&raw)?),
        None => None,
    };
    let snapshot = store.snapshot();
    if snapshot.class(&class_id).is_none() {
        return Err(HandlerErr::new("not_found", "class not found"));
    }
    let records: Vec<&Attendance> = snapshot
        .attendances
        .iter()
        .filter(|a| a.class_id == class_id)
        .filter(|a| date.map_or(true, |d| a.date == d))
        .collect();
    Ok(json!({ "attendances": records }))
}

fn parse_record(
    raw: &serde_json::Value,
    idx: usize,
    setup: &DiarySetup,
    snapshot: &Snapshot,
) -> Result<Attendance, HandlerErr> {
    // Tag the failing record; keeps `field` when the error carries one.
    let at = |mut e: HandlerErr| {
        let mut details = e.details.take().unwrap_or_else(|| json!({}));
        details["index"] = json!(idx);
        e.details = Some(details);
        e
    };
    let student_id = required_str(raw, "studentId").map_err(at)?;
    let class_id = required_str(raw, "classId").map_err(at)?;
    let enrolled = snapshot
        .students
        .iter()
        .any(|s| s.id == student_id && s.class_id == class_id);
    if !enrolled {
        return Err(at(ValidationError::StudentNotInClass {
            student_id,
            class_id,
        }
        .into()));
    }
    let date = required_str(raw, "date")
        .map_err(at)
        .and_then(|d| parse_entry_date(&d).map_err(|e| at(e.into())))?;
    let status = match parse_opt_string(raw.get("status")) {
        Ok(Some(s)) => s
            .parse::<AttendanceStatus>()
            .map_err(|m| at(ValidationError::InvalidStatus(m).into()))?,
        Ok(None) => AttendanceStatus::default(),
        Err(m) => return Err(at(HandlerErr::bad_params(format!("status {}", m)))),
    };
    let lesson_number = match raw.get("lessonNumber") {
        None => setup.lesson_number,
        Some(v) if v.is_null() => setup.lesson_number,
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => n,
            _ => {
                return Err(at(HandlerErr::bad_params(
                    "lessonNumber must be a positive integer",
                )))
            }
        },
    };
    let justification = parse_opt_string(raw.get("justification"))
        .map_err(|m| at(HandlerErr::bad_params(format!("justification {}", m))))?;
    let id = parse_opt_string(raw.get("id"))
        .map_err(|m| at(HandlerErr::bad_params(format!("id {}", m))))?
        .unwrap_or_else(|| Attendance::record_id(&student_id, date, lesson_number));
    Ok(Attendance {
        id,
        student_id,
        class_id,
        date,
        lesson_number,
        status,
        justification,
    })
}

fn attendance_save_batch(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(items) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing records"));
    };
    let setup = DiarySetup::load(store.conn());
    let snapshot = store.snapshot();
    let records = items
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_record(raw, i, &setup, &snapshot))
        .collect::<Result<Vec<_>, _>>()?;
    store.save_attendances(&records).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "table": "attendances" })),
    })?;
    Ok(json!({ "count": records.len() }))
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_list(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_save_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_save_batch(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.saveBatch" => Some(handle_attendance_save_batch(state, req)),
        _ => None,
    }
}
