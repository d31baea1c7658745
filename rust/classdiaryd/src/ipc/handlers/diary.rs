use crate::diary::commit::parse_entry_date;
use crate::diary::derive;
use crate::diary::session::FormPatch;
use crate::diary::view::DiaryView;
use crate::diary::ValidationError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_opt_string, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, ClassLog, Tab};
use crate::store::Store;
use chrono::{Local, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::warn;
use uuid::Uuid;

fn state_json(store: &Store, view: &DiaryView) -> JsonValue {
    json!(view.state(&store.snapshot()))
}

/// Runs `f` against the mounted view.
fn with_view(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Store, &DiaryView, &JsonValue) -> Result<JsonValue, HandlerErr>,
) -> JsonValue {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(view) = state.diary.as_ref() else {
        return err(&req.id, "no_view", "open the diary first", None);
    };
    match f(store, view, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            warn!(method = %req.method, code = error.code, message = %error.message, "diary request failed");
            error.response(&req.id)
        }
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> JsonValue {
    let class_id = match parse_opt_string(req.params.get("classId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("classId {}", m), None),
    };
    state.diary = None;
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let today = Local::now().date_naive();
    match DiaryView::mount(store, class_id.as_deref(), today) {
        Ok(view) => {
            let result = state_json(store, &view);
            state.diary = Some(view);
            ok(&req.id, result)
        }
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> JsonValue {
    state.diary = None;
    ok(&req.id, json!({ "ok": true }))
}

fn diary_state(store: &Store, view: &DiaryView, _params: &JsonValue) -> Result<JsonValue, HandlerErr> {
    Ok(state_json(store, view))
}

fn diary_select_class(
    store: &Store,
    view: &DiaryView,
    params: &JsonValue,
) -> Result<JsonValue, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    view.select_class(store, &class_id)?;
    Ok(state_json(store, view))
}

fn parse_patch(params: &JsonValue) -> Result<FormPatch, HandlerErr> {
    let Some(obj) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let mut patch = FormPatch::default();
    for (k, v) in obj {
        let s = v
            .as_str()
            .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be string", k)))?
            .to_string();
        match k.as_str() {
            "date" => patch.date = Some(s),
            "content" => patch.content = Some(s),
            "activities" => patch.activities = Some(s),
            _ => return Err(HandlerErr::bad_params(format!("unknown diary field: {}", k))),
        }
    }
    Ok(patch)
}

fn diary_edit(store: &Store, view: &DiaryView, params: &JsonValue) -> Result<JsonValue, HandlerErr> {
    let patch = parse_patch(params)?;
    view.edit(patch);
    Ok(state_json(store, view))
}

fn diary_set_attendance(
    store: &Store,
    view: &DiaryView,
    params: &JsonValue,
) -> Result<JsonValue, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let status = required_str(params, "status")?
        .parse::<AttendanceStatus>()
        .map_err(ValidationError::InvalidStatus)?;
    view.set_attendance(&student_id, status)?;
    Ok(state_json(store, view))
}

fn diary_set_tab(store: &Store, view: &DiaryView, params: &JsonValue) -> Result<JsonValue, HandlerErr> {
    let raw = required_str(params, "tab")?;
    let Some(tab) = Tab::parse(&raw) else {
        return Err(HandlerErr::bad_params("tab must be one of: register, history"));
    };
    view.set_tab(tab);
    Ok(state_json(store, view))
}

fn diary_save(store: &Store, view: &DiaryView, _params: &JsonValue) -> Result<JsonValue, HandlerErr> {
    let entry = view.save(store)?;
    Ok(json!({
        "logId": entry.log.id,
        "attendanceCount": entry.attendances.len(),
        "state": state_json(store, view)
    }))
}

fn handle_history(state: &mut AppState, req: &Request) -> JsonValue {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match parse_opt_string(req.params.get("classId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("classId {}", m), None),
    };
    let snapshot = store.snapshot();
    let logs: Vec<ClassLog> = match (class_id.as_deref(), state.diary.as_ref()) {
        (_, Some(view)) => view.history(&snapshot, class_id.as_deref()),
        (Some(id), None) => derive::history(&snapshot.class_logs, id)
            .into_iter()
            .cloned()
            .collect(),
        (None, None) => {
            return err(&req.id, "bad_params", "missing classId (no diary open)", None)
        }
    };
    ok(&req.id, json!({ "logs": logs }))
}

fn class_log_save(store: &Store, params: &JsonValue) -> Result<JsonValue, HandlerErr> {
    let Some(input) = params.get("log") else {
        return Err(HandlerErr::bad_params("missing log"));
    };
    let class_id = required_str(input, "classId")?;
    let content = input
        .get("content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent.into());
    }
    let date = parse_entry_date(&required_str(input, "date")?)?;
    if store.snapshot().class(&class_id).is_none() {
        return Err(ValidationError::UnknownClass(class_id).into());
    }
    let activities = parse_opt_string(input.get("activities"))
        .map_err(|m| HandlerErr::bad_params(format!("log.activities {}", m)))?
        .unwrap_or_default();
    let id = parse_opt_string(input.get("id"))
        .map_err(|m| HandlerErr::bad_params(format!("log.id {}", m)))?
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = parse_opt_string(input.get("createdAt"))
        .map_err(|m| HandlerErr::bad_params(format!("log.createdAt {}", m)))?
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    let log = ClassLog {
        id,
        class_id,
        date,
        content,
        activities,
        created_at,
    };
    store.save_class_log(&log).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "table": "class_logs" })),
    })?;
    Ok(json!({ "logId": log.id }))
}

fn handle_class_log_save(state: &mut AppState, req: &Request) -> JsonValue {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match class_log_save(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "diary.open" => Some(handle_open(state, req)),
        "diary.close" => Some(handle_close(state, req)),
        "diary.state" => Some(with_view(state, req, diary_state)),
        "diary.selectClass" => Some(with_view(state, req, diary_select_class)),
        "diary.edit" => Some(with_view(state, req, diary_edit)),
        "diary.setAttendance" => Some(with_view(state, req, diary_set_attendance)),
        "diary.setTab" => Some(with_view(state, req, diary_set_tab)),
        "diary.save" => Some(with_view(state, req, diary_save)),
        "diary.history" => Some(handle_history(state, req)),
        "classLogs.save" => Some(handle_class_log_save(state, req)),
        _ => None,
    }
}
