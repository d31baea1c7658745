use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    let snapshot = store.snapshot();
    let classes: Vec<serde_json::Value> = snapshot
        .classes
        .iter()
        .map(|c| {
            let student_count = snapshot
                .students
                .iter()
                .filter(|s| s.class_id == c.id)
                .count();
            let log_count = snapshot
                .class_logs
                .iter()
                .filter(|l| l.class_id == c.id)
                .count();
            json!({
                "id": c.id,
                "name": c.name,
                "studentCount": student_count,
                "logCount": log_count
            })
        })
        .collect();
    ok(&req.id, json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match store.create_class(&name) {
        Ok(class) => ok(&req.id, json!({ "classId": class.id, "name": class.name })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "classes" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        _ => None,
    }
}
