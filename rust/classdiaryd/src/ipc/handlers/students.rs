use crate::diary::derive;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let snapshot = store.snapshot();
    if snapshot.class(&class_id).is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }
    let students: Vec<serde_json::Value> = derive::roster(&snapshot.students, &class_id)
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            json!({
                "id": s.id,
                "name": s.name,
                "sortOrder": i
            })
        })
        .collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let name = match required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if store.snapshot().class(&class_id).is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }
    match store.create_student(&class_id, &name) {
        Ok(student) => ok(&req.id, json!({ "studentId": student.id })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "students" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        _ => None,
    }
}
