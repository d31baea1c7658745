use crate::db;
use crate::diary::{DiarySetup, SETUP_KEY};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Diary,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "diary" => Some(Self::Diary),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Diary => SETUP_KEY,
        }
    }
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    match section {
        SetupSection::Diary => Ok(DiarySetup::read(conn)?.to_json()),
    }
}

/// Validates `patch` against the stored section and returns the merged value.
/// Nothing is written on error.
fn merge_section_patch(
    conn: &rusqlite::Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> Result<Value, (&'static str, String)> {
    match section {
        SetupSection::Diary => {
            let mut setup =
                DiarySetup::read(conn).map_err(|e| ("db_query_failed", e.to_string()))?;
            setup
                .apply_patch(patch)
                .map_err(|msg| ("bad_params", msg))?;
            Ok(setup.to_json())
        }
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let diary = match load_section(store.conn(), SetupSection::Diary) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "diary": diary }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let merged = match merge_section_patch(store.conn(), section, patch_obj) {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err(e) = db::settings_set_json(store.conn(), section.key(), &merged) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
