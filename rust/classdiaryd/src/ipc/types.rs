use std::path::PathBuf;

use crate::diary::view::DiaryView;
use crate::store::Store;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    /// Mounted diary screen, if the host has one open.
    pub diary: Option<DiaryView>,
}
