use crate::diary::{DiaryError, ValidationError};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::{json, Value as JsonValue};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<JsonValue>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> JsonValue {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        let code = match e {
            ValidationError::UnknownClass(_) | ValidationError::UnknownStudent(_) => "not_found",
            _ => "validation_failed",
        };
        Self {
            code,
            details: Some(json!({ "field": e.field() })),
            message: e.to_string(),
        }
    }
}

impl From<DiaryError> for HandlerErr {
    fn from(e: DiaryError) -> Self {
        match e {
            DiaryError::Validation(v) => v.into(),
            DiaryError::Store(inner) => Self {
                code: "db_commit_failed",
                message: format!("{:#}", inner),
                details: Some(json!({ "retryable": true })),
            },
        }
    }
}

pub fn store<'a>(state: &'a AppState, req: &Request) -> Result<&'a Store, JsonValue> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(params: &JsonValue, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}
