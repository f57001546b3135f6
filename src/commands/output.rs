//! Structured command results.
//!
//! Every command prints exactly one JSON object on stdout. Success carries
//! `"ok": true` merged with the command's payload; failure carries
//! `"ok": false`, the error kind, and a message, and also gets a
//! human-readable line on stderr.

use crate::error::{BatonError, Result};
use crate::exit_codes;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// What a command prints, and the process exit code that goes with it.
#[derive(Debug, Clone)]
pub struct Report {
    pub body: Value,
    pub exit_code: i32,
    /// Line for stderr on failure.
    pub message: Option<String>,
}

impl Report {
    /// A successful result.
    pub fn ok<T: Serialize>(payload: &T) -> Result<Self> {
        let mut body = payload_object(payload)?;
        body.insert("ok".to_string(), Value::Bool(true));
        Ok(Self {
            body: Value::Object(body),
            exit_code: exit_codes::SUCCESS,
            message: None,
        })
    }

    /// A completed evaluation whose answer is "no": the payload is still
    /// printed, alongside the error that explains it.
    pub fn denied<T: Serialize>(payload: &T, err: &BatonError) -> Result<Self> {
        let mut body = payload_object(payload)?;
        body.extend(error_fields(err));
        Ok(Self {
            body: Value::Object(body),
            exit_code: err.exit_code(),
            message: Some(err.to_string()),
        })
    }

    /// A failed command.
    pub fn failure(err: &BatonError) -> Self {
        Self {
            body: Value::Object(error_fields(err)),
            exit_code: err.exit_code(),
            message: Some(err.to_string()),
        }
    }

    /// Pretty JSON for stdout.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}

fn error_fields(err: &BatonError) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("ok".to_string(), Value::Bool(false));
    fields.insert("error".to_string(), json!(err.kind()));
    fields.insert("message".to_string(), json!(err.to_string()));
    let details = err.details();
    if !details.is_null() {
        fields.insert("details".to_string(), details);
    }
    fields
}

fn payload_object<T: Serialize>(payload: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(payload)
        .map_err(|e| BatonError::Io(format!("failed to serialize command output: {}", e)))?;
    Ok(match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    })
}
