//! Adapter between loosely typed backend payloads and the engine's records.
//!
//! Backends disagree on casing (`success` vs `Success`, `requestId` vs
//! `RequestID`), and some send JSON encoded inside a string. All of that is
//! absorbed here; nothing else in the crate looks at raw field names.

use serde_json::{Map, Value};

use crate::{DropReason, ProgressEvent, RequestId};

pub const INVALID_FORMAT: &str = "Invalid response format";
pub const NO_CONTENT: &str = "No content generated";
pub const DEFAULT_FAILURE: &str = "Failed to generate response";

const REQUEST_ID_KEYS: &[&str] = &["requestId", "RequestId", "RequestID", "requestID", "request_id"];
const SUCCESS_KEYS: &[&str] = &["success", "Success"];
const RESULT_KEYS: &[&str] = &["result", "Result", "response"];
const ERROR_KEYS: &[&str] = &["error", "Error", "errorMessage"];
const PROCESSING_TIME_KEYS: &[&str] = &["processingTime", "ProcessingTime", "processing_time"];
const PROGRESS_KEYS: &[&str] = &["progress", "Progress"];
const STATUS_KEYS: &[&str] = &["status", "Status"];
const MESSAGE_KEYS: &[&str] = &["message", "Message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalResult {
    pub success: bool,
    pub result: String,
    pub error: String,
    pub processing_time_ms: Option<u64>,
}

impl CanonicalResult {
    fn invalid() -> Self {
        Self {
            success: false,
            result: INVALID_FORMAT.to_string(),
            error: INVALID_FORMAT.to_string(),
            processing_time_ms: None,
        }
    }

    /// Best available explanation for a failed result.
    pub fn failure_text(&self) -> &str {
        if !self.error.trim().is_empty() {
            &self.error
        } else if !self.result.trim().is_empty() {
            &self.result
        } else {
            DEFAULT_FAILURE
        }
    }
}

/// Classifies any response payload. Never fails: garbage maps to an
/// "Invalid response format" failure.
pub fn normalize_response(raw: &Value) -> CanonicalResult {
    match raw {
        Value::Object(fields) => from_fields(fields),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => from_fields(&fields),
            _ => from_plain_text(text),
        },
        _ => CanonicalResult::invalid(),
    }
}

/// Pulls the correlation id out of a payload, whatever its casing.
pub fn extract_request_id(raw: &Value) -> Option<RequestId> {
    let embedded;
    let fields = match raw {
        Value::Object(fields) => fields,
        Value::String(text) => {
            embedded = serde_json::from_str::<Value>(text).ok()?;
            embedded.as_object()?
        }
        _ => return None,
    };
    let id = match field(fields, REQUEST_ID_KEYS)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then(|| RequestId::new(id))
}

pub fn normalize_progress(raw: &Value) -> Result<ProgressEvent, DropReason> {
    let fields = raw.as_object().ok_or(DropReason::Malformed)?;
    let request_id = extract_request_id(raw).ok_or(DropReason::MissingRequestId)?;
    let progress = field(fields, PROGRESS_KEYS)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0);
    Ok(ProgressEvent {
        request_id,
        progress,
        status: field(fields, STATUS_KEYS).map(text_of).unwrap_or_default(),
        message: field(fields, MESSAGE_KEYS).map(text_of).unwrap_or_default(),
    })
}

fn from_fields(fields: &Map<String, Value>) -> CanonicalResult {
    let success = matches!(field(fields, SUCCESS_KEYS), Some(Value::Bool(true)));
    enforce_postconditions(CanonicalResult {
        success,
        result: field(fields, RESULT_KEYS).map(text_of).unwrap_or_default(),
        error: field(fields, ERROR_KEYS).map(text_of).unwrap_or_default(),
        processing_time_ms: field(fields, PROCESSING_TIME_KEYS).and_then(millis_of),
    })
}

fn from_plain_text(text: &str) -> CanonicalResult {
    if carries_failure_sentinel(text) {
        return CanonicalResult {
            success: false,
            result: text.to_string(),
            error: text.to_string(),
            processing_time_ms: None,
        };
    }
    enforce_postconditions(CanonicalResult {
        success: true,
        result: text.to_string(),
        error: String::new(),
        processing_time_ms: None,
    })
}

// Same markers the backend uses when it decides a run failed.
fn carries_failure_sentinel(text: &str) -> bool {
    text.contains("Error:") || text.to_ascii_lowercase().contains("cancelled by user")
}

/// A "successful" response must carry content and no error.
fn enforce_postconditions(mut canonical: CanonicalResult) -> CanonicalResult {
    if !canonical.success {
        return canonical;
    }
    if !canonical.error.trim().is_empty() {
        canonical.success = false;
        canonical.result = canonical.error.clone();
    } else if canonical.result.trim().is_empty() {
        canonical.success = false;
        canonical.result = NO_CONTENT.to_string();
        canonical.error = NO_CONTENT.to_string();
    }
    canonical
}

/// First alias holding a non-null, non-empty value.
fn field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.is_empty(),
            _ => true,
        })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn millis_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|ms| ms.is_finite() && *ms >= 0.0)
                .map(|ms| ms.round() as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
