use super::error::HandlerErr;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Ids cross the boundary as UUID strings; anything else is rejected here so the
/// core never sees a malformed identifier.
pub fn required_id(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    let Some(s) = raw.as_str() else {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: format!("{} must be a string id", key),
            details: Some(json!({ key: raw })),
        });
    };
    Uuid::parse_str(s.trim())
        .map(|u| u.to_string())
        .map_err(|_| HandlerErr {
            code: "bad_params".to_string(),
            message: format!("malformed {}", key),
            details: Some(json!({ key: s })),
        })
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s.to_string())
}

pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    let v = params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing/invalid {}", key)))?;
    if !v.is_finite() {
        return Err(HandlerErr::bad_params(format!("{} must be finite", key)));
    }
    Ok(v)
}

/// Present-but-null is a legitimate "not graded yet" value.
pub fn nullable_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(HandlerErr::bad_params(format!(
                "{} must be a number or null",
                key
            ))),
        },
    }
}

pub fn required_i64_min(params: &Value, key: &str, min: i64) -> Result<i64, HandlerErr> {
    match params.get(key).and_then(|v| v.as_i64()) {
        Some(v) if v >= min => Ok(v),
        _ => Err(HandlerErr::bad_params(format!(
            "{} must be an integer >= {}",
            key, min
        ))),
    }
}
