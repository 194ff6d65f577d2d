//! Loose coercion of JSON values coming from control clients.
//!
//! Control payloads are hand-edited JSON files or UI forms, so numbers may
//! arrive as strings, booleans or not at all. These helpers turn them into
//! plain Rust values without ever failing.

use serde_json::Value;

/// Coerces a JSON value into a finite number.
///
/// Returns `None` for missing, null, blank, non-numeric or non-finite input.
pub fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    n.is_finite().then_some(n)
}

/// Coerces a JSON value into a boolean using JSON truthiness.
///
/// Missing values, `null`, `false`, `0`, `NaN` and `""` are false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Looks up the first key present in a JSON object.
pub fn field<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

/// Floors `n` and clamps it into `[min, u32::MAX]`.
pub fn floor_u32(n: f64, min: u32) -> u32 {
    let floored = n.floor();
    if floored <= f64::from(min) {
        min
    } else if floored >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        floored as u32
    }
}

/// Floors `n` and clamps it into `[0, u64::MAX]`.
pub fn floor_u64(n: f64) -> u64 {
    let floored = n.floor();
    if floored <= 0.0 {
        0
    } else if floored >= u64::MAX as f64 {
        u64::MAX
    } else {
        floored as u64
    }
}
