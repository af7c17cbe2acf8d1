// src/autotype.rs

//! Best-effort primitive inference for string leaves
//!
//! Applied to the values of `map` and `list` sections when autotyping is
//! enabled. Attempts, in order: integer, float, `true`/`false`, `null`, and
//! otherwise keeps the original string.

use serde_json::{Number, Value};

/// Infer the most specific primitive a string represents
pub fn infer(value: &str) -> Value {
    if let Ok(int) = value.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(uint) = value.parse::<u64>() {
        return Value::Number(uint.into());
    }
    // Non-finite floats ("inf", "NaN") have no JSON form and stay strings
    if let Some(float) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(float);
    }
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(value.to_string()),
    }
}

/// Convert a string leaf, inferring its type only when `autotype` is set
pub fn convert(value: &str, autotype: bool) -> Value {
    if autotype {
        infer(value)
    } else {
        Value::String(value.to_string())
    }
}
