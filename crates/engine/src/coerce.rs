//! Raw value coercion to declared parameter types.
//!
//! The same table serves submission-time binding and in-worker typed lookups, so a
//! value accepted by the binder always reads back identically inside a worker.

use flowparam_types::{ParamType, ParamValue};

use crate::error::ParameterError;

/// Coerces `value` to `target`, naming `name` in the error on failure.
///
/// | target  | string                                 | integer      | float                      | boolean      |
/// |---------|----------------------------------------|--------------|----------------------------|--------------|
/// | string  | passthrough                            | decimal text | shortest text              | `true/false` |
/// | integer | trimmed parse                          | identity     | only if integral, in range | rejected     |
/// | float   | trimmed parse, finite only             | widened      | identity                   | rejected     |
/// | boolean | `true`/`false` (any case), `0`/`1`     | `0`/`1` only | rejected                   | identity     |
pub fn coerce(name: &str, value: &ParamValue, target: ParamType) -> Result<ParamValue, ParameterError> {
    let coerced = match (target, value) {
        (ParamType::String, ParamValue::String(text)) => Some(ParamValue::String(text.clone())),
        (ParamType::String, other) => Some(ParamValue::String(other.to_string())),

        (ParamType::Integer, ParamValue::Integer(number)) => Some(ParamValue::Integer(*number)),
        (ParamType::Integer, ParamValue::Float(number)) => integral_float(*number).map(ParamValue::Integer),
        (ParamType::Integer, ParamValue::String(text)) => text.trim().parse::<i64>().ok().map(ParamValue::Integer),
        (ParamType::Integer, ParamValue::Boolean(_)) => None,

        (ParamType::Float, ParamValue::Float(number)) => Some(*number).filter(|n| n.is_finite()).map(ParamValue::Float),
        (ParamType::Float, ParamValue::Integer(number)) => Some(ParamValue::Float(*number as f64)),
        (ParamType::Float, ParamValue::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(ParamValue::Float),
        (ParamType::Float, ParamValue::Boolean(_)) => None,

        (ParamType::Boolean, ParamValue::Boolean(flag)) => Some(ParamValue::Boolean(*flag)),
        (ParamType::Boolean, ParamValue::Integer(0)) => Some(ParamValue::Boolean(false)),
        (ParamType::Boolean, ParamValue::Integer(1)) => Some(ParamValue::Boolean(true)),
        (ParamType::Boolean, ParamValue::String(text)) => parse_boolean(text).map(ParamValue::Boolean),
        (ParamType::Boolean, _) => None,
    };

    coerced.ok_or_else(|| ParameterError::type_mismatch(name, target, describe(value)))
}

fn integral_float(number: f64) -> Option<i64> {
    // 2^63 is exactly representable, so the upper bound is exclusive.
    if number.is_finite() && number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        Some(false)
    } else {
        None
    }
}

fn describe(value: &ParamValue) -> String {
    match value {
        ParamValue::String(text) => format!("string {text:?}"),
        other => format!("{} {other}", other.param_type()),
    }
}
