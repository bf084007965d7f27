//! Type coercion for fixed-type Inputs and Outputs.
//!
//! Coercion always yields exactly one sample and keeps the original
//! timestamp. Coercing to the type a sample already has returns the same
//! shared sample.

use crate::types::{DataSample, DataType, SampleValue};
use serde_json::Value;

/// Convert `sample` (declared as `from`) into a sample of type `to`.
pub fn coerce(from: DataType, sample: &DataSample, to: DataType) -> DataSample {
    if from == to {
        return sample.clone();
    }

    let ts = sample.timestamp();
    match to {
        DataType::Trigger => DataSample::trigger(ts),
        DataType::Boolean => DataSample::boolean(ts, to_bool(from, sample)),
        DataType::Numeric => DataSample::numeric(ts, to_number(from, sample)),
        DataType::String => DataSample::text(ts, to_string(from, sample)),
        DataType::Json => DataSample::text(ts, sample.to_json(from)),
    }
}

fn to_bool(from: DataType, sample: &DataSample) -> bool {
    match sample.value() {
        SampleValue::Trigger => false,
        SampleValue::Boolean(b) => *b,
        SampleValue::Numeric(n) => *n != 0.0,
        SampleValue::Text(s) if from == DataType::Json => match parse_json(s) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => text_to_bool(&s),
            Some(Value::Null) | None => false,
            Some(_) => true,
        },
        SampleValue::Text(s) => text_to_bool(s),
    }
}

fn to_number(from: DataType, sample: &DataSample) -> f64 {
    match sample.value() {
        SampleValue::Trigger => f64::NAN,
        SampleValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        SampleValue::Numeric(n) => *n,
        SampleValue::Text(s) if from == DataType::Json => match parse_json(s) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
            Some(Value::Bool(b)) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        },
        SampleValue::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
    }
}

fn to_string(from: DataType, sample: &DataSample) -> String {
    match sample.value() {
        // A JSON string literal becomes its unquoted contents.
        SampleValue::Text(s) if from == DataType::Json => match parse_json(s) {
            Some(Value::String(inner)) => inner,
            _ => s.clone(),
        },
        _ => sample.to_text(),
    }
}

/// "false", "0" and "" are false; any other text is true.
fn text_to_bool(s: &str) -> bool {
    let s = s.trim();
    !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
}

fn parse_json(s: &str) -> Option<Value> {
    serde_json::from_str(s).ok()
}
