//! Core data types for the data hub
//!
//! This module contains the fundamental value types that flow through the
//! resource graph.
//!
//! # Main Types
//!
//! - [`DataType`] - The five value kinds a resource can carry
//! - [`SampleValue`] - A tagged value (trigger, boolean, numeric, text)
//! - [`DataSample`] - An immutable, shared, timestamped value
//! - [`JsonKind`] - The kind of a value extracted from a JSON document
//!
//! # Sharing
//!
//! A `DataSample` is an `Arc` around an immutable payload. Cloning a sample
//! adds a reference; nothing ever mutates a sample in place. Strings and
//! JSON documents share the `Text` representation, the declared
//! [`DataType`] travelling alongside the sample tells them apart.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Timestamp sentinel meaning "now": resolved to wall-clock time at creation.
pub const NOW: f64 = 0.0;

/// Maximum length of a single path segment, in bytes.
pub const MAX_ENTRY_NAME_LEN: usize = 63;

/// Maximum length of a rendered resource path, in bytes.
pub const MAX_RESOURCE_PATH_LEN: usize = 79;

/// Maximum length of a string or JSON value, in bytes.
pub const MAX_STRING_BYTES: usize = 50_000;

/// Start times at or above this many seconds are absolute epoch times;
/// below it they mean "this many seconds ago".
pub const ABSOLUTE_TIME_THRESHOLD: f64 = 30.0 * 365.0 * 24.0 * 60.0 * 60.0;

/// Used to split a timestamp into whole seconds and milliseconds.
pub const MILLIS_PER_SECOND: f64 = 1000.0;

/// The kind of value carried by a resource or a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// No value, only a timestamp
    #[default]
    Trigger,
    /// true / false
    Boolean,
    /// 64-bit floating point
    Numeric,
    /// UTF-8 text
    String,
    /// A JSON document, stored as text
    Json,
}

impl DataType {
    /// All data types, in declaration order.
    pub fn all() -> &'static [DataType] {
        &[
            DataType::Trigger,
            DataType::Boolean,
            DataType::Numeric,
            DataType::String,
            DataType::Json,
        ]
    }

    /// One-byte code used in the backup file format.
    pub fn code(self) -> u8 {
        match self {
            DataType::Trigger => b't',
            DataType::Boolean => b'b',
            DataType::Numeric => b'n',
            DataType::String => b's',
            DataType::Json => b'j',
        }
    }

    /// Inverse of [`DataType::code`].
    pub fn from_code(code: u8) -> Option<DataType> {
        match code {
            b't' => Some(DataType::Trigger),
            b'b' => Some(DataType::Boolean),
            b'n' => Some(DataType::Numeric),
            b's' => Some(DataType::String),
            b'j' => Some(DataType::Json),
            _ => None,
        }
    }

    /// True for the two types whose value is stored as text.
    pub fn is_text(self) -> bool {
        matches!(self, DataType::String | DataType::Json)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Trigger => write!(f, "trigger"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Numeric => write!(f, "numeric"),
            DataType::String => write!(f, "string"),
            DataType::Json => write!(f, "json"),
        }
    }
}

/// A tagged value held by a [`DataSample`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Trigger,
    Boolean(bool),
    Numeric(f64),
    /// String or JSON text
    Text(String),
}

impl SampleValue {
    /// The data type this value naturally carries. Text reports `String`;
    /// whether it is actually JSON is decided by the declared type.
    pub fn natural_type(&self) -> DataType {
        match self {
            SampleValue::Trigger => DataType::Trigger,
            SampleValue::Boolean(_) => DataType::Boolean,
            SampleValue::Numeric(_) => DataType::Numeric,
            SampleValue::Text(_) => DataType::String,
        }
    }
}

#[derive(Debug)]
struct SampleData {
    timestamp: f64,
    value: SampleValue,
}

/// An immutable, reference-counted, timestamped value.
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct DataSample(Arc<SampleData>);

impl DataSample {
    pub fn new(timestamp: f64, value: SampleValue) -> Self {
        Self(Arc::new(SampleData { timestamp, value }))
    }

    pub fn trigger(timestamp: f64) -> Self {
        Self::new(timestamp, SampleValue::Trigger)
    }

    pub fn boolean(timestamp: f64, value: bool) -> Self {
        Self::new(timestamp, SampleValue::Boolean(value))
    }

    pub fn numeric(timestamp: f64, value: f64) -> Self {
        Self::new(timestamp, SampleValue::Numeric(value))
    }

    pub fn text(timestamp: f64, value: impl Into<String>) -> Self {
        Self::new(timestamp, SampleValue::Text(value.into()))
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.0.timestamp
    }

    #[inline]
    pub fn value(&self) -> &SampleValue {
        &self.0.value
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.0.value {
            SampleValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.0.value {
            SampleValue::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.0.value {
            SampleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// A new sample carrying the same value with a different timestamp.
    pub fn with_timestamp(&self, timestamp: f64) -> Self {
        Self::new(timestamp, self.0.value.clone())
    }

    /// True if both handles refer to the very same sample.
    #[inline]
    pub fn ptr_eq(a: &DataSample, b: &DataSample) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of live references to this sample.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Render the value as plain text (used for string-typed consumers).
    pub fn to_text(&self) -> String {
        match &self.0.value {
            SampleValue::Trigger => String::new(),
            SampleValue::Boolean(b) => b.to_string(),
            SampleValue::Numeric(n) => format_number(*n),
            SampleValue::Text(s) => s.clone(),
        }
    }

    /// Render the value as a JSON document, given its declared type.
    pub fn to_json(&self, data_type: DataType) -> String {
        match &self.0.value {
            SampleValue::Trigger => "null".to_string(),
            SampleValue::Boolean(b) => b.to_string(),
            SampleValue::Numeric(n) => format_json_number(*n),
            SampleValue::Text(s) if data_type == DataType::Json => s.clone(),
            SampleValue::Text(s) => json_quote(s),
        }
    }
}

impl PartialEq for DataSample {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
            || (self.timestamp() == other.timestamp() && self.value() == other.value())
    }
}

/// The kind of a value extracted from a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

impl JsonKind {
    /// The hub data type an extracted value of this kind becomes.
    pub fn data_type(self) -> DataType {
        match self {
            JsonKind::Null => DataType::Trigger,
            JsonKind::Boolean => DataType::Boolean,
            JsonKind::Number => DataType::Numeric,
            JsonKind::String => DataType::String,
            JsonKind::Object | JsonKind::Array => DataType::Json,
        }
    }
}

/// Decimal text for a numeric value.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// JSON text for a numeric value. JSON has no NaN or infinity.
pub fn format_json_number(value: f64) -> String {
    if value.is_finite() {
        format_number(value)
    } else {
        "null".to_string()
    }
}

/// Quote and escape a string as a JSON string literal.
pub fn json_quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Split a timestamp into whole seconds and milliseconds, rounded to the
/// nearest millisecond.
pub fn split_timestamp(timestamp: f64) -> (i64, u32) {
    let mut seconds = timestamp.floor();
    let mut millis = ((timestamp - seconds) * MILLIS_PER_SECOND).round();
    if millis >= MILLIS_PER_SECOND {
        seconds += 1.0;
        millis = 0.0;
    }
    (seconds as i64, (millis as u32).min(999))
}

/// Render a timestamp as `<seconds>.<milliseconds>`.
pub fn format_timestamp(timestamp: f64) -> String {
    let (seconds, millis) = split_timestamp(timestamp);
    format!("{}.{:03}", seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_codes() {
        for &ty in DataType::all() {
            assert_eq!(DataType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(DataType::from_code(b'x'), None);
    }

    #[test]
    fn test_sample_sharing() {
        let a = DataSample::numeric(10.0, 1.5);
        let b = a.clone();
        assert!(DataSample::ptr_eq(&a, &b));
        assert_eq!(a.ref_count(), 2);

        let c = a.with_timestamp(11.0);
        assert!(!DataSample::ptr_eq(&a, &c));
        assert_eq!(c.as_f64(), Some(1.5));
        assert_eq!(c.timestamp(), 11.0);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(DataSample::trigger(1.0).to_json(DataType::Trigger), "null");
        assert_eq!(DataSample::boolean(1.0, true).to_json(DataType::Boolean), "true");
        assert_eq!(DataSample::numeric(1.0, 2.5).to_json(DataType::Numeric), "2.5");
        assert_eq!(
            DataSample::numeric(1.0, f64::NAN).to_json(DataType::Numeric),
            "null"
        );
        assert_eq!(
            DataSample::text(1.0, "a\"b").to_json(DataType::String),
            "\"a\\\"b\""
        );
        assert_eq!(
            DataSample::text(1.0, "{\"x\":1}").to_json(DataType::Json),
            "{\"x\":1}"
        );
    }

    #[test]
    fn test_split_timestamp() {
        assert_eq!(split_timestamp(1_700_000_000.25), (1_700_000_000, 250));
        assert_eq!(format_timestamp(12.5), "12.500");
        assert_eq!(format_timestamp(3.0), "3.000");
    }

    #[test]
    fn test_split_timestamp_rounds_to_nearest_milli() {
        // These land just below the millisecond in binary.
        assert_eq!(format_timestamp(1.001), "1.001");
        assert_eq!(format_timestamp(1_700_000_000.123), "1700000000.123");
        assert_eq!(split_timestamp(0.007), (0, 7));
        assert_eq!(format_timestamp(2.9996), "3.000");
    }

    #[test]
    fn test_json_kind_mapping() {
        assert_eq!(JsonKind::Null.data_type(), DataType::Trigger);
        assert_eq!(JsonKind::Number.data_type(), DataType::Numeric);
        assert_eq!(JsonKind::Array.data_type(), DataType::Json);
    }
}
