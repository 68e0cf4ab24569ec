use super::PatientVitals;
use serde_json::{Map, Value};
use std::fmt;

/// Reasons a single inbound record is rejected
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    NotObject,
    MissingField(&'static str),
    InvalidField(&'static str),
    OutOfRange { field: &'static str, value: f64 },
    InvalidTimestamp(i64),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::NotObject => write!(f, "record must be a JSON object"),
            RecordError::MissingField(field) => write!(f, "{} is required", field),
            RecordError::InvalidField(field) => write!(f, "{} has the wrong type", field),
            RecordError::OutOfRange { field, value } => {
                write!(f, "{} out of range: {}", field, value)
            }
            RecordError::InvalidTimestamp(ts) => {
                write!(f, "timestamp must not be negative, got {}", ts)
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Result of validating one batch: accepted records in arrival order plus
/// the index and reason of every dropped record.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<PatientVitals>,
    pub dropped: Vec<(usize, RecordError)>,
}

/// Numeric fields with their accepted domain (inclusive)
const MEASUREMENTS: [(&str, f64, f64); 6] = [
    ("heartRate", 0.0, 300.0),
    ("systolic", 0.0, 300.0),
    ("diastolic", 0.0, 200.0),
    ("oxygenSaturation", 0.0, 100.0),
    ("temperature", 25.0, 45.0),
    ("respiratoryRate", 0.0, 100.0),
];

/// Validate one record.
///
/// Rules:
/// - Must be an object with a non-empty string `id`
/// - Every measurement must be a finite number within its domain
/// - `timestamp` must be a non-negative integer (epoch milliseconds)
///
/// Unknown keys are ignored.
pub fn parse_record(value: &Value) -> Result<PatientVitals, RecordError> {
    let obj = value.as_object().ok_or(RecordError::NotObject)?;

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(RecordError::MissingField("id"))
        }
        Some(_) => return Err(RecordError::InvalidField("id")),
    };

    let mut values = [0.0_f64; MEASUREMENTS.len()];
    for (slot, (field, min, max)) in values.iter_mut().zip(MEASUREMENTS) {
        let v = measurement(obj, field)?;
        if !(min..=max).contains(&v) {
            return Err(RecordError::OutOfRange { field, value: v });
        }
        *slot = v;
    }

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => return Err(RecordError::MissingField("timestamp")),
        Some(v) => v.as_i64().ok_or(RecordError::InvalidField("timestamp"))?,
    };
    if timestamp < 0 {
        return Err(RecordError::InvalidTimestamp(timestamp));
    }

    let [heart_rate, systolic, diastolic, oxygen_saturation, temperature, respiratory_rate] =
        values;

    Ok(PatientVitals {
        id,
        heart_rate,
        systolic,
        diastolic,
        oxygen_saturation,
        temperature,
        respiratory_rate,
        timestamp,
    })
}

/// Validate a batch, keeping good records and collecting rejects.
///
/// A bad record never rejects the whole batch.
pub fn parse_records(values: &[Value]) -> ParsedBatch {
    let mut batch = ParsedBatch {
        records: Vec::with_capacity(values.len()),
        dropped: Vec::new(),
    };

    for (index, value) in values.iter().enumerate() {
        match parse_record(value) {
            Ok(record) => batch.records.push(record),
            Err(e) => batch.dropped.push((index, e)),
        }
    }

    batch
}

fn measurement(obj: &Map<String, Value>, field: &'static str) -> Result<f64, RecordError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingField(field)),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or(RecordError::InvalidField(field)),
    }
}
