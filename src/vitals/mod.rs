// Patient vitals model and per-record validation

mod entity;
mod validation;

pub use entity::{PatientVitals, VitalStatus};
pub use validation::{parse_record, parse_records, ParsedBatch, RecordError};
