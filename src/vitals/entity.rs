use serde::{Deserialize, Serialize};

/// One vital-sign record for a monitored patient.
///
/// Records are immutable once received. The engine shares them behind
/// `Arc` handles and uses handle identity as the changed/unchanged signal,
/// so a record is replaced wholesale, never edited in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientVitals {
    /// Stable patient identifier (e.g., "patient-0042")
    pub id: String,

    /// Beats per minute
    pub heart_rate: f64,

    /// Systolic blood pressure (mmHg)
    pub systolic: f64,

    /// Diastolic blood pressure (mmHg)
    pub diastolic: f64,

    /// Peripheral oxygen saturation (%)
    pub oxygen_saturation: f64,

    /// Body temperature (°C)
    pub temperature: f64,

    /// Breaths per minute
    pub respiratory_rate: f64,

    /// Producer time, Unix epoch milliseconds
    pub timestamp: i64,
}

/// Coarse status bucket shown next to each patient
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalStatus {
    Normal,
    Warning,
    Critical,
}

impl PatientVitals {
    /// Measurement tracked by the rolling history
    pub fn primary_measurement(&self) -> f64 {
        self.heart_rate
    }

    /// Classify the record into a status bucket
    pub fn status(&self) -> VitalStatus {
        if self.heart_rate < 40.0
            || self.heart_rate > 130.0
            || self.oxygen_saturation < 90.0
            || self.systolic < 80.0
            || self.systolic > 180.0
            || self.temperature > 39.5
        {
            return VitalStatus::Critical;
        }

        if self.heart_rate < 50.0
            || self.heart_rate > 110.0
            || self.oxygen_saturation < 94.0
            || self.systolic > 140.0
            || self.diastolic > 90.0
            || self.temperature > 38.0
            || self.respiratory_rate < 10.0
            || self.respiratory_rate > 24.0
        {
            return VitalStatus::Warning;
        }

        VitalStatus::Normal
    }
}
