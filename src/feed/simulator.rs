use crate::config::FeedConfig;
use crate::feed::FeedHub;
use crate::vitals::PatientVitals;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Random-walk vitals generator for a fixed set of patients
pub struct VitalsSimulator {
    rng: StdRng,
    patients: Vec<PatientVitals>,
}

impl VitalsSimulator {
    pub fn new(patient_count: usize) -> Self {
        Self::with_rng(patient_count, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests
    pub fn with_seed(patient_count: usize, seed: u64) -> Self {
        Self::with_rng(patient_count, StdRng::seed_from_u64(seed))
    }

    fn with_rng(patient_count: usize, mut rng: StdRng) -> Self {
        let now = Utc::now().timestamp_millis();
        let patients = (1..=patient_count)
            .map(|n| PatientVitals {
                id: format!("patient-{:04}", n),
                heart_rate: rng.gen_range(60.0_f64..100.0).round(),
                systolic: rng.gen_range(105.0_f64..135.0).round(),
                diastolic: rng.gen_range(65.0_f64..85.0).round(),
                oxygen_saturation: rng.gen_range(95.0_f64..100.0).round(),
                temperature: (rng.gen_range(36.2_f64..37.4) * 10.0).round() / 10.0,
                respiratory_rate: rng.gen_range(12.0_f64..20.0).round(),
                timestamp: now,
            })
            .collect();

        Self { rng, patients }
    }

    pub fn patients(&self) -> &[PatientVitals] {
        &self.patients
    }

    /// Advance a random subset of patients and return their new records.
    ///
    /// `fraction` of the patients (at least one, when any exist) take one
    /// random-walk step each; the rest are left out of the batch.
    pub fn tick(&mut self, fraction: f64) -> Vec<PatientVitals> {
        let total = self.patients.len();
        if total == 0 {
            return Vec::new();
        }

        let amount = ((total as f64 * fraction.clamp(0.0, 1.0)).round() as usize).clamp(1, total);
        let now = Utc::now().timestamp_millis();
        let picked = index::sample(&mut self.rng, total, amount);

        let mut batch = Vec::with_capacity(amount);
        for i in picked.iter() {
            let rng = &mut self.rng;
            let p = &mut self.patients[i];
            p.heart_rate = step(rng, p.heart_rate, 3.0, 35.0, 180.0).round();
            p.systolic = step(rng, p.systolic, 3.0, 70.0, 200.0).round();
            p.diastolic = step(rng, p.diastolic, 2.0, 40.0, 120.0).round();
            p.oxygen_saturation = step(rng, p.oxygen_saturation, 1.0, 85.0, 100.0).round();
            p.temperature = (step(rng, p.temperature, 0.1, 35.0, 41.0) * 10.0).round() / 10.0;
            p.respiratory_rate = step(rng, p.respiratory_rate, 1.0, 8.0, 30.0).round();
            p.timestamp = now;
            batch.push(p.clone());
        }

        batch
    }
}

fn step(rng: &mut StdRng, value: f64, max_delta: f64, min: f64, max: f64) -> f64 {
    (value + rng.gen_range(-max_delta..=max_delta)).clamp(min, max)
}

/// Publish one simulated batch to the hub every tick.
///
/// Runs until the task is cancelled.
pub async fn run_simulator(hub: Arc<FeedHub>, mut simulator: VitalsSimulator, config: FeedConfig) {
    info!(
        patients = simulator.patients().len(),
        tick_interval_ms = config.tick_interval_ms,
        "Starting vitals simulator"
    );

    let mut ticker = interval(Duration::from_millis(config.tick_interval_ms.max(1)));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // First tick completes immediately; the hub already holds the seed state
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let batch = simulator.tick(config.update_fraction);
        hub.publish_batch(&batch);
    }
}
