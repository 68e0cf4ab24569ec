use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete vitalstream configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VitalsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Vitals simulator and broadcast hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Number of simulated patients
    #[serde(default = "default_patient_count")]
    pub patient_count: usize,
    /// Time between update batches (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Share of patients included in each update batch (0.0 - 1.0)
    #[serde(default = "default_update_fraction")]
    pub update_fraction: f64,
    /// Batches buffered per subscriber before it starts skipping
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_patient_count() -> usize {
    100
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_update_fraction() -> f64 {
    0.3
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            patient_count: default_patient_count(),
            tick_interval_ms: default_tick_interval_ms(),
            update_fraction: default_update_fraction(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Observer session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Samples kept per patient history (minimum 1)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Feed endpoint used by the remote observer binary
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
}

fn default_history_capacity() -> usize {
    crate::history::DEFAULT_CAPACITY
}

fn default_feed_url() -> String {
    "ws://127.0.0.1:3000/api/ws".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            feed_url: default_feed_url(),
        }
    }
}

/// Worker task pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Submit every update batch to the worker pipeline
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,
    /// Encryption rounds per task
    #[serde(default = "default_worker_rounds")]
    pub rounds: u32,
    /// Caller-side deadline per task; unset means wait for the worker
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_worker_enabled() -> bool {
    true
}

fn default_worker_rounds() -> u32 {
    50
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
            rounds: default_worker_rounds(),
            timeout_ms: None,
        }
    }
}

impl VitalsConfig {
    /// Override fields from `VITALS_*` environment variables.
    ///
    /// Unparseable values are ignored and the existing setting is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VITALS_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("VITALS_PATIENT_COUNT") {
            if let Ok(n) = v.parse::<usize>() {
                self.feed.patient_count = n;
            }
        }
        if let Ok(v) = std::env::var("VITALS_TICK_INTERVAL_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.feed.tick_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("VITALS_UPDATE_FRACTION") {
            if let Ok(f) = v.parse::<f64>() {
                self.feed.update_fraction = f;
            }
        }
        if let Ok(v) = std::env::var("VITALS_BROADCAST_CAPACITY") {
            if let Ok(n) = v.parse::<usize>() {
                self.feed.broadcast_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("VITALS_HISTORY_CAPACITY") {
            if let Ok(n) = v.parse::<usize>() {
                self.session.history_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("VITALS_FEED_URL") {
            self.session.feed_url = v;
        }
        if let Ok(v) = std::env::var("VITALS_WORKER_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                self.worker.enabled = b;
            }
        }
        if let Ok(v) = std::env::var("VITALS_WORKER_ROUNDS") {
            if let Ok(n) = v.parse::<u32>() {
                self.worker.rounds = n;
            }
        }
        if let Ok(v) = std::env::var("VITALS_WORKER_TIMEOUT_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.worker.timeout_ms = Some(n);
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<VitalsConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config '{}'", path))?;
    let config: VitalsConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config '{}'", path))?;
    Ok(config)
}

/// Load from `VITALS_CONFIG` when set, else defaults, then apply env overrides
pub fn load_from_env() -> Result<VitalsConfig> {
    let mut config = match std::env::var("VITALS_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => VitalsConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}
