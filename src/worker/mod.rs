//! CPU-bound work offloaded to isolated worker threads.
//!
//! Each call to [`WorkerPipeline::execute`] spawns a fresh OS thread, moves
//! the payload into it and waits for exactly one terminal message on a
//! oneshot channel. Panics inside the job are caught and reported as
//! failures, and a thread that dies without reporting is surfaced as
//! [`TaskError::Exited`], so a caller is never left waiting forever.
//!
//! There is no pooling and no internal timeout. Callers that need bounded
//! latency use [`WorkerPipeline::execute_with_timeout`].

mod cipher;

pub use cipher::simulate_encryption;

use crate::config::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Job executed on the worker thread
pub type Job = Arc<dyn Fn(&[u8]) -> Result<(), String> + Send + Sync>;

/// Why a worker task did not succeed
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// The job returned an error
    Failed(String),
    /// The job panicked
    Panicked(String),
    /// The worker thread ended without reporting a result
    Exited,
    /// The worker thread could not be started
    Spawn(String),
    /// The caller's deadline expired first
    TimedOut(Duration),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Failed(reason) => write!(f, "task failed: {}", reason),
            TaskError::Panicked(reason) => write!(f, "task panicked: {}", reason),
            TaskError::Exited => write!(f, "worker exited without reporting a result"),
            TaskError::Spawn(reason) => write!(f, "failed to start worker: {}", reason),
            TaskError::TimedOut(after) => write!(f, "task timed out after {:?}", after),
        }
    }
}

impl std::error::Error for TaskError {}

/// Terminal message in its wire form: `{"ok":true}` or `{"ok":false,"error":"..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<(), TaskError>> for TaskReport {
    fn from(result: &Result<(), TaskError>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Runs one job per call on its own thread
#[derive(Clone)]
pub struct WorkerPipeline {
    job: Job,
}

impl WorkerPipeline {
    /// Pipeline running the simulated encryption workload
    pub fn new(config: &WorkerConfig) -> Self {
        let rounds = config.rounds;
        Self::with_job(move |payload| simulate_encryption(payload, rounds).map(|_| ()))
    }

    /// Pipeline running a custom job
    pub fn with_job<F>(job: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), String> + Send + Sync + 'static,
    {
        Self { job: Arc::new(job) }
    }

    /// Run the job on a fresh thread and wait for its single result
    pub async fn execute(&self, payload: Vec<u8>) -> Result<(), TaskError> {
        let (tx, rx) = oneshot::channel();
        let job = Arc::clone(&self.job);
        let size = payload.len();

        thread::Builder::new()
            .name("vitals-worker".to_string())
            .spawn(move || {
                let run = AssertUnwindSafe(|| job(payload.as_slice()));
                let outcome = match panic::catch_unwind(run) {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(reason)) => Err(TaskError::Failed(reason)),
                    Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
                };
                // Receiver gone means the caller stopped waiting; drop the result
                let _ = tx.send(outcome);
            })
            .map_err(|e| TaskError::Spawn(e.to_string()))?;

        debug!(payload_bytes = size, "Worker task started");

        rx.await.unwrap_or(Err(TaskError::Exited))
    }

    /// [`execute`](Self::execute) with a caller-side deadline.
    ///
    /// On expiry the thread keeps running to completion and its result is
    /// discarded.
    pub async fn execute_with_timeout(
        &self,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<(), TaskError> {
        tokio::time::timeout(timeout, self.execute(payload))
            .await
            .unwrap_or(Err(TaskError::TimedOut(timeout)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
