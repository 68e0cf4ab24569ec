use crate::config::SessionConfig;
use crate::history::{self, History};
use crate::reconcile::{self, Collection};
use crate::session::protocol::{decode_frame, ChannelEvent};
use crate::vitals::PatientVitals;
use crate::worker::{TaskError, WorkerPipeline};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rolling history per patient id
pub type HistoryMap = Arc<HashMap<String, History>>;

/// Immutable view handed to the presentation layer.
///
/// `entities` and `history` are shared handles; a consumer re-renders a row
/// only when its record handle or its history handle differs from the last
/// snapshot it saw.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// Increments on every publish
    pub version: u64,
    pub entities: Collection,
    pub history: HistoryMap,
}

impl SessionSnapshot {
    fn empty() -> Self {
        Self {
            version: 0,
            entities: reconcile::empty(),
            history: Arc::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PatientVitals>> {
        self.entities.iter().find(|p| p.id == id)
    }

    pub fn history_of(&self, id: &str) -> Option<&History> {
        self.history.get(id)
    }
}

/// Connection lifecycle of one session.
///
/// `Pending` and `Closed` both report "disconnected". `Closed` is terminal:
/// reconnecting means building a new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Pending,
    Connected,
    Closed,
}

/// Session-level errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Event received before the session connected
    NotConnected,
    /// Session already closed
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotConnected => write!(f, "session is not connected"),
            SessionError::Closed => write!(f, "session is closed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Counters for one session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub snapshots: u64,
    pub batches: u64,
    pub published: u64,
    pub dropped_records: u64,
    pub malformed_frames: u64,
    pub worker_succeeded: u64,
    pub worker_failed: u64,
}

/// Owns one logical connection to a vitals feed.
///
/// All state is mutated from the task driving the session, one event at a
/// time. Observers only ever see immutable [`SessionSnapshot`]s through the
/// watch channel returned by [`subscribe`](Self::subscribe).
pub struct StreamSession {
    id: Uuid,
    link: LinkState,
    entities: Collection,
    history: HistoryMap,
    version: u64,
    history_capacity: usize,
    worker: Option<WorkerPipeline>,
    worker_timeout: Option<Duration>,
    tasks: JoinSet<Result<(), TaskError>>,
    stats: SessionStats,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    connected_tx: watch::Sender<bool>,
}

impl StreamSession {
    /// Create a disconnected session with no worker offload
    pub fn new(config: &SessionConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::empty());
        let (connected_tx, _) = watch::channel(false);

        if config.history_capacity == 0 {
            warn!("history_capacity of 0 is not usable, keeping 1 sample per patient");
        }

        Self {
            id: Uuid::now_v7(),
            link: LinkState::Pending,
            entities: reconcile::empty(),
            history: Arc::new(HashMap::new()),
            version: 0,
            history_capacity: config.history_capacity.max(1),
            worker: None,
            worker_timeout: None,
            tasks: JoinSet::new(),
            stats: SessionStats::default(),
            snapshot_tx,
            connected_tx,
        }
    }

    /// Submit every update batch to `worker` (fire-and-forget).
    ///
    /// Task outcomes are counted and logged but never touch the displayed
    /// state. Submitting requires a Tokio runtime.
    pub fn with_worker(mut self, worker: WorkerPipeline, timeout: Option<Duration>) -> Self {
        self.worker = Some(worker);
        self.worker_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> LinkState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive a new snapshot after every batch that changed something
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Connectivity flag: true while connected
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    /// Mark the handshake as complete
    pub fn connect(&mut self) -> Result<(), SessionError> {
        match self.link {
            LinkState::Closed => Err(SessionError::Closed),
            LinkState::Connected => Ok(()),
            LinkState::Pending => {
                self.link = LinkState::Connected;
                self.connected_tx.send_replace(true);
                info!(session_id = %self.id, "Session connected");
                Ok(())
            }
        }
    }

    /// Close the session.
    ///
    /// Entities and history are kept so observers keep showing the last
    /// known state. In-flight worker tasks are aborted and any result they
    /// still produce is discarded.
    pub fn disconnect(&mut self) {
        if self.link == LinkState::Closed {
            return;
        }

        self.link = LinkState::Closed;
        self.connected_tx.send_replace(false);
        self.tasks.abort_all();

        info!(
            session_id = %self.id,
            entities = self.entities.len(),
            batches = self.stats.batches,
            "Session disconnected"
        );
    }

    /// Apply one channel event.
    ///
    /// Returns `Ok(true)` when a new snapshot was published.
    pub fn apply(&mut self, event: ChannelEvent) -> Result<bool, SessionError> {
        match self.link {
            LinkState::Pending => return Err(SessionError::NotConnected),
            LinkState::Closed => return Err(SessionError::Closed),
            LinkState::Connected => {}
        }

        let published = match event {
            ChannelEvent::InitialSnapshot(records) => self.load_snapshot(records),
            ChannelEvent::UpdateBatch(records) => self.apply_batch(records),
        };

        Ok(published)
    }

    /// Replace everything with a full snapshot and seed every history
    fn load_snapshot(&mut self, records: Vec<PatientVitals>) -> bool {
        let records: Vec<Arc<PatientVitals>> = records.into_iter().map(Arc::new).collect();
        let entities = reconcile::from_snapshot(&records);

        let history: HashMap<String, History> = entities
            .iter()
            .map(|p| {
                (
                    p.id.clone(),
                    history::build_seed_history(p, self.history_capacity),
                )
            })
            .collect();

        self.entities = entities;
        self.history = Arc::new(history);
        self.stats.snapshots += 1;

        info!(
            session_id = %self.id,
            entities = self.entities.len(),
            "Loaded initial snapshot"
        );

        self.publish();
        true
    }

    /// Merge an update batch and extend histories
    fn apply_batch(&mut self, records: Vec<PatientVitals>) -> bool {
        self.stats.batches += 1;
        self.submit_worker_task(&records);

        let records: Vec<Arc<PatientVitals>> = records.into_iter().map(Arc::new).collect();
        let merge = reconcile::merge(&self.entities, &records);

        // Every record extends its history, whether or not the merge kept it
        let mut touched: HashMap<&str, History> = HashMap::new();
        for record in &records {
            let current = touched
                .get(record.id.as_str())
                .or_else(|| self.history.get(&record.id))
                .cloned();
            let next = history::append(
                current.as_ref(),
                record.primary_measurement(),
                record,
                self.history_capacity,
            );
            let unchanged = current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &next));
            if !unchanged {
                touched.insert(record.id.as_str(), next);
            }
        }

        let history_changed = !touched.is_empty();
        if history_changed {
            let mut next = (*self.history).clone();
            for (id, samples) in touched {
                next.insert(id.to_string(), samples);
            }
            self.history = Arc::new(next);
        }

        self.entities = merge.collection;

        debug!(
            records = records.len(),
            replaced = merge.replaced,
            added = merge.added,
            history_changed,
            "Applied update batch"
        );

        if merge.changed || history_changed {
            self.publish();
            true
        } else {
            false
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        self.stats.published += 1;
        self.snapshot_tx.send_replace(SessionSnapshot {
            version: self.version,
            entities: Arc::clone(&self.entities),
            history: Arc::clone(&self.history),
        });
    }

    fn submit_worker_task(&mut self, records: &[PatientVitals]) {
        let Some(worker) = self.worker.clone() else {
            return;
        };

        let payload = match serde_json::to_vec(records) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize worker payload, skipping task");
                return;
            }
        };

        let timeout = self.worker_timeout;
        self.tasks.spawn(async move {
            match timeout {
                Some(limit) => worker.execute_with_timeout(payload, limit).await,
                None => worker.execute(payload).await,
            }
        });
    }

    fn record_task_outcome(&mut self, joined: Result<Result<(), TaskError>, JoinError>) {
        if self.link == LinkState::Closed {
            return;
        }

        match joined {
            Ok(Ok(())) => {
                self.stats.worker_succeeded += 1;
                debug!(session_id = %self.id, "Worker task completed");
            }
            Ok(Err(e)) => {
                self.stats.worker_failed += 1;
                warn!(session_id = %self.id, error = %e, "Worker task failed");
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                self.stats.worker_failed += 1;
                warn!(session_id = %self.id, error = %e, "Worker task aborted");
            }
        }
    }

    /// Wait for every in-flight worker task and record its outcome
    pub async fn drain_tasks(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.record_task_outcome(joined);
        }
    }

    /// Decode and apply one raw text frame
    pub fn handle_frame(&mut self, text: &str) {
        match decode_frame(text) {
            Ok(decoded) => {
                self.stats.dropped_records += decoded.dropped as u64;
                if let Err(e) = self.apply(decoded.event) {
                    warn!(session_id = %self.id, error = %e, "Event rejected");
                }
            }
            Err(e) => {
                self.stats.malformed_frames += 1;
                warn!(session_id = %self.id, error = %e, "Malformed frame, skipping");
            }
        }
    }

    /// Drive the session from a stream of text frames.
    ///
    /// The stream is expected to be the output of a completed handshake, so
    /// the session connects first. It closes when the stream ends or yields
    /// an error, and returns its final counters.
    pub async fn run<S, E>(mut self, mut frames: S) -> SessionStats
    where
        S: Stream<Item = Result<String, E>> + Unpin,
        E: fmt::Display,
    {
        if let Err(e) = self.connect() {
            warn!(session_id = %self.id, error = %e, "Cannot run session");
            return self.stats;
        }

        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        warn!(session_id = %self.id, error = %e, "Channel error");
                        break;
                    }
                    None => {
                        info!(session_id = %self.id, "Channel closed");
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.record_task_outcome(joined);
                }
            }
        }

        self.disconnect();
        self.stats
    }
}
