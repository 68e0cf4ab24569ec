use crate::session::FeedMessage;
use crate::vitals::PatientVitals;
use dashmap::DashMap;
use futures::{stream, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, warn};

/// Latest state per patient plus a broadcast of encoded update batches.
///
/// Batches are encoded once and shared by every subscriber as `Arc<str>`.
pub struct FeedHub {
    /// Lock-free concurrent map for fast reads
    latest: DashMap<String, PatientVitals>,

    /// Encoded `update_batch` frames
    batch_tx: broadcast::Sender<Arc<str>>,
}

/// A subscriber's starting point: one frame carrying the full current state
/// and a receiver for every later batch.
pub struct FeedSubscription {
    pub frame: String,
    pub batches: broadcast::Receiver<Arc<str>>,
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (batch_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: DashMap::new(),
            batch_tx,
        }
    }

    /// Load initial state without broadcasting
    pub fn seed(&self, records: &[PatientVitals]) {
        for record in records {
            self.latest.insert(record.id.clone(), record.clone());
        }
    }

    /// Record a batch as the latest state and broadcast it.
    ///
    /// Returns the number of subscribers the batch reached.
    pub fn publish_batch(&self, records: &[PatientVitals]) -> usize {
        for record in records {
            self.latest.insert(record.id.clone(), record.clone());
        }

        let frame = match (FeedMessage::UpdateBatch { entities: records }).to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to encode update batch");
                return 0;
            }
        };

        // No subscribers is fine
        let reached = self.batch_tx.send(Arc::from(frame)).unwrap_or(0);
        debug!(records = records.len(), subscribers = reached, "Published batch");
        reached
    }

    /// All patients sorted by id
    pub fn snapshot(&self) -> Vec<PatientVitals> {
        let mut records: Vec<PatientVitals> =
            self.latest.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn patient_count(&self) -> usize {
        self.latest.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.batch_tx.receiver_count()
    }

    /// Subscribe to the feed. `frame` is an `initial_snapshot`.
    ///
    /// The receiver is created before the snapshot is taken, so a batch
    /// racing the snapshot shows up at most twice, never zero times.
    pub fn subscribe(&self) -> anyhow::Result<FeedSubscription> {
        self.subscription(true)
    }

    /// Catch-up for a subscriber whose receiver lagged: a fresh receiver and
    /// the full state as an `update_batch`, so the observer keeps its
    /// unchanged records and their histories.
    pub fn resync(&self) -> anyhow::Result<FeedSubscription> {
        self.subscription(false)
    }

    fn subscription(&self, initial: bool) -> anyhow::Result<FeedSubscription> {
        let batches = self.batch_tx.subscribe();
        let records = self.snapshot();
        let message = if initial {
            FeedMessage::InitialSnapshot { entities: &records }
        } else {
            FeedMessage::UpdateBatch { entities: &records }
        };
        let frame = message.to_json()?;

        Ok(FeedSubscription { frame, batches })
    }

    /// In-process frame stream for a local session: the initial snapshot
    /// followed by every batch. A lagging receiver is replaced and the
    /// session gets a resync batch.
    pub fn frames(
        self: &Arc<Self>,
    ) -> anyhow::Result<impl Stream<Item = Result<String, Infallible>> + Unpin> {
        let FeedSubscription { frame, batches } = self.subscribe()?;

        let state = (Arc::clone(self), BroadcastStream::new(batches));
        let updates = stream::unfold(state, |(hub, mut batches)| async move {
            loop {
                match batches.next().await? {
                    Ok(frame) => return Some((Ok(frame.to_string()), (hub, batches))),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Local session lagged, resyncing");
                        match hub.resync() {
                            Ok(sub) => {
                                let batches = BroadcastStream::new(sub.batches);
                                return Some((Ok(sub.frame), (hub, batches)));
                            }
                            Err(e) => error!(error = %e, "Failed to build resync frame"),
                        }
                    }
                }
            }
        });

        Ok(stream::once(async move { Ok::<_, Infallible>(frame) })
            .chain(updates)
            .boxed())
    }
}
