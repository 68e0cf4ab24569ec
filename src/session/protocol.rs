use crate::vitals::{parse_records, PatientVitals};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Feed → observer frame as it travels on the wire.
///
/// Records stay as raw JSON here so that one malformed record can be dropped
/// without rejecting the whole frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    InitialSnapshot { entities: Vec<Value> },
    UpdateBatch { entities: Vec<Value> },
}

/// Outbound frame, borrowing the records it carries
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage<'a> {
    InitialSnapshot { entities: &'a [PatientVitals] },
    UpdateBatch { entities: &'a [PatientVitals] },
}

impl FeedMessage<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Validated inbound channel event
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Full state; replaces everything the observer holds
    InitialSnapshot(Vec<PatientVitals>),
    /// Incremental records in arrival order
    UpdateBatch(Vec<PatientVitals>),
}

/// A decoded frame plus the number of records dropped as malformed
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub event: ChannelEvent,
    pub dropped: usize,
}

/// Decode one text frame.
///
/// Fails only when the envelope itself is unusable. Individual records that
/// fail validation are logged and dropped.
pub fn decode_frame(text: &str) -> serde_json::Result<DecodedFrame> {
    let frame: WireFrame = serde_json::from_str(text)?;

    let (entities, snapshot) = match frame {
        WireFrame::InitialSnapshot { entities } => (entities, true),
        WireFrame::UpdateBatch { entities } => (entities, false),
    };

    let batch = parse_records(&entities);
    for (index, reason) in &batch.dropped {
        warn!(index = *index, reason = %reason, "Dropping malformed record");
    }

    let event = if snapshot {
        ChannelEvent::InitialSnapshot(batch.records)
    } else {
        ChannelEvent::UpdateBatch(batch.records)
    };

    Ok(DecodedFrame {
        event,
        dropped: batch.dropped.len(),
    })
}
