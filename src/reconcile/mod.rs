//! Batch reconciliation of patient records.
//!
//! The authoritative collection is an immutable, ordered list of shared
//! record handles. [`merge`] never edits it in place: it returns the same
//! handle when a batch changes nothing, and otherwise a new collection that
//! still reuses the original handle of every record that did not change.

use crate::vitals::PatientVitals;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ordered, id-unique collection of patient records
pub type Collection = Arc<Vec<Arc<PatientVitals>>>;

/// Outcome of merging one batch
#[derive(Debug, Clone)]
pub struct Merge {
    /// Collection after the batch (same handle as the input when unchanged)
    pub collection: Collection,

    /// True when at least one record was replaced or added
    pub changed: bool,

    /// Existing records replaced by a different value
    pub replaced: usize,

    /// Records seen for the first time
    pub added: usize,
}

/// Create an empty collection
pub fn empty() -> Collection {
    Arc::new(Vec::new())
}

/// Merge a batch of updates into `previous`.
///
/// Algorithm:
/// 1. Index `updates` by id; a later record for the same id wins.
/// 2. Walk `previous` in order. When an update exists for a record, keep the
///    original handle if the values are equal, otherwise take the update.
/// 3. Append ids not seen before, in the order they first appear in the
///    batch, each carrying its last value from the batch.
/// 4. If nothing was replaced or added, return `previous` itself.
///
/// Records are never removed.
pub fn merge(previous: &Collection, updates: &[Arc<PatientVitals>]) -> Merge {
    let unchanged = || Merge {
        collection: Arc::clone(previous),
        changed: false,
        replaced: 0,
        added: 0,
    };

    if updates.is_empty() {
        return unchanged();
    }

    // id -> index of the last record for that id in the batch
    let mut latest: HashMap<&str, usize> = HashMap::with_capacity(updates.len());
    for (index, update) in updates.iter().enumerate() {
        latest.insert(update.id.as_str(), index);
    }

    let mut next = Vec::with_capacity(previous.len() + latest.len());
    let mut replaced = 0;

    for existing in previous.iter() {
        match latest.remove(existing.id.as_str()) {
            Some(index) if *updates[index] != **existing => {
                next.push(Arc::clone(&updates[index]));
                replaced += 1;
            }
            _ => next.push(Arc::clone(existing)),
        }
    }

    let mut added = 0;
    for update in updates {
        if let Some(index) = latest.remove(update.id.as_str()) {
            next.push(Arc::clone(&updates[index]));
            added += 1;
        }
    }

    if replaced == 0 && added == 0 {
        return unchanged();
    }

    debug!(replaced, added, total = next.len(), "Batch reconciled");

    Merge {
        collection: Arc::new(next),
        changed: true,
        replaced,
        added,
    }
}

/// Build a collection from a full snapshot.
///
/// Ids are unique in the result: a repeated id keeps its first position and
/// its last value, matching [`merge`] on an empty collection.
pub fn from_snapshot(records: &[Arc<PatientVitals>]) -> Collection {
    merge(&empty(), records).collection
}

#[cfg(test)]
mod tests;
