use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::prediction::{HistoryItem, Prediction, ResultTag, Verdict};
use crate::storage::KeyValueStore;

pub const HISTORY_KEY: &str = "predictionHistory";

/// Archived predictions, newest first, mirrored to a key-value store after
/// every mutation.
///
/// A failed write leaves the in-memory list updated and reports the
/// `StorageError`; the next successful write persists everything.
pub struct HistoryStore<S> {
    store: S,
    items: Vec<HistoryItem>,
    last_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistorySummary {
    pub pending: usize,
    pub correct: usize,
    pub incorrect: usize,
}

impl HistorySummary {
    pub fn total(&self) -> usize {
        self.pending + self.correct + self.incorrect
    }

    /// Share of settled predictions that were right.
    pub fn accuracy(&self) -> Option<f64> {
        let settled = self.correct + self.incorrect;
        if settled == 0 {
            return None;
        }
        Some(self.correct as f64 / settled as f64)
    }
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn open(store: S) -> Self {
        let items = load_items(&store);
        let last_id = max_id(&items);
        debug!(items = items.len(), "history loaded");
        Self {
            store,
            items,
            last_id,
        }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn get(&self, id: u64) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Archive a prediction as pending. Returns the new item's id.
    pub fn add(&mut self, prediction: Prediction) -> Result<u64, StorageError> {
        let id = self.next_id();
        debug!(id, label = %prediction.match_label, "history add");
        self.items.insert(
            0,
            HistoryItem {
                prediction,
                id,
                result: ResultTag::Pending,
            },
        );
        self.persist()?;
        Ok(id)
    }

    /// Unknown ids are ignored.
    pub fn mark_result(&mut self, id: u64, verdict: Verdict) -> Result<(), StorageError> {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            debug!(id, "mark_result on unknown id");
            return Ok(());
        };
        item.result = verdict.into();
        self.persist()
    }

    /// Unknown ids are ignored.
    pub fn delete(&mut self, id: u64) -> Result<(), StorageError> {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() == before {
            debug!(id, "delete on unknown id");
            return Ok(());
        }
        self.persist()
    }

    /// Re-read the backing store, dropping unsaved in-memory state.
    pub fn reload(&mut self) {
        self.items = load_items(&self.store);
        self.last_id = self.last_id.max(max_id(&self.items));
    }

    pub fn summary(&self) -> HistorySummary {
        let mut summary = HistorySummary::default();
        for item in &self.items {
            match item.result {
                ResultTag::Pending => summary.pending += 1,
                ResultTag::Correct => summary.correct += 1,
                ResultTag::Incorrect => summary.incorrect += 1,
            }
        }
        summary
    }

    // Millisecond clock, bumped past every id already issued or stored.
    fn next_id(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let floor = self.last_id.max(max_id(&self.items)).saturating_add(1);
        self.last_id = now.max(floor);
        self.last_id
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.items)?;
        self.store.set(HISTORY_KEY, &json).inspect_err(|err| {
            warn!(error = %err, "history persist failed");
        })
    }
}

/// Drop every active prediction carrying `label`. Returns how many went.
pub fn remove_by_match_label(active: &mut Vec<Prediction>, label: &str) -> usize {
    let before = active.len();
    active.retain(|p| p.match_label != label);
    before - active.len()
}

fn load_items<S: KeyValueStore>(store: &S) -> Vec<HistoryItem> {
    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(error = %err, "history read failed; starting empty");
            return Vec::new();
        }
    };
    serde_json::from_str::<Vec<HistoryItem>>(&raw).unwrap_or_else(|err| {
        warn!(error = %err, "stored history is corrupt; starting empty");
        Vec::new()
    })
}

fn max_id(items: &[HistoryItem]) -> u64 {
    items.iter().map(|item| item.id).max().unwrap_or(0)
}
