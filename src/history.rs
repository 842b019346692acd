//! Bounded linear undo/redo log of full-scene snapshots

use std::collections::HashSet;

use crate::error::EditorError;
use crate::scene::{AssetId, SceneDocument};

pub const MAX_HISTORY_SIZE: usize = 10;

/// Serialized scene plus the image assets it needs to be replayed
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    serialized: String,
    assets: Vec<AssetId>,
    sequence: u64,
}

impl HistorySnapshot {
    pub fn capture(doc: &SceneDocument) -> Result<Self, EditorError> {
        Ok(Self {
            serialized: serde_json::to_string(doc)?,
            assets: doc.assets(),
            sequence: 0,
        })
    }

    pub fn document(&self) -> Result<SceneDocument, EditorError> {
        Ok(serde_json::from_str(&self.serialized)?)
    }

    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Insertion order, assigned when pushed
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[doc(hidden)]
    pub fn from_serialized(serialized: String) -> Self {
        Self {
            serialized,
            assets: Vec::new(),
            sequence: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Debug)]
pub struct History {
    entries: Vec<HistorySnapshot>,
    /// Position of the current state; `None` while empty
    index: Option<usize>,
    capacity: usize,
    locked: bool,
    next_sequence: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            capacity: capacity.max(1),
            locked: false,
            next_sequence: 0,
        }
    }

    /// Record a new current state.
    ///
    /// Returns `false` without touching the log while locked or when the
    /// snapshot equals the current one. Otherwise the redo branch is
    /// discarded and the oldest entry evicted past capacity.
    pub fn push(&mut self, mut snapshot: HistorySnapshot) -> bool {
        if self.locked {
            tracing::debug!("History locked, snapshot skipped");
            return false;
        }

        if let Some(current) = self.current()
            && current.serialized == snapshot.serialized
        {
            return false;
        }

        self.entries.truncate(self.index.map_or(0, |i| i + 1));

        snapshot.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(snapshot);

        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.index = Some(self.entries.len() - 1);

        tracing::debug!(
            "History push #{} ({} entries)",
            self.next_sequence - 1,
            self.entries.len()
        );
        true
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.index.and_then(|i| self.entries.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&HistorySnapshot> {
        self.entries.get(index)
    }

    pub fn undo_target(&self) -> Option<usize> {
        self.index.filter(|&i| i > 0).map(|i| i - 1)
    }

    pub fn redo_target(&self) -> Option<usize> {
        self.index
            .filter(|&i| i + 1 < self.entries.len())
            .map(|i| i + 1)
    }

    /// Move the current position after a successful replay
    pub fn set_index(&mut self, index: usize) {
        if index < self.entries.len() {
            self.index = Some(index);
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.undo_target().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.redo_target().is_some()
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Clear all history (e.g., when loading a new image)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn referenced_assets(&self) -> HashSet<AssetId> {
        self.entries
            .iter()
            .flat_map(|s| s.assets.iter().copied())
            .collect()
    }
}
