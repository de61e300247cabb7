use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Latest observed block height per group.
///
/// Heights only move forward: a notification carrying a lower height than
/// one already seen (e.g. from a lagging node) is ignored.
#[derive(Debug, Clone, Default)]
pub struct BlockHeightCache {
    heights: Arc<Mutex<HashMap<u32, u64>>>,
}

impl BlockHeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `height` for `group_id`. Returns true if it raised the maximum.
    pub fn update(&self, group_id: u32, height: u64) -> bool {
        let mut heights = self.heights.lock().unwrap_or_else(|e| e.into_inner());
        let current = heights.entry(group_id).or_insert(0);
        if height > *current {
            *current = height;
            true
        } else {
            false
        }
    }

    /// Start tracking a group at height 0 if it is not tracked yet.
    pub fn track(&self, group_id: u32) {
        self.heights
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(group_id)
            .or_insert(0);
    }

    pub fn get(&self, group_id: u32) -> Option<u64> {
        self.heights
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&group_id)
            .copied()
    }

    pub fn is_tracked(&self, group_id: u32) -> bool {
        self.get(group_id).is_some()
    }
}
