//! Push-notification subscriber registries.
//!
//! Callbacks run on the connection's reader task. They are cloned out of
//! the registry before being invoked, so a callback may register or
//! unregister subscribers without deadlocking. A panicking callback is
//! contained and logged; the connection and the other subscribers carry on.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::event_log::EventLogPush;

/// Called with `(group_id, block_height)`.
pub type BlockNotifyCallback = Arc<dyn Fn(u32, u64) + Send + Sync>;

/// Called with each event-log push for the subscribed filter.
pub type EventLogCallback = Arc<dyn Fn(&EventLogPush) + Send + Sync>;

/// Identifies one block-notify subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockNotifyHandle {
    group_id: u32,
    id: u64,
}

impl BlockNotifyHandle {
    pub fn group_id(&self) -> u32 {
        self.group_id
    }
}

/// Group id → ordered block-notify callbacks.
#[derive(Default)]
pub struct BlockNotifyRegistry {
    next_id: AtomicU64,
    groups: Mutex<HashMap<u32, Vec<(u64, BlockNotifyCallback)>>>,
}

impl BlockNotifyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `group_id`. Callbacks fire in registration order.
    pub fn register(&self, group_id: u32, callback: BlockNotifyCallback) -> BlockNotifyHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(group_id).or_default().push((id, callback));
        BlockNotifyHandle { group_id, id }
    }

    /// Remove one subscription. Returns false if it was already gone.
    pub fn unregister(&self, handle: BlockNotifyHandle) -> bool {
        let mut groups = self.lock();
        let Some(callbacks) = groups.get_mut(&handle.group_id) else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != handle.id);
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            groups.remove(&handle.group_id);
        }
        removed
    }

    /// Invoke every callback for `group_id`. Returns how many ran.
    pub fn notify(&self, group_id: u32, block_height: u64) -> usize {
        let callbacks: Vec<BlockNotifyCallback> = match self.lock().get(&group_id) {
            Some(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };
        for callback in &callbacks {
            invoke("block_notify", || callback(group_id, block_height));
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, group_id: u32) -> usize {
        self.lock().get(&group_id).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Vec<(u64, BlockNotifyCallback)>>> {
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run one subscriber callback, containing any panic it raises.
fn invoke(subscriber: &'static str, callback: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        warn!(
            subscriber,
            panic = panic_message(payload.as_ref()),
            "subscriber callback panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Filter id → event-log callback. At most one callback per filter id.
#[derive(Default)]
pub struct EventLogRegistry {
    callbacks: Mutex<HashMap<String, EventLogCallback>>,
}

impl EventLogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback` for `filter_id`, replacing any previous one.
    pub fn register(&self, filter_id: impl Into<String>, callback: EventLogCallback) {
        self.lock().insert(filter_id.into(), callback);
    }

    pub fn unregister(&self, filter_id: &str) -> bool {
        self.lock().remove(filter_id).is_some()
    }

    pub fn contains(&self, filter_id: &str) -> bool {
        self.lock().contains_key(filter_id)
    }

    /// Deliver a push to its filter's callback.
    ///
    /// A push with a non-success status is the node's last word for that
    /// filter: the callback sees it once and is then removed. Returns false
    /// if no callback was registered.
    pub fn deliver(&self, push: &EventLogPush) -> bool {
        let callback = {
            let mut callbacks = self.lock();
            if push.status.is_success() {
                callbacks.get(&push.filter_id).cloned()
            } else {
                callbacks.remove(&push.filter_id)
            }
        };
        match callback {
            Some(callback) => {
                invoke("event_log", || callback(push));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EventLogCallback>> {
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
