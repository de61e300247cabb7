//! In-flight request bookkeeping.
//!
//! Every request sent with a timeout gets one entry keyed by its
//! correlation id. Removing the entry and sending the outcome happen under
//! one lock, so whichever of reply, timeout, or connection failure gets
//! there first is the only one that resolves the request.

use std::collections::HashMap;
use std::sync::Mutex;

use bcos_channel_frame::{CorrelationId, MessageType};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{ChannelError, Result};

/// How a reply is judged final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// Read-only query: any `error` or a present `result` answers it.
    Query,
    /// Transaction: only an `error`, `status` or `result.status` answers it.
    /// A bare acknowledgement is not final.
    Transaction,
    /// Registration-style request: the first reply answers it.
    Registration,
}

impl PendingKind {
    pub fn for_message(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Query => Self::Query,
            MessageType::ChannelRpcRequest => Self::Transaction,
            _ => Self::Registration,
        }
    }

    /// Whether `response` is the definitive reply for this kind of request.
    pub fn is_answered(self, response: &Value) -> bool {
        match self {
            Self::Query => is_truthy(response.get("error")) || response.get("result").is_some(),
            Self::Transaction => {
                is_truthy(response.get("error"))
                    || is_truthy(response.get("status"))
                    || response
                        .get("result")
                        .filter(|r| is_truthy(Some(r)))
                        .is_some_and(|r| is_truthy(r.get("status")))
            }
            Self::Registration => true,
        }
    }
}

/// Truthiness as the node's JSON producers use it: absent, `null`,
/// `false`, `0` and `""` are all "not set".
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Map a final reply to the caller's outcome.
pub(crate) fn outcome_from(response: Value) -> Result<Value> {
    if is_truthy(response.get("error")) {
        Err(ChannelError::Application(response))
    } else {
        Ok(response)
    }
}

pub(crate) type Outcome = Result<Value>;

/// What happened when a reply was offered to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Resolved,
    /// The entry exists but the reply was not final; the entry stays.
    NotReady,
    /// No entry: already resolved, timed out, or never ours.
    Unknown,
}

struct PendingRequest {
    connection_id: u64,
    kind: PendingKind,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<CorrelationId, PendingRequest>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `seq` on a connection.
    pub(crate) fn register(
        &self,
        seq: CorrelationId,
        connection_id: u64,
        kind: PendingKind,
    ) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            seq,
            PendingRequest {
                connection_id,
                kind,
                tx,
            },
        );
        rx
    }

    /// Offer a reply. `decide` sees the entry's kind and returns the
    /// outcome if the reply is final; the entry is removed only then.
    pub(crate) fn complete(
        &self,
        seq: &CorrelationId,
        decide: impl FnOnce(PendingKind) -> Option<Outcome>,
    ) -> Completion {
        let mut entries = self.lock();
        let Some(entry) = entries.get(seq) else {
            return Completion::Unknown;
        };
        let Some(outcome) = decide(entry.kind) else {
            return Completion::NotReady;
        };
        if let Some(entry) = entries.remove(seq) {
            // The receiver may already be gone if the caller was cancelled.
            let _ = entry.tx.send(outcome);
        }
        Completion::Resolved
    }

    /// Resolve `seq` unconditionally.
    pub(crate) fn resolve(&self, seq: &CorrelationId, outcome: Outcome) -> bool {
        self.complete(seq, |_| Some(outcome)) == Completion::Resolved
    }

    /// Drop an entry without resolving it. Returns false if it was gone.
    pub(crate) fn remove(&self, seq: &CorrelationId) -> bool {
        self.lock().remove(seq).is_some()
    }

    /// Fail every request waiting on one connection.
    pub(crate) fn fail_connection(&self, connection_id: u64, err: &ChannelError) -> usize {
        let mut entries = self.lock();
        let failed: Vec<CorrelationId> = entries
            .iter()
            .filter(|(_, entry)| entry.connection_id == connection_id)
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &failed {
            if let Some(entry) = entries.remove(seq) {
                let _ = entry.tx.send(Err(err.clone()));
            }
        }
        failed.len()
    }

    /// Fail everything.
    pub(crate) fn fail_all(&self, err: &ChannelError) -> usize {
        let drained: Vec<PendingRequest> = self.lock().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(err.clone()));
        }
        count
    }

    pub fn contains(&self, seq: &CorrelationId) -> bool {
        self.lock().contains_key(seq)
    }

    pub fn kind_of(&self, seq: &CorrelationId) -> Option<PendingKind> {
        self.lock().get(seq).map(|entry| entry.kind)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, PendingRequest>> {
        // A panicking callback elsewhere must not wedge request bookkeeping.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes a request's entry when the waiting caller goes away, whether it
/// finished, failed to write, or was cancelled.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingTable,
    seq: CorrelationId,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingTable, seq: CorrelationId) -> Self {
        Self { table, seq }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.seq);
    }
}
