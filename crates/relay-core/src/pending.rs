//! Pending Request Table - the async-to-sync bridge.
//!
//! Maps request ids to the one-shot continuation of the caller waiting on it.
//!
//! Flow:
//! 1. Dispatcher calls `insert()` and keeps the returned receiver
//! 2. Dispatcher broadcasts the command
//! 3. Exactly one of completion router, per-request timer or reaper calls
//!    `resolve()` / `sweep_expired()` and removes the entry; if the caller
//!    goes away first, the dispatcher calls `cancel()` instead
//! 4. The remover owns the sender and is the only one able to deliver
//!
//! Removal from the map is the linearization point: whoever gets the entry
//! out of the `DashMap` resolves it, everyone else sees "already resolved".

use crate::domain::{CommandKind, RequestId, TableError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// How a request ended
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Executor sent a result
    Succeeded(serde_json::Value),
    /// Executor sent an error
    Failed(String),
    /// The dispatcher's own deadline timer fired
    TimedOut,
    /// The reaper swept it
    Expired,
}

impl Resolution {
    fn is_completion(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// What `resolve` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    /// Entry was pending and has now been resolved
    Resolved,
    /// Entry was resolved earlier (late or duplicate completion)
    AlreadyResolved,
    /// Never issued, or resolved too long ago to remember
    Unknown,
}

/// A request waiting for its outcome
struct PendingEntry {
    sender: oneshot::Sender<Resolution>,
    kind: CommandKind,
    created_at: Instant,
    deadline: Instant,
}

/// Counters for the pending table
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_succeeded: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_timeouts: AtomicU64,
    /// Reaper resolutions; non-zero means per-request timers are not firing
    pub total_expired: AtomicU64,
    /// Resolved but the caller had already gone away
    pub total_abandoned: AtomicU64,
    /// Caller dropped its dispatch before any outcome; removed without delivery
    pub total_cancelled: AtomicU64,
    /// Completions that arrived after their request was resolved
    pub late_completions: AtomicU64,
    /// Completions for ids the table never knew (or forgot)
    pub unknown_completions: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub expired: u64,
    pub abandoned: u64,
    pub cancelled: u64,
    pub late_completions: u64,
    pub unknown_completions: u64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            succeeded: self.total_succeeded.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            expired: self.total_expired.load(Ordering::Relaxed),
            abandoned: self.total_abandoned.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            late_completions: self.late_completions.load(Ordering::Relaxed),
            unknown_completions: self.unknown_completions.load(Ordering::Relaxed),
        }
    }
}

/// Bounded FIFO memory of recently resolved ids
struct Tombstones {
    order: VecDeque<RequestId>,
    members: HashSet<RequestId>,
    capacity: usize,
}

impl Tombstones {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, id: RequestId) {
        if self.capacity == 0 || !self.members.insert(id) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    fn contains(&self, id: &RequestId) -> bool {
        self.members.contains(id)
    }
}

/// Table of requests awaiting an executor reply
pub struct PendingRequestTable {
    pending: DashMap<RequestId, PendingEntry>,
    tombstones: Mutex<Tombstones>,
    stats: PendingStats,
}

impl PendingRequestTable {
    pub fn new(tombstone_capacity: usize) -> Self {
        Self {
            pending: DashMap::new(),
            tombstones: Mutex::new(Tombstones::new(tombstone_capacity)),
            stats: PendingStats::default(),
        }
    }

    /// Register a request and get the receiver its outcome will arrive on.
    ///
    /// A duplicate id means id generation is broken; the existing entry is
    /// left untouched.
    pub fn insert(
        &self,
        id: RequestId,
        kind: CommandKind,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Resolution>, TableError> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => {
                error!(request_id = %id, kind = %kind, "Duplicate request id");
                Err(TableError::DuplicateRequestId(id))
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(PendingEntry {
                    sender,
                    kind,
                    created_at: Instant::now(),
                    deadline,
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, kind = %kind, "Registered pending request");
                Ok(receiver)
            }
        }
    }

    /// Resolve a request. Idempotent: only the first call for an id has any
    /// effect.
    pub fn resolve(&self, id: RequestId, resolution: Resolution) -> ResolveStatus {
        if let Some(entry) = self.take(id, |_| true) {
            self.finish(id, entry, resolution);
            return ResolveStatus::Resolved;
        }

        let status = if self.tombstones.lock().contains(&id) {
            ResolveStatus::AlreadyResolved
        } else {
            ResolveStatus::Unknown
        };

        if resolution.is_completion() {
            match status {
                ResolveStatus::AlreadyResolved => {
                    self.stats.late_completions.fetch_add(1, Ordering::Relaxed)
                }
                _ => self
                    .stats
                    .unknown_completions
                    .fetch_add(1, Ordering::Relaxed),
            };
        }

        status
    }

    /// Remove and expire every entry whose deadline is at or before `now`.
    ///
    /// Returns the ids that were expired by this call.
    pub fn sweep_expired(&self, now: Instant) -> Vec<RequestId> {
        let candidates: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().deadline <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut expired = Vec::with_capacity(candidates.len());
        for id in candidates {
            // Re-check under the shard lock; a completion may have won meanwhile
            if let Some(entry) = self.take(id, |e| e.deadline <= now) {
                warn!(
                    request_id = %id,
                    kind = %entry.kind,
                    age_ms = entry.created_at.elapsed().as_millis() as u64,
                    "Reaping expired pending request"
                );
                self.finish(id, entry, Resolution::Expired);
                expired.push(id);
            }
        }

        expired
    }

    /// Drop a request whose caller went away before any outcome arrived.
    ///
    /// Nothing is delivered. Returns false if the request was already resolved.
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.take(id, |_| true) {
            Some(entry) => {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, kind = %entry.kind, "Cancelled pending request");
                true
            }
            None => false,
        }
    }

    /// Number of unresolved requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Remove an entry if `due` accepts it. The tombstone is written while the
    /// shard lock is still held, so a racing resolver that finds the slot empty
    /// always sees the id as already resolved.
    fn take(&self, id: RequestId, due: impl Fn(&PendingEntry) -> bool) -> Option<PendingEntry> {
        match self.pending.entry(id) {
            Entry::Occupied(slot) if due(slot.get()) => {
                self.tombstones.lock().record(id);
                Some(slot.remove())
            }
            _ => None,
        }
    }

    fn finish(&self, id: RequestId, entry: PendingEntry, resolution: Resolution) {
        let counter = match &resolution {
            Resolution::Succeeded(_) => &self.stats.total_succeeded,
            Resolution::Failed(_) => &self.stats.total_failed,
            Resolution::TimedOut => &self.stats.total_timeouts,
            Resolution::Expired => &self.stats.total_expired,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let elapsed_ms = entry.created_at.elapsed().as_millis() as u64;
        if entry.sender.send(resolution).is_err() {
            // Caller future was dropped before the outcome arrived
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %id, kind = %entry.kind, "Pending request receiver dropped");
        } else {
            debug!(
                request_id = %id,
                kind = %entry.kind,
                elapsed_ms,
                "Resolved pending request"
            );
        }
    }
}
