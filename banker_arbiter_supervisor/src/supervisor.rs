//! Sharded arbiter supervisor.
//!
//! This crate is the outside-world facing orchestration layer around
//! `banker_arbiter_core`:
//! - owns per-arena `BankerState`
//! - routes calls by `arena_id`
//! - holds one shard lock across each whole request evaluation, so no caller
//!   ever observes a tentatively-mutated state
//!
//! No IO. No async. Concurrency is achieved by sharding arenas by `arena_id`.

use std::collections::{HashMap, HashSet};

use banker_arbiter_core::{
    is_safe, request_resources, safe_sequence, ArbiterError, BankerState, Outcome,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("unknown arena: {0}")]
    UnknownArena(String),

    #[error(transparent)]
    Arbiter(#[from] ArbiterError),
}

/// One allocation request addressed to a named arena.
#[derive(Clone, Debug)]
pub struct AllocationRequest {
    pub arena_id: String,
    pub process: usize,
    pub request: Vec<u32>,
}

/// Output of one batch-ingested request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    pub arena_id: String,
    pub process: usize,
    pub outcome: Result<Outcome, SupervisorError>,
}

/// Snapshot of supervisor state for storage-agnostic persistence.
///
/// This is intentionally pure data: callers decide how/where to store it.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SupervisorSnapshot {
    /// Per-arena arbiter state.
    pub arenas: Vec<(String, BankerState)>,
}

/// Simple observability counters returned by restore/import operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RestoreStats {
    /// Number of arena states applied from the snapshot/iterator.
    pub applied: usize,
    /// Number of existing arena states that were overwritten.
    pub overwritten: usize,
}

#[derive(Default, Debug)]
struct Shard {
    arenas: HashMap<String, BankerState>,
}

/// Deterministic FNV-1a hash (stable across runs).
fn fnv1a_u64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn shard_index(arena_id: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    (fnv1a_u64(arena_id) as usize) % shard_count
}

/// A sharded supervisor. One "arbiter instance" is one
/// `(arena_id -> BankerState)` entry.
///
/// - `shards == 1` is the default and behaves like a single-threaded
///   supervisor.
/// - Increasing `shards` reduces contention between arenas when the
///   supervisor is shared across threads, while keeping each arena's
///   request path a single critical section.
#[derive(Debug)]
pub struct ArbiterSupervisor {
    shards: usize,
    // NOTE: State is behind a Mutex for interior mutability. This crate does
    // not spawn threads. If a caller wants to share the supervisor across
    // threads, they can wrap the whole `ArbiterSupervisor` in an `Arc`
    // externally.
    state_shards: Vec<std::sync::Mutex<Shard>>,
}

impl ArbiterSupervisor {
    /// Create a supervisor with `shards` (concurrency count). `shards=1` is
    /// the default.
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        let mut state_shards = Vec::with_capacity(shards);
        for _ in 0..shards {
            state_shards.push(std::sync::Mutex::new(Shard::default()));
        }

        Self {
            shards,
            state_shards,
        }
    }

    /// Create (or replace, by overwrite) an arena for `processes` processes
    /// and `resources` resource classes. All counts start at zero; drive
    /// [`set_available`](Self::set_available) and
    /// [`register_process`](Self::register_process) before evaluating
    /// anything.
    pub fn create_arena(&self, arena_id: impl Into<String>, processes: usize, resources: usize) {
        let arena_id = arena_id.into();
        let mut guard = self.shard_for(&arena_id);
        let replaced = guard
            .arenas
            .insert(arena_id.clone(), BankerState::new(processes, resources))
            .is_some();
        tracing::debug!(arena = %arena_id, processes, resources, replaced, "arena created");
    }

    /// Drop a single arena (useful for ops / debugging).
    pub fn remove_arena(&self, arena_id: &str) {
        let mut guard = self.shard_for(arena_id);
        guard.arenas.remove(arena_id);
    }

    /// Initialize the arena's available vector.
    pub fn set_available(&self, arena_id: &str, values: &[u32]) -> Result<(), SupervisorError> {
        self.with_arena(arena_id, |state| state.set_available(values))?
            .map_err(Into::into)
    }

    /// Register one process row (maximum claim + current allocation).
    pub fn register_process(
        &self,
        arena_id: &str,
        process: usize,
        maximum: &[u32],
        allocation: &[u32],
    ) -> Result<(), SupervisorError> {
        self.with_arena(arena_id, |state| {
            state.register_process(process, maximum, allocation)
        })?
        .map_err(Into::into)
    }

    /// Safety query. Holds the arena's shard lock for the whole scan, so a
    /// standalone query never observes an in-flight request.
    pub fn is_safe(&self, arena_id: &str) -> Result<bool, SupervisorError> {
        self.with_arena(arena_id, |state| is_safe(state))
    }

    /// Like [`is_safe`](Self::is_safe), but reports the completion ordering
    /// found (deterministic, lowest-index-first).
    pub fn safe_sequence(&self, arena_id: &str) -> Result<Option<Vec<usize>>, SupervisorError> {
        self.with_arena(arena_id, |state| safe_sequence(state))
    }

    /// Evaluate one request. The entire gate-check / tentative-grant /
    /// commit-or-rollback span executes under the shard lock.
    pub fn request(
        &self,
        arena_id: &str,
        process: usize,
        request: &[u32],
    ) -> Result<Outcome, SupervisorError> {
        let outcome = self
            .with_arena(arena_id, |state| {
                request_resources(state, process, request)
            })??;
        tracing::debug!(arena = %arena_id, process, ?outcome, "request evaluated");
        Ok(outcome)
    }

    /// Export all `(arena_id, BankerState)` pairs as a plain snapshot.
    ///
    /// No IO, no policy: callers decide how/where to persist this.
    /// Deterministic ordering: arenas are returned sorted by `arena_id`.
    pub fn snapshot(&self) -> SupervisorSnapshot {
        self.export_state()
    }

    /// Export a snapshot filtered by a caller-provided predicate.
    ///
    /// Deterministic ordering: arenas are returned sorted by `arena_id`.
    pub fn snapshot_filtered<F>(&self, mut predicate: F) -> SupervisorSnapshot
    where
        F: FnMut(&str, &BankerState) -> bool,
    {
        let mut out: Vec<(String, BankerState)> = Vec::new();

        // Lock shards in a stable order.
        for shard in &self.state_shards {
            let guard = shard
                .lock()
                .expect("arbiter supervisor shard mutex poisoned");
            for (k, v) in guard.arenas.iter() {
                if predicate(k.as_str(), v) {
                    out.push((k.clone(), v.clone()));
                }
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        SupervisorSnapshot { arenas: out }
    }

    /// Export a snapshot containing only the provided `arena_id`s.
    ///
    /// Deterministic ordering: arenas are returned sorted by `arena_id`.
    pub fn snapshot_arenas(&self, arena_ids: &[&str]) -> SupervisorSnapshot {
        let want: HashSet<&str> = arena_ids.iter().copied().collect();
        self.snapshot_filtered(|id, _state| want.contains(id))
    }

    /// Restore supervisor state from a previously exported snapshot.
    ///
    /// This overwrites any existing arena state currently held by the
    /// supervisor. No IO, no policy: callers decide how the snapshot is
    /// stored.
    pub fn restore(&self, snap: SupervisorSnapshot) -> RestoreStats {
        self.import_state(snap.arenas)
    }

    /// Restore supervisor state by merging a snapshot into the current state.
    ///
    /// Unlike `restore()`, this does **not** clear existing state first.
    /// Snapshot entries overwrite existing entries with the same `arena_id`.
    pub fn restore_merge(&self, snap: SupervisorSnapshot) -> RestoreStats {
        self.import_state_merge(snap.arenas)
    }

    /// Export all `(arena_id, BankerState)` pairs.
    ///
    /// Deterministic ordering: returned vector is sorted by `arena_id`.
    pub fn export_state(&self) -> SupervisorSnapshot {
        self.snapshot_filtered(|_, _| true)
    }

    /// Import `(arena_id, BankerState)` pairs, overwriting any existing
    /// arena state.
    ///
    /// The caller controls the source iterator (JSON, sqlite, LMDB, etc.).
    pub fn import_state<I>(&self, iter: I) -> RestoreStats
    where
        I: IntoIterator<Item = (String, BankerState)>,
    {
        // 1) Clear all current shard maps.
        for shard in &self.state_shards {
            let mut guard = shard
                .lock()
                .expect("arbiter supervisor shard mutex poisoned");
            guard.arenas.clear();
        }

        // 2) Re-insert into the current shard layout.
        self.import_state_merge(iter)
    }

    /// Import `(arena_id, BankerState)` pairs without clearing existing
    /// state. Entries overwrite existing entries with the same `arena_id`.
    pub fn import_state_merge<I>(&self, iter: I) -> RestoreStats
    where
        I: IntoIterator<Item = (String, BankerState)>,
    {
        let mut stats = RestoreStats::default();
        for (arena_id, state) in iter {
            let idx = shard_index(&arena_id, self.shards);
            let mut guard = self.state_shards[idx]
                .lock()
                .expect("arbiter supervisor shard mutex poisoned");

            if guard.arenas.insert(arena_id, state).is_some() {
                stats.overwritten += 1;
            }
            stats.applied += 1;
        }
        stats
    }

    /// Evaluate a batch of requests and return one event per request, in
    /// input order.
    ///
    /// Requests are grouped by shard so each shard is locked once; within an
    /// arena the input order is preserved (grant order matters). Output is
    /// deterministic for a given input ordering regardless of shard count.
    pub fn ingest(&self, requests: &[AllocationRequest]) -> Vec<ActionEvent> {
        let mut shard_batches: Vec<Vec<usize>> = vec![Vec::new(); self.shards];
        for (i, req) in requests.iter().enumerate() {
            shard_batches[shard_index(&req.arena_id, self.shards)].push(i);
        }

        let mut out: Vec<(usize, ActionEvent)> = Vec::with_capacity(requests.len());
        for (shard_idx, batch) in shard_batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }

            let mut guard = self.state_shards[shard_idx]
                .lock()
                .expect("arbiter supervisor shard mutex poisoned");

            for i in batch {
                let req = &requests[i];
                let outcome = match guard.arenas.get_mut(&req.arena_id) {
                    None => Err(SupervisorError::UnknownArena(req.arena_id.clone())),
                    Some(state) => request_resources(state, req.process, &req.request)
                        .map_err(Into::into),
                };
                tracing::trace!(arena = %req.arena_id, process = req.process, ?outcome, "batch request evaluated");

                out.push((
                    i,
                    ActionEvent {
                        arena_id: req.arena_id.clone(),
                        process: req.process,
                        outcome,
                    },
                ));
            }
        }

        out.sort_by_key(|(i, _)| *i);
        out.into_iter().map(|(_, ev)| ev).collect()
    }

    fn shard_for(&self, arena_id: &str) -> std::sync::MutexGuard<'_, Shard> {
        let idx = shard_index(arena_id, self.shards);
        self.state_shards[idx]
            .lock()
            .expect("arbiter supervisor shard mutex poisoned")
    }

    /// Run `f` against one arena while holding its shard lock.
    fn with_arena<T>(
        &self,
        arena_id: &str,
        f: impl FnOnce(&mut BankerState) -> T,
    ) -> Result<T, SupervisorError> {
        let mut guard = self.shard_for(arena_id);
        let state = guard
            .arenas
            .get_mut(arena_id)
            .ok_or_else(|| SupervisorError::UnknownArena(arena_id.to_string()))?;
        Ok(f(state))
    }
}
