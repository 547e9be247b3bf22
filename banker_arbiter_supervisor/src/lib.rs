//! banker_arbiter_supervisor
//!
//! Outside-world facing orchestration layer for `banker_arbiter_core`.
//!
//! Responsibilities:
//! - own named arbiter arenas (`arena_id -> BankerState`)
//! - shard arenas by `arena_id` (deterministic)
//! - serialize every request/safety call as one critical section per arena
//! - storage-agnostic snapshot/restore of all arena state
//!
//! Non-goals:
//! - no IO
//! - no async
//! - no waiting/retry policy (callers react to `Outcome` values)

pub mod supervisor;

pub use supervisor::{
    ActionEvent,
    AllocationRequest,
    ArbiterSupervisor,
    RestoreStats,
    SupervisorError,
    SupervisorSnapshot,
};
