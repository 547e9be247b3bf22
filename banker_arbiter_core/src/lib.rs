//! banker_arbiter_core
//!
//! Deadlock-avoidance resource arbiter (Banker's Algorithm) for a fixed
//! population of processes competing for multiple classes of reusable
//! resources.
//!
//! Responsibilities:
//! - own the `available` / `maximum` / `allocation` / derived `need` matrices
//! - decide whether a state is safe (a completion ordering exists)
//! - evaluate requests transactionally: tentative grant, safety re-check,
//!   commit or exact rollback
//!
//! Non-goals:
//! - no IO
//! - no async
//! - no locking (exclusive access lives in `banker_arbiter_supervisor`)
//! - no resource acquisition, scheduling, deadlock detection, or recovery

pub mod error;
pub mod request;
pub mod safety;
pub mod state;

pub use error::ArbiterError;
pub use request::{request_resources, Outcome};
pub use safety::{is_safe, safe_sequence};
pub use state::BankerState;
