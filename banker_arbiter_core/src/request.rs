//! Transactional request evaluation: tentatively grant, re-check safety,
//! commit or roll back exactly.

use serde::Deserialize;
use serde::Serialize;

use crate::error::ArbiterError;
use crate::safety::is_safe;
use crate::state::BankerState;

/// Outcome of one request evaluation. All four are ordinary control-flow
/// values a caller branches on; none is a fault.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    /// Request applied; state permanently updated.
    Granted,
    /// The process asked for more than it ever declared it would need.
    /// A caller bug, not a transient condition. State unchanged.
    ExceedsMaximumClaim,
    /// Resources currently held by others; back off and retry later.
    /// State unchanged.
    InsufficientlyAvailable,
    /// Granting would risk deadlock; back off, possibly with a smaller
    /// request. State restored to its pre-call values.
    DeniedUnsafe,
}

impl Outcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Outcome::Granted)
    }

    /// Whether the denial is transient (retry may succeed once other
    /// processes release resources) rather than a caller bug.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Outcome::InsufficientlyAvailable | Outcome::DeniedUnsafe
        )
    }
}

/// Evaluate a request from process `id` for `request[r]` instances of each
/// resource class `r`.
///
/// Hard gates, in order; failing any gate returns without mutating state:
/// 1. claim check (`request <= need[id]`), else [`Outcome::ExceedsMaximumClaim`];
/// 2. availability check (`request <= available`), else
///    [`Outcome::InsufficientlyAvailable`];
/// 3. tentative grant, then safety re-evaluation: commit on safe, exact
///    rollback on unsafe ([`Outcome::DeniedUnsafe`]).
///
/// Errors cover malformed input only (unknown id, wrong-length vector); they
/// are returned before any gate runs.
pub fn request_resources(
    state: &mut BankerState,
    id: usize,
    request: &[u32],
) -> Result<Outcome, ArbiterError> {
    state.check_id(id)?;
    state.check_len(request)?;

    let need = state.need_row(id).expect("id checked above");
    if request.iter().zip(need).any(|(req, n)| req > n) {
        return Ok(Outcome::ExceedsMaximumClaim);
    }

    if request.iter().zip(state.available()).any(|(req, a)| req > a) {
        return Ok(Outcome::InsufficientlyAvailable);
    }

    // Both gates passed: pretend to allocate, then ask whether every process
    // can still finish from the hypothetical post-grant world.
    state.shift(id, request, true);
    if is_safe(state) {
        Ok(Outcome::Granted)
    } else {
        state.shift(id, request, false);
        Ok(Outcome::DeniedUnsafe)
    }
}
