//! Safe-state evaluation: the greedy fixed-point scan at the heart of the
//! Banker's Algorithm.
//!
//! A state is safe when some ordering of the remaining processes exists such
//! that each can obtain its full claim from `work` (currently available
//! resources plus everything released by processes finishing earlier in the
//! ordering). Safety is order-independent, but the scan below is pinned to
//! lowest-index-first so traces are reproducible.

use crate::state::BankerState;

/// Pure query: does a completion ordering exist for every process?
pub fn is_safe(state: &BankerState) -> bool {
    safe_sequence(state).is_some()
}

/// Find a completion ordering, or `None` when the state is unsafe.
///
/// Each pass restarts the scan from process 0 and simulates the completion of
/// the first unfinished process whose entire `need` row fits in `work`
/// (folding its allocation back into `work`). Restarting matters for the
/// reported ordering: after a completion, earlier-indexed processes may newly
/// qualify and take precedence. Worst case O(P^2 * R).
pub fn safe_sequence(state: &BankerState) -> Option<Vec<usize>> {
    let processes = state.processes();
    let mut work = state.available().to_vec();
    let mut finish = vec![false; processes];
    let mut order = Vec::with_capacity(processes);

    while order.len() < processes {
        let candidate = (0..processes).find(|&p| {
            !finish[p]
                && state
                    .need_row(p)
                    .is_some_and(|need| need.iter().zip(&work).all(|(n, w)| n <= w))
        });

        match candidate {
            Some(p) => {
                // Simulate completion: the process runs to its maximum and
                // releases everything it holds.
                let allocation = state.allocation_row(p).expect("scanned id in range");
                for (w, a) in work.iter_mut().zip(allocation) {
                    *w += *a;
                }
                finish[p] = true;
                order.push(p);
            }
            // No unfinished process can finish with the current work vector.
            None => return None,
        }
    }

    Some(order)
}
