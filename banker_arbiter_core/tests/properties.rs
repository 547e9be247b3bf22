//! Property tests: fuzz request sequences against randomly built arenas and
//! assert the transactional guarantees continuously.

use banker_arbiter_core::*;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

#[derive(Debug, Clone)]
struct ArenaSpec {
    resources: usize,
    /// Per process: (allocation, headroom); maximum = allocation + headroom.
    rows: Vec<(Vec<u32>, Vec<u32>)>,
    /// Initially available instances per resource class.
    spare: Vec<u32>,
    requests: Vec<(usize, Vec<u32>)>,
}

impl ArenaSpec {
    fn build(&self) -> BankerState {
        let mut state = BankerState::new(self.rows.len(), self.resources);
        state.set_available(&self.spare).unwrap();
        for (id, (alloc, headroom)) in self.rows.iter().enumerate() {
            let max: Vec<u32> = alloc.iter().zip(headroom).map(|(a, h)| a + h).collect();
            state.register_process(id, &max, alloc).unwrap();
        }
        state
    }
}

fn arena_spec() -> impl Strategy<Value = ArenaSpec> {
    (1usize..=5, 1usize..=4).prop_flat_map(|(processes, resources)| {
        let row = (
            prop::collection::vec(0u32..4, resources),
            prop::collection::vec(0u32..4, resources),
        );
        (
            prop::collection::vec(row, processes),
            prop::collection::vec(0u32..5, resources),
            prop::collection::vec(
                (0..processes, prop::collection::vec(0u32..5, resources)),
                0..12,
            ),
        )
            .prop_map(move |(rows, spare, requests)| ArenaSpec {
                resources,
                rows,
                spare,
                requests,
            })
    })
}

// prop_assert! early-returns Err, so this helper carries the Result type.
fn assert_invariants(state: &BankerState) -> Result<(), TestCaseError> {
    for p in 0..state.processes() {
        let max = state.maximum_row(p).unwrap();
        let alloc = state.allocation_row(p).unwrap();
        let need = state.need_row(p).unwrap();
        for r in 0..state.resources() {
            prop_assert!(alloc[r] <= max[r]);
            prop_assert_eq!(need[r], max[r] - alloc[r]);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn request_sequences_keep_the_guarantees(spec in arena_spec()) {
        let mut state = spec.build();
        let totals = state.totals();
        assert_invariants(&state)?;

        for (id, request) in &spec.requests {
            let before = state.clone();
            let outcome = request_resources(&mut state, *id, request).unwrap();

            match outcome {
                Outcome::Granted => {
                    // Grant really applied: available shrank by the request.
                    for (r, req) in request.iter().enumerate() {
                        prop_assert_eq!(state.available()[r], before.available()[r] - req);
                    }
                    // A granted request never leaves an unsafe state behind.
                    prop_assert!(is_safe(&state));
                }
                // Rollback exactness: every non-granted outcome restores the
                // full state bit-for-bit.
                _ => prop_assert_eq!(&state, &before),
            }

            assert_invariants(&state)?;
            prop_assert_eq!(state.totals(), totals.clone());
        }
    }

    #[test]
    fn safety_query_is_pure(spec in arena_spec()) {
        let state = spec.build();
        let snapshot = state.clone();
        let first = safe_sequence(&state);
        prop_assert_eq!(safe_sequence(&state), first.clone());
        prop_assert_eq!(is_safe(&state), first.is_some());
        prop_assert_eq!(state, snapshot);
    }

    #[test]
    fn zero_request_is_granted_from_any_safe_state(spec in arena_spec()) {
        // If the initial state is safe, the all-zero request is granted and
        // changes nothing.
        let mut state = spec.build();
        if is_safe(&state) {
            let before = state.clone();
            let zeros = vec![0u32; state.resources()];
            let outcome = request_resources(&mut state, 0, &zeros).unwrap();
            prop_assert_eq!(outcome, Outcome::Granted);
            prop_assert_eq!(state, before);
        }
    }
}
