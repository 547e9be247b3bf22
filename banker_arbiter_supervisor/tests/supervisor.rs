use banker_arbiter_core::{ArbiterError, Outcome};
use banker_arbiter_supervisor::{
    ActionEvent, AllocationRequest, ArbiterSupervisor, SupervisorError,
};

fn seed_reference_arena(sup: &ArbiterSupervisor, arena: &str) {
    sup.create_arena(arena, 5, 3);
    sup.set_available(arena, &[3, 3, 2]).unwrap();
    sup.register_process(arena, 0, &[7, 5, 3], &[0, 1, 0]).unwrap();
    sup.register_process(arena, 1, &[3, 2, 2], &[2, 0, 0]).unwrap();
    sup.register_process(arena, 2, &[9, 0, 2], &[3, 0, 2]).unwrap();
    sup.register_process(arena, 3, &[2, 2, 2], &[2, 1, 1]).unwrap();
    sup.register_process(arena, 4, &[4, 3, 3], &[0, 0, 2]).unwrap();
}

#[test]
fn scenario_flow_through_supervisor() {
    let sup = ArbiterSupervisor::new(1);
    seed_reference_arena(&sup, "arena:a");

    assert_eq!(sup.is_safe("arena:a"), Ok(true));
    assert_eq!(
        sup.safe_sequence("arena:a"),
        Ok(Some(vec![1, 3, 0, 2, 4]))
    );

    assert_eq!(sup.request("arena:a", 1, &[1, 0, 2]), Ok(Outcome::Granted));

    let snap = sup.snapshot();
    assert_eq!(snap.arenas.len(), 1);
    let (_, state) = &snap.arenas[0];
    assert_eq!(state.available(), &[2, 3, 0]);
    assert_eq!(state.allocation_row(1).unwrap(), &[3, 0, 2]);
    assert_eq!(state.need_row(1).unwrap(), &[0, 2, 0]);
}

#[test]
fn unknown_arena_and_bad_input_are_errors() {
    let sup = ArbiterSupervisor::new(2);
    seed_reference_arena(&sup, "arena:a");

    assert_eq!(
        sup.is_safe("arena:missing"),
        Err(SupervisorError::UnknownArena("arena:missing".to_string()))
    );
    assert_eq!(
        sup.request("arena:a", 9, &[0, 0, 0]),
        Err(SupervisorError::Arbiter(ArbiterError::UnknownProcess {
            id: 9,
            processes: 5
        }))
    );
    assert_eq!(
        sup.set_available("arena:a", &[1, 2]),
        Err(SupervisorError::Arbiter(ArbiterError::DimensionMismatch {
            expected: 3,
            actual: 2
        }))
    );
}

#[test]
fn ingest_preserves_input_order_across_arenas() {
    let sup = ArbiterSupervisor::new(4);
    seed_reference_arena(&sup, "arena:a");
    seed_reference_arena(&sup, "arena:b");

    let req = |arena: &str, process: usize, request: &[u32]| AllocationRequest {
        arena_id: arena.to_string(),
        process,
        request: request.to_vec(),
    };

    let events = sup.ingest(&[
        req("arena:a", 1, &[1, 0, 2]),
        req("arena:b", 4, &[3, 3, 0]),
        req("arena:a", 4, &[3, 3, 0]),
        req("arena:missing", 0, &[0, 0, 0]),
    ]);

    assert_eq!(
        events,
        vec![
            ActionEvent {
                arena_id: "arena:a".to_string(),
                process: 1,
                outcome: Ok(Outcome::Granted),
            },
            // arena:b never saw the first grant, so from its initial state
            // the request passes both gates and fails the safety re-check.
            ActionEvent {
                arena_id: "arena:b".to_string(),
                process: 4,
                outcome: Ok(Outcome::DeniedUnsafe),
            },
            // arena:a did, so the same request fails the availability gate.
            ActionEvent {
                arena_id: "arena:a".to_string(),
                process: 4,
                outcome: Ok(Outcome::InsufficientlyAvailable),
            },
            ActionEvent {
                arena_id: "arena:missing".to_string(),
                process: 0,
                outcome: Err(SupervisorError::UnknownArena(
                    "arena:missing".to_string()
                )),
            },
        ]
    );
}

#[test]
fn snapshot_restore_roundtrip_across_shard_counts() {
    let sup = ArbiterSupervisor::new(1);
    seed_reference_arena(&sup, "arena:a");
    seed_reference_arena(&sup, "arena:b");
    sup.request("arena:a", 1, &[1, 0, 2]).unwrap();

    let snap = sup.snapshot();

    // Restore into a supervisor with a different shard layout.
    let other = ArbiterSupervisor::new(3);
    let stats = other.restore(snap.clone());
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.overwritten, 0);

    assert_eq!(other.is_safe("arena:a"), Ok(true));
    assert_eq!(other.snapshot().arenas, snap.arenas);

    // Merging the same snapshot again overwrites both entries.
    let stats = other.restore_merge(snap);
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.overwritten, 2);
}

#[test]
fn snapshot_filtering_and_removal() {
    let sup = ArbiterSupervisor::new(2);
    seed_reference_arena(&sup, "arena:a");
    seed_reference_arena(&sup, "arena:b");
    seed_reference_arena(&sup, "arena:c");

    let snap = sup.snapshot_arenas(&["arena:a", "arena:c"]);
    let ids: Vec<&str> = snap.arenas.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["arena:a", "arena:c"]);

    sup.remove_arena("arena:b");
    assert_eq!(
        sup.is_safe("arena:b"),
        Err(SupervisorError::UnknownArena("arena:b".to_string()))
    );
    assert_eq!(sup.snapshot().arenas.len(), 2);
}

#[test]
fn snapshot_serializes_as_json() {
    let sup = ArbiterSupervisor::new(1);
    seed_reference_arena(&sup, "arena:a");
    sup.request("arena:a", 1, &[1, 0, 2]).unwrap();

    let snap = sup.snapshot();
    let json = serde_json::to_string(&snap).unwrap();
    let back: banker_arbiter_supervisor::SupervisorSnapshot =
        serde_json::from_str(&json).unwrap();
    assert_eq!(back.arenas, snap.arenas);
}
