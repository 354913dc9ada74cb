use super::*;

#[test]
fn admits_within_both_ceilings() {
    let mut pool = WorkerPool::new(8, 10);
    let permit = pool.admit("alice", 3).unwrap();
    assert_eq!(pool.running_for("alice"), 3);
    drop(permit);
    assert_eq!(pool.running_for("alice"), 0);
}

#[test]
fn rejects_zero_clients() {
    let mut pool = WorkerPool::new(8, 10);
    assert!(matches!(
        pool.admit("alice", 0),
        Err(OrchestrateError::NoClients)
    ));
}

#[test]
fn rejects_request_above_global_ceiling() {
    let mut pool = WorkerPool::new(8, 10);
    let err = pool.admit("alice", 9).unwrap_err();
    assert!(matches!(
        err,
        OrchestrateError::LimitExceeded {
            kind: LimitKind::ClientWorkers,
            requested: 9,
            ceiling: 8,
        }
    ));
    // Rejection must not leak partial state.
    assert_eq!(pool.running_for("alice"), 0);
}

#[test]
fn global_ceiling_is_shared_across_owners() {
    let mut pool = WorkerPool::new(4, 10);
    let _first = pool.admit("alice", 3).unwrap();
    let err = pool.admit("bob", 2).unwrap_err();
    assert!(matches!(
        err,
        OrchestrateError::LimitExceeded {
            kind: LimitKind::ClientWorkers,
            ..
        }
    ));
    let _second = pool.admit("bob", 1).unwrap();
}

#[test]
fn per_owner_ceiling_counts_running_clients() {
    let mut pool = WorkerPool::new(16, 5);
    let _first = pool.admit("alice", 4).unwrap();
    let err = pool.admit("alice", 2).unwrap_err();
    assert!(matches!(
        err,
        OrchestrateError::LimitExceeded {
            kind: LimitKind::ClientsPerUser,
            requested: 6,
            ceiling: 5,
        }
    ));
    // Another owner is unaffected.
    let _second = pool.admit("bob", 5).unwrap();
}

#[test]
fn dropping_permit_releases_global_capacity() {
    let mut pool = WorkerPool::new(4, 10);
    let permit = pool.admit("alice", 4).unwrap();
    assert!(pool.admit("bob", 1).is_err());
    drop(permit);
    assert!(pool.admit("bob", 4).is_ok());
}
