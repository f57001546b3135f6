//! Tests for spawn admission.

use super::*;
use crate::error::BatonError;
use crate::locks::LockManager;
use crate::sessions::{SessionManager, SessionStatus};
use crate::test_support::{TestDomain, config_with_capacity};

fn healthy() -> HealthReport {
    HealthReport::default()
}

fn vetoed(reason: &str) -> HealthReport {
    HealthReport {
        veto: Some(Veto {
            active: true,
            reason: reason.to_string(),
            set_by: None,
            set_at: None,
        }),
        violations: Vec::new(),
    }
}

fn check_names(decision: &Decision) -> Vec<CheckKind> {
    decision.checks.iter().map(|c| c.name).collect()
}

#[test]
fn test_admit_passes_all_checks_in_order() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let decision = controller.admit("index-builder", None, &[]).unwrap();

    assert!(decision.allowed);
    assert!(decision.blocker.is_none());
    assert_eq!(decision.resources, vec!["module-index.md"]);
    assert_eq!(
        check_names(&decision),
        vec![
            CheckKind::Capacity,
            CheckKind::InstanceLimit,
            CheckKind::Resources,
            CheckKind::Health
        ]
    );
    assert!(decision.checks.iter().all(|c| c.passed));
}

#[test]
fn test_admit_stops_at_capacity() {
    let config = config_with_capacity(1);
    let domain = TestDomain::with_config(config);
    SessionManager::new(&domain.store, &domain.config)
        .register("writer-1", None, "module-writer")
        .unwrap();
    // A veto would also block, but capacity is checked first.
    let health = vetoed("freeze");
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let decision = controller.admit("reviewer", None, &[]).unwrap();

    assert!(!decision.allowed);
    assert_eq!(check_names(&decision), vec![CheckKind::Capacity]);
    assert!(matches!(
        decision.blocker,
        Some(BatonError::CapacityExceeded { active: 1, max: 1 })
    ));
}

#[test]
fn test_admit_stops_at_instance_limit() {
    let domain = TestDomain::new();
    SessionManager::new(&domain.store, &domain.config)
        .register("orch-1", None, "orchestrator")
        .unwrap();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let decision = controller.admit("orchestrator", None, &[]).unwrap();

    assert!(!decision.allowed);
    assert_eq!(
        check_names(&decision),
        vec![CheckKind::Capacity, CheckKind::InstanceLimit]
    );
    assert!(decision.reason.contains("orchestrator"));
}

#[test]
fn test_admit_blocks_on_foreign_lock_but_not_own() {
    let domain = TestDomain::new();
    LockManager::new(&domain.store, &domain.config)
        .acquire("module-index.md", "index-builder-1", Some("T1"))
        .unwrap();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let decision = controller.admit("index-builder", None, &[]).unwrap();
    assert!(!decision.allowed);
    assert!(matches!(
        decision.blocker,
        Some(BatonError::Conflict { ref holder, .. }) if holder == "index-builder-1"
    ));

    let decision = controller
        .admit("index-builder", Some("index-builder-1"), &[])
        .unwrap();
    assert!(decision.allowed);
}

#[test]
fn test_admit_blocks_on_veto_and_critical_violation() {
    let domain = TestDomain::new();

    let health = vetoed("release freeze");
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);
    let decision = controller.admit("reviewer", None, &[]).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.checks.last().unwrap().name, CheckKind::Health);
    assert!(decision.reason.contains("release freeze"));

    let health = HealthReport {
        veto: None,
        violations: vec![Violation {
            id: "V-7".to_string(),
            severity: Severity::Critical,
            resolved: false,
            message: "index drift".to_string(),
        }],
    };
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);
    let decision = controller.admit("reviewer", None, &[]).unwrap();
    assert!(!decision.allowed);
    assert!(matches!(decision.blocker, Some(BatonError::Vetoed(_))));
}

#[test]
fn test_admit_unknown_type_is_invalid() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let err = controller.admit("astronaut", None, &[]).unwrap_err();
    assert!(matches!(err, BatonError::InvalidArgument(_)));
}

#[test]
fn test_prepare_spawn_registers_session_and_locks() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let grant = controller
        .prepare_spawn(
            "index-builder",
            Some("index-builder-1"),
            Some("T9"),
            &["chapter-2.md".to_string()],
        )
        .unwrap();

    assert_eq!(grant.session.holder_id, "index-builder-1");
    assert_eq!(grant.session.status, SessionStatus::Active);
    assert_eq!(grant.locks.len(), 2);
    assert_eq!(grant.session.locks_held.len(), 2);
    for lock in &grant.locks {
        assert_eq!(lock.holder_id, "index-builder-1");
        assert_eq!(lock.task_id.as_deref(), Some("T9"));
        assert!(grant.session.locks_held.contains(&lock.lock_id));
    }

    // Ending the session frees what the spawn took.
    let report = SessionManager::new(&domain.store, &domain.config)
        .end(&grant.session.session_id, SessionStatus::Completed)
        .unwrap();
    assert_eq!(report.released_lock_ids.len(), 2);
}

#[test]
fn test_prepare_spawn_generates_holder_id() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let grant = controller.prepare_spawn("validator", None, None, &[]).unwrap();

    assert!(grant.session.holder_id.starts_with("validator-"));
    assert!(grant.locks.is_empty());
}

#[test]
fn test_prepare_spawn_denied_changes_nothing() {
    let domain = TestDomain::new();
    LockManager::new(&domain.store, &domain.config)
        .acquire("module-index.md", "someone", None)
        .unwrap();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let err = controller
        .prepare_spawn("index-builder", None, None, &["extra.md".to_string()])
        .unwrap_err();

    assert!(matches!(err, BatonError::Conflict { .. }));
    let (sessions, locks) = domain
        .store
        .read(|tables| Ok((tables.sessions.active.len(), tables.locks.locks.len())))
        .unwrap();
    assert_eq!(sessions, 0);
    assert_eq!(locks, 1);
}

#[test]
fn test_prepare_spawn_vetoed_is_operation_failure() {
    let domain = TestDomain::new();
    let health = vetoed("freeze");
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let err = controller
        .prepare_spawn("reviewer", None, None, &[])
        .unwrap_err();

    assert!(matches!(err, BatonError::Vetoed(_)));
    assert_eq!(err.exit_code(), crate::exit_codes::OPERATION_FAILURE);
}

#[test]
fn test_prepare_spawn_reads_health_file() {
    let domain = TestDomain::new();
    let path = domain.ctx.health_signal_path(&domain.config.health_signal_file);
    std::fs::write(&path, r#"{"veto": {"active": true, "reason": "maintenance"}}"#).unwrap();
    let health = FileHealthSignal::new(path);
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    let err = controller
        .prepare_spawn("reviewer", None, None, &[])
        .unwrap_err();

    match err {
        BatonError::Vetoed(reason) => assert!(reason.contains("maintenance")),
        other => panic!("expected Vetoed, got {:?}", other),
    }
}

#[test]
fn test_spawn_is_audited() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);
    controller
        .prepare_spawn("reviewer", Some("reviewer-1"), None, &[])
        .unwrap();

    let events = crate::events::read_events(&domain.ctx).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action.to_string(), "spawn");
    assert_eq!(events[0].agent.as_deref(), Some("reviewer-1"));
}

#[test]
fn test_prepare_spawn_unwinds_when_acquisition_fails_partway() {
    let domain = TestDomain::new();
    let health = healthy();
    let controller = AdmissionController::new(&domain.store, &domain.config, &health);

    // Acquisition order is sorted: chapter-2.md succeeds, module-index.md fails.
    let err = controller
        .prepare_spawn_with(
            "index-builder",
            Some("index-builder-1"),
            Some("T9"),
            &["chapter-2.md".to_string()],
            |tables, key, holder, task, lease, now| {
                if key == "module-index.md" {
                    return Err(BatonError::Conflict {
                        resource: key.to_string(),
                        holder: "intruder".to_string(),
                        task: None,
                        expires_at: now + lease,
                    });
                }
                tables.acquire_lock(key, holder, task, lease, now)
            },
        )
        .unwrap_err();

    match &err {
        BatonError::Conflict { resource, holder, .. } => {
            assert_eq!(resource, "module-index.md");
            assert_eq!(holder, "intruder");
        }
        other => panic!("expected Conflict, got {:?}", other),
    }

    let (active, history, locks) = domain
        .store
        .read(|tables| {
            Ok((
                tables.sessions.active.len(),
                tables.sessions.history.clone(),
                tables.locks.locks.len(),
            ))
        })
        .unwrap();
    assert_eq!(active, 0);
    assert_eq!(locks, 0);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].holder_id, "index-builder-1");
    assert_eq!(history[0].status, SessionStatus::Failed);
    assert!(history[0].locks_held.is_empty());
    assert!(
        history[0]
            .termination_reason
            .as_deref()
            .unwrap()
            .starts_with("spawn aborted")
    );

    let events = crate::events::read_events(&domain.ctx).unwrap();
    let rollback = events
        .iter()
        .find(|e| e.action.to_string() == "spawn_rollback")
        .unwrap();
    assert_eq!(rollback.agent.as_deref(), Some("index-builder-1"));
    assert_eq!(rollback.details["released_lock_ids"].as_array().unwrap().len(), 1);
    assert!(!events.iter().any(|e| e.action.to_string() == "spawn"));
}
