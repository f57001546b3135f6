//! Admission checks and atomic spawn preparation.

use super::health::HealthSignal;
use crate::config::Config;
use crate::error::{BatonError, Result};
use crate::events::{self, Event, EventAction};
use crate::locks::{Acquisition, LockRecord, conflict};
use crate::sessions::{SessionRecord, SessionStatus};
use crate::store::{CoordinationStore, Tables};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

/// The admission checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Capacity,
    InstanceLimit,
    Resources,
    Health,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: CheckKind,
    pub passed: bool,
    pub detail: String,
}

/// Admission verdict. `checks` lists every check evaluated, ending at the
/// first failure.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    pub agent_type: String,
    pub resources: Vec<String>,
    pub checks: Vec<Check>,

    /// Error a spawn would fail with; `None` when allowed.
    #[serde(skip)]
    pub blocker: Option<BatonError>,
}

impl Decision {
    fn pass(&mut self, name: CheckKind, detail: String) {
        self.checks.push(Check {
            name,
            passed: true,
            detail,
        });
    }

    fn deny(mut self, name: CheckKind, blocker: BatonError) -> Self {
        let detail = blocker.to_string();
        self.checks.push(Check {
            name,
            passed: false,
            detail: detail.clone(),
        });
        self.allowed = false;
        self.reason = detail;
        self.blocker = Some(blocker);
        self
    }
}

/// A prepared spawn: the registered session and the locks it owns.
#[derive(Debug, Clone, Serialize)]
pub struct SpawnGrant {
    pub session: SessionRecord,
    pub locks: Vec<LockRecord>,
    pub checks: Vec<Check>,
}

enum SpawnOutcome {
    Granted(SpawnGrant),
    Denied(Decision),
    RolledBack {
        session_id: String,
        holder_id: String,
        released: Vec<String>,
        error: BatonError,
    },
}

/// Spawn admission over the coordination store and an external health signal.
pub struct AdmissionController<'a> {
    store: &'a CoordinationStore,
    config: &'a Config,
    health: &'a dyn HealthSignal,
}

impl<'a> AdmissionController<'a> {
    pub fn new(
        store: &'a CoordinationStore,
        config: &'a Config,
        health: &'a dyn HealthSignal,
    ) -> Self {
        Self {
            store,
            config,
            health,
        }
    }

    /// Evaluate whether an agent of `agent_type` may start now. Read-only.
    ///
    /// Without a `holder_id`, any live lock on a required resource blocks.
    pub fn admit(
        &self,
        agent_type: &str,
        holder_id: Option<&str>,
        extra_resources: &[String],
    ) -> Result<Decision> {
        self.store.read(|tables| {
            evaluate(
                tables,
                self.config,
                self.health,
                agent_type,
                holder_id,
                extra_resources,
                Utc::now(),
            )
        })
    }

    /// Admit, register a session, and acquire every required resource as one
    /// transaction.
    ///
    /// A denial fails with the error of the first failing check. If an
    /// acquisition fails partway, the locks already taken are released and
    /// the session is archived as `failed`; that unwinding is committed and
    /// the acquisition error is returned.
    pub fn prepare_spawn(
        &self,
        agent_type: &str,
        holder_id: Option<&str>,
        task_id: Option<&str>,
        extra_resources: &[String],
    ) -> Result<SpawnGrant> {
        self.prepare_spawn_with(
            agent_type,
            holder_id,
            task_id,
            extra_resources,
            |tables, key, holder, task, lease, now| tables.acquire_lock(key, holder, task, lease, now),
        )
    }

    /// [`prepare_spawn`](Self::prepare_spawn) with the per-resource
    /// acquisition supplied by the caller.
    pub(crate) fn prepare_spawn_with<A>(
        &self,
        agent_type: &str,
        holder_id: Option<&str>,
        task_id: Option<&str>,
        extra_resources: &[String],
        mut acquire: A,
    ) -> Result<SpawnGrant>
    where
        A: FnMut(&mut Tables, &str, &str, Option<&str>, Duration, DateTime<Utc>) -> Result<Acquisition>,
    {
        let holder_id = match holder_id {
            Some(id) => id.to_string(),
            None => generate_holder_id(agent_type),
        };
        let lease = self.config.lock_lease();
        let max_concurrent = self.config.max_concurrent as usize;
        let history_limit = self.config.session_history_limit as usize;

        let outcome = self.store.transact(|tables| {
            let now = Utc::now();
            let decision = evaluate(
                tables,
                self.config,
                self.health,
                agent_type,
                Some(&holder_id),
                extra_resources,
                now,
            )?;
            if !decision.allowed {
                return Ok(SpawnOutcome::Denied(decision));
            }

            let type_config = self.config.agent_type(agent_type)?;
            let session = tables.sessions.register(
                &holder_id,
                agent_type,
                type_config,
                task_id,
                max_concurrent,
                now,
            )?;

            let mut acquired: Vec<LockRecord> = Vec::new();
            for key in &decision.resources {
                match acquire(tables, key, &holder_id, task_id, lease, now) {
                    Ok(acquisition) => {
                        if !acquisition.reentrant {
                            acquired.push(acquisition.lock);
                        }
                    }
                    Err(error) => {
                        let released = unwind(tables, &session.session_id, &holder_id, &acquired);
                        tables.end_session(
                            &session.session_id,
                            SessionStatus::Failed,
                            Some(format!("spawn aborted: {}", error)),
                            history_limit,
                            now,
                        )?;
                        return Ok(SpawnOutcome::RolledBack {
                            session_id: session.session_id,
                            holder_id: holder_id.clone(),
                            released,
                            error,
                        });
                    }
                }
            }

            let session = tables
                .sessions
                .active
                .get(&session.session_id)
                .cloned()
                .unwrap_or(session);
            let locks = decision
                .resources
                .iter()
                .filter_map(|key| tables.locks.inspect(key, now).cloned())
                .collect();
            Ok(SpawnOutcome::Granted(SpawnGrant {
                session,
                locks,
                checks: decision.checks,
            }))
        })?;

        match outcome {
            SpawnOutcome::Granted(grant) => {
                info!(
                    session = %grant.session.session_id,
                    holder = %grant.session.holder_id,
                    %agent_type,
                    locks = grant.locks.len(),
                    "spawn prepared"
                );
                events::record(
                    self.store.context(),
                    Event::new(EventAction::Spawn)
                        .with_agent(grant.session.holder_id.clone())
                        .with_details(json!({
                            "session_id": grant.session.session_id,
                            "agent_type": agent_type,
                            "task_id": task_id,
                            "lock_ids": grant.session.locks_held,
                        })),
                );
                Ok(grant)
            }
            SpawnOutcome::Denied(decision) => {
                info!(%agent_type, reason = %decision.reason, "spawn denied");
                Err(decision.blocker.unwrap_or_else(|| {
                    BatonError::InvalidArgument(decision.reason.clone())
                }))
            }
            SpawnOutcome::RolledBack {
                session_id,
                holder_id,
                released,
                error,
            } => {
                warn!(session = %session_id, holder = %holder_id, %error, "spawn rolled back");
                events::record(
                    self.store.context(),
                    Event::new(EventAction::SpawnRollback)
                        .with_agent(holder_id)
                        .with_details(json!({
                            "session_id": session_id,
                            "released_lock_ids": released,
                            "error": error.to_string(),
                        })),
                );
                Err(error)
            }
        }
    }
}

/// Run the admission checks against `tables` at `now`.
pub(crate) fn evaluate(
    tables: &Tables,
    config: &Config,
    health: &dyn HealthSignal,
    agent_type: &str,
    holder_id: Option<&str>,
    extra_resources: &[String],
    now: DateTime<Utc>,
) -> Result<Decision> {
    let type_config = config.agent_type(agent_type)?;
    let resources = required_resources(&type_config.exclusive_resources, extra_resources)?;

    let mut decision = Decision {
        allowed: true,
        reason: "all admission checks passed".to_string(),
        agent_type: agent_type.to_string(),
        resources,
        checks: Vec::new(),
        blocker: None,
    };

    let active = tables.sessions.active_count();
    let max = config.max_concurrent as usize;
    if active >= max {
        return Ok(decision.deny(
            CheckKind::Capacity,
            BatonError::CapacityExceeded { active, max },
        ));
    }
    decision.pass(
        CheckKind::Capacity,
        format!("{} of {} slots in use", active, max),
    );

    let of_type = tables.sessions.active_of_type(agent_type);
    let type_limit = type_config.effective_max_instances();
    if of_type >= type_limit {
        return Ok(decision.deny(
            CheckKind::InstanceLimit,
            BatonError::InstanceLimitExceeded {
                agent_type: agent_type.to_string(),
                active: of_type,
                max: type_limit,
            },
        ));
    }
    decision.pass(
        CheckKind::InstanceLimit,
        format!("{} of {} {} instances active", of_type, type_limit, agent_type),
    );

    let held_elsewhere = decision.resources.iter().find_map(|key| {
        tables
            .locks
            .inspect(key, now)
            .filter(|lock| holder_id != Some(lock.holder_id.as_str()))
    });
    if let Some(lock) = held_elsewhere {
        return Ok(decision.deny(CheckKind::Resources, conflict(lock)));
    }
    let detail = if decision.resources.is_empty() {
        "no exclusive resources required".to_string()
    } else {
        format!("available: {}", decision.resources.join(", "))
    };
    decision.pass(CheckKind::Resources, detail);

    let report = health.check()?;
    if let Some(reason) = report.blocking_reason() {
        return Ok(decision.deny(CheckKind::Health, BatonError::Vetoed(reason)));
    }
    decision.pass(CheckKind::Health, "no veto or critical violations".to_string());

    Ok(decision)
}

/// Type resources plus extras, deduplicated, in sorted acquisition order.
fn required_resources(type_resources: &[String], extra: &[String]) -> Result<Vec<String>> {
    let mut keys = BTreeSet::new();
    for key in type_resources.iter().chain(extra) {
        let key = key.trim();
        if key.is_empty() {
            return Err(BatonError::InvalidArgument(
                "resource key must be non-empty".to_string(),
            ));
        }
        keys.insert(key.to_string());
    }
    Ok(keys.into_iter().collect())
}

/// Release the locks taken during a failed spawn and detach anything the
/// session adopted, so ending it releases nothing further.
fn unwind(
    tables: &mut Tables,
    session_id: &str,
    holder_id: &str,
    acquired: &[LockRecord],
) -> Vec<String> {
    let mut released = Vec::new();
    for lock in acquired.iter().rev() {
        match tables.release_lock(&lock.resource_key, holder_id) {
            Ok(lock) => released.push(lock.lock_id),
            Err(e) => warn!(resource = %lock.resource_key, error = %e, "unwind release failed"),
        }
    }
    if let Some(session) = tables.sessions.active.get_mut(session_id) {
        session.locks_held.clear();
    }
    released
}

/// `<agent_type>-<8 hex chars>`.
fn generate_holder_id(agent_type: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", agent_type, &suffix[..8])
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_required_resources_are_deduplicated_and_sorted() {
        let keys = required_resources(
            &["module-index.md".to_string()],
            &["b.md".to_string(), "module-index.md".to_string(), "a.md".to_string()],
        )
        .unwrap();
        assert_eq!(keys, vec!["a.md", "b.md", "module-index.md"]);
    }

    #[test]
    fn test_required_resources_rejects_blank_key() {
        let err = required_resources(&[], &["  ".to_string()]).unwrap_err();
        assert!(matches!(err, BatonError::InvalidArgument(_)));
    }

    #[test]
    fn test_unwind_releases_new_locks_and_ends_session_owning_nothing() {
        let config = Config::default();
        let now = Utc::now();
        let lease = chrono::Duration::minutes(15);
        let mut tables = Tables::default();
        tables
            .acquire_lock("kept.md", "writer-1", None, lease, now)
            .unwrap();
        let session = tables
            .sessions
            .register(
                "writer-1",
                "module-writer",
                config.agent_type("module-writer").unwrap(),
                None,
                12,
                now,
            )
            .unwrap();
        // Adopted by the session, but predates the spawn.
        tables
            .acquire_lock("kept.md", "writer-1", None, lease, now)
            .unwrap();
        let fresh = tables
            .acquire_lock("fresh.md", "writer-1", None, lease, now)
            .unwrap();

        let released = unwind(&mut tables, &session.session_id, "writer-1", &[fresh.lock]);
        let ended = tables
            .end_session(&session.session_id, SessionStatus::Failed, None, 500, now)
            .unwrap();

        assert_eq!(released.len(), 1);
        assert!(ended.released.is_empty());
        assert!(tables.locks.inspect("fresh.md", now).is_none());
        assert_eq!(
            tables.locks.inspect("kept.md", now).unwrap().holder_id,
            "writer-1"
        );
    }

    #[test]
    fn test_generated_holder_id_shape() {
        let id = generate_holder_id("validator");
        let suffix = id.strip_prefix("validator-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
