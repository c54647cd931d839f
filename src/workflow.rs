//! Workflow orchestrator - the entry point other layers call.
//!
//! Validates a requested action against the role authority and the task
//! state machine, applies it through the registry's transactional
//! compare-and-swap, and exposes the read surfaces (leaderboard, stats,
//! points history). After each committed transition a [`TransitionEvent`]
//! goes out on a broadcast channel for external notifiers; delivery beyond
//! the channel is not this module's concern.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{CoreError, CoreResult};
use crate::leaderboard::{self, LeaderboardRow};
use crate::ledger::{self, LedgerEntry, LedgerReason, Scope};
use crate::roles::{Capability, Role};
use crate::store::Store;
use crate::task::registry::{self, TaskFilter};
use crate::task::{machine, NewTask, Task, TaskAction, TaskStatus};

/// Verified identity of the caller, supplied by the auth layer.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

/// Emitted after every committed transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub task_id: i64,
    pub action: TaskAction,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub actor_id: i64,
    pub points_awarded: Option<i64>,
    pub at: DateTime<Utc>,
}

/// Per-user point and task summary.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub total_points: i64,
    pub weekly_points: i64,
    pub monthly_points: i64,
    /// Tasks of this user that reached `approved`.
    pub completed_tasks: i64,
    /// Tasks currently claimed, in progress, or awaiting approval.
    pub open_tasks: i64,
}

/// Coordinating facade over store, registry, ledger and leaderboard.
pub struct Workflow {
    store: Arc<Store>,
    events: broadcast::Sender<TransitionEvent>,
}

impl Workflow {
    pub fn new(store: Arc<Store>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { store, events }
    }

    /// Subscribe to transition events (e.g. for a notifier).
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task. Requires the `create_tasks` capability.
    pub async fn create_task(&self, new: NewTask, actor: Actor) -> CoreResult<Task> {
        if !actor.role.can(Capability::CreateTasks) {
            return Err(CoreError::Forbidden(
                "only parents and advisors can create tasks".to_string(),
            ));
        }
        new.validate().map_err(CoreError::Validation)?;
        let task = self
            .store
            .with_conn(move |conn| registry::insert(conn, &new, actor.id))
            .await?;
        tracing::info!(task_id = task.id, title = %task.title, "task created");
        Ok(task)
    }

    pub async fn get_task(&self, id: i64) -> CoreResult<Task> {
        self.store.with_conn(move |conn| registry::get(conn, id)).await
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> CoreResult<Vec<Task>> {
        self.store
            .with_conn(move |conn| registry::list(conn, &filter))
            .await
    }

    /// Request a lifecycle transition on behalf of `actor`.
    ///
    /// Validation runs against a snapshot read; the write re-checks the
    /// status with a compare-and-swap, so of two racing callers exactly one
    /// wins and the other sees `Conflict`.
    pub async fn request_transition(
        &self,
        task_id: i64,
        action: TaskAction,
        actor: Actor,
    ) -> CoreResult<Task> {
        let snapshot = self.get_task(task_id).await?;
        self.apply_validated(&snapshot, action, actor).await
    }

    /// Validate `action` against `snapshot` and apply it. Split from
    /// [`Self::request_transition`] so tests can pin two actors to the same
    /// snapshot and exercise the claim race deterministically.
    pub(crate) async fn apply_validated(
        &self,
        snapshot: &Task,
        action: TaskAction,
        actor: Actor,
    ) -> CoreResult<Task> {
        let spec = machine::transition(snapshot.status, action).ok_or(
            CoreError::InvalidTransition {
                from: snapshot.status,
                action,
            },
        )?;

        let is_assignee = snapshot.assignee_id == Some(actor.id);
        if !spec.gate.permits(actor.role, is_assignee) {
            return Err(CoreError::Forbidden(format!(
                "role '{}' may not {} this task",
                actor.role, action
            )));
        }

        let snap = snapshot.clone();
        let (task, entry) = self
            .store
            .with_conn(move |conn| registry::apply(conn, &snap, action, spec, actor.id))
            .await?;

        let event = TransitionEvent {
            task_id: task.id,
            action,
            from: snapshot.status,
            to: task.status,
            actor_id: actor.id,
            points_awarded: entry.as_ref().map(|e| e.delta),
            at: task.updated_at,
        };
        tracing::info!(
            task_id = event.task_id,
            action = %event.action,
            from = %event.from,
            to = %event.to,
            actor_id = event.actor_id,
            points = event.points_awarded,
            "task transition"
        );
        // Receivers may come and go; an empty channel is not an error.
        let _ = self.events.send(event);

        Ok(task)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Points
    // ─────────────────────────────────────────────────────────────────────

    /// Manual point grant or deduction. Requires `modify_points`.
    pub async fn adjust_points(
        &self,
        actor: Actor,
        user_id: i64,
        delta: i64,
        note: Option<String>,
    ) -> CoreResult<LedgerEntry> {
        if !actor.role.can(Capability::ModifyPoints) {
            return Err(CoreError::Forbidden(
                "only advisors can adjust points".to_string(),
            ));
        }
        let entry = self
            .store
            .with_conn(move |conn| {
                // The target must exist; the ledger has no other guard.
                crate::store::user_by_id(conn, user_id)?;
                ledger::append(
                    conn,
                    user_id,
                    delta,
                    LedgerReason::ManualAdjustment,
                    None,
                    note.as_deref(),
                    Some(actor.id),
                )
            })
            .await?;
        tracing::info!(user_id, delta, actor_id = actor.id, "manual point adjustment");
        Ok(entry)
    }

    /// Append the negation of an existing entry. The original row is never
    /// touched. Requires `modify_points`.
    pub async fn correct_entry(&self, actor: Actor, entry_id: i64) -> CoreResult<LedgerEntry> {
        if !actor.role.can(Capability::ModifyPoints) {
            return Err(CoreError::Forbidden(
                "only advisors can correct ledger entries".to_string(),
            ));
        }
        self.store
            .with_conn(move |conn| {
                let original = ledger::entry_by_id(conn, entry_id)?;
                let note = format!("correction of entry {}", original.id);
                ledger::append(
                    conn,
                    original.user_id,
                    -original.delta,
                    LedgerReason::Correction,
                    original.task_id,
                    Some(note.as_str()),
                    Some(actor.id),
                )
            })
            .await
    }

    pub async fn points_history(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<LedgerEntry>> {
        self.store
            .with_conn(move |conn| ledger::history(conn, user_id, limit, offset))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read surfaces
    // ─────────────────────────────────────────────────────────────────────

    pub async fn leaderboard(&self, scope: Scope) -> CoreResult<Vec<LeaderboardRow>> {
        self.store
            .with_conn(move |conn| leaderboard::rank(conn, scope, Utc::now()))
            .await
    }

    pub async fn user_stats(&self, user_id: i64) -> CoreResult<UserStats> {
        self.store
            .with_conn(move |conn| {
                crate::store::user_by_id(conn, user_id)?;
                let now = Utc::now();
                let total_points = ledger::total_for(conn, user_id)?;
                let weekly_points = match Scope::Weekly.window_start(now) {
                    Some(start) => ledger::period_total(conn, user_id, start, now)?,
                    None => total_points,
                };
                let monthly_points = match Scope::Monthly.window_start(now) {
                    Some(start) => ledger::period_total(conn, user_id, start, now)?,
                    None => total_points,
                };
                let completed_tasks: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE assignee_id = ?1 AND status = 'approved'",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )?;
                let open_tasks: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE assignee_id = ?1
                     AND status IN ('claimed', 'in_progress', 'completed')",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )?;
                Ok(UserStats {
                    user_id,
                    total_points,
                    weekly_points,
                    monthly_points,
                    completed_tasks,
                    open_tasks,
                })
            })
            .await
    }
}
