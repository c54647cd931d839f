//! Task registry - owns task rows and applies validated transitions.
//!
//! [`apply`] is the single write path for task status. It runs inside one
//! SQLite transaction and guards the status column with a compare-and-swap
//! against the status the caller validated: if another writer got there
//! first, zero rows match and the request fails with `Conflict` instead of
//! silently overwriting an assignee. The ledger append for an approval
//! commits in the same transaction as the status write.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{CoreError, CoreResult};
use crate::ledger::{self, LedgerEntry, LedgerReason};
use crate::task::{
    AssigneeEffect, NewTask, PointsEffect, Task, TaskAction, TaskStatus, TaskType, TransitionSpec,
};

/// Filters for task listing.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<i64>,
    pub created_by: Option<i64>,
}

/// Insert a new task in `pending` with no assignee. Input must already be
/// validated.
pub fn insert(conn: &Connection, new: &NewTask, created_by: i64) -> CoreResult<Task> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO tasks (title, description, task_type, points, status, created_by,
                            due_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?7)",
        params![
            new.title.trim(),
            new.description,
            new.task_type.as_str(),
            new.points,
            created_by,
            new.due_date,
            now
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

/// Fetch one task.
pub fn get(conn: &Connection, id: i64) -> CoreResult<Task> {
    conn.query_row(
        &format!("{SELECT_TASK} WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::NotFound(format!("task {id}")))
}

/// List tasks, newest first, with optional filters.
pub fn list(conn: &Connection, filter: &TaskFilter) -> CoreResult<Vec<Task>> {
    let mut sql = format!("{SELECT_TASK} WHERE 1=1");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    if let Some(assignee) = filter.assignee_id {
        args.push(Box::new(assignee));
        sql.push_str(&format!(" AND assignee_id = ?{}", args.len()));
    }
    if let Some(creator) = filter.created_by {
        args.push(Box::new(creator));
        sql.push_str(&format!(" AND created_by = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
    let rows = stmt.query_map(params, task_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(CoreError::from)
}

/// Apply a validated transition atomically.
///
/// `snapshot` is the task state the caller validated against; its status is
/// the compare value for the CAS write. Returns the post-transition task and
/// the ledger entry when the transition awarded points.
pub fn apply(
    conn: &mut Connection,
    snapshot: &Task,
    action: TaskAction,
    spec: TransitionSpec,
    actor_id: i64,
) -> CoreResult<(Task, Option<LedgerEntry>)> {
    let tx = conn.transaction()?;
    let now = Utc::now();

    let assignee: Option<i64> = match spec.assignee {
        AssigneeEffect::Keep => snapshot.assignee_id,
        AssigneeEffect::SetActor => Some(actor_id),
        AssigneeEffect::Clear => None,
    };
    let stamps_completed = action == TaskAction::Submit;
    let stamps_approved = action == TaskAction::Approve;

    let updated = tx.execute(
        "UPDATE tasks SET
             status = ?1,
             assignee_id = ?2,
             updated_at = ?3,
             completed_at = CASE WHEN ?4 THEN ?3 ELSE completed_at END,
             approved_at  = CASE WHEN ?5 THEN ?3 ELSE approved_at END,
             approved_by  = CASE WHEN ?5 THEN ?6 ELSE approved_by END
         WHERE id = ?7 AND status = ?8",
        params![
            spec.to.as_str(),
            assignee,
            now,
            stamps_completed,
            stamps_approved,
            actor_id,
            snapshot.id,
            snapshot.status.as_str()
        ],
    )?;
    if updated == 0 {
        // Someone else moved the task between our validating read and this
        // write. Roll back and report the lost race.
        return Err(CoreError::Conflict);
    }

    let task = get(&tx, snapshot.id)?;

    let entry = match spec.points {
        PointsEffect::None => None,
        PointsEffect::AwardAssignee => {
            // The delta is the points column as committed right now, not any
            // value the caller may have read earlier. Later task edits can
            // never change this ledger row.
            let assignee_id = task.assignee_id.ok_or_else(|| {
                CoreError::Validation(format!("task {} has no assignee to award", task.id))
            })?;
            Some(ledger::append(
                &tx,
                assignee_id,
                task.points,
                LedgerReason::TaskApproved,
                Some(task.id),
                Some(task.title.as_str()),
                Some(actor_id),
            )?)
        }
    };

    tx.commit()?;
    Ok((task, entry))
}

const SELECT_TASK: &str = "SELECT id, title, description, task_type, points, status, created_by,
        assignee_id, due_date, completed_at, approved_at, approved_by, created_at, updated_at
 FROM tasks";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let type_str: String = row.get(3)?;
    let task_type = TaskType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown task type '{type_str}'").into(),
        )
    })?;
    let status_str: String = row.get(5)?;
    let status = TaskStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown task status '{status_str}'").into(),
        )
    })?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        task_type,
        points: row.get(4)?,
        status,
        created_by: row.get(6)?,
        assignee_id: row.get(7)?,
        due_date: row.get(8)?,
        completed_at: row.get(9)?,
        approved_at: row.get(10)?,
        approved_by: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::store::Store;
    use crate::task::machine;

    async fn setup() -> (Store, i64, i64) {
        let store = Store::open_in_memory().unwrap();
        let parent = store
            .create_user("mom", "mom@example.com", Role::Parent, "h", "s")
            .await
            .unwrap();
        let kid = store
            .create_user("kid", "kid@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        (store, parent.id, kid.id)
    }

    fn sample_task(points: i64) -> NewTask {
        NewTask {
            title: "Take out trash".to_string(),
            description: "bins by 8pm".to_string(),
            task_type: TaskType::FTL,
            points,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_insert_starts_pending_unassigned() {
        let (store, parent, _) = setup().await;
        let task = store
            .with_conn(move |conn| insert(conn, &sample_task(25), parent))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assignee_id, None);
        assert_eq!(task.points, 25);
    }

    #[tokio::test]
    async fn test_cas_detects_lost_claim_race() {
        let (store, parent, kid) = setup().await;
        store
            .with_conn(move |conn| {
                let task = insert(conn, &sample_task(10), parent)?;
                let spec = machine::transition(task.status, TaskAction::Claim).unwrap();

                // Two actors validated against the same pending snapshot.
                let (won, _) = apply(conn, &task, TaskAction::Claim, spec, kid)?;
                assert_eq!(won.status, TaskStatus::Claimed);
                assert_eq!(won.assignee_id, Some(kid));

                let err = apply(conn, &task, TaskAction::Claim, spec, parent).unwrap_err();
                assert!(matches!(err, CoreError::Conflict));

                // The winner's assignment survived.
                let after = get(conn, task.id)?;
                assert_eq!(after.assignee_id, Some(kid));
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_approve_appends_snapshot_delta_in_same_tx() {
        let (store, parent, kid) = setup().await;
        store
            .with_conn(move |conn| {
                let mut task = insert(conn, &sample_task(50), parent)?;
                for action in [TaskAction::Claim, TaskAction::Start, TaskAction::Submit] {
                    let spec = machine::transition(task.status, action).unwrap();
                    task = apply(conn, &task, action, spec, kid)?.0;
                }
                assert_eq!(task.status, TaskStatus::Completed);
                assert!(task.completed_at.is_some());

                let spec = machine::transition(task.status, TaskAction::Approve).unwrap();
                let (approved, entry) = apply(conn, &task, TaskAction::Approve, spec, parent)?;
                assert_eq!(approved.status, TaskStatus::Approved);
                assert_eq!(approved.approved_by, Some(parent));

                let entry = entry.expect("approve must append a ledger entry");
                assert_eq!(entry.user_id, kid);
                assert_eq!(entry.delta, 50);
                assert_eq!(entry.reason, LedgerReason::TaskApproved);
                assert_eq!(entry.task_id, Some(task.id));
                assert_eq!(ledger::total_for(conn, kid)?, 50);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_assignee() {
        let (store, parent, kid) = setup().await;
        store
            .with_conn(move |conn| {
                let a = insert(conn, &sample_task(10), parent)?;
                let _b = insert(conn, &sample_task(20), parent)?;
                let spec = machine::transition(a.status, TaskAction::Claim).unwrap();
                apply(conn, &a, TaskAction::Claim, spec, kid)?;

                let pending = list(
                    conn,
                    &TaskFilter {
                        status: Some(TaskStatus::Pending),
                        ..Default::default()
                    },
                )?;
                assert_eq!(pending.len(), 1);

                let mine = list(
                    conn,
                    &TaskFilter {
                        assignee_id: Some(kid),
                        ..Default::default()
                    },
                )?;
                assert_eq!(mine.len(), 1);
                assert_eq!(mine[0].id, a.id);
                Ok(())
            })
            .await
            .unwrap();
    }
}
