//! Leaderboard - derived, read-only ranking over the points ledger.
//!
//! Nothing here mutates state; every call recomputes from ledger sums so the
//! ranking can never drift from the balances it claims to show. Ties at
//! equal points break by earliest account creation, then lowest user id, so
//! the order is fully deterministic.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::ledger::Scope;

/// One leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub user_id: i64,
    pub username: String,
    pub total_points: i64,
    /// Tasks of this user approved inside the scope window.
    pub completed_tasks: i64,
}

/// Rank all users for the given scope, best first.
pub fn rank(conn: &Connection, scope: Scope, now: DateTime<Utc>) -> CoreResult<Vec<LeaderboardRow>> {
    // An unbounded window keeps one query shape for all scopes.
    let since = scope
        .window_start(now)
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);

    let mut stmt = conn.prepare(
        "SELECT u.id, u.username,
                COALESCE((SELECT SUM(l.delta) FROM points_ledger l
                          WHERE l.user_id = u.id AND l.created_at >= ?1), 0) AS total_points,
                (SELECT COUNT(*) FROM tasks t
                 WHERE t.assignee_id = u.id AND t.status = 'approved'
                   AND t.approved_at >= ?1) AS completed_tasks
         FROM users u
         ORDER BY total_points DESC, u.created_at ASC, u.id ASC",
    )?;
    let rows = stmt
        .query_map(params![since], row_without_rank)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(CoreError::from)?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            row.rank = i + 1;
            row
        })
        .collect())
}

fn row_without_rank(row: &Row<'_>) -> rusqlite::Result<LeaderboardRow> {
    Ok(LeaderboardRow {
        rank: 0,
        user_id: row.get(0)?,
        username: row.get(1)?,
        total_points: row.get(2)?,
        completed_tasks: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{self, LedgerReason};
    use crate::roles::Role;
    use crate::store::Store;

    #[tokio::test]
    async fn test_orders_by_points_descending() {
        let store = Store::open_in_memory().unwrap();
        let a = store
            .create_user("a", "a@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        let b = store
            .create_user("b", "b@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        store
            .with_conn(move |conn| {
                ledger::append(conn, a.id, 30, LedgerReason::TaskApproved, None, None, None)?;
                ledger::append(conn, b.id, 80, LedgerReason::TaskApproved, None, None, None)?;

                let board = rank(conn, Scope::All, Utc::now())?;
                assert_eq!(board.len(), 2);
                assert_eq!(board[0].username, "b");
                assert_eq!(board[0].total_points, 80);
                assert_eq!(board[0].rank, 1);
                assert_eq!(board[1].username, "a");
                assert_eq!(board[1].rank, 2);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ties_break_by_earliest_account() {
        let store = Store::open_in_memory().unwrap();
        // "first" registers before "second"; equal points must rank first
        // above second, never by iteration accident.
        let first = store
            .create_user("first", "f@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        let second = store
            .create_user("second", "s@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        store
            .with_conn(move |conn| {
                ledger::append(conn, second.id, 100, LedgerReason::TaskApproved, None, None, None)?;
                ledger::append(conn, first.id, 100, LedgerReason::TaskApproved, None, None, None)?;

                let board = rank(conn, Scope::All, Utc::now())?;
                assert_eq!(board[0].user_id, first.id);
                assert_eq!(board[1].user_id, second.id);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_users_without_entries_score_zero() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_user("idle", "i@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        store
            .with_conn(|conn| {
                let board = rank(conn, Scope::Weekly, Utc::now())?;
                assert_eq!(board.len(), 1);
                assert_eq!(board[0].total_points, 0);
                assert_eq!(board[0].completed_tasks, 0);
                Ok(())
            })
            .await
            .unwrap();
    }
}
