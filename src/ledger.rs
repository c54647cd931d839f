//! Points ledger - append-only record of point-affecting events.
//!
//! The ledger is the only authority on balances: a user's total is always
//! `SUM(delta)` over their rows. Rows are never updated or deleted;
//! corrections append a new row with the negated delta. Functions here take
//! a `&Connection` so callers can compose them into a transaction together
//! with a task status write.

use chrono::{DateTime, Duration, Months, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Why a ledger entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    TaskCompleted,
    TaskApproved,
    ManualAdjustment,
    Correction,
}

impl LedgerReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCompleted => "task_completed",
            Self::TaskApproved => "task_approved",
            Self::ManualAdjustment => "manual_adjustment",
            Self::Correction => "correction",
        }
    }

    pub fn parse(s: &str) -> Option<LedgerReason> {
        match s {
            "task_completed" => Some(Self::TaskCompleted),
            "task_approved" => Some(Self::TaskApproved),
            "manual_adjustment" => Some(Self::ManualAdjustment),
            "correction" => Some(Self::Correction),
            _ => None,
        }
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub delta: i64,
    pub reason: LedgerReason,
    pub task_id: Option<i64>,
    pub note: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Aggregation window for totals and the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Weekly,
    Monthly,
}

impl Scope {
    /// Start of the window relative to `now`; `None` means unbounded.
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Weekly => Some(now - Duration::days(7)),
            Self::Monthly => now.checked_sub_months(Months::new(1)),
        }
    }

    pub fn parse(s: &str) -> Option<Scope> {
        match s {
            "all" | "all-time" => Some(Self::All),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// Append an entry. Pure insert; the caller owns the transaction boundary.
pub fn append(
    conn: &Connection,
    user_id: i64,
    delta: i64,
    reason: LedgerReason,
    task_id: Option<i64>,
    note: Option<&str>,
    created_by: Option<i64>,
) -> CoreResult<LedgerEntry> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO points_ledger (user_id, delta, reason, task_id, note, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![user_id, delta, reason.as_str(), task_id, note, created_by, now],
    )?;
    entry_by_id(conn, conn.last_insert_rowid())
}

/// Fetch one entry by id.
pub fn entry_by_id(conn: &Connection, id: i64) -> CoreResult<LedgerEntry> {
    conn.query_row(
        "SELECT id, user_id, delta, reason, task_id, note, created_by, created_at
         FROM points_ledger WHERE id = ?1",
        params![id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::NotFound(format!("ledger entry {id}")))
}

/// Sum of all deltas for a user. Zero when the user has no rows.
pub fn total_for(conn: &Connection, user_id: i64) -> CoreResult<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM points_ledger WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .map_err(CoreError::from)
}

/// Sum of deltas for a user with `created_at` in `[start, end)`.
pub fn period_total(
    conn: &Connection,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CoreResult<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM points_ledger
         WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3",
        params![user_id, start, end],
        |row| row.get(0),
    )
    .map_err(CoreError::from)
}

/// Newest-first page of a user's history.
pub fn history(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> CoreResult<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, delta, reason, task_id, note, created_by, created_at
         FROM points_ledger WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(params![user_id, limit, offset], entry_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(CoreError::from)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let reason_str: String = row.get(3)?;
    let reason = LedgerReason::parse(&reason_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown ledger reason '{reason_str}'").into(),
        )
    })?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        delta: row.get(2)?,
        reason,
        task_id: row.get(4)?,
        note: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::store::Store;

    async fn store_with_user() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("kid", "kid@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        (store, user.id)
    }

    #[tokio::test]
    async fn test_total_is_sum_of_deltas() {
        let (store, uid) = store_with_user().await;
        store
            .with_conn(|conn| {
                assert_eq!(total_for(conn, uid).unwrap(), 0);
                append(conn, uid, 50, LedgerReason::TaskApproved, None, None, None)?;
                append(conn, uid, 25, LedgerReason::TaskApproved, None, None, None)?;
                append(
                    conn,
                    uid,
                    -10,
                    LedgerReason::ManualAdjustment,
                    None,
                    Some("late penalty"),
                    None,
                )?;
                assert_eq!(total_for(conn, uid).unwrap(), 65);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_period_total_windows() {
        let (store, uid) = store_with_user().await;
        store
            .with_conn(|conn| {
                append(conn, uid, 40, LedgerReason::TaskApproved, None, None, None)?;
                let now = Utc::now();
                let hour = Duration::hours(1);
                assert_eq!(period_total(conn, uid, now - hour, now + hour).unwrap(), 40);
                // Window entirely in the past sees nothing.
                assert_eq!(
                    period_total(conn, uid, now - Duration::days(14), now - Duration::days(7))
                        .unwrap(),
                    0
                );
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_paged() {
        let (store, uid) = store_with_user().await;
        store
            .with_conn(|conn| {
                for delta in [10, 20, 30] {
                    append(conn, uid, delta, LedgerReason::TaskApproved, None, None, None)?;
                }
                let page = history(conn, uid, 2, 0)?;
                assert_eq!(page.len(), 2);
                assert_eq!(page[0].delta, 30);
                assert_eq!(page[1].delta, 20);
                let rest = history(conn, uid, 2, 2)?;
                assert_eq!(rest.len(), 1);
                assert_eq!(rest[0].delta, 10);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("weekly"), Some(Scope::Weekly));
        assert_eq!(Scope::parse("month"), Some(Scope::Monthly));
        assert_eq!(Scope::parse("all-time"), Some(Scope::All));
        assert_eq!(Scope::parse("daily"), None);
    }
}
