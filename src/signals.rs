//! Completion event feed.
//!
//! Every action that reaches `completed` appends one event here. The streak
//! and promise-score accounting lives downstream and subscribes to this feed;
//! the core only produces it.

use chrono::{NaiveDate, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::db::{DbCompletionEvent, DbError, KeptDb};

/// Emit a completion event. Returns the generated event ID.
pub fn emit_completion(
    db: &KeptDb,
    action_id: &str,
    account_id: &str,
    completed_date: NaiveDate,
) -> Result<String, DbError> {
    let id = format!("cmp-{}", Uuid::new_v4());
    let now = Utc::now().to_rfc3339();
    db.conn_ref().execute(
        "INSERT INTO completion_events (id, action_id, account_id, completed_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            action_id,
            account_id,
            completed_date.format("%Y-%m-%d").to_string(),
            now,
        ],
    )?;
    Ok(id)
}

/// Completion events for an account within an inclusive date range, oldest
/// first — the shape the streak consumer reads.
pub fn completions_between(
    db: &KeptDb,
    account_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DbCompletionEvent>, DbError> {
    let mut stmt = db.conn_ref().prepare(
        "SELECT id, action_id, account_id, completed_date, created_at
         FROM completion_events
         WHERE account_id = ?1 AND completed_date >= ?2 AND completed_date <= ?3
         ORDER BY completed_date ASC, created_at ASC",
    )?;
    let rows = stmt.query_map(
        params![
            account_id,
            from.format("%Y-%m-%d").to_string(),
            to.format("%Y-%m-%d").to_string(),
        ],
        |row| {
            Ok(DbCompletionEvent {
                id: row.get(0)?,
                action_id: row.get(1)?,
                account_id: row.get(2)?,
                completed_date: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_query_window() {
        let db = KeptDb::open_in_memory().unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2026, 8, day).unwrap();

        emit_completion(&db, "a1", "acct", d(5)).unwrap();
        emit_completion(&db, "a2", "acct", d(7)).unwrap();
        emit_completion(&db, "a3", "other", d(6)).unwrap();

        let events = completions_between(&db, "acct", d(1), d(6)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action_id, "a1");

        let events = completions_between(&db, "acct", d(1), d(31)).unwrap();
        assert_eq!(events.len(), 2);
    }
}
