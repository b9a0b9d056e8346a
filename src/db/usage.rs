use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::*;
use crate::util::period_bounds;

impl KeptDb {
    // =========================================================================
    // Usage ledger
    // =========================================================================

    /// Get the usage record whose period covers `on`, if one exists.
    pub fn get_usage_record(
        &self,
        account_id: &str,
        on: NaiveDate,
    ) -> Result<Option<DbUsageRecord>, DbError> {
        let date = on.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, period_start, period_end, tier,
                    recording_count, recording_duration_minutes, comment_count,
                    created_at, updated_at
             FROM usage_records
             WHERE account_id = ?1 AND period_start <= ?2 AND period_end >= ?2",
        )?;
        let record = stmt
            .query_row(params![account_id, date], Self::map_usage_row)
            .optional()?;
        Ok(record)
    }

    /// Get-or-create the current-period record with zero counters.
    ///
    /// The UNIQUE(account_id, period_start) constraint plus `ON CONFLICT DO
    /// NOTHING` makes concurrent first-recordings from two devices converge
    /// on one row. `tier` is frozen here; a plan change produces a new record
    /// at the next period boundary, never a rewrite of this one.
    pub fn get_or_create_usage_record(
        &self,
        account_id: &str,
        today: NaiveDate,
        tier: &str,
    ) -> Result<DbUsageRecord, DbError> {
        if let Some(record) = self.get_usage_record(account_id, today)? {
            return Ok(record);
        }

        let (start, end) = period_bounds(today);
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO usage_records (
                id, account_id, period_start, period_end, tier,
                recording_count, recording_duration_minutes, comment_count,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, ?6, ?6)
             ON CONFLICT(account_id, period_start) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                account_id,
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
                tier,
                now,
            ],
        )?;

        // Re-read: either our insert or the concurrent winner's row.
        self.get_usage_record(account_id, today)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Atomically consume one recording slot against `limit`.
    ///
    /// The quota check and the increment are one conditional UPDATE — there
    /// is no fetch-compare-write window for two concurrent starts to slip
    /// through. Returns false when the period is already at the limit.
    /// A negative limit is the unlimited sentinel.
    pub fn try_consume_recording(&self, record_id: &str, limit: i64) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE usage_records
             SET recording_count = recording_count + 1, updated_at = ?2
             WHERE id = ?1 AND (?3 < 0 OR recording_count < ?3)",
            params![record_id, now, limit],
        )?;
        Ok(changed > 0)
    }

    /// Add billed recording minutes to a period record.
    pub fn add_recording_minutes(&self, record_id: &str, minutes: i64) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE usage_records
             SET recording_duration_minutes = recording_duration_minutes + ?2,
                 updated_at = ?3
             WHERE id = ?1",
            params![record_id, minutes, now],
        )?;
        Ok(())
    }

    /// Increment the comment counter for a period record.
    pub fn add_comment(&self, record_id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE usage_records
             SET comment_count = comment_count + 1, updated_at = ?2
             WHERE id = ?1",
            params![record_id, now],
        )?;
        Ok(())
    }

    /// Creation date of the account's oldest surviving recording session,
    /// used to drive the retention countdown.
    pub fn oldest_session_created_at(
        &self,
        account_id: &str,
    ) -> Result<Option<String>, DbError> {
        let created: Option<String> = self
            .conn
            .query_row(
                "SELECT MIN(created_at) FROM recording_sessions WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(created)
    }

    fn map_usage_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbUsageRecord> {
        Ok(DbUsageRecord {
            id: row.get(0)?,
            account_id: row.get(1)?,
            period_start: row.get(2)?,
            period_end: row.get(3)?,
            tier: row.get(4)?,
            recording_count: row.get(5)?,
            recording_duration_minutes: row.get(6)?,
            comment_count: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
