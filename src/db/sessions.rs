use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::*;

impl KeptDb {
    // =========================================================================
    // Recording sessions
    // =========================================================================

    pub fn insert_session(&self, session: &DbRecordingSession) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO recording_sessions (
                id, account_id, status, title, participants, context, location,
                energy_level, started_at, stopped_at, duration_seconds,
                transcript_quality, extraction_method, aggregate_confidence,
                failure_reason, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                session.id,
                session.account_id,
                session.status,
                session.title,
                session.participants,
                session.context,
                session.location,
                session.energy_level,
                session.started_at,
                session.stopped_at,
                session.duration_seconds,
                session.transcript_quality,
                session.extraction_method,
                session.aggregate_confidence,
                session.failure_reason,
                session.created_at,
                session.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<DbRecordingSession>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, status, title, participants, context, location,
                    energy_level, started_at, stopped_at, duration_seconds,
                    transcript_quality, extraction_method, aggregate_confidence,
                    failure_reason, created_at, updated_at
             FROM recording_sessions
             WHERE id = ?1",
        )?;
        let session = stmt
            .query_row(params![id], Self::map_session_row)
            .optional()?;
        Ok(session)
    }

    /// Capture -> stopped. Guarded on `status = 'recording'` so exactly one
    /// caller wins; a repeated or concurrent stop changes nothing and the
    /// winner alone books the usage minutes.
    pub fn mark_session_stopped(
        &self,
        id: &str,
        stopped_at: &str,
        duration_seconds: i64,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE recording_sessions
             SET status = 'stopped', stopped_at = ?2, duration_seconds = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'recording'",
            params![id, stopped_at, duration_seconds, now],
        )?;
        Ok(changed > 0)
    }

    /// Stopped -> processing. Extraction is invoked once per stopped session;
    /// a second attempt fails this guard instead of re-entering.
    pub fn mark_session_processing(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE recording_sessions
             SET status = 'processing', updated_at = ?2
             WHERE id = ?1 AND status = 'stopped'",
            params![id, now],
        )?;
        Ok(changed > 0)
    }

    /// Processing -> complete, storing the extraction summary on the session.
    pub fn mark_session_complete(
        &self,
        id: &str,
        transcript_quality: &str,
        extraction_method: &str,
        aggregate_confidence: i64,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE recording_sessions
             SET status = 'complete', transcript_quality = ?2, extraction_method = ?3,
                 aggregate_confidence = ?4, updated_at = ?5
             WHERE id = ?1 AND status = 'processing'",
            params![id, transcript_quality, extraction_method, aggregate_confidence, now],
        )?;
        Ok(changed > 0)
    }

    /// Any non-terminal status -> failed, with the reason stored for display.
    pub fn mark_session_failed(&self, id: &str, reason: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE recording_sessions
             SET status = 'failed', failure_reason = ?2, updated_at = ?3
             WHERE id = ?1 AND status IN ('recording', 'stopped', 'processing')",
            params![id, reason, now],
        )?;
        Ok(changed > 0)
    }

    /// Discard a session that never reached extraction. Guarded to
    /// `recording`/`stopped`; extracted actions cascade with the row.
    pub fn delete_session_pre_extraction(&self, id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "DELETE FROM recording_sessions
             WHERE id = ?1 AND status IN ('recording', 'stopped')",
            params![id],
        )?;
        Ok(changed > 0)
    }

    /// Whether the account has a capture in flight. The duration booking
    /// path uses this as its defensive check.
    pub fn has_session_in_flight(&self, account_id: &str) -> Result<bool, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM recording_sessions
             WHERE account_id = ?1 AND status IN ('recording', 'stopped')
             LIMIT 1",
        )?;
        Ok(stmt.exists(params![account_id])?)
    }

    /// All sessions for an account, newest first.
    pub fn sessions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<DbRecordingSession>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, status, title, participants, context, location,
                    energy_level, started_at, stopped_at, duration_seconds,
                    transcript_quality, extraction_method, aggregate_confidence,
                    failure_reason, created_at, updated_at
             FROM recording_sessions
             WHERE account_id = ?1
             ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map(params![account_id], Self::map_session_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbRecordingSession> {
        Ok(DbRecordingSession {
            id: row.get(0)?,
            account_id: row.get(1)?,
            status: row.get(2)?,
            title: row.get(3)?,
            participants: row.get(4)?,
            context: row.get(5)?,
            location: row.get(6)?,
            energy_level: row.get(7)?,
            started_at: row.get(8)?,
            stopped_at: row.get(9)?,
            duration_seconds: row.get(10)?,
            transcript_quality: row.get(11)?,
            extraction_method: row.get(12)?,
            aggregate_confidence: row.get(13)?,
            failure_reason: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::seed_session;
    use super::*;

    #[test]
    fn test_stop_guard_wins_once() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "recording");

        assert!(db.mark_session_stopped("s1", "2026-08-07T10:05:00Z", 300).unwrap());
        assert!(!db.mark_session_stopped("s1", "2026-08-07T10:06:00Z", 360).unwrap());

        let session = db.get_session("s1").unwrap().unwrap();
        assert_eq!(session.status, "stopped");
        assert_eq!(session.duration_seconds, Some(300));
    }

    #[test]
    fn test_processing_refuses_reentry() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "stopped");

        assert!(db.mark_session_processing("s1").unwrap());
        assert!(!db.mark_session_processing("s1").unwrap());
    }

    #[test]
    fn test_failed_is_terminal() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "processing");

        assert!(db.mark_session_failed("s1", "empty extraction").unwrap());
        assert!(!db.mark_session_failed("s1", "again").unwrap());

        let session = db.get_session("s1").unwrap().unwrap();
        assert_eq!(session.failure_reason.as_deref(), Some("empty extraction"));
    }

    #[test]
    fn test_delete_pre_extraction_only() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "stopped");
        seed_session(&db, "s2", "acct", "processing");

        assert!(db.delete_session_pre_extraction("s1").unwrap());
        assert!(!db.delete_session_pre_extraction("s2").unwrap());
        assert!(db.get_session("s1").unwrap().is_none());
        assert!(db.get_session("s2").unwrap().is_some());
    }
}
