use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::*;

impl KeptDb {
    // =========================================================================
    // Extracted actions
    // =========================================================================

    pub fn insert_extracted_action(&self, action: &DbExtractedAction) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO extracted_actions (
                id, session_id, account_id, action_type, text, priority_level,
                confidence_score, due_context, relationship_impact, emotional_stakes,
                intent_behind, transcript_excerpt, status, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                action.id,
                action.session_id,
                action.account_id,
                action.action_type,
                action.text,
                action.priority_level,
                action.confidence_score,
                action.due_context,
                action.relationship_impact,
                action.emotional_stakes,
                action.intent_behind,
                action.transcript_excerpt,
                action.status,
                action.created_at,
                action.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_extracted_action(&self, id: &str) -> Result<Option<DbExtractedAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, account_id, action_type, text, priority_level,
                    confidence_score, due_context, relationship_impact, emotional_stakes,
                    intent_behind, transcript_excerpt, status, created_at, updated_at
             FROM extracted_actions
             WHERE id = ?1",
        )?;
        let action = stmt
            .query_row(params![id], Self::map_extracted_action_row)
            .optional()?;
        Ok(action)
    }

    /// Guarded status transition: only fires when the row is still in
    /// `from`. Returns false when another caller already moved it (or the
    /// caller had a stale view) — the service layer turns that into
    /// `InvalidTransition` rather than coercing.
    pub fn transition_action_status(
        &self,
        id: &str,
        from: &str,
        to: &str,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE extracted_actions SET status = ?3, updated_at = ?4
             WHERE id = ?1 AND status = ?2",
            params![id, from, to, now],
        )?;
        Ok(changed > 0)
    }

    /// Apply user edits made during confirmation. Only the reviewable fields
    /// move; provenance fields (confidence, excerpt) stay as extracted.
    pub fn update_action_review_fields(
        &self,
        id: &str,
        text: Option<&str>,
        priority_level: Option<i64>,
        due_context: Option<&str>,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE extracted_actions SET
                text = COALESCE(?2, text),
                priority_level = COALESCE(?3, priority_level),
                due_context = COALESCE(?4, due_context),
                updated_at = ?5
             WHERE id = ?1",
            params![id, text, priority_level, due_context, now],
        )?;
        Ok(())
    }

    /// Explicit user deletion. Actions are never expired away by the core.
    pub fn delete_extracted_action(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM extracted_actions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Pending actions for review, highest priority first, confidence as the
    /// tiebreak.
    pub fn pending_actions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<DbExtractedAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, account_id, action_type, text, priority_level,
                    confidence_score, due_context, relationship_impact, emotional_stakes,
                    intent_behind, transcript_excerpt, status, created_at, updated_at
             FROM extracted_actions
             WHERE account_id = ?1 AND status = 'pending'
             ORDER BY priority_level DESC, confidence_score DESC, created_at ASC",
        )?;
        let rows = stmt.query_map(params![account_id], Self::map_extracted_action_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Confirmed-but-unscheduled actions, the bulk scheduler's work list.
    pub fn confirmed_actions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<DbExtractedAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, account_id, action_type, text, priority_level,
                    confidence_score, due_context, relationship_impact, emotional_stakes,
                    intent_behind, transcript_excerpt, status, created_at, updated_at
             FROM extracted_actions
             WHERE account_id = ?1 AND status = 'confirmed'
             ORDER BY priority_level DESC, created_at ASC",
        )?;
        let rows = stmt.query_map(params![account_id], Self::map_extracted_action_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Actions a session produced, in extraction order.
    pub fn actions_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<DbExtractedAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, account_id, action_type, text, priority_level,
                    confidence_score, due_context, relationship_impact, emotional_stakes,
                    intent_behind, transcript_excerpt, status, created_at, updated_at
             FROM extracted_actions
             WHERE session_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![session_id], Self::map_extracted_action_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub(crate) fn map_extracted_action_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<DbExtractedAction> {
        Ok(DbExtractedAction {
            id: row.get(0)?,
            session_id: row.get(1)?,
            account_id: row.get(2)?,
            action_type: row.get(3)?,
            text: row.get(4)?,
            priority_level: row.get(5)?,
            confidence_score: row.get(6)?,
            due_context: row.get(7)?,
            relationship_impact: row.get(8)?,
            emotional_stakes: row.get(9)?,
            intent_behind: row.get(10)?,
            transcript_excerpt: row.get(11)?,
            status: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    // =========================================================================
    // Confirmation audit trail (append-only)
    // =========================================================================

    pub fn append_action_audit(
        &self,
        action_id: &str,
        confirmation_status: &str,
        modifications: Option<&str>,
        note: Option<&str>,
    ) -> Result<String, DbError> {
        let id = format!("aud-{}", Uuid::new_v4());
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO action_audits (id, action_id, confirmation_status, modifications, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, action_id, confirmation_status, modifications, note, now],
        )?;
        Ok(id)
    }

    /// Audit rows for one action, oldest first.
    pub fn audits_for_action(&self, action_id: &str) -> Result<Vec<DbActionAudit>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action_id, confirmation_status, modifications, note, created_at
             FROM action_audits
             WHERE action_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![action_id], |row| {
            Ok(DbActionAudit {
                id: row.get(0)?,
                action_id: row.get(1)?,
                confirmation_status: row.get(2)?,
                modifications: row.get(3)?,
                note: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Insert a minimal extracted action in the given status.
    pub fn seed_action(
        db: &KeptDb,
        id: &str,
        session_id: &str,
        account_id: &str,
        status: &str,
    ) -> DbExtractedAction {
        seed_action_with(db, id, session_id, account_id, status, "Call mom", 5, 0.9)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn seed_action_with(
        db: &KeptDb,
        id: &str,
        session_id: &str,
        account_id: &str,
        status: &str,
        text: &str,
        priority_level: i64,
        confidence_score: f64,
    ) -> DbExtractedAction {
        let now = Utc::now().to_rfc3339();
        let action = DbExtractedAction {
            id: id.to_string(),
            session_id: session_id.to_string(),
            account_id: account_id.to_string(),
            action_type: "promise".to_string(),
            text: text.to_string(),
            priority_level,
            confidence_score,
            due_context: None,
            relationship_impact: None,
            emotional_stakes: None,
            intent_behind: None,
            transcript_excerpt: None,
            status: status.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        db.insert_extracted_action(&action).unwrap();
        action
    }
}
