use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::*;

impl KeptDb {
    // =========================================================================
    // Reminders
    // =========================================================================

    pub fn insert_reminder(&self, reminder: &DbReminder) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO reminders (
                id, event_id, reminder_time, methods, fire_at, is_active,
                sent_at, note, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                reminder.id,
                reminder.event_id,
                reminder.reminder_time,
                reminder.methods,
                reminder.fire_at,
                reminder.is_active,
                reminder.sent_at,
                reminder.note,
                reminder.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_reminder(&self, id: &str) -> Result<Option<DbReminder>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, reminder_time, methods, fire_at, is_active,
                    sent_at, note, created_at
             FROM reminders
             WHERE id = ?1",
        )?;
        let reminder = stmt
            .query_row(params![id], Self::map_reminder_row)
            .optional()?;
        Ok(reminder)
    }

    /// Mark a reminder delivered. A reminder is immutable once `sent_at` is
    /// set, so the guard refuses a second firing.
    pub fn mark_reminder_sent(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE reminders SET sent_at = ?2, is_active = 0
             WHERE id = ?1 AND sent_at IS NULL",
            params![id, now],
        )?;
        Ok(changed > 0)
    }

    /// Deactivate a reminder that was never delivered (`sent_at` stays NULL —
    /// this is what distinguishes a dismissal from a delivery).
    pub fn deactivate_reminder(&self, id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE reminders SET is_active = 0
             WHERE id = ?1 AND sent_at IS NULL AND is_active = 1",
            params![id],
        )?;
        Ok(changed > 0)
    }

    /// Active, unsent reminders due at or before `now`, soonest first.
    pub fn due_reminders(&self, now: &str) -> Result<Vec<DbReminder>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, reminder_time, methods, fire_at, is_active,
                    sent_at, note, created_at
             FROM reminders
             WHERE is_active = 1 AND sent_at IS NULL AND fire_at <= ?1
             ORDER BY fire_at ASC",
        )?;
        let rows = stmt.query_map(params![now], Self::map_reminder_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All reminders attached to an event, active first, soonest first.
    pub fn reminders_for_event(&self, event_id: &str) -> Result<Vec<DbReminder>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, reminder_time, methods, fire_at, is_active,
                    sent_at, note, created_at
             FROM reminders
             WHERE event_id = ?1
             ORDER BY is_active DESC, fire_at ASC",
        )?;
        let rows = stmt.query_map(params![event_id], Self::map_reminder_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_reminder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbReminder> {
        Ok(DbReminder {
            id: row.get(0)?,
            event_id: row.get(1)?,
            reminder_time: row.get(2)?,
            methods: row.get(3)?,
            fire_at: row.get(4)?,
            is_active: row.get(5)?,
            sent_at: row.get(6)?,
            note: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
