use rusqlite::{params, OptionalExtension};

use super::*;

impl KeptDb {
    // =========================================================================
    // Calendar events + daily actions
    // =========================================================================

    pub fn insert_calendar_event(&self, event: &DbCalendarEvent) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO calendar_events (
                id, account_id, action_id, title, description, event_date,
                event_time, category, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.account_id,
                event.action_id,
                event.title,
                event.description,
                event.event_date,
                event.event_time,
                event.category,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_daily_action(&self, daily: &DbDailyAction) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO daily_actions (
                id, account_id, action_id, event_id, title, action_date,
                start_time, duration_minutes, focus_area, difficulty_level,
                status, completed_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                daily.id,
                daily.account_id,
                daily.action_id,
                daily.event_id,
                daily.title,
                daily.action_date,
                daily.start_time,
                daily.duration_minutes,
                daily.focus_area,
                daily.difficulty_level,
                daily.status,
                daily.completed_at,
                daily.created_at,
            ],
        )?;
        Ok(())
    }

    /// Create the calendar event + daily action pair and advance the source
    /// action `confirmed -> scheduled`, all as one unit of work. If any write
    /// fails (including the status guard losing to a concurrent scheduler),
    /// the whole pair rolls back and the action stays `confirmed` with no
    /// orphan rows.
    pub fn create_scheduled_pair(
        &self,
        event: &DbCalendarEvent,
        daily: &DbDailyAction,
    ) -> Result<(), String> {
        self.with_transaction(|db| {
            db.insert_calendar_event(event).map_err(|e| e.to_string())?;
            db.insert_daily_action(daily).map_err(|e| e.to_string())?;
            let advanced = db
                .transition_action_status(&event.action_id, "confirmed", "scheduled")
                .map_err(|e| e.to_string())?;
            if !advanced {
                return Err(format!(
                    "action {} is no longer in 'confirmed'",
                    event.action_id
                ));
            }
            Ok(())
        })
    }

    pub fn get_event_for_action(
        &self,
        action_id: &str,
    ) -> Result<Option<DbCalendarEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, action_id, title, description, event_date,
                    event_time, category, created_at
             FROM calendar_events
             WHERE action_id = ?1",
        )?;
        let event = stmt
            .query_row(params![action_id], Self::map_event_row)
            .optional()?;
        Ok(event)
    }

    pub fn get_daily_action_for_action(
        &self,
        action_id: &str,
    ) -> Result<Option<DbDailyAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, action_id, event_id, title, action_date,
                    start_time, duration_minutes, focus_area, difficulty_level,
                    status, completed_at, created_at
             FROM daily_actions
             WHERE action_id = ?1",
        )?;
        let daily = stmt
            .query_row(params![action_id], Self::map_daily_row)
            .optional()?;
        Ok(daily)
    }

    /// Mark the paired daily action completed. Guarded so a repeat completion
    /// keeps the original timestamp.
    pub fn complete_daily_action(&self, action_id: &str, completed_at: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE daily_actions SET status = 'completed', completed_at = ?2
             WHERE action_id = ?1 AND status = 'pending'",
            params![action_id, completed_at],
        )?;
        Ok(changed > 0)
    }

    /// Calendar events for an account within an inclusive date range.
    pub fn events_for_range(
        &self,
        account_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<DbCalendarEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, action_id, title, description, event_date,
                    event_time, category, created_at
             FROM calendar_events
             WHERE account_id = ?1 AND event_date >= ?2 AND event_date <= ?3
             ORDER BY event_date ASC, event_time ASC",
        )?;
        let rows = stmt.query_map(params![account_id, from, to], Self::map_event_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The day's action list, earliest start first.
    pub fn daily_actions_for_date(
        &self,
        account_id: &str,
        date: &str,
    ) -> Result<Vec<DbDailyAction>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, action_id, event_id, title, action_date,
                    start_time, duration_minutes, focus_area, difficulty_level,
                    status, completed_at, created_at
             FROM daily_actions
             WHERE account_id = ?1 AND action_date = ?2
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map(params![account_id, date], Self::map_daily_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCalendarEvent> {
        Ok(DbCalendarEvent {
            id: row.get(0)?,
            account_id: row.get(1)?,
            action_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            event_date: row.get(5)?,
            event_time: row.get(6)?,
            category: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn map_daily_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbDailyAction> {
        Ok(DbDailyAction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            action_id: row.get(2)?,
            event_id: row.get(3)?,
            title: row.get(4)?,
            action_date: row.get(5)?,
            start_time: row.get(6)?,
            duration_minutes: row.get(7)?,
            focus_area: row.get(8)?,
            difficulty_level: row.get(9)?,
            status: row.get(10)?,
            completed_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::actions::test_support::seed_action;
    use crate::db::sessions::test_support::seed_session;

    fn pair_for(action_id: &str, account_id: &str) -> (DbCalendarEvent, DbDailyAction) {
        let now = Utc::now().to_rfc3339();
        let event = DbCalendarEvent {
            id: format!("evt-{action_id}"),
            account_id: account_id.to_string(),
            action_id: action_id.to_string(),
            title: "Call mom".to_string(),
            description: None,
            event_date: "2026-08-07".to_string(),
            event_time: "09:00".to_string(),
            category: "relationships".to_string(),
            created_at: now.clone(),
        };
        let daily = DbDailyAction {
            id: format!("day-{action_id}"),
            account_id: account_id.to_string(),
            action_id: action_id.to_string(),
            event_id: event.id.clone(),
            title: "Call mom".to_string(),
            action_date: "2026-08-07".to_string(),
            start_time: "09:00".to_string(),
            duration_minutes: 15,
            focus_area: "relationships".to_string(),
            difficulty_level: 5,
            status: "pending".to_string(),
            completed_at: None,
            created_at: now,
        };
        (event, daily)
    }

    #[test]
    fn test_pair_creation_advances_action() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "confirmed");

        let (event, daily) = pair_for("a1", "acct");
        db.create_scheduled_pair(&event, &daily).unwrap();

        assert_eq!(
            db.get_extracted_action("a1").unwrap().unwrap().status,
            "scheduled"
        );
        assert!(db.get_event_for_action("a1").unwrap().is_some());
        assert!(db.get_daily_action_for_action("a1").unwrap().is_some());
    }

    #[test]
    fn test_failed_second_write_leaves_no_orphans() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "confirmed");
        seed_action(&db, "a2", "s1", "acct", "confirmed");

        let (event_a1, daily_a1) = pair_for("a1", "acct");
        db.create_scheduled_pair(&event_a1, &daily_a1).unwrap();

        // Reuse a1's daily-action id so the second write inside the
        // transaction fails after the event insert succeeded.
        let (event_a2, mut daily_a2) = pair_for("a2", "acct");
        daily_a2.id = daily_a1.id.clone();
        let result = db.create_scheduled_pair(&event_a2, &daily_a2);
        assert!(result.is_err());

        assert_eq!(
            db.get_extracted_action("a2").unwrap().unwrap().status,
            "confirmed"
        );
        assert!(db.get_event_for_action("a2").unwrap().is_none());
        assert!(db.get_daily_action_for_action("a2").unwrap().is_none());
    }

    #[test]
    fn test_pair_rolls_back_when_action_not_confirmed() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "pending");

        let (event, daily) = pair_for("a1", "acct");
        assert!(db.create_scheduled_pair(&event, &daily).is_err());
        assert!(db.get_event_for_action("a1").unwrap().is_none());
        assert_eq!(
            db.get_extracted_action("a1").unwrap().unwrap().status,
            "pending"
        );
    }

    #[test]
    fn test_range_and_date_queries() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "confirmed");

        let (event, daily) = pair_for("a1", "acct");
        db.create_scheduled_pair(&event, &daily).unwrap();

        let events = db
            .events_for_range("acct", "2026-08-01", "2026-08-31")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(db
            .events_for_range("acct", "2026-09-01", "2026-09-30")
            .unwrap()
            .is_empty());

        let day = db.daily_actions_for_date("acct", "2026-08-07").unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].duration_minutes, 15);
    }

    #[test]
    fn test_complete_daily_action_keeps_first_timestamp() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "confirmed");
        let (event, daily) = pair_for("a1", "acct");
        db.create_scheduled_pair(&event, &daily).unwrap();

        assert!(db.complete_daily_action("a1", "2026-08-07T18:00:00Z").unwrap());
        assert!(!db.complete_daily_action("a1", "2026-08-08T09:00:00Z").unwrap());
        let daily = db.get_daily_action_for_action("a1").unwrap().unwrap();
        assert_eq!(daily.completed_at.as_deref(), Some("2026-08-07T18:00:00Z"));
    }
}
