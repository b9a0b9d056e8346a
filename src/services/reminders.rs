//! Reminder generator.
//!
//! Scheduling attaches a fixed default set; users add more afterwards. Each
//! reminder resolves to an absolute `fire_at` when created, so the delivery
//! loop is one indexed comparison. A fired reminder is immutable — snoozing
//! retires it and creates a replacement.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DbCalendarEvent, DbReminder, KeptDb};
use crate::error::CoreError;
use crate::util::validate_range;

/// When a reminder fires, relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderTime {
    #[serde(rename = "5_minutes_before")]
    FiveMinutesBefore,
    #[serde(rename = "15_minutes_before")]
    FifteenMinutesBefore,
    #[serde(rename = "30_minutes_before")]
    ThirtyMinutesBefore,
    #[serde(rename = "1_hour_before")]
    OneHourBefore,
    #[serde(rename = "1_day_before")]
    OneDayBefore,
    #[serde(rename = "morning_of")]
    MorningOf,
}

impl ReminderTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTime::FiveMinutesBefore => "5_minutes_before",
            ReminderTime::FifteenMinutesBefore => "15_minutes_before",
            ReminderTime::ThirtyMinutesBefore => "30_minutes_before",
            ReminderTime::OneHourBefore => "1_hour_before",
            ReminderTime::OneDayBefore => "1_day_before",
            ReminderTime::MorningOf => "morning_of",
        }
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMethod {
    InApp,
    Push,
    Email,
    Sms,
}

/// Fixed default set attached on scheduling. Not configurable at creation
/// time; users add more afterwards.
pub const DEFAULT_REMINDER_SET: &[(ReminderTime, &[ReminderMethod])] = &[
    (
        ReminderTime::FifteenMinutesBefore,
        &[ReminderMethod::InApp, ReminderMethod::Push],
    ),
    (
        ReminderTime::MorningOf,
        &[ReminderMethod::Email, ReminderMethod::InApp],
    ),
];

/// Where "morning of" lands on the event date.
const MORNING_OF_HOUR: u32 = 8;

fn morning_of_time() -> NaiveTime {
    NaiveTime::from_hms_opt(MORNING_OF_HOUR, 0, 0).unwrap_or_default()
}

/// Resolve a relative reminder to an absolute instant. Event times are
/// stored naive and treated as UTC; the embedding shell owns timezone
/// presentation.
pub fn fire_time(
    reminder_time: ReminderTime,
    event_date: NaiveDate,
    event_time: NaiveTime,
) -> DateTime<Utc> {
    let event_at = Utc.from_utc_datetime(&event_date.and_time(event_time));
    match reminder_time {
        ReminderTime::FiveMinutesBefore => event_at - Duration::minutes(5),
        ReminderTime::FifteenMinutesBefore => event_at - Duration::minutes(15),
        ReminderTime::ThirtyMinutesBefore => event_at - Duration::minutes(30),
        ReminderTime::OneHourBefore => event_at - Duration::hours(1),
        ReminderTime::OneDayBefore => event_at - Duration::days(1),
        ReminderTime::MorningOf => Utc.from_utc_datetime(&event_date.and_time(morning_of_time())),
    }
}

fn parse_event_schedule(event: &DbCalendarEvent) -> Result<(NaiveDate, NaiveTime), CoreError> {
    let date = NaiveDate::parse_from_str(&event.event_date, "%Y-%m-%d").map_err(|_| {
        CoreError::Validation {
            field: "event_date",
            message: format!("expected YYYY-MM-DD, got '{}'", event.event_date),
        }
    })?;
    let time = NaiveTime::parse_from_str(&event.event_time, "%H:%M").map_err(|_| {
        CoreError::Validation {
            field: "event_time",
            message: format!("expected HH:MM, got '{}'", event.event_time),
        }
    })?;
    Ok((date, time))
}

fn insert_reminder(
    db: &KeptDb,
    event_id: &str,
    reminder_time: ReminderTime,
    methods: &[ReminderMethod],
    fire_at: DateTime<Utc>,
    note: Option<&str>,
) -> Result<String, CoreError> {
    let id = format!("rem-{}", Uuid::new_v4());
    let reminder = DbReminder {
        id: id.clone(),
        event_id: event_id.to_string(),
        reminder_time: reminder_time.as_str().to_string(),
        methods: serde_json::to_string(methods).unwrap_or_else(|_| "[]".to_string()),
        fire_at: fire_at.to_rfc3339(),
        is_active: true,
        sent_at: None,
        note: note.map(String::from),
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_reminder(&reminder)?;
    Ok(id)
}

/// Attach the default reminder set to a freshly scheduled event.
pub fn attach_defaults(db: &KeptDb, event: &DbCalendarEvent) -> Result<Vec<String>, CoreError> {
    let (date, time) = parse_event_schedule(event)?;
    let mut ids = Vec::with_capacity(DEFAULT_REMINDER_SET.len());
    for (reminder_time, methods) in DEFAULT_REMINDER_SET {
        let fire_at = fire_time(*reminder_time, date, time);
        ids.push(insert_reminder(db, &event.id, *reminder_time, methods, fire_at, None)?);
    }
    Ok(ids)
}

/// Add a user-chosen reminder to an event.
pub fn add_reminder(
    db: &KeptDb,
    event: &DbCalendarEvent,
    reminder_time: ReminderTime,
    methods: &[ReminderMethod],
) -> Result<String, CoreError> {
    if methods.is_empty() {
        return Err(CoreError::Validation {
            field: "methods",
            message: "at least one delivery channel is required".to_string(),
        });
    }
    let (date, time) = parse_event_schedule(event)?;
    let fire_at = fire_time(reminder_time, date, time);
    insert_reminder(db, &event.id, reminder_time, methods, fire_at, None)
}

/// Snooze: retire the existing reminder as sent and create a replacement
/// firing in `minutes`. The old reminder never reactivates.
pub fn snooze(
    db: &KeptDb,
    reminder_id: &str,
    minutes: i64,
    reason: Option<&str>,
) -> Result<String, CoreError> {
    validate_range(minutes, "minutes", 1, 7 * 24 * 60)?;
    let reminder = db
        .get_reminder(reminder_id)?
        .ok_or_else(|| CoreError::ReminderNotFound(reminder_id.to_string()))?;

    if !db.mark_reminder_sent(reminder_id)? {
        return Err(CoreError::InvalidTransition {
            entity: "reminder",
            from: "sent".to_string(),
            to: "snoozed".to_string(),
        });
    }

    let methods: Vec<ReminderMethod> =
        serde_json::from_str(&reminder.methods).unwrap_or_else(|_| vec![ReminderMethod::InApp]);
    let reminder_time = parse_reminder_time(&reminder.reminder_time);
    let fire_at = Utc::now() + Duration::minutes(minutes);
    insert_reminder(
        db,
        &reminder.event_id,
        reminder_time,
        &methods,
        fire_at,
        reason,
    )
}

/// Dismiss: deactivate without marking delivery. `sent_at` stays NULL, which
/// is how "never needed" is told apart from "was delivered".
pub fn dismiss(db: &KeptDb, reminder_id: &str) -> Result<(), CoreError> {
    let reminder = db
        .get_reminder(reminder_id)?
        .ok_or_else(|| CoreError::ReminderNotFound(reminder_id.to_string()))?;

    if !db.deactivate_reminder(reminder_id)? {
        let from = if reminder.sent_at.is_some() {
            "sent"
        } else {
            "inactive"
        };
        return Err(CoreError::InvalidTransition {
            entity: "reminder",
            from: from.to_string(),
            to: "dismissed".to_string(),
        });
    }
    Ok(())
}

/// Mark a reminder delivered. Refuses a second delivery.
pub fn mark_sent(db: &KeptDb, reminder_id: &str) -> Result<(), CoreError> {
    if db.get_reminder(reminder_id)?.is_none() {
        return Err(CoreError::ReminderNotFound(reminder_id.to_string()));
    }
    if !db.mark_reminder_sent(reminder_id)? {
        return Err(CoreError::InvalidTransition {
            entity: "reminder",
            from: "sent".to_string(),
            to: "sent".to_string(),
        });
    }
    Ok(())
}

/// Reminders the delivery loop should fire now.
pub fn due(db: &KeptDb, now: DateTime<Utc>) -> Result<Vec<DbReminder>, CoreError> {
    Ok(db.due_reminders(&now.to_rfc3339())?)
}

/// Stored label back to the enum; unknown labels degrade to the most common
/// kind rather than failing a snooze.
fn parse_reminder_time(label: &str) -> ReminderTime {
    match label {
        "5_minutes_before" => ReminderTime::FiveMinutesBefore,
        "30_minutes_before" => ReminderTime::ThirtyMinutesBefore,
        "1_hour_before" => ReminderTime::OneHourBefore,
        "1_day_before" => ReminderTime::OneDayBefore,
        "morning_of" => ReminderTime::MorningOf,
        _ => ReminderTime::FifteenMinutesBefore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::actions::test_support::seed_action;
    use crate::db::sessions::test_support::seed_session;

    fn seeded_event(db: &KeptDb) -> DbCalendarEvent {
        seed_session(db, "s1", "acct", "complete");
        seed_action(db, "a1", "s1", "acct", "confirmed");
        let event = DbCalendarEvent {
            id: "evt-1".to_string(),
            account_id: "acct".to_string(),
            action_id: "a1".to_string(),
            title: "Call mom".to_string(),
            description: None,
            event_date: "2026-08-07".to_string(),
            event_time: "09:00".to_string(),
            category: "relationships".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        let daily = crate::db::DbDailyAction {
            id: "day-1".to_string(),
            account_id: "acct".to_string(),
            action_id: "a1".to_string(),
            event_id: "evt-1".to_string(),
            title: "Call mom".to_string(),
            action_date: "2026-08-07".to_string(),
            start_time: "09:00".to_string(),
            duration_minutes: 15,
            focus_area: "relationships".to_string(),
            difficulty_level: 5,
            status: "pending".to_string(),
            completed_at: None,
            created_at: Utc::now().to_rfc3339(),
        };
        db.create_scheduled_pair(&event, &daily).unwrap();
        event
    }

    #[test]
    fn test_fire_time_offsets() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let time = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        let at = |h: u32, m: u32| {
            Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap()))
        };
        assert_eq!(fire_time(ReminderTime::FiveMinutesBefore, date, time), at(13, 55));
        assert_eq!(fire_time(ReminderTime::FifteenMinutesBefore, date, time), at(13, 45));
        assert_eq!(fire_time(ReminderTime::OneHourBefore, date, time), at(13, 0));
        assert_eq!(fire_time(ReminderTime::MorningOf, date, time), at(8, 0));

        let day_before = fire_time(ReminderTime::OneDayBefore, date, time);
        assert_eq!(
            day_before,
            Utc.from_utc_datetime(
                &NaiveDate::from_ymd_opt(2026, 8, 6).unwrap().and_time(time)
            )
        );
    }

    #[test]
    fn test_defaults_attach_fixed_set() {
        let db = KeptDb::open_in_memory().unwrap();
        let event = seeded_event(&db);

        let ids = attach_defaults(&db, &event).unwrap();
        assert_eq!(ids.len(), 2);

        let reminders = db.reminders_for_event(&event.id).unwrap();
        assert_eq!(reminders.len(), 2);
        let kinds: Vec<&str> = reminders.iter().map(|r| r.reminder_time.as_str()).collect();
        assert!(kinds.contains(&"15_minutes_before"));
        assert!(kinds.contains(&"morning_of"));

        let fifteen = reminders
            .iter()
            .find(|r| r.reminder_time == "15_minutes_before")
            .unwrap();
        assert!(fifteen.methods.contains("in_app"));
        assert!(fifteen.methods.contains("push"));
        let morning = reminders
            .iter()
            .find(|r| r.reminder_time == "morning_of")
            .unwrap();
        assert!(morning.methods.contains("email"));
    }

    #[test]
    fn test_snooze_retires_and_replaces() {
        let db = KeptDb::open_in_memory().unwrap();
        let event = seeded_event(&db);
        let ids = attach_defaults(&db, &event).unwrap();

        let new_id = snooze(&db, &ids[0], 10, Some("still on the call")).unwrap();
        assert_ne!(new_id, ids[0]);

        let old = db.get_reminder(&ids[0]).unwrap().unwrap();
        assert!(!old.is_active);
        assert!(old.sent_at.is_some());

        let new = db.get_reminder(&new_id).unwrap().unwrap();
        assert!(new.is_active);
        assert!(new.sent_at.is_none());
        assert_eq!(new.note.as_deref(), Some("still on the call"));

        // A snoozed reminder never reactivates
        let err = snooze(&db, &ids[0], 10, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_dismiss_leaves_sent_at_null() {
        let db = KeptDb::open_in_memory().unwrap();
        let event = seeded_event(&db);
        let ids = attach_defaults(&db, &event).unwrap();

        dismiss(&db, &ids[0]).unwrap();
        let reminder = db.get_reminder(&ids[0]).unwrap().unwrap();
        assert!(!reminder.is_active);
        assert!(reminder.sent_at.is_none());
    }

    #[test]
    fn test_dismiss_refuses_fired_reminder() {
        let db = KeptDb::open_in_memory().unwrap();
        let event = seeded_event(&db);
        let ids = attach_defaults(&db, &event).unwrap();

        mark_sent(&db, &ids[0]).unwrap();
        let err = dismiss(&db, &ids[0]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        // Delivery timestamp survives the refused dismissal
        assert!(db.get_reminder(&ids[0]).unwrap().unwrap().sent_at.is_some());
    }

    #[test]
    fn test_due_picks_past_reminders_only() {
        let db = KeptDb::open_in_memory().unwrap();
        let event = seeded_event(&db); // event on 2026-08-07 09:00

        attach_defaults(&db, &event).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 8, 7, 7, 0, 0).unwrap();
        assert!(due(&db, before).unwrap().is_empty());

        let mid_morning = Utc.with_ymd_and_hms(2026, 8, 7, 8, 30, 0).unwrap();
        let due_now = due(&db, mid_morning).unwrap();
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].reminder_time, "morning_of");
    }

    #[test]
    fn test_snooze_unknown_reminder() {
        let db = KeptDb::open_in_memory().unwrap();
        assert!(matches!(
            snooze(&db, "missing", 5, None).unwrap_err(),
            CoreError::ReminderNotFound(_)
        ));
    }
}
