//! Scheduler — turns a confirmed action into a calendar event plus a daily
//! action, deterministically.
//!
//! Duration and focus-area classification are ordered (predicate, result)
//! tables evaluated first-match-wins over the action text, not nested
//! conditionals. The pair insert and the status advance are one transaction;
//! reminder attachment rides behind it and may fail independently.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{DbCalendarEvent, DbDailyAction, DbExtractedAction, KeptDb};
use crate::error::CoreError;
use crate::util::validate_hh_mm;

use super::{confirmation, reminders};

/// Priority at or above which an action counts as urgent.
pub const URGENT_PRIORITY: i64 = 4;

/// Ordered duration rules: first keyword hit wins. Case-insensitive
/// substring match over the action text.
const DURATION_RULES: &[(&[&str], i64)] = &[
    (&["call", "text", "email"], 15),
    (&["meet", "visit", "discuss"], 45),
    (&["prepare", "plan", "research"], 90),
];

/// Fallbacks when no keyword matches: urgent actions get a short slot.
const FALLBACK_URGENT_MINUTES: i64 = 30;
const FALLBACK_MINUTES: i64 = 60;

/// Estimate how long an action takes.
pub fn estimate_duration_minutes(text: &str, priority_level: i64) -> i64 {
    let lowered = text.to_lowercase();
    for (keywords, minutes) in DURATION_RULES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return *minutes;
        }
    }
    if priority_level >= URGENT_PRIORITY {
        FALLBACK_URGENT_MINUTES
    } else {
        FALLBACK_MINUTES
    }
}

/// Coarse life-domain tag for a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Health,
    Relationships,
    Work,
    Fitness,
    Personal,
}

impl FocusArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::Health => "health",
            FocusArea::Relationships => "relationships",
            FocusArea::Work => "work",
            FocusArea::Fitness => "fitness",
            FocusArea::Personal => "personal",
        }
    }
}

const HEALTH_KEYWORDS: &[&str] = &[
    "doctor", "dentist", "medical", "health", "therapy", "checkup", "appointment", "medication",
];
const FAMILY_KEYWORDS: &[&str] = &[
    "mom", "dad", "family", "kids", "daughter", "son", "wife", "husband", "partner", "parents",
    "grandma", "grandpa",
];
const WORK_KEYWORDS: &[&str] = &["work", "job", "career", "boss", "client", "office", "project"];
const FITNESS_KEYWORDS: &[&str] = &["gym", "workout", "exercise", "run", "fitness", "training"];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Classify an action into a focus area, first match wins: health, then
/// relationships (family words in the text or in the relationship impact),
/// then work, then fitness, then personal.
pub fn classify_focus_area(text: &str, relationship_impact: Option<&str>) -> FocusArea {
    let lowered = text.to_lowercase();
    if contains_any(&lowered, HEALTH_KEYWORDS) {
        return FocusArea::Health;
    }
    let impact_mentions_family = relationship_impact
        .map(|impact| contains_any(&impact.to_lowercase(), FAMILY_KEYWORDS))
        .unwrap_or(false);
    if contains_any(&lowered, FAMILY_KEYWORDS) || impact_mentions_family {
        return FocusArea::Relationships;
    }
    if contains_any(&lowered, WORK_KEYWORDS) {
        return FocusArea::Work;
    }
    if contains_any(&lowered, FITNESS_KEYWORDS) {
        return FocusArea::Fitness;
    }
    FocusArea::Personal
}

/// Default start time: urgent actions land in the morning block.
pub fn default_start_time(priority_level: i64) -> &'static str {
    if priority_level >= URGENT_PRIORITY {
        "09:00"
    } else {
        "14:00"
    }
}

/// The pair a successful scheduling produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPair {
    pub event: DbCalendarEvent,
    pub daily_action: DbDailyAction,
    /// False when the default reminders could not be attached; the gap is
    /// retryable and does not undo the scheduling.
    pub reminders_attached: bool,
}

/// Outcome of a bulk scheduling pass.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScheduleOutcome {
    pub scheduled: usize,
    pub failed: usize,
}

fn build_pair(
    action: &DbExtractedAction,
    date: NaiveDate,
    time: &str,
) -> (DbCalendarEvent, DbDailyAction) {
    let now = Utc::now().to_rfc3339();
    let focus = classify_focus_area(&action.text, action.relationship_impact.as_deref());
    let duration = estimate_duration_minutes(&action.text, action.priority_level);
    let date_str = date.format("%Y-%m-%d").to_string();

    let event = DbCalendarEvent {
        id: Uuid::new_v4().to_string(),
        account_id: action.account_id.clone(),
        action_id: action.id.clone(),
        title: action.text.clone(),
        description: action
            .intent_behind
            .clone()
            .or_else(|| action.due_context.clone()),
        event_date: date_str.clone(),
        event_time: time.to_string(),
        category: focus.as_str().to_string(),
        created_at: now.clone(),
    };
    let daily = DbDailyAction {
        id: Uuid::new_v4().to_string(),
        account_id: action.account_id.clone(),
        action_id: action.id.clone(),
        event_id: event.id.clone(),
        title: action.text.clone(),
        action_date: date_str,
        start_time: time.to_string(),
        duration_minutes: duration,
        focus_area: focus.as_str().to_string(),
        difficulty_level: action.priority_level.min(5),
        status: "pending".to_string(),
        completed_at: None,
        created_at: now,
    };
    (event, daily)
}

/// Schedule one confirmed action.
///
/// The calendar event, the daily action, and the `confirmed -> scheduled`
/// advance commit together or not at all; on failure the action is still
/// `confirmed` and the error says so. Default reminders attach after the
/// commit — a reminder failure is logged and left for retry.
pub fn schedule_action(
    db: &KeptDb,
    action_id: &str,
    target_date: Option<NaiveDate>,
    target_time: Option<&str>,
    today: NaiveDate,
) -> Result<ScheduledPair, CoreError> {
    let action = db
        .get_extracted_action(action_id)?
        .ok_or_else(|| CoreError::ActionNotFound(action_id.to_string()))?;

    if action.status != "confirmed" {
        return Err(CoreError::InvalidTransition {
            entity: "action",
            from: action.status,
            to: "scheduled".to_string(),
        });
    }

    if let Some(time) = target_time {
        validate_hh_mm(time, "target_time")?;
    }
    let date = target_date.unwrap_or(today);
    let time = target_time.unwrap_or_else(|| default_start_time(action.priority_level));

    let (event, daily) = build_pair(&action, date, time);
    db.create_scheduled_pair(&event, &daily)
        .map_err(|reason| CoreError::SchedulingPartialFailure {
            action_id: action_id.to_string(),
            reason,
        })?;
    confirmation::audit_scheduled(db, action_id)?;

    let reminders_attached = match reminders::attach_defaults(db, &event) {
        Ok(_) => true,
        Err(e) => {
            log::warn!(
                "scheduled action {} but reminder attachment failed: {}",
                action_id,
                e
            );
            false
        }
    };

    Ok(ScheduledPair {
        event,
        daily_action: daily,
        reminders_attached,
    })
}

/// Schedule every confirmed-but-unscheduled action for an account. One bad
/// action never aborts the batch; failures are logged and counted.
pub fn schedule_all_confirmed(
    db: &KeptDb,
    account_id: &str,
    today: NaiveDate,
) -> Result<BulkScheduleOutcome, CoreError> {
    let confirmed = db.confirmed_actions_for_account(account_id)?;
    let mut outcome = BulkScheduleOutcome {
        scheduled: 0,
        failed: 0,
    };
    for action in confirmed {
        match schedule_action(db, &action.id, None, None, today) {
            Ok(_) => outcome.scheduled += 1,
            Err(e) => {
                outcome.failed += 1;
                log::warn!("bulk scheduling skipped action {}: {}", action.id, e);
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::actions::test_support::{seed_action, seed_action_with};
    use crate::db::sessions::test_support::seed_session;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn test_duration_keyword_rules() {
        assert_eq!(estimate_duration_minutes("Call mom", 2), 15);
        assert_eq!(estimate_duration_minutes("Text Sarah back", 9), 15);
        assert_eq!(estimate_duration_minutes("Meet with the landlord", 3), 45);
        assert_eq!(estimate_duration_minutes("Visit grandma", 5), 45);
        assert_eq!(estimate_duration_minutes("Research vacation options", 5), 90);
        assert_eq!(estimate_duration_minutes("Plan the offsite", 1), 90);
    }

    #[test]
    fn test_duration_first_match_wins() {
        // "call" (15) appears before "plan" (90) in the rule order
        assert_eq!(estimate_duration_minutes("Call to plan the trip", 5), 15);
    }

    #[test]
    fn test_duration_fallback_by_priority() {
        assert_eq!(estimate_duration_minutes("Pick up milk", 2), 60);
        assert_eq!(estimate_duration_minutes("Pick up milk", 5), 30);
        assert_eq!(estimate_duration_minutes("Pick up milk", 4), 30);
    }

    #[test]
    fn test_focus_first_match_order() {
        assert_eq!(classify_focus_area("Book doctor appointment", None), FocusArea::Health);
        // Health outranks family even when both match
        assert_eq!(
            classify_focus_area("Take mom to the doctor", None),
            FocusArea::Health
        );
        assert_eq!(classify_focus_area("Call mom", None), FocusArea::Relationships);
        assert_eq!(
            classify_focus_area("Finish the client proposal", None),
            FocusArea::Work
        );
        assert_eq!(classify_focus_area("Hit the gym", None), FocusArea::Fitness);
        assert_eq!(classify_focus_area("Pick up milk", None), FocusArea::Personal);
    }

    #[test]
    fn test_focus_relationship_impact_pulls_family() {
        assert_eq!(
            classify_focus_area("Send the photos", Some("your sister and kids are waiting")),
            FocusArea::Relationships
        );
        assert_eq!(classify_focus_area("Send the photos", Some("a colleague")), FocusArea::Personal);
    }

    #[test]
    fn test_default_start_time() {
        assert_eq!(default_start_time(4), "09:00");
        assert_eq!(default_start_time(10), "09:00");
        assert_eq!(default_start_time(3), "14:00");
    }

    #[test]
    fn test_schedule_action_pair_and_defaults() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action_with(&db, "a1", "s1", "acct", "confirmed", "Call mom", 8, 0.9);

        let pair = schedule_action(&db, "a1", None, None, today()).unwrap();
        assert_eq!(pair.event.event_date, "2026-08-07");
        assert_eq!(pair.event.event_time, "09:00");
        assert_eq!(pair.event.category, "relationships");
        assert_eq!(pair.daily_action.duration_minutes, 15);
        assert_eq!(pair.daily_action.difficulty_level, 5);
        assert!(pair.reminders_attached);

        assert_eq!(
            db.get_extracted_action("a1").unwrap().unwrap().status,
            "scheduled"
        );
        let reminders = db.reminders_for_event(&pair.event.id).unwrap();
        assert_eq!(reminders.len(), 2);
    }

    #[test]
    fn test_schedule_respects_explicit_date_time() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action_with(&db, "a1", "s1", "acct", "confirmed", "Pick up milk", 2, 0.9);

        let date = NaiveDate::from_ymd_opt(2026, 8, 12).unwrap();
        let pair = schedule_action(&db, "a1", Some(date), Some("17:30"), today()).unwrap();
        assert_eq!(pair.event.event_date, "2026-08-12");
        assert_eq!(pair.event.event_time, "17:30");
        assert_eq!(pair.daily_action.duration_minutes, 60);
        assert_eq!(pair.daily_action.difficulty_level, 2);
    }

    #[test]
    fn test_schedule_rejects_unconfirmed() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "pending");

        let err = schedule_action(&db, "a1", None, None, today()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_schedule_twice_fails_cleanly() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action(&db, "a1", "s1", "acct", "confirmed");

        schedule_action(&db, "a1", None, None, today()).unwrap();
        let err = schedule_action(&db, "a1", None, None, today()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_bulk_continues_past_failures() {
        let db = KeptDb::open_in_memory().unwrap();
        seed_session(&db, "s1", "acct", "complete");
        seed_action_with(&db, "a1", "s1", "acct", "confirmed", "Call mom", 8, 0.9);
        seed_action_with(&db, "a2", "s1", "acct", "confirmed", "Plan the trip", 3, 0.8);
        seed_action_with(&db, "a3", "s1", "acct", "confirmed", "Email the landlord", 6, 0.7);

        // Poison a2: a stray calendar event already claims it, so its pair
        // insert fails while a1 and a3 go through.
        let stray = DbCalendarEvent {
            id: "evt-stray".to_string(),
            account_id: "acct".to_string(),
            action_id: "a2".to_string(),
            title: "stray".to_string(),
            description: None,
            event_date: "2026-08-07".to_string(),
            event_time: "09:00".to_string(),
            category: "personal".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        db.insert_calendar_event(&stray).unwrap();

        let outcome = schedule_all_confirmed(&db, "acct", today()).unwrap();
        assert_eq!(outcome.scheduled, 2);
        assert_eq!(outcome.failed, 1);

        assert_eq!(
            db.get_extracted_action("a1").unwrap().unwrap().status,
            "scheduled"
        );
        assert_eq!(
            db.get_extracted_action("a2").unwrap().unwrap().status,
            "confirmed"
        );
        assert_eq!(
            db.get_extracted_action("a3").unwrap().unwrap().status,
            "scheduled"
        );
    }
}
