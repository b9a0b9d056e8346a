//! Usage ledger — recording quota enforcement and retention countdowns.
//!
//! One record per account per calendar-month billing period. The quota gate
//! and its increment are a single conditional UPDATE in the db layer; this
//! module layers the tier policy on top.

use chrono::NaiveDate;

use crate::db::{DbUsageRecord, KeptDb};
use crate::error::CoreError;
use crate::tiers::{Tier, TierLimits};
use crate::util::days_since;

/// Counters plus plan context, shaped for an app shell's usage screen.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub tier: String,
    pub recording_count: i64,
    pub recording_duration_minutes: i64,
    pub comment_count: i64,
    /// `-1` means unlimited.
    pub recording_limit: i64,
    /// None when the plan is unlimited.
    pub recordings_remaining: Option<i64>,
    /// None when retention is permanent.
    pub retention_days_remaining: Option<i64>,
}

/// Whether the account may start another recording this period.
///
/// Creates the current-period record with zero counters if it doesn't exist
/// yet. The answer uses the *live* limits, so a mid-period upgrade widens the
/// gate immediately while already-logged counts stand.
pub fn can_record(
    db: &KeptDb,
    account_id: &str,
    tier: Tier,
    limits: &TierLimits,
    today: NaiveDate,
) -> Result<bool, CoreError> {
    let record = db.get_or_create_usage_record(account_id, today, tier.as_str())?;
    if limits.unlimited_recordings() {
        return Ok(true);
    }
    Ok(record.recording_count < limits.recording_count)
}

/// Atomically consume one recording slot. Returns the period record when the
/// slot was granted; `QuotaExceeded` when the period is already at the limit.
pub fn consume_recording_slot(
    db: &KeptDb,
    account_id: &str,
    tier: Tier,
    limits: &TierLimits,
    today: NaiveDate,
) -> Result<DbUsageRecord, CoreError> {
    let record = db.get_or_create_usage_record(account_id, today, tier.as_str())?;
    if !db.try_consume_recording(&record.id, limits.recording_count)? {
        return Err(CoreError::QuotaExceeded {
            limit: limits.recording_count,
        });
    }
    Ok(record)
}

/// Book billed recording minutes against the current period.
///
/// Defensive path: the session lifecycle guarantees a record and an in-flight
/// session exist by the time minutes are booked. If either is missing the
/// booking is dropped with a warning instead of failing the stop.
pub fn record_usage(
    db: &KeptDb,
    account_id: &str,
    duration_minutes: i64,
    today: NaiveDate,
) -> Result<(), CoreError> {
    if duration_minutes <= 0 {
        return Ok(());
    }
    if !db.has_session_in_flight(account_id)? {
        log::warn!(
            "usage booking for account {} with no session in flight; dropping {} minutes",
            account_id,
            duration_minutes
        );
        return Ok(());
    }
    match db.get_usage_record(account_id, today)? {
        Some(record) => {
            db.add_recording_minutes(&record.id, duration_minutes)?;
            Ok(())
        }
        None => {
            log::warn!(
                "usage booking for account {} with no current-period record; dropping {} minutes",
                account_id,
                duration_minutes
            );
            Ok(())
        }
    }
}

/// Count a comment against the current period.
pub fn record_comment(
    db: &KeptDb,
    account_id: &str,
    tier: Tier,
    today: NaiveDate,
) -> Result<(), CoreError> {
    let record = db.get_or_create_usage_record(account_id, today, tier.as_str())?;
    db.add_comment(&record.id)?;
    Ok(())
}

/// Days until the account's oldest recording falls out of its retention
/// window. None means permanent storage; never negative. An account with no
/// recordings yet gets the full window.
pub fn retention_countdown(
    db: &KeptDb,
    account_id: &str,
    limits: &TierLimits,
    today: NaiveDate,
) -> Result<Option<i64>, CoreError> {
    if limits.permanent_retention() {
        return Ok(None);
    }
    let remaining = match db.oldest_session_created_at(account_id)? {
        Some(created_at) => {
            let created = created_at
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            match created {
                Some(date) => (limits.retention_days - days_since(date, today)).max(0),
                None => {
                    log::warn!(
                        "unparseable session creation date '{}' for account {}",
                        created_at,
                        account_id
                    );
                    limits.retention_days
                }
            }
        }
        None => limits.retention_days,
    };
    Ok(Some(remaining))
}

/// Current-period counters plus plan headroom.
pub fn usage_summary(
    db: &KeptDb,
    account_id: &str,
    tier: Tier,
    limits: &TierLimits,
    today: NaiveDate,
) -> Result<UsageSummary, CoreError> {
    let record = db.get_or_create_usage_record(account_id, today, tier.as_str())?;
    let recordings_remaining = if limits.unlimited_recordings() {
        None
    } else {
        Some((limits.recording_count - record.recording_count).max(0))
    };
    Ok(UsageSummary {
        tier: record.tier.clone(),
        recording_count: record.recording_count,
        recording_duration_minutes: record.recording_duration_minutes,
        comment_count: record.comment_count,
        recording_limit: limits.recording_count,
        recordings_remaining,
        retention_days_remaining: retention_countdown(db, account_id, limits, today)?,
    })
}
