//! Recording session lifecycle: start, stop, cancel, hand-off to extraction.
//!
//! Quota is consumed on start — a cancel-and-retry loop burns slots, which is
//! the point. Stop is idempotent: exactly one caller wins the guarded
//! transition and books the usage minutes; everyone else gets the stored
//! result.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{DbRecordingSession, KeptDb};
use crate::error::CoreError;
use crate::tiers::{Tier, TierLimits};
use crate::util::{minutes_rounded_up, validate_bounded_string, validate_range};

use super::usage;

/// What the owner tells us about the conversation before recording.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    pub title: String,
    #[serde(default)]
    pub participants: Vec<String>,
    pub context: Option<String>,
    pub location: Option<String>,
    /// Self-reported 1-10 energy going into the conversation.
    pub energy_level: Option<i64>,
}

/// Result of stopping a capture. Re-stopping an already-stopped session
/// returns the stored values with `already_stopped` set.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub session_id: String,
    /// Wall-clock capture length, rounded to the nearest second.
    pub duration_seconds: i64,
    /// What the ledger was billed: partial minutes round up.
    pub billed_minutes: i64,
    pub already_stopped: bool,
}

/// Start a capture. Fails with `QuotaExceeded` before any session row is
/// written; on success the session is `recording` and one quota slot is gone.
pub fn start(
    db: &KeptDb,
    account_id: &str,
    setup: &SessionSetup,
    tier: Tier,
    limits: &TierLimits,
    today: NaiveDate,
) -> Result<DbRecordingSession, CoreError> {
    let title = validate_bounded_string(&setup.title, "title", 1, 280)?;
    if let Some(ref context) = setup.context {
        validate_bounded_string(context, "context", 1, 2000)?;
    }
    if let Some(ref location) = setup.location {
        validate_bounded_string(location, "location", 1, 200)?;
    }
    if let Some(energy) = setup.energy_level {
        validate_range(energy, "energy_level", 1, 10)?;
    }

    usage::consume_recording_slot(db, account_id, tier, limits, today)?;

    let now = Utc::now().to_rfc3339();
    let participants = if setup.participants.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&setup.participants).unwrap_or_default())
    };
    let session = DbRecordingSession {
        id: Uuid::new_v4().to_string(),
        account_id: account_id.to_string(),
        status: "recording".to_string(),
        title,
        participants,
        context: setup.context.clone(),
        location: setup.location.clone(),
        energy_level: setup.energy_level,
        started_at: now.clone(),
        stopped_at: None,
        duration_seconds: None,
        transcript_quality: None,
        extraction_method: None,
        aggregate_confidence: None,
        failure_reason: None,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_session(&session)?;
    log::info!(
        "recording started: session {} for account {}",
        session.id,
        account_id
    );
    Ok(session)
}

/// Stop a capture. Callable any number of times; only the first call (per
/// the status guard) transitions the row and books usage minutes.
pub fn stop(db: &KeptDb, session_id: &str) -> Result<StopOutcome, CoreError> {
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if session.status != "recording" {
        // Idempotent no-op: the capture already ended, return what we stored.
        return Ok(StopOutcome {
            session_id: session.id,
            duration_seconds: session.duration_seconds.unwrap_or(0),
            billed_minutes: minutes_rounded_up(session.duration_seconds.unwrap_or(0)),
            already_stopped: true,
        });
    }

    let now = Utc::now();
    let duration_seconds = elapsed_seconds(&session.started_at, now);

    if !db.mark_session_stopped(session_id, &now.to_rfc3339(), duration_seconds)? {
        // Lost the guard to a concurrent stop — defer to the winner's result.
        let session = db
            .get_session(session_id)?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;
        return Ok(StopOutcome {
            session_id: session.id,
            duration_seconds: session.duration_seconds.unwrap_or(0),
            billed_minutes: minutes_rounded_up(session.duration_seconds.unwrap_or(0)),
            already_stopped: true,
        });
    }

    let billed_minutes = minutes_rounded_up(duration_seconds);
    usage::record_usage(db, &session.account_id, billed_minutes, now.date_naive())?;
    log::info!(
        "recording stopped: session {} ({}s, billed {}min)",
        session_id,
        duration_seconds,
        billed_minutes
    );

    Ok(StopOutcome {
        session_id: session.id,
        duration_seconds,
        billed_minutes,
        already_stopped: false,
    })
}

/// Discard a session that hasn't reached extraction. The quota slot consumed
/// on start stays consumed.
pub fn cancel(db: &KeptDb, session_id: &str) -> Result<(), CoreError> {
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if !db.delete_session_pre_extraction(session_id)? {
        return Err(CoreError::InvalidTransition {
            entity: "session",
            from: session.status,
            to: "cancelled".to_string(),
        });
    }
    log::info!(
        "session {} cancelled for account {}; quota slot retained",
        session_id,
        session.account_id
    );
    Ok(())
}

/// Hand a stopped session to the extraction collaborator. Extraction runs
/// once per session; a second hand-off fails the guard.
pub fn begin_extraction(db: &KeptDb, session_id: &str) -> Result<(), CoreError> {
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if !db.mark_session_processing(session_id)? {
        return Err(CoreError::InvalidTransition {
            entity: "session",
            from: session.status,
            to: "processing".to_string(),
        });
    }
    Ok(())
}

/// Record that the extraction collaborator failed outright. The session
/// becomes `failed`; the user is offered a re-record, not a crash.
pub fn mark_failed(db: &KeptDb, session_id: &str, reason: &str) -> Result<(), CoreError> {
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if !db.mark_session_failed(session_id, reason)? {
        return Err(CoreError::InvalidTransition {
            entity: "session",
            from: session.status,
            to: "failed".to_string(),
        });
    }
    log::error!("session {} failed: {}", session_id, reason);
    Ok(())
}

/// Wall-clock seconds from `started_at` to `now`, rounded to the nearest
/// second, never negative.
fn elapsed_seconds(started_at: &str, now: DateTime<Utc>) -> i64 {
    match DateTime::parse_from_rfc3339(started_at) {
        Ok(started) => {
            let millis = (now - started.with_timezone(&Utc)).num_milliseconds();
            ((millis as f64) / 1000.0).round().max(0.0) as i64
        }
        Err(_) => {
            log::warn!("unparseable started_at '{}'", started_at);
            0
        }
    }
}
