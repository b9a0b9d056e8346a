//! Extraction result intake.
//!
//! The speech-to-commitments collaborator is a black box; this module takes
//! whatever it returns, materializes pending actions, and scores the session.
//! A malformed or empty payload degrades the session to `failed` — it never
//! panics into a caller's render path.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DbExtractedAction, KeptDb};
use crate::error::CoreError;

/// Collaborator's self-reported transcript quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptQuality {
    High,
    Medium,
    Low,
}

/// How the actions were pulled out of the transcript. `rule-based` is the
/// degraded fallback when the model path is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Ai,
    RuleBased,
}

/// Commitment vs. errand, as the collaborator labelled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Promise,
    Task,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Promise => "promise",
            ActionType::Task => "task",
        }
    }
}

/// One raw action as the collaborator returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtractedAction {
    pub action_type: ActionType,
    pub text: String,
    pub priority_level: i64,
    pub confidence_score: f64,
    #[serde(default)]
    pub due_context: Option<String>,
    #[serde(default)]
    pub relationship_impact: Option<String>,
    #[serde(default)]
    pub emotional_stakes: Option<String>,
    #[serde(default)]
    pub intent_behind: Option<String>,
    #[serde(default)]
    pub transcript_excerpt: Option<String>,
}

/// The collaborator's full response for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    pub actions: Vec<RawExtractedAction>,
    pub transcript_quality: TranscriptQuality,
    pub method: ExtractionMethod,
}

/// Messaging band for the aggregate score. Thresholds are product policy and
/// must stay put: 85 and 70.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    ReadyToSchedule,
    ReviewBeforeScheduling,
    ReviewCarefully,
}

impl ConfidenceBand {
    pub fn for_score(score: i64) -> ConfidenceBand {
        if score >= 85 {
            ConfidenceBand::ReadyToSchedule
        } else if score >= 70 {
            ConfidenceBand::ReviewBeforeScheduling
        } else {
            ConfidenceBand::ReviewCarefully
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ConfidenceBand::ReadyToSchedule => "These look solid — ready to schedule.",
            ConfidenceBand::ReviewBeforeScheduling => "Worth a quick review before scheduling.",
            ConfidenceBand::ReviewCarefully => {
                "Review carefully — consider re-recording if these look off."
            }
        }
    }
}

/// What the intake produced for one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSummary {
    pub session_id: String,
    pub action_ids: Vec<String>,
    pub aggregate_confidence: i64,
    pub band: ConfidenceBand,
    pub message: String,
}

/// Degraded-signal ceilings. A low-quality transcript can never present as
/// high confidence (< 70), and the rule-based fallback can never present as
/// ready-to-schedule (< 85), no matter what the per-action scores say.
fn quality_cap(quality: TranscriptQuality) -> i64 {
    match quality {
        TranscriptQuality::High => 100,
        TranscriptQuality::Medium => 92,
        TranscriptQuality::Low => 69,
    }
}

fn method_cap(method: ExtractionMethod) -> i64 {
    match method {
        ExtractionMethod::Ai => 100,
        ExtractionMethod::RuleBased => 84,
    }
}

/// Aggregate session confidence on a 0-100 scale: the mean of the per-action
/// scores, clipped by the transcript-quality and extraction-method ceilings.
/// Monotonic in every input.
pub fn aggregate_confidence(
    actions: &[RawExtractedAction],
    quality: TranscriptQuality,
    method: ExtractionMethod,
) -> i64 {
    if actions.is_empty() {
        return 0;
    }
    let mean: f64 = actions
        .iter()
        .map(|a| a.confidence_score.clamp(0.0, 1.0))
        .sum::<f64>()
        / actions.len() as f64;
    let base = (mean * 100.0).round() as i64;
    base.min(quality_cap(quality)).min(method_cap(method))
}

/// Ingest a raw JSON response. Parse failures fail the session rather than
/// surfacing as a crash.
pub fn ingest_json(db: &KeptDb, session_id: &str, raw: &str) -> Result<IntakeSummary, CoreError> {
    match serde_json::from_str::<ExtractionPayload>(raw) {
        Ok(payload) => ingest(db, session_id, &payload),
        Err(e) => {
            let reason = format!("malformed extraction payload: {}", e);
            let _ = db.mark_session_failed(session_id, &reason)?;
            Err(CoreError::ExtractionFailed(reason))
        }
    }
}

/// Materialize a parsed payload into pending actions and complete the
/// session. The session must be `processing`; an empty action list fails it.
pub fn ingest(
    db: &KeptDb,
    session_id: &str,
    payload: &ExtractionPayload,
) -> Result<IntakeSummary, CoreError> {
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if session.status != "processing" {
        return Err(CoreError::InvalidTransition {
            entity: "session",
            from: session.status,
            to: "complete".to_string(),
        });
    }

    if payload.actions.is_empty() {
        let reason = "extraction returned no actions".to_string();
        db.mark_session_failed(session_id, &reason)?;
        return Err(CoreError::ExtractionFailed(reason));
    }

    let aggregate = aggregate_confidence(&payload.actions, payload.transcript_quality, payload.method);
    let quality = serde_json::to_value(payload.transcript_quality)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "medium".to_string());
    let method = serde_json::to_value(payload.method)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "ai".to_string());

    let now = Utc::now().to_rfc3339();
    let actions: Vec<DbExtractedAction> = payload
        .actions
        .iter()
        .map(|raw| DbExtractedAction {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            account_id: session.account_id.clone(),
            action_type: raw.action_type.as_str().to_string(),
            text: raw.text.trim().to_string(),
            priority_level: raw.priority_level.clamp(1, 10),
            confidence_score: raw.confidence_score.clamp(0.0, 1.0),
            due_context: raw.due_context.clone(),
            relationship_impact: raw.relationship_impact.clone(),
            emotional_stakes: raw.emotional_stakes.clone(),
            intent_behind: raw.intent_behind.clone(),
            transcript_excerpt: raw.transcript_excerpt.clone(),
            status: "pending".to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect();

    db.with_transaction(|db| {
        for action in &actions {
            db.insert_extracted_action(action).map_err(|e| e.to_string())?;
        }
        let completed = db
            .mark_session_complete(&session.id, &quality, &method, aggregate)
            .map_err(|e| e.to_string())?;
        if !completed {
            return Err(format!("session {} left 'processing' mid-intake", session.id));
        }
        Ok(())
    })
    .map_err(CoreError::ExtractionFailed)?;

    let band = ConfidenceBand::for_score(aggregate);
    log::info!(
        "intake for session {}: {} actions, confidence {}",
        session_id,
        actions.len(),
        aggregate
    );
    Ok(IntakeSummary {
        session_id: session.id,
        action_ids: actions.into_iter().map(|a| a.id).collect(),
        aggregate_confidence: aggregate,
        band,
        message: band.message().to_string(),
    })
}
