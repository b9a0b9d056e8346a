//! Confirmation workflow — the per-action state machine.
//!
//! pending -> confirmed | rejected, confirmed -> scheduled,
//! scheduled -> completed. The table below is the whole policy; anything not
//! in it is rejected with `InvalidTransition`, never coerced. Every
//! transition appends an audit row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{DbExtractedAction, KeptDb};
use crate::error::CoreError;
use crate::signals;
use crate::util::{validate_bounded_string, validate_range};

/// Extracted action status. String forms match the stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Confirmed,
    Rejected,
    Scheduled,
    Completed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Confirmed => "confirmed",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Scheduled => "scheduled",
            ActionStatus::Completed => "completed",
        }
    }

    pub fn parse(label: &str) -> Option<ActionStatus> {
        match label {
            "pending" => Some(ActionStatus::Pending),
            "confirmed" => Some(ActionStatus::Confirmed),
            "rejected" => Some(ActionStatus::Rejected),
            "scheduled" => Some(ActionStatus::Scheduled),
            "completed" => Some(ActionStatus::Completed),
            _ => None,
        }
    }
}

/// The allowed transitions. No skipping, no reverse edges.
const TRANSITIONS: &[(ActionStatus, ActionStatus)] = &[
    (ActionStatus::Pending, ActionStatus::Confirmed),
    (ActionStatus::Pending, ActionStatus::Rejected),
    (ActionStatus::Confirmed, ActionStatus::Scheduled),
    (ActionStatus::Scheduled, ActionStatus::Completed),
];

pub fn can_transition(from: ActionStatus, to: ActionStatus) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Edits the user made while confirming. Only the reviewable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionModifications {
    pub text: Option<String>,
    pub priority_level: Option<i64>,
    pub due_context: Option<String>,
}

impl ActionModifications {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.priority_level.is_none() && self.due_context.is_none()
    }
}

/// Pending actions ready for review. `hidden` is how many fell below the
/// display cap — they are still pending, just behind "show more".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueue {
    pub actions: Vec<DbExtractedAction>,
    pub hidden: usize,
    pub total: usize,
}

/// Default number of pending actions surfaced before "show more".
pub const DEFAULT_REVIEW_CAP: usize = 5;

fn fetch(db: &KeptDb, action_id: &str) -> Result<DbExtractedAction, CoreError> {
    db.get_extracted_action(action_id)?
        .ok_or_else(|| CoreError::ActionNotFound(action_id.to_string()))
}

/// Guarded move through the transition table, with the audit row appended on
/// success. `InvalidTransition` carries the action's actual current status.
fn transition(
    db: &KeptDb,
    action_id: &str,
    to: ActionStatus,
    modifications_json: Option<&str>,
    note: Option<&str>,
) -> Result<DbExtractedAction, CoreError> {
    let action = fetch(db, action_id)?;
    let from = ActionStatus::parse(&action.status).ok_or_else(|| CoreError::InvalidTransition {
        entity: "action",
        from: action.status.clone(),
        to: to.as_str().to_string(),
    })?;

    if !can_transition(from, to) {
        return Err(CoreError::InvalidTransition {
            entity: "action",
            from: action.status,
            to: to.as_str().to_string(),
        });
    }

    if !db.transition_action_status(action_id, from.as_str(), to.as_str())? {
        // Another device moved it between our read and the guarded write.
        let current = fetch(db, action_id)?;
        log::warn!(
            "action {} transition {} -> {} lost to concurrent update (now '{}')",
            action_id,
            from.as_str(),
            to.as_str(),
            current.status
        );
        return Err(CoreError::InvalidTransition {
            entity: "action",
            from: current.status,
            to: to.as_str().to_string(),
        });
    }

    db.append_action_audit(action_id, to.as_str(), modifications_json, note)?;
    fetch(db, action_id)
}

/// Confirm a pending action, optionally applying the user's edits first.
pub fn confirm(
    db: &KeptDb,
    action_id: &str,
    modifications: Option<&ActionModifications>,
) -> Result<DbExtractedAction, CoreError> {
    let mods_json = match modifications {
        Some(mods) if !mods.is_empty() => {
            let text = match &mods.text {
                Some(t) => Some(validate_bounded_string(t, "text", 1, 500)?),
                None => None,
            };
            if let Some(priority) = mods.priority_level {
                validate_range(priority, "priority_level", 1, 10)?;
            }
            db.update_action_review_fields(
                action_id,
                text.as_deref(),
                mods.priority_level,
                mods.due_context.as_deref(),
            )?;
            Some(serde_json::to_string(mods).unwrap_or_default())
        }
        _ => None,
    };
    transition(db, action_id, ActionStatus::Confirmed, mods_json.as_deref(), None)
}

/// Reject a pending action. Terminal.
pub fn reject(
    db: &KeptDb,
    action_id: &str,
    reason: Option<&str>,
) -> Result<DbExtractedAction, CoreError> {
    transition(db, action_id, ActionStatus::Rejected, None, reason)
}

/// Record that the scheduler advanced the action. The status move itself
/// happens inside the scheduler's transaction; this appends the audit row.
pub(crate) fn audit_scheduled(db: &KeptDb, action_id: &str) -> Result<(), CoreError> {
    db.append_action_audit(action_id, ActionStatus::Scheduled.as_str(), None, None)?;
    Ok(())
}

/// Complete a scheduled action: advances the action, completes the paired
/// daily action, and emits the completion event the streak consumer reads.
pub fn complete(
    db: &KeptDb,
    action_id: &str,
    today: NaiveDate,
) -> Result<DbExtractedAction, CoreError> {
    let action = transition(db, action_id, ActionStatus::Completed, None, None)?;

    let now = chrono::Utc::now().to_rfc3339();
    if !db.complete_daily_action(action_id, &now)? {
        // The pair invariant says this exists; log rather than unwind the
        // user's completion.
        log::warn!("no pending daily action found for completed action {}", action_id);
    }
    signals::emit_completion(db, action_id, &action.account_id, today)?;
    Ok(action)
}

/// The review queue for an account: priority desc, confidence desc, capped
/// for display without dropping anything.
pub fn pending_review(
    db: &KeptDb,
    account_id: &str,
    cap: usize,
) -> Result<ReviewQueue, CoreError> {
    let mut actions = db.pending_actions_for_account(account_id)?;
    let total = actions.len();
    let hidden = total.saturating_sub(cap);
    actions.truncate(cap);
    Ok(ReviewQueue {
        actions,
        hidden,
        total,
    })
}
