//! Error types for the capture-to-schedule pipeline.
//!
//! Errors are classified by recoverability:
//! - Recoverable: quota refusals, extraction failures, partial scheduling —
//!   scoped to one session or one action, safe to surface and retry
//! - Programming errors: invalid state transitions — rejected and logged,
//!   never silently coerced

use thiserror::Error;

use crate::db::DbError;

/// Error taxonomy for the core pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    // Recoverable errors
    #[error("Recording quota exceeded for this billing period (limit: {limit})")]
    QuotaExceeded { limit: i64 },

    #[error("Action extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Scheduling failed for action {action_id}: {reason}")]
    SchedulingPartialFailure { action_id: String, reason: String },

    // Programming errors
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    // Lookup failures
    #[error("Recording session not found: {0}")]
    SessionNotFound(String),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl CoreError {
    /// Returns true if this error is recoverable by the user without a code
    /// change (upgrade plan, re-record, retry the one action).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::QuotaExceeded { .. }
                | CoreError::ExtractionFailed(_)
                | CoreError::SchedulingPartialFailure { .. }
        )
    }

    /// Get a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CoreError::QuotaExceeded { .. } => {
                "You've used all recordings on your current plan. Upgrade to keep recording."
            }
            CoreError::ExtractionFailed(_) => {
                "We couldn't pull commitments out of that recording. Try recording again."
            }
            CoreError::SchedulingPartialFailure { .. } => {
                "The action stayed in your review queue. Schedule it again."
            }
            CoreError::InvalidTransition { .. } => {
                "This item is no longer in a state that allows that change."
            }
            CoreError::SessionNotFound(_)
            | CoreError::ActionNotFound(_)
            | CoreError::ReminderNotFound(_) => "The item may have been deleted. Refresh and retry.",
            CoreError::Validation { .. } => "Check the highlighted field and try again.",
            CoreError::Db(_) => "Something went wrong saving your data. Try again.",
        }
    }
}

/// Serializable error representation for an embedding app shell.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineError {
    pub message: String,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

impl From<&CoreError> for PipelineError {
    fn from(err: &CoreError) -> Self {
        PipelineError {
            message: err.to_string(),
            can_retry: err.is_recoverable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
