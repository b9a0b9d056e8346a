//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `usage_records` table. One per account per calendar-month
/// billing period; counters only ever grow within a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUsageRecord {
    pub id: String,
    pub account_id: String,
    pub period_start: String,
    pub period_end: String,
    /// Plan label frozen when the record was created. Enforcement uses the
    /// live tier limits; this records which plan the period ran under.
    pub tier: String,
    pub recording_count: i64,
    pub recording_duration_minutes: i64,
    pub comment_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `recording_sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRecordingSession {
    pub id: String,
    pub account_id: String,
    pub status: String,
    pub title: String,
    /// JSON array of participant names.
    pub participants: Option<String>,
    pub context: Option<String>,
    pub location: Option<String>,
    pub energy_level: Option<i64>,
    pub started_at: String,
    pub stopped_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub transcript_quality: Option<String>,
    pub extraction_method: Option<String>,
    pub aggregate_confidence: Option<i64>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `extracted_actions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbExtractedAction {
    pub id: String,
    pub session_id: String,
    pub account_id: String,
    pub action_type: String,
    pub text: String,
    pub priority_level: i64,
    pub confidence_score: f64,
    pub due_context: Option<String>,
    pub relationship_impact: Option<String>,
    pub emotional_stakes: Option<String>,
    pub intent_behind: Option<String>,
    pub transcript_excerpt: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the append-only `action_audits` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActionAudit {
    pub id: String,
    pub action_id: String,
    pub confirmation_status: String,
    /// JSON of the user's edits, when the transition carried modifications.
    pub modifications: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

/// A row from the `calendar_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCalendarEvent {
    pub id: String,
    pub account_id: String,
    pub action_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub event_time: String,
    pub category: String,
    pub created_at: String,
}

/// A row from the `daily_actions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDailyAction {
    pub id: String,
    pub account_id: String,
    pub action_id: String,
    pub event_id: String,
    pub title: String,
    pub action_date: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub focus_area: String,
    pub difficulty_level: i64,
    pub status: String,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// A row from the `reminders` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbReminder {
    pub id: String,
    pub event_id: String,
    pub reminder_time: String,
    /// JSON array of delivery channels.
    pub methods: String,
    pub fire_at: String,
    pub is_active: bool,
    pub sent_at: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

/// A row from the `completion_events` table — the feed the streak/score
/// consumer subscribes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCompletionEvent {
    pub id: String,
    pub action_id: String,
    pub account_id: String,
    pub completed_date: String,
    pub created_at: String,
}
