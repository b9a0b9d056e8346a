//! Core engine for kept: record a conversation, turn it into discrete
//! commitments, and turn those into calendar events with reminders — under
//! plan-based usage quotas, with follow-through fed to the streak consumer.
//!
//! The pipeline runs one direction: the usage ledger gates a recording
//! session, the extraction collaborator returns raw actions, intake scores
//! them, the confirmation workflow resolves each one, the scheduler emits a
//! calendar event + daily action pair, and the reminder generator attaches
//! the default set. Completion events flow out the far end.
//!
//! The UI shell, speech-to-text, and billing backend all live elsewhere;
//! this crate is the part with rules in it.

pub mod db;
pub mod error;
mod migrations;
pub mod services;
pub mod signals;
pub mod tiers;
pub mod util;

pub use db::KeptDb;
pub use error::{CoreError, PipelineError};
pub use tiers::{Tier, TierCatalog, TierLimits};
