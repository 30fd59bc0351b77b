// Public fallible APIs in this crate share one concrete error contract (`BrewError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod client;
pub mod config;
pub mod distance;
pub mod error;
pub mod history;
pub mod matching;
pub mod models;
pub mod provider;
pub mod reminder;
pub mod slack;

pub use client::{BrewPair, InvitationOutcome, ReminderOutcome};
pub use config::RunConfig;
pub use error::{BrewError, Result};
pub use models::{Algorithm, ConversationId, GroupId, MemberId, PairGroup, Round};
pub use slack::SlackGateway;
