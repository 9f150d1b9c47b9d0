//! Shared types for the reply pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound message ─────────────────────────────────────────────────

/// The one message a run works on. Read-only once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEmail {
    /// Bare sender address (no display name).
    pub sender_address: String,
    pub subject: String,
    /// Plain-text body. Empty when the message had no text content.
    pub body: String,
}

// ── Model contract ──────────────────────────────────────────────────

/// Normalized model output. All five fields are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_technical: bool,
    pub simple_reply_draft: String,
    pub non_technical_reply_draft: String,
    pub request_meeting: bool,
    pub meeting_suggestion_draft: String,
}

/// Which draft the router picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyRoute {
    /// Technical email that warrants a call.
    MeetingSuggestion,
    /// Technical email answered in writing.
    SimpleReply,
    /// Anything else gets a courteous acknowledgement.
    NonTechnical,
}

impl ReplyRoute {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            ReplyRoute::MeetingSuggestion => "meeting_suggestion",
            ReplyRoute::SimpleReply => "simple_reply",
            ReplyRoute::NonTechnical => "non_technical",
        }
    }
}

impl std::fmt::Display for ReplyRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Outbound reply ──────────────────────────────────────────────────

/// Formatted reply, ready for the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReply {
    pub subject: String,
    pub body: String,
}

/// A message that was classified and answered.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedReply {
    pub email: IncomingEmail,
    pub classification: ClassificationResult,
    pub route: ReplyRoute,
    pub reply: FinalReply,
    pub processed_at: DateTime<Utc>,
}

/// How a run ended without aborting.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The mailbox had nothing unread.
    NoUnreadMessage,
    /// The sender was filtered out before classification.
    Skipped { sender: String, reason: String },
    /// A reply was delivered (or logged, in dry-run mode).
    Replied(Box<ProcessedReply>),
    /// Delivery failed. Terminal for the run and not retried.
    SendFailed { to: String, reason: String },
}

impl RunOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::NoUnreadMessage => "no_unread_message",
            RunOutcome::Skipped { .. } => "skipped",
            RunOutcome::Replied(_) => "replied",
            RunOutcome::SendFailed { .. } => "send_failed",
        }
    }
}
