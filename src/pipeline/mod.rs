//! Reply pipeline.
//!
//! One run flows through:
//! 1. `Mailbox::fetch_newest()`: channel-specific I/O
//! 2. `SenderRules::evaluate()`: automated-sender guard (no LLM)
//! 3. `PromptBuilder` → `ModelInvoker` → `extract` → `normalize`
//! 4. `router::route()` → `format::format_reply()`
//! 5. `MailSender::send()`
//!
//! At most one email per run; nothing is sent after an abort.

pub mod extract;
pub mod format;
pub mod invoker;
pub mod normalize;
pub mod processor;
pub mod prompt;
pub mod router;
pub mod rules;
pub mod types;

pub use processor::ReplyProcessor;
pub use types::{
    ClassificationResult, FinalReply, IncomingEmail, ProcessedReply, ReplyRoute, RunOutcome,
};
