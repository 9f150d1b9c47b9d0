//! Mailbox I/O: the reader and sender collaborators of the pipeline.
//!
//! Both are pure I/O. Classification and reply selection live in
//! `pipeline::processor`.

pub mod email;

pub use email::{DryRunSender, EmailConfig, ImapMailbox, SmtpSender};

use async_trait::async_trait;

use crate::error::{MailboxError, SendError};
use crate::pipeline::types::IncomingEmail;

/// The newest unread message plus the handle needed to release it again.
#[derive(Debug, Clone)]
pub struct FetchedEmail {
    /// Mailbox-native id (IMAP UID).
    pub handle: String,
    pub email: IncomingEmail,
}

/// Source of inbound mail.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch the newest unread message and mark it read.
    ///
    /// `Ok(None)` when nothing is unread; that is a normal outcome.
    async fn fetch_newest(&self) -> Result<Option<FetchedEmail>, MailboxError>;

    /// Mark a previously fetched message unread again.
    async fn release(&self, handle: &str) -> Result<(), MailboxError>;
}

/// Outbound delivery.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver one plain-text email.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError>;
}
