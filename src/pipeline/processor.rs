//! Reply processor: one linear run over the newest unread email.
//!
//! Flow:
//! 1. Mailbox → newest unread message (marked seen)
//! 2. Sender rules (fast, no LLM) → may skip
//! 3. Prompt → model (bounded retries) → JSON object → normalized fields
//! 4. Router → one draft; formatter → final reply
//! 5. Mail sender
//!
//! Nothing is sent unless step 3 produced a JSON object.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::channels::{MailSender, Mailbox};
use crate::config::{Config, ReplyConfig};
use crate::error::PipelineError;
use crate::llm::provider::LlmProvider;
use crate::llm::retry::{RetryPolicy, DEFAULT_BASE_DELAY};
use crate::pipeline::format::format_reply;
use crate::pipeline::invoker::ModelInvoker;
use crate::pipeline::normalize::normalize;
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::router::{route, selected_draft};
use crate::pipeline::rules::SenderRules;
use crate::pipeline::types::{ClassificationResult, IncomingEmail, ProcessedReply, RunOutcome};

/// Drives one run: fetch, classify, route, format, send.
pub struct ReplyProcessor {
    mailbox: Arc<dyn Mailbox>,
    sender: Arc<dyn MailSender>,
    invoker: ModelInvoker,
    rules: SenderRules,
    reply: ReplyConfig,
}

impl ReplyProcessor {
    /// Create a processor with no sender rules.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        mailbox: Arc<dyn Mailbox>,
        sender: Arc<dyn MailSender>,
        reply: ReplyConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            mailbox,
            sender,
            invoker: ModelInvoker::new(llm, policy),
            rules: SenderRules::empty(),
            reply,
        }
    }

    /// Create a processor wired the way the binary runs it.
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LlmProvider>,
        mailbox: Arc<dyn Mailbox>,
        sender: Arc<dyn MailSender>,
    ) -> Self {
        let policy = RetryPolicy::new(config.llm.max_attempts, DEFAULT_BASE_DELAY);
        let rules = if config.reply.skip_automated_senders {
            SenderRules::default_rules(&config.email.from_address)
        } else {
            SenderRules::empty()
        };
        Self::new(llm, mailbox, sender, config.reply.clone(), policy).with_rules(rules)
    }

    pub fn with_rules(mut self, rules: SenderRules) -> Self {
        self.rules = rules;
        self
    }

    /// Process the newest unread email, if any.
    ///
    /// `Err` means the run aborted before sending anything.
    pub async fn run_once(&self) -> Result<RunOutcome, PipelineError> {
        let Some(fetched) = self.mailbox.fetch_newest().await? else {
            info!("No unread email");
            return Ok(RunOutcome::NoUnreadMessage);
        };
        let handle = fetched.handle;
        let email = fetched.email;

        info!(
            sender = %email.sender_address,
            subject = %email.subject,
            "Processing newest unread email"
        );

        if let Some(reason) = self.rules.evaluate(&email) {
            info!(sender = %email.sender_address, reason = %reason, "Skipping email");
            return Ok(RunOutcome::Skipped {
                sender: email.sender_address,
                reason,
            });
        }

        let classification = match self.classify(&email).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "Classification failed; no reply sent");
                self.restore_unseen(&handle).await;
                return Err(e);
            }
        };

        let route = route(&classification);
        info!(
            is_technical = classification.is_technical,
            request_meeting = classification.request_meeting,
            route = route.label(),
            "Email classified"
        );

        let reply = format_reply(selected_draft(&classification, route), &email.subject);

        if let Err(e) = self
            .sender
            .send(&email.sender_address, &reply.subject, &reply.body)
            .await
        {
            error!(to = %email.sender_address, error = %e, "Failed to send reply");
            self.restore_unseen(&handle).await;
            return Ok(RunOutcome::SendFailed {
                to: email.sender_address,
                reason: e.to_string(),
            });
        }

        info!(to = %email.sender_address, subject = %reply.subject, "Reply sent");

        Ok(RunOutcome::Replied(Box::new(ProcessedReply {
            email,
            classification,
            route,
            reply,
            processed_at: Utc::now(),
        })))
    }

    /// Prompt, invoke and normalize. Fails only when the retry budget is spent.
    pub async fn classify(
        &self,
        email: &IncomingEmail,
    ) -> Result<ClassificationResult, PipelineError> {
        let enforce_schema = self.invoker.provider().supports_response_schema();
        let request = PromptBuilder::new(&self.reply).build(email, enforce_schema);
        let object = self.invoker.invoke(&request).await?;
        Ok(normalize(&object, &self.reply.signature))
    }

    /// Clear `\Seen` when the policy asks for it. Failures are logged only.
    async fn restore_unseen(&self, handle: &str) {
        if !self.reply.restore_unseen_on_failure {
            return;
        }
        match self.mailbox.release(handle).await {
            Ok(()) => info!(handle, "Email marked unread for the next run"),
            Err(e) => warn!(handle, error = %e, "Failed to mark email unread"),
        }
    }
}
