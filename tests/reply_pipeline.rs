//! End-to-end runs of the reply pipeline with in-memory collaborators.
//!
//! Every collaborator is faked through the public traits, so these tests
//! exercise the same wiring the binary uses without any network I/O.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use inbox_autoreply::channels::{FetchedEmail, MailSender, Mailbox};
use inbox_autoreply::config::ReplyConfig;
use inbox_autoreply::error::{LlmError, MailboxError, PipelineError, SendError};
use inbox_autoreply::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use inbox_autoreply::llm::RetryPolicy;
use inbox_autoreply::pipeline::normalize::safe_default_reply;
use inbox_autoreply::pipeline::{IncomingEmail, ReplyProcessor, ReplyRoute, RunOutcome};

// ── Fakes ───────────────────────────────────────────────────────────

/// LLM that replays a script; once the script is empty it fails with 503.
struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    fn replying(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(texts.iter().map(|t| Ok(t.to_string())).collect()),
            calls: Mutex::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Self::replying(&[])
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
            }),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::HttpStatus {
                provider: "scripted".into(),
                status: 503,
                body: "unavailable".into(),
            }),
        }
    }
}

/// Mailbox holding at most one message, tracking seen/unseen.
struct FakeMailbox {
    message: Option<IncomingEmail>,
    fetches: Mutex<usize>,
    released: Mutex<Vec<String>>,
}

impl FakeMailbox {
    fn with(message: Option<IncomingEmail>) -> Arc<Self> {
        Arc::new(Self {
            message,
            fetches: Mutex::new(0),
            released: Mutex::new(Vec::new()),
        })
    }

    fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn fetch_newest(&self) -> Result<Option<FetchedEmail>, MailboxError> {
        *self.fetches.lock().unwrap() += 1;
        Ok(self.message.clone().map(|email| FetchedEmail {
            handle: "42".into(),
            email,
        }))
    }

    async fn release(&self, handle: &str) -> Result<(), MailboxError> {
        self.released.lock().unwrap().push(handle.to_string());
        Ok(())
    }
}

/// Mailbox whose server is down.
struct BrokenMailbox;

#[async_trait]
impl Mailbox for BrokenMailbox {
    async fn fetch_newest(&self) -> Result<Option<FetchedEmail>, MailboxError> {
        Err(MailboxError::LoginFailed {
            username: "bot@example.com".into(),
        })
    }

    async fn release(&self, _handle: &str) -> Result<(), MailboxError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingSender {
    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn incoming(subject: &str, body: &str) -> IncomingEmail {
    IncomingEmail {
        sender_address: "client@example.com".into(),
        subject: subject.into(),
        body: body.into(),
    }
}

fn processor(
    llm: Arc<ScriptedLlm>,
    mailbox: Arc<dyn Mailbox>,
    sender: Arc<RecordingSender>,
    reply: ReplyConfig,
) -> ReplyProcessor {
    ReplyProcessor::new(llm, mailbox, sender, reply, RetryPolicy::new(3, Duration::ZERO))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn no_unread_message_has_no_side_effects() {
    let llm = ScriptedLlm::failing();
    let mailbox = FakeMailbox::with(None);
    let sender = Arc::new(RecordingSender::default());

    let outcome = processor(llm.clone(), mailbox.clone(), sender.clone(), ReplyConfig::default())
        .run_once()
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::NoUnreadMessage));
    assert_eq!(*mailbox.fetches.lock().unwrap(), 1);
    assert_eq!(llm.calls(), 0);
    assert!(sender.sent().is_empty());
    assert!(mailbox.released().is_empty());
}

#[tokio::test]
async fn meeting_request_end_to_end() {
    let llm = ScriptedLlm::replying(&[concat!(
        "Here is the JSON you asked for:\n```json\n",
        r#"{"is_technical": true, "request_meeting": true, "#,
        r#""simple_reply_draft": "Use LSTM.", "non_technical_reply_draft": "Thanks.", "#,
        r#""meeting_suggestion_draft": "Are you free Monday?"}"#,
        "\n```\nLet me know if you need anything else."
    )]);
    let mailbox = FakeMailbox::with(Some(incoming("LSTM project", "We need forecasting.")));
    let sender = Arc::new(RecordingSender::default());

    let outcome = processor(llm, mailbox, sender.clone(), ReplyConfig::default())
        .run_once()
        .await
        .unwrap();

    let processed = match outcome {
        RunOutcome::Replied(processed) => processed,
        other => panic!("Expected Replied, got {:?}", other),
    };
    assert_eq!(processed.route, ReplyRoute::MeetingSuggestion);
    assert_eq!(processed.reply.subject, "Re: LSTM project");
    assert_eq!(processed.reply.body, "Hello,\n\nAre you free Monday?");

    assert_eq!(
        sender.sent(),
        vec![(
            "client@example.com".to_string(),
            "Re: LSTM project".to_string(),
            "Hello,\n\nAre you free Monday?".to_string(),
        )]
    );
}

#[tokio::test]
async fn non_technical_email_gets_acknowledgement() {
    let llm = ScriptedLlm::replying(&[
        r#"{"isTechnical": "false", "requestMeeting": "true", "nonTechnicalReplyDraft": "Thank you for the certificate!<br>Best regards,\nAkash BV"}"#,
    ]);
    let mailbox = FakeMailbox::with(Some(incoming("Your certificate", "Congrats!")));
    let sender = Arc::new(RecordingSender::default());

    let outcome = processor(llm, mailbox, sender.clone(), ReplyConfig::default())
        .run_once()
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Replied(ref p) if p.route == ReplyRoute::NonTechnical));
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].2,
        "Thank you for the certificate!Best regards,\nAkash BV"
    );
}

#[tokio::test]
async fn missing_draft_falls_back_to_safe_default() {
    let llm = ScriptedLlm::replying(&[r#"{"is_technical": true, "request_meeting": false}"#]);
    let mailbox = FakeMailbox::with(Some(incoming("ARIMA?", "Is ARIMA enough?")));
    let sender = Arc::new(RecordingSender::default());
    let config = ReplyConfig::default();
    let expected = safe_default_reply(&config.signature);

    processor(llm, mailbox, sender.clone(), config)
        .run_once()
        .await
        .unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].2, expected);
}

#[tokio::test]
async fn garbage_then_valid_output_recovers_within_budget() {
    let llm = ScriptedLlm::replying(&[
        "Sorry, I cannot help with that.",
        r#"{"is_technical": true} {"request_meeting": true}"#,
        r#"{"is_technical": true, "simple_reply_draft": "Hi, ARIMA works."}"#,
    ]);
    let mailbox = FakeMailbox::with(Some(incoming("ARIMA?", "Is ARIMA enough?")));
    let sender = Arc::new(RecordingSender::default());

    let outcome = processor(llm.clone(), mailbox, sender.clone(), ReplyConfig::default())
        .run_once()
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Replied(_)));
    assert_eq!(llm.calls(), 3);
    assert_eq!(sender.sent()[0].2, "Hi, ARIMA works.");
}

#[tokio::test]
async fn backend_unavailable_aborts_without_sending() {
    let llm = ScriptedLlm::failing();
    let mailbox = FakeMailbox::with(Some(incoming("Hello", "Question")));
    let sender = Arc::new(RecordingSender::default());

    let err = processor(llm.clone(), mailbox.clone(), sender.clone(), ReplyConfig::default())
        .run_once()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::BackendUnavailable { attempts: 3, .. }));
    assert_eq!(llm.calls(), 3);
    assert!(sender.sent().is_empty());
    // Default policy: the message stays seen.
    assert!(mailbox.released().is_empty());
}

#[tokio::test]
async fn backend_unavailable_restores_unseen_when_configured() {
    let llm = ScriptedLlm::failing();
    let mailbox = FakeMailbox::with(Some(incoming("Hello", "Question")));
    let sender = Arc::new(RecordingSender::default());
    let reply = ReplyConfig {
        restore_unseen_on_failure: true,
        ..ReplyConfig::default()
    };

    let result = processor(llm, mailbox.clone(), sender.clone(), reply)
        .run_once()
        .await;

    assert!(result.is_err());
    assert!(sender.sent().is_empty());
    assert_eq!(mailbox.released(), vec!["42".to_string()]);
}

#[tokio::test]
async fn mailbox_failure_aborts_before_llm() {
    let llm = ScriptedLlm::failing();
    let sender = Arc::new(RecordingSender::default());

    let err = processor(
        llm.clone(),
        Arc::new(BrokenMailbox),
        sender.clone(),
        ReplyConfig::default(),
    )
    .run_once()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Mailbox(MailboxError::LoginFailed { .. })));
    assert_eq!(llm.calls(), 0);
    assert!(sender.sent().is_empty());
}
