//! Pre-LLM sender guard.
//!
//! Runs before the model call so that automated senders never receive an
//! auto-reply:
//! - our own address → skip (reply loop)
//! - noreply/no-reply senders → skip
//! - mailer-daemon/postmaster bounces → skip
//!
//! A match skips the run without spending a model call.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::IncomingEmail;

/// A sender pattern with the reason reported when it matches.
#[derive(Debug, Clone)]
struct SenderRule {
    regex: Regex,
    reason: String,
}

impl SenderRule {
    fn builtin(pattern: &str, reason: &str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("built-in sender pattern is valid"),
            reason: reason.to_string(),
        }
    }
}

/// Decides which senders are never answered.
#[derive(Debug, Clone)]
pub struct SenderRules {
    own_address: Option<String>,
    rules: Vec<SenderRule>,
}

impl SenderRules {
    /// Built-in automated-sender patterns plus our own address.
    pub fn default_rules(own_address: &str) -> Self {
        let rules = vec![
            SenderRule::builtin(r"(?i)^no[\-_.]?reply@", "noreply sender"),
            SenderRule::builtin(
                r"(?i)^(mailer[\-_]?daemon|postmaster)@",
                "automated mail system",
            ),
        ];
        Self {
            own_address: Some(own_address.trim().to_lowercase()),
            rules,
        }
    }

    /// No rules at all. Everything is answered.
    pub fn empty() -> Self {
        Self {
            own_address: None,
            rules: Vec::new(),
        }
    }

    #[cfg(test)]
    fn add_rule(&mut self, pattern: &str, reason: &str) -> Result<(), regex::Error> {
        self.rules.push(SenderRule {
            regex: Regex::new(pattern)?,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// `Some(reason)` when the email must not be answered.
    pub fn evaluate(&self, email: &IncomingEmail) -> Option<String> {
        let sender = email.sender_address.trim();

        if sender.is_empty() {
            return Some("missing sender address".to_string());
        }

        if self
            .own_address
            .as_deref()
            .is_some_and(|own| sender.eq_ignore_ascii_case(own))
        {
            debug!(sender = %sender, "Sender is our own address");
            return Some("own address".to_string());
        }

        for rule in &self.rules {
            if rule.regex.is_match(sender) {
                debug!(sender = %sender, reason = %rule.reason, "Sender rule matched");
                return Some(rule.reason.clone());
            }
        }

        None
    }
}
