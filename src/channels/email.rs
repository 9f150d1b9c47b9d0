//! Email I/O: raw IMAP over rustls for the inbox, SMTP via lettre for replies.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::channels::{FetchedEmail, MailSender, Mailbox};
use crate::config::{self, Env};
use crate::error::{ConfigError, MailboxError, SendError};
use crate::pipeline::types::IncomingEmail;

/// Socket read/write timeout for IMAP.
const IMAP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP command timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Port that speaks TLS from the first byte (SMTPS). Other ports use STARTTLS.
const SMTPS_PORT: u16 = 465;

/// Subject used when the inbound message has none.
pub const NO_SUBJECT: &str = "No Subject";

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox and delivery configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub mailbox: String,
}

impl EmailConfig {
    /// Build config from `EMAIL_*` variables.
    ///
    /// `EMAIL_ADDRESS` and `EMAIL_PASSWORD` are required; everything else
    /// defaults to Gmail.
    pub fn from_lookup(env: Env<'_>) -> Result<Self, ConfigError> {
        let username = config::required(env, "EMAIL_ADDRESS")?;
        let password = SecretString::from(config::required(env, "EMAIL_PASSWORD")?);

        let imap_host =
            config::var(env, "EMAIL_IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string());
        let imap_port = config::parse_or(env, "EMAIL_IMAP_PORT", 993)?;
        let smtp_host = config::var(env, "EMAIL_SMTP_HOST")
            .unwrap_or_else(|| imap_host.replacen("imap", "smtp", 1));
        let smtp_port = config::parse_or(env, "EMAIL_SMTP_PORT", SMTPS_PORT)?;
        let from_address = config::var(env, "EMAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());
        let mailbox = config::var(env, "EMAIL_MAILBOX").unwrap_or_else(|| "INBOX".to_string());

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            mailbox,
        })
    }
}

// ── Mailbox reader ──────────────────────────────────────────────────

/// IMAP inbox. Each call opens its own session; nothing is held between runs.
pub struct ImapMailbox {
    config: EmailConfig,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn fetch_newest(&self) -> Result<Option<FetchedEmail>, MailboxError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_newest_unseen(&cfg))
            .await
            .map_err(|e| MailboxError::TaskFailed(e.to_string()))?
    }

    async fn release(&self, handle: &str) -> Result<(), MailboxError> {
        let cfg = self.config.clone();
        let uid = handle.to_string();
        tokio::task::spawn_blocking(move || mark_unseen(&cfg, &uid))
            .await
            .map_err(|e| MailboxError::TaskFailed(e.to_string()))?
    }
}

// ── Mail sender ─────────────────────────────────────────────────────

/// SMTP delivery through lettre's blocking transport.
pub struct SmtpSender {
    config: EmailConfig,
}

impl SmtpSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the outgoing plain-text message.
    pub fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, SendError> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| SendError::InvalidAddress {
                address: self.config.from_address.clone(),
                reason: format!("{e}"),
            })?;
        let to_mailbox = to.parse().map_err(|e| SendError::InvalidAddress {
            address: to.to_string(),
            reason: format!("{e}"),
        })?;

        Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SendError::Build(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, SendError> {
        let host = self.config.smtp_host.as_str();
        let builder = if self.config.smtp_port == SMTPS_PORT {
            SmtpTransport::relay(host)
        } else {
            SmtpTransport::starttls_relay(host)
        }
        .map_err(|e| SendError::Transport(format!("SMTP relay error: {e}")))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let message = self.build_message(to, subject, body)?;
        let transport = self.transport()?;

        debug!(host = %self.config.smtp_host, port = self.config.smtp_port, "Sending via SMTP");
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| SendError::TaskFailed(e.to_string()))?
            .map_err(|e| SendError::Transport(e.to_string()))?;

        info!(to = %to, "Email sent");
        Ok(())
    }
}

/// Sender that only logs. Used when `AUTOREPLY_DRY_RUN` is set.
pub struct DryRunSender;

#[async_trait]
impl MailSender for DryRunSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        info!(to = %to, subject = %subject, body = %body, "Dry run: reply not sent");
        Ok(())
    }
}

// ── Message parsing (public for testing) ────────────────────────────

/// Parse a raw RFC822 message into the fields the pipeline needs.
pub fn parse_message(raw: &[u8]) -> Option<IncomingEmail> {
    let parsed = MessageParser::default().parse(raw)?;

    let sender_address = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_default();
    let subject = parsed.subject().unwrap_or(NO_SUBJECT).to_string();

    Some(IncomingEmail {
        sender_address,
        subject,
        body: extract_text(&parsed),
    })
}

/// Plain-text body. mail-parser renders HTML-only messages to text.
fn extract_text(parsed: &mail_parser::Message) -> String {
    parsed
        .body_text(0)
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Quote an IMAP string argument.
pub fn imap_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// UIDs from `* SEARCH` lines.
pub fn parse_search_uids(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter_map(|uid| uid.parse().ok())
        .collect()
}

/// Size of the literal announced at the end of a line (`... {1234}`).
fn literal_size(line: &str) -> Option<usize> {
    line.trim_end()
        .strip_suffix('}')?
        .rsplit_once('{')?
        .1
        .parse()
        .ok()
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Completed response to one tagged command.
#[derive(Debug, Default)]
struct ImapReply {
    untagged: Vec<String>,
    literals: Vec<Vec<u8>>,
    status: String,
}

impl ImapReply {
    fn is_ok(&self) -> bool {
        self.status.starts_with("OK")
    }

    fn ensure_ok(self, command: &str) -> Result<Self, MailboxError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(MailboxError::Protocol(format!(
                "{command} failed: {}",
                self.status
            )))
        }
    }
}

/// Minimal blocking IMAP client (run inside `spawn_blocking`).
struct ImapSession {
    stream: TlsStream,
    next_tag: u32,
}

impl ImapSession {
    fn connect(config: &EmailConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port)).map_err(
            |source| MailboxError::Connect {
                host: config.imap_host.clone(),
                port: config.imap_port,
                source,
            },
        )?;
        tcp.set_read_timeout(Some(IMAP_TIMEOUT))?;
        tcp.set_write_timeout(Some(IMAP_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            next_tag: 1,
        };

        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if self.stream.read(&mut byte)? == 0 {
                return Err(MailboxError::Protocol("connection closed".into()));
            }
            buf.push(byte[0]);
            if buf.ends_with(b"\r\n") {
                return Ok(String::from_utf8_lossy(&buf).into_owned());
            }
        }
    }

    fn command(&mut self, cmd: &str) -> Result<ImapReply, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let tagged = format!("{tag} ");
        let mut reply = ImapReply::default();
        loop {
            let line = self.read_line()?;
            if let Some(size) = literal_size(&line) {
                let mut literal = vec![0u8; size];
                self.stream.read_exact(&mut literal)?;
                reply.literals.push(literal);
                reply.untagged.push(line);
                continue;
            }
            if let Some(status) = line.strip_prefix(&tagged) {
                reply.status = status.trim().to_string();
                return Ok(reply);
            }
            reply.untagged.push(line);
        }
    }

    fn open(config: &EmailConfig) -> Result<Self, MailboxError> {
        let mut session = Self::connect(config)?;

        let login = session.command(&format!(
            "LOGIN {} {}",
            imap_quote(&config.username),
            imap_quote(config.password.expose_secret())
        ))?;
        if !login.is_ok() {
            return Err(MailboxError::LoginFailed {
                username: config.username.clone(),
            });
        }

        session
            .command(&format!("SELECT {}", imap_quote(&config.mailbox)))?
            .ensure_ok("SELECT")?;
        Ok(session)
    }

    fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!("IMAP logout failed: {e}");
        }
    }
}

/// Find the newest unseen message, flag it `\Seen`, then fetch it.
///
/// The flag is set before the fetch so a crash mid-run cannot cause a
/// second reply to the same message.
fn fetch_newest_unseen(config: &EmailConfig) -> Result<Option<FetchedEmail>, MailboxError> {
    let mut session = ImapSession::open(config)?;

    let search = session.command("UID SEARCH UNSEEN")?.ensure_ok("SEARCH")?;
    let Some(uid) = parse_search_uids(&search.untagged).into_iter().max() else {
        session.logout();
        return Ok(None);
    };

    session
        .command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?
        .ensure_ok("STORE")?;
    let fetch = session
        .command(&format!("UID FETCH {uid} RFC822"))?
        .ensure_ok("FETCH")?;
    session.logout();

    let raw = fetch
        .literals
        .into_iter()
        .next()
        .ok_or_else(|| MailboxError::Protocol(format!("FETCH {uid} returned no message")))?;
    let email = parse_message(&raw)
        .ok_or_else(|| MailboxError::Protocol(format!("message {uid} is not parseable")))?;

    if email.sender_address.is_empty() {
        warn!(uid, "Fetched message has no sender address");
    }
    debug!(uid, sender = %email.sender_address, "Fetched newest unseen message");

    Ok(Some(FetchedEmail {
        handle: uid.to_string(),
        email,
    }))
}

/// Clear `\Seen` on a message so the next run picks it up again.
fn mark_unseen(config: &EmailConfig, uid: &str) -> Result<(), MailboxError> {
    let mut session = ImapSession::open(config)?;
    session
        .command(&format!("UID STORE {uid} -FLAGS (\\Seen)"))?
        .ensure_ok("STORE")?;
    session.logout();
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
