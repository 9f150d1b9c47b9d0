use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use inbox_autoreply::channels::{DryRunSender, ImapMailbox, MailSender, SmtpSender};
use inbox_autoreply::config::Config;
use inbox_autoreply::error::Result;
use inbox_autoreply::llm::create_provider;
use inbox_autoreply::logging;
use inbox_autoreply::pipeline::{ReplyProcessor, RunOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Warning: a rustls crypto provider was already installed");
    }

    let log_dir = std::env::var_os("AUTOREPLY_LOG_DIR").map(PathBuf::from);
    let _log_guard = match logging::init(log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("📬 inbox-autoreply v{}", env!("CARGO_PKG_VERSION"));

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);

    match run().instrument(span).await {
        Ok(outcome) => {
            info!(%run_id, outcome = outcome.label(), "Run complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%run_id, error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunOutcome> {
    let config = Config::from_env()?;

    info!(
        backend = ?config.llm.backend,
        model = config.llm.model(),
        mailbox = %config.email.mailbox,
        dry_run = config.reply.dry_run,
        "Starting run"
    );

    let llm = create_provider(&config.llm)?;
    let mailbox = Arc::new(ImapMailbox::new(config.email.clone()));
    let sender: Arc<dyn MailSender> = if config.reply.dry_run {
        Arc::new(DryRunSender)
    } else {
        Arc::new(SmtpSender::new(config.email.clone()))
    };

    let processor = ReplyProcessor::from_config(&config, llm, mailbox, sender);
    Ok(processor.run_once().await?)
}
