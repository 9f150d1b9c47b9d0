//! Configuration types, built once from the environment at startup.

use std::path::Path;
use std::str::FromStr;

use crate::channels::email::EmailConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Environment lookup. `std::env::var` in production, a map in tests.
pub type Env<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Persona of the reference deployment.
pub const DEFAULT_PERSONA: &str = "\
You are a professional agentic assistant acting ONLY as Senior Data Scientist Akash BV. \
You MUST NOT impersonate anyone else or reply on behalf of third parties (certificates, \
team mailings, notifications).
Your goal is a helpful, professional, and courteous response to every email. Perform all of \
the following roles and return one structured JSON object:
1. CONDITION CHECK: decide whether the email is technical or a project pitch, using the \
condition given below.
2. TRANSLATOR: draft a reply. If technical, draw details from the knowledge base. If not, \
draft a polite general acknowledgement.
3. TONE ANALYZER: if the email is a serious project inquiry, set request_meeting to true.";

/// Knowledge base of the reference deployment.
pub const DEFAULT_KNOWLEDGE_BASE: &str = "\
# Data Science Project & Service Knowledge Base

## 1. Core Services
- Predictive Modeling: regression and time series forecasting (ARIMA, SARIMA, Prophet, LSTM) \
for finance, logistics, and retail problem statements.
- Machine Learning Projects: full lifecycle delivery for classification, clustering, and \
reinforcement learning.
- Natural Language Processing: sentiment analysis, topic modeling, summarization, custom NER.
- Computer Vision: object detection, image segmentation, and OCR with CNNs (YOLO, ResNet).
- MLOps and Deployment: Docker containerization, CI/CD, hosting on AWS SageMaker, Azure ML, \
or GCP Vertex AI.
- Data Engineering: ETL pipelines with Python/Pandas, Spark, and SQL optimization.
- Data Visualization: dashboards in Streamlit, Tableau, and Power BI.

## 2. Time Series Guidance
- ARIMA/SARIMA: strong baseline for linear, stationary data; best for short-term, stable, \
interpretable predictions. Requires stationarity.
- LSTM: captures non-linear relationships and long-term dependencies; suited to long horizons \
and volatile, non-stationary data. Needs more data and compute.
- Recommendation: complex, non-linear, or long-horizon problems favor LSTM; simple, short-term, \
or interpretability-driven problems favor ARIMA.

## 3. Engagement Process
1. Discovery call (45 minutes): business problem, data sources, success metrics.
2. Data audit and preparation.
3. Model prototyping and validation.
4. Deployment and handoff with documentation and training.
5. Post-deployment monitoring: quarterly reviews and drift detection.

## 4. Meeting Availability
45-minute discovery calls on Mondays, Wednesdays, and Fridays between 2:00 PM and 5:00 PM IST. \
Ask the sender to propose two slots within this window.";

/// Classification rubric of the reference deployment.
pub const DEFAULT_CONDITION: &str = "\
Does the incoming email contain a technical question or an explicit project inquiry/pitch \
related to Data Science, Machine Learning, Deep Learning, Data Engineering, advanced \
statistical analysis, or any service listed in the core offerings?";

/// Signature of the reference deployment.
pub const DEFAULT_SIGNATURE: &str = "Best regards,\nAkash BV";

/// Reply content and policy configuration.
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    /// Persona / system instructions block.
    pub persona: String,
    /// Business knowledge base text.
    pub knowledge_base: String,
    /// Technical/project classification rubric.
    pub condition: String,
    /// Exact sign-off every draft must end with.
    pub signature: String,
    /// Log the reply instead of delivering it.
    pub dry_run: bool,
    /// Clear `\Seen` when the run aborts or the send fails.
    pub restore_unseen_on_failure: bool,
    /// Skip our own address and noreply/mailer-daemon senders.
    pub skip_automated_senders: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            knowledge_base: DEFAULT_KNOWLEDGE_BASE.to_string(),
            condition: DEFAULT_CONDITION.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            dry_run: false,
            restore_unseen_on_failure: false,
            skip_automated_senders: true,
        }
    }
}

impl ReplyConfig {
    /// Build from `AUTOREPLY_*` variables, falling back to the reference blocks.
    pub fn from_lookup(env: Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            persona: text_block(env, "AUTOREPLY_PERSONA_FILE", defaults.persona)?,
            knowledge_base: text_block(
                env,
                "AUTOREPLY_KNOWLEDGE_BASE_FILE",
                defaults.knowledge_base,
            )?,
            condition: text_block(env, "AUTOREPLY_CONDITION_FILE", defaults.condition)?,
            signature: var(env, "AUTOREPLY_SIGNATURE")
                .map(|s| s.replace("\\n", "\n"))
                .unwrap_or(defaults.signature),
            dry_run: flag(env, "AUTOREPLY_DRY_RUN", defaults.dry_run)?,
            restore_unseen_on_failure: flag(
                env,
                "AUTOREPLY_RESTORE_UNSEEN_ON_FAILURE",
                defaults.restore_unseen_on_failure,
            )?,
            skip_automated_senders: flag(
                env,
                "AUTOREPLY_SKIP_AUTOMATED_SENDERS",
                defaults.skip_automated_senders,
            )?,
        })
    }
}

/// Whole-process configuration. Constructed once and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub email: EmailConfig,
    pub llm: LlmConfig,
    pub reply: ReplyConfig,
}

impl Config {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary lookup. Mailbox credentials are checked first.
    pub fn from_lookup(env: Env<'_>) -> Result<Self, ConfigError> {
        let email = EmailConfig::from_lookup(env)?;
        let llm = LlmConfig::from_lookup(env)?;
        let reply = ReplyConfig::from_lookup(env)?;
        Ok(Self { email, llm, reply })
    }
}

// ── Lookup helpers ──────────────────────────────────────────────────

/// Non-empty, trimmed value of `key`.
pub(crate) fn var(env: Env<'_>, key: &str) -> Option<String> {
    env(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value of `key`, or `CredentialsMissing`.
pub(crate) fn required(env: Env<'_>, key: &str) -> Result<String, ConfigError> {
    var(env, key).ok_or_else(|| ConfigError::CredentialsMissing {
        key: key.to_string(),
    })
}

/// Parse `key` when present, otherwise `default`.
pub(crate) fn parse_or<T>(env: Env<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(env, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Boolean flag: `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn flag(env: Env<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = var(env, key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a boolean"),
        }),
    }
}

/// Read a text block from the file named by `key`, or use `default`.
fn text_block(env: Env<'_>, key: &str, default: String) -> Result<String, ConfigError> {
    let Some(path) = var(env, key) else {
        return Ok(default);
    };
    std::fs::read_to_string(Path::new(&path))
        .map(|text| text.trim().to_string())
        .map_err(|source| ConfigError::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::llm::LlmBackend;

    type Lookup = Box<dyn Fn(&str) -> Option<String>>;

    fn lookup(pairs: &[(&str, &str)]) -> Lookup {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Box::new(move |key: &str| map.get(key).cloned())
    }

    #[test]
    fn missing_email_credentials_is_credentials_missing() {
        let env = lookup(&[("EMAIL_ADDRESS", "bot@example.com")]);
        let err = Config::from_lookup(&*env).unwrap_err();
        match err {
            ConfigError::CredentialsMissing { key } => assert_eq!(key, "EMAIL_PASSWORD"),
            other => panic!("Expected CredentialsMissing, got {:?}", other),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let env = lookup(&[("EMAIL_ADDRESS", "  "), ("EMAIL_PASSWORD", "secret")]);
        assert!(matches!(
            Config::from_lookup(&*env),
            Err(ConfigError::CredentialsMissing { .. })
        ));
    }

    #[test]
    fn minimal_env_uses_reference_defaults() {
        let env = lookup(&[
            ("EMAIL_ADDRESS", "bot@example.com"),
            ("EMAIL_PASSWORD", "secret"),
        ]);
        let config = Config::from_lookup(&*env).unwrap();
        assert_eq!(config.email.imap_host, "imap.gmail.com");
        assert_eq!(config.email.smtp_port, 465);
        assert_eq!(config.llm.backend, LlmBackend::Ollama);
        assert_eq!(config.reply.signature, "Best regards,\nAkash BV");
        assert!(config.reply.skip_automated_senders);
        assert!(!config.reply.restore_unseen_on_failure);
        assert!(config.reply.knowledge_base.contains("Mondays, Wednesdays, and Fridays"));
    }

    #[test]
    fn signature_unescapes_newlines() {
        let env = lookup(&[("AUTOREPLY_SIGNATURE", "Cheers,\\nSam")]);
        let reply = ReplyConfig::from_lookup(&*env).unwrap();
        assert_eq!(reply.signature, "Cheers,\nSam");
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let env = lookup(&[("AUTOREPLY_DRY_RUN", "maybe")]);
        match ReplyConfig::from_lookup(&*env) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "AUTOREPLY_DRY_RUN"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn flag_accepts_common_spellings() {
        let env = lookup(&[("A", "YES"), ("B", "off"), ("C", "1")]);
        assert!(flag(&*env, "A", false).unwrap());
        assert!(!flag(&*env, "B", true).unwrap());
        assert!(flag(&*env, "C", false).unwrap());
        assert!(flag(&*env, "D", true).unwrap());
    }

    #[test]
    fn parse_or_reports_key_on_failure() {
        let env = lookup(&[("PORT", "not-a-port")]);
        let err = parse_or::<u16>(&*env, "PORT", 993).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert_eq!(parse_or::<u16>(&*env, "OTHER", 993).unwrap(), 993);
    }

    #[test]
    fn knowledge_base_loaded_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  Widgets and gadgets only.  ").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let env = lookup(&[("AUTOREPLY_KNOWLEDGE_BASE_FILE", path.as_str())]);
        let reply = ReplyConfig::from_lookup(&*env).unwrap();
        assert_eq!(reply.knowledge_base, "Widgets and gadgets only.");
        assert_eq!(reply.persona, DEFAULT_PERSONA);
    }

    #[test]
    fn missing_text_block_file_is_io_error() {
        let env = lookup(&[("AUTOREPLY_PERSONA_FILE", "/nonexistent/persona.txt")]);
        assert!(matches!(
            ReplyConfig::from_lookup(&*env),
            Err(ConfigError::Io { .. })
        ));
    }
}
