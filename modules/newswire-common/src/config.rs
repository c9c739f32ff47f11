use crate::error::{NewswireError, Result};
use crate::text::FingerprintAlgo;

/// Application configuration loaded from environment variables. Secrets and
/// env-specific values only; the feed list lives in the TOML feeds file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Dedup
    pub similarity_threshold: f64,
    pub time_window_hours: i64,
    pub fingerprint_algo: FingerprintAlgo,
    pub title_weight: f64,
    pub content_weight: f64,
    pub entity_weight: f64,
    pub max_vocabulary: usize,
    pub max_doc_tokens: usize,
    pub batch_size: usize,

    // Ingestion
    pub max_concurrent_feeds: usize,
    pub full_page_extraction: bool,

    // Embeddings / LLM
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub vector_dimension: usize,

    // Alerting
    pub alert_cooldown_minutes: i64,
    pub max_alerts_per_hour: usize,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
    pub email_enabled: bool,
    pub smtp: Option<SmtpConfig>,
    pub slack_enabled: bool,
    pub slack_webhook_url: Option<String>,
    pub slack_channel: Option<String>,
    pub trusted_sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required("DATABASE_URL")?,
            similarity_threshold: parsed("SIMILARITY_THRESHOLD", 0.85)?,
            time_window_hours: parsed("TIME_WINDOW_HOURS", 24)?,
            fingerprint_algo: std::env::var("CONTENT_FINGERPRINT")
                .unwrap_or_else(|_| "sha256".to_string())
                .parse()
                .map_err(NewswireError::Configuration)?,
            title_weight: parsed("TITLE_WEIGHT", 0.4)?,
            content_weight: parsed("CONTENT_WEIGHT", 0.4)?,
            entity_weight: parsed("ENTITY_WEIGHT", 0.2)?,
            max_vocabulary: parsed("TFIDF_MAX_VOCABULARY", 2000)?,
            max_doc_tokens: parsed("TFIDF_MAX_DOC_TOKENS", 500)?,
            batch_size: parsed("DEDUP_BATCH_SIZE", 50)?,
            max_concurrent_feeds: parsed("MAX_CONCURRENT_FEEDS", 10)?,
            full_page_extraction: flag("FULL_PAGE_EXTRACTION", false),
            openai_api_key: optional("OPENAI_API_KEY"),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            vector_dimension: parsed("VECTOR_DIMENSION", 1536)?,
            alert_cooldown_minutes: parsed("ALERT_COOLDOWN_MINUTES", 5)?,
            max_alerts_per_hour: parsed("MAX_ALERTS_PER_HOUR", 20)?,
            webhook_enabled: flag("WEBHOOK_ENABLED", false),
            webhook_url: optional("WEBHOOK_URL"),
            email_enabled: flag("EMAIL_ENABLED", false),
            smtp: smtp_from_env(),
            slack_enabled: flag("SLACK_ENABLED", false),
            slack_webhook_url: optional("SLACK_WEBHOOK_URL"),
            slack_channel: optional("SLACK_CHANNEL"),
            trusted_sources: list("TRUSTED_SOURCES"),
        };

        config.validate()?;
        config.log_redacted();
        Ok(config)
    }

    /// Range checks. Out-of-range configuration is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(NewswireError::Configuration(format!(
                "SIMILARITY_THRESHOLD must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(1..=168).contains(&self.time_window_hours) {
            return Err(NewswireError::Configuration(format!(
                "TIME_WINDOW_HOURS must be in [1, 168], got {}",
                self.time_window_hours
            )));
        }
        if !(1..=50).contains(&self.max_concurrent_feeds) {
            return Err(NewswireError::Configuration(format!(
                "MAX_CONCURRENT_FEEDS must be in [1, 50], got {}",
                self.max_concurrent_feeds
            )));
        }
        if !(1..=1000).contains(&self.batch_size) {
            return Err(NewswireError::Configuration(format!(
                "DEDUP_BATCH_SIZE must be in [1, 1000], got {}",
                self.batch_size
            )));
        }
        let weight_sum = self.title_weight + self.content_weight + self.entity_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(NewswireError::Configuration(format!(
                "TITLE_WEIGHT + CONTENT_WEIGHT + ENTITY_WEIGHT must sum to 1.0, got {weight_sum}"
            )));
        }
        if self.vector_dimension == 0 {
            return Err(NewswireError::Configuration(
                "VECTOR_DIMENSION must be positive".to_string(),
            ));
        }
        if self.webhook_enabled && self.webhook_url.is_none() {
            return Err(NewswireError::Configuration(
                "WEBHOOK_ENABLED requires WEBHOOK_URL".to_string(),
            ));
        }
        if self.email_enabled && self.smtp.is_none() {
            return Err(NewswireError::Configuration(
                "EMAIL_ENABLED requires SMTP_HOST, SMTP_FROM, SMTP_TO".to_string(),
            ));
        }
        if self.slack_enabled && self.slack_webhook_url.is_none() {
            return Err(NewswireError::Configuration(
                "SLACK_ENABLED requires SLACK_WEBHOOK_URL".to_string(),
            ));
        }
        Ok(())
    }

    fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!(
            "  similarity_threshold={} window_h={} fingerprint={} batch={}",
            self.similarity_threshold,
            self.time_window_hours,
            self.fingerprint_algo,
            self.batch_size
        );
        tracing::info!(
            "  channels: webhook={} email={} slack={}",
            self.webhook_enabled,
            self.email_enabled,
            self.slack_enabled
        );
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| NewswireError::Configuration(format!("{key} is required")))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_string())
        .collect()
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| NewswireError::Configuration(format!("{key} has invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let host = optional("SMTP_HOST")?;
    let from = optional("SMTP_FROM")?;
    let to: Vec<String> = list("SMTP_TO");
    if to.is_empty() {
        return None;
    }
    Some(SmtpConfig {
        host,
        port: std::env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587),
        username: optional("SMTP_USERNAME").unwrap_or_default(),
        password: optional("SMTP_PASSWORD").unwrap_or_default(),
        from,
        to,
    })
}
