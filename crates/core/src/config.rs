//! Process configuration.
//!
//! Layering, lowest to highest precedence:
//! built-in defaults, `config/default.*`, `config/{environment}.*`,
//! `APP__SECTION__KEY` variables, then the well-known deployment variables
//! (`PORT`, `GEMINI_API_KEY`, `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

use crate::{Error, Result};

/// Default per-file upload ceiling (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub inference: InferenceConfig,
    pub notifier: NotifierConfig,
    pub governance: GovernanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub enable_tracing: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Directory for ephemeral uploads. Created on first use.
    pub dir: PathBuf,
    pub max_file_size_bytes: u64,
    /// How often the orphan sweep runs. `0` disables it.
    pub sweep_interval_secs: u64,
    /// Files older than this are considered orphaned by the sweep.
    pub max_file_age_secs: u64,
}

/// What the pipeline does when the inference call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Answer with an error status.
    Fail,
    /// Answer 200 with the configured placeholder text.
    Degrade,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    pub placeholder_response: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    pub bot_token: Option<Secret<String>>,
    pub chat_id: Option<String>,
    pub base_url: String,
    /// Notifications are only sent when `governance.environment` equals this.
    pub enabled_environment: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GovernanceConfig {
    pub environment: String,
    pub json_logs: bool,
    pub enable_metrics: bool,
}

/// Deployment variables that predate the `APP__` scheme.
#[derive(Debug, Clone, Default)]
pub struct DeploymentVars {
    pub port: Option<String>,
    pub gemini_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl DeploymentVars {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            port: var("PORT"),
            gemini_api_key: var("GEMINI_API_KEY"),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
        }
    }
}

/// Name of the running environment: `APP_ENV`, then `NODE_ENV`, then `development`.
pub fn environment_name() -> String {
    std::env::var("APP_ENV")
        .or_else(|_| std::env::var("NODE_ENV"))
        .unwrap_or_else(|_| "development".into())
}

impl AppConfig {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(
            Path::new("config"),
            &environment_name(),
            &DeploymentVars::from_env(),
        )
    }

    pub fn load_from(
        config_dir: &Path,
        environment: &str,
        vars: &DeploymentVars,
    ) -> std::result::Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let file = |name: &str| {
            File::with_name(&config_dir.join(name).to_string_lossy()).required(false)
        };

        let s = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as u64)?
            .set_default("server.allowed_origins", defaults.server.allowed_origins)?
            .set_default("server.enable_tracing", defaults.server.enable_tracing)?
            .set_default("upload.dir", defaults.upload.dir.to_string_lossy().into_owned())?
            .set_default("upload.max_file_size_bytes", defaults.upload.max_file_size_bytes)?
            .set_default("upload.sweep_interval_secs", defaults.upload.sweep_interval_secs)?
            .set_default("upload.max_file_age_secs", defaults.upload.max_file_age_secs)?
            .set_default("inference.base_url", defaults.inference.base_url)?
            .set_default("inference.model", defaults.inference.model)?
            .set_default("inference.timeout_secs", defaults.inference.timeout_secs)?
            .set_default("inference.failure_policy", "fail")?
            .set_default(
                "inference.placeholder_response",
                defaults.inference.placeholder_response,
            )?
            .set_default("notifier.base_url", defaults.notifier.base_url)?
            .set_default(
                "notifier.enabled_environment",
                defaults.notifier.enabled_environment,
            )?
            .set_default("notifier.timeout_secs", defaults.notifier.timeout_secs)?
            .set_default("governance.json_logs", defaults.governance.json_logs)?
            .set_default("governance.enable_metrics", defaults.governance.enable_metrics)?
            .add_source(file("default"))
            .add_source(file(environment))
            // Map APP__SERVER__PORT=5000 to server.port
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .try_parsing(true),
            )
            .set_override_option("server.port", vars.port.clone())?
            .set_override_option("inference.api_key", vars.gemini_api_key.clone())?
            .set_override_option("notifier.bot_token", vars.telegram_bot_token.clone())?
            .set_override_option("notifier.chat_id", vars.telegram_chat_id.clone())?
            .set_override("governance.environment", environment)?
            .build()?;

        s.try_deserialize()
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_file_size_bytes == 0 {
            return Err(Error::configuration("upload.max_file_size_bytes must be > 0"));
        }
        if self.inference.timeout_secs == 0 {
            return Err(Error::configuration("inference.timeout_secs must be > 0"));
        }
        if self.inference.model.trim().is_empty() {
            return Err(Error::configuration("inference.model must not be empty"));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 5000,
                allowed_origins: vec!["*".into()],
                enable_tracing: true,
            },
            upload: UploadConfig {
                dir: std::env::temp_dir().join("photo-advisor").join("uploads"),
                max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
                sweep_interval_secs: 300,
                max_file_age_secs: 900,
            },
            inference: InferenceConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".into(),
                model: "gemini-1.5-flash".into(),
                timeout_secs: 30,
                failure_policy: FailurePolicy::Fail,
                placeholder_response: "We could not analyze your image right now. \
                    Please try again in a few minutes."
                    .into(),
            },
            notifier: NotifierConfig {
                bot_token: None,
                chat_id: None,
                base_url: "https://api.telegram.org".into(),
                enabled_environment: "production".into(),
                timeout_secs: 10,
            },
            governance: GovernanceConfig {
                environment: "development".into(),
                json_logs: false,
                enable_metrics: true,
            },
        }
    }
}
