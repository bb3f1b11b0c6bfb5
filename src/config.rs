use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub transcript: TranscriptConfig,
    pub advisory: AdvisoryConfig,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptConfig {
    pub api_key: String,

    /// Seconds of stream silence before falling back to polling
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,

    /// Fixed polling interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AdvisoryConfig {
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum seconds between hints for one session
    #[serde(default = "default_min_hint_interval_secs")]
    pub min_hint_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: Option<String>,
}

fn default_liveness_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_min_hint_interval_secs() -> u64 {
    20
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            // LIVECOACH__ADVISORY__API_KEY etc. override the file
            .add_source(config::Environment::with_prefix("LIVECOACH").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.transcript.liveness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.transcript.poll_interval_secs)
    }

    pub fn min_hint_interval(&self) -> Duration {
        Duration::from_secs(self.advisory.min_hint_interval_secs)
    }
}
