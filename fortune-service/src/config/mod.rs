use serde::Deserialize;
use service_core::config::{self as core_config, env_or, env_parse};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct FortuneConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub ollama: OllamaConfig,
    pub lots: LotsConfig,
    pub static_files: StaticConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server, without a trailing slash.
    pub base_url: String,
    pub model: String,
    /// Upper bound for a single completion call, in seconds.
    pub timeout_secs: u64,
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LotsConfig {
    /// JSON array of fortune lots, re-read on every request.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    pub dir: PathBuf,
}

impl FortuneConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let timeout_secs = env_parse("OLLAMA_TIMEOUT_SECS", DEFAULT_OLLAMA_TIMEOUT_SECS)?;

        Ok(FortuneConfig {
            common: common_config,
            ollama: OllamaConfig {
                base_url: env_or("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL)
                    .trim_end_matches('/')
                    .to_string(),
                model: env_or("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
                timeout_secs,
            },
            lots: LotsConfig {
                path: env_or("LOTS_PATH", "data/lots.json").into(),
            },
            static_files: StaticConfig {
                dir: env_or("STATIC_DIR", "static").into(),
            },
        })
    }
}
