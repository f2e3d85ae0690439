use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    pub training: TrainingConfig,
    pub store: StoreConfig,
    pub verify: VerifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("input_data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    /// Train model groups on blocking worker threads
    pub parallel: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 0,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            extension: "bin".to_string(),
        }
    }
}

/// Reload one persisted model after training and report its score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub enabled: bool,
    pub model: String,
    pub seed: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "MT064-4".to_string(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Defaults, then the TOML file (if present), then `CPR__` env vars
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CPR__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let f = self.training.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            anyhow::bail!("training.test_fraction must be strictly between 0 and 1, got {}", f);
        }
        if self.store.extension.is_empty() || self.store.extension.contains(['/', '\\', '.']) {
            anyhow::bail!("store.extension must be a bare file extension, got '{}'", self.store.extension);
        }
        Ok(())
    }
}
