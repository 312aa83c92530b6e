use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub ready_timeout_ms: u64,
    pub max_queue_size: usize,

    // Paths
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Valor inválido para {}", key))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN").context("Falta DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("Falta APPLICATION_ID")?
                .parse()
                .context("APPLICATION_ID debe ser numérico")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: env_or("DEFAULT_VOLUME", "0.1")?,
            ready_timeout_ms: env_or("READY_TIMEOUT_MS", "5000")?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "1000")?,

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            media_dir: std::env::var("MEDIA_DIR")
                .unwrap_or_else(|_| "./media".to_string())
                .into(),
        };

        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("No se pudo crear {}", config.data_dir.display()))?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - The readiness timeout and the queue limit must be non-zero
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.ready_timeout_ms == 0 {
            anyhow::bail!("Ready timeout must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {}ms ready timeout, {} max queue\n  \
            Paths: data={}, media={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            self.ready_timeout_ms,
            self.max_queue_size,
            self.data_dir.display(),
            self.media_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.1,
            ready_timeout_ms: 5000,
            max_queue_size: 1000,

            data_dir: "./data".into(),
            media_dir: "./media".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ready_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_timeout = Config {
            ready_timeout_ms: 0,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());

        let no_queue = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        assert!(no_queue.validate().is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            application_id: 42,
            ..Config::default()
        };
        let summary = config.summary();
        assert!(summary.contains("App ID 42"));
        assert!(summary.contains("10% vol"));
        assert!(!summary.contains("super-secret"));
    }
}
