use anyhow::Result;
use std::{str::FromStr, time::Duration};

use crate::audio::source::DEFAULT_VOLUME;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,

    // yt-dlp
    pub ytdlp_path: String,
    pub resolve_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN")
                .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN no está definido"))?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),
            command_prefix: lookup("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),

            // Audio
            default_volume: parse_or(&lookup, "DEFAULT_VOLUME", DEFAULT_VOLUME)?,

            // yt-dlp
            ytdlp_path: lookup("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            resolve_timeout: Duration::from_secs(parse_or(&lookup, "RESOLVE_TIMEOUT", 60)?),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token and command prefix must not be empty
    /// - Default volume must be between 0.0 and 2.0
    /// - Resolve timeout must be greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN está vacío");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("COMMAND_PREFIX no puede estar vacío");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}' (Guild: {})\n  \
            Audio: {}% vol\n  \
            yt-dlp: {} ({}s timeout)",
            self.command_prefix,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.ytdlp_path,
            self.resolve_timeout.as_secs(),
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Valor inválido para {}: '{}' ({})", key, raw, e))
}
