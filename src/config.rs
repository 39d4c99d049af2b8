//! Gateway configuration module
//!
//! Layered with the `config` crate, lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. `DISCORD_TOKEN` / `DISCORD_BOT_TOKEN` as the default token
//! 3. Optional `gateway.{toml,json,yaml}` in the working directory
//! 4. `GATEWAY_*` environment variables (`GATEWAY_USE_SHARDING=true`)
//!
//! A `.env` file is loaded first if present.

use crate::error::GatewayError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use twilight_gateway::Intents;

/// Gateway configuration
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Discord bot token
    #[serde(default)]
    pub token: String,

    /// Run a shard set instead of a single session
    pub use_sharding: bool,

    /// Honour declared commands, permissions, scopes and intents
    pub annotation_configuration: bool,

    /// Overwrite the remote command set when it differs from the local one
    pub update_commands: bool,

    /// Attach every gateway listener that did not opt out
    pub event_auto_register: bool,

    /// Shard count in shard mode; Discord's recommendation when unset
    #[serde(default)]
    pub total_shards: Option<u64>,

    /// Base gateway intent bits
    pub intents: u64,

    /// JSON array of declared commands
    #[serde(default)]
    pub commands_file: Option<PathBuf>,

    /// Health/metrics HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl GatewayConfig {
    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let mut builder = Self::defaults()?;

        if let Ok(token) = env::var("DISCORD_TOKEN").or_else(|_| env::var("DISCORD_BOT_TOKEN")) {
            builder = builder.set_default("token", token)?;
        }

        let source = builder
            .add_source(File::with_name("gateway").required(false))
            .add_source(Environment::with_prefix("GATEWAY").try_parsing(true))
            .build()?;

        Self::from_source(source)
    }

    /// Builder preloaded with every default
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, GatewayError> {
        Ok(Config::builder()
            .set_default("use_sharding", false)?
            .set_default("annotation_configuration", true)?
            .set_default("update_commands", false)?
            .set_default("event_auto_register", false)?
            .set_default("intents", Intents::GUILDS.bits())?
            .set_default("http_port", 9090_i64)?
            .set_default("log_level", "info")?)
    }

    /// Deserialize and validate an already built source
    pub fn from_source(source: Config) -> Result<Self, GatewayError> {
        let config: Self = source.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.token.trim().is_empty() {
            return Err(GatewayError::Config(
                "token must be set (GATEWAY_TOKEN, DISCORD_TOKEN or DISCORD_BOT_TOKEN)".to_string(),
            ));
        }

        if self.total_shards == Some(0) {
            return Err(GatewayError::Config(
                "total_shards must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured Discord intents
    ///
    /// Unknown bits are dropped. Declared intents from the application
    /// components are merged on top of these.
    pub fn intents(&self) -> Intents {
        Intents::from_bits_truncate(self.intents)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("use_sharding", &self.use_sharding)
            .field("annotation_configuration", &self.annotation_configuration)
            .field("update_commands", &self.update_commands)
            .field("event_auto_register", &self.event_auto_register)
            .field("total_shards", &self.total_shards)
            .field("intents", &self.intents())
            .field("commands_file", &self.commands_file)
            .field("http_port", &self.http_port)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(overrides: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let mut builder = GatewayConfig::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        GatewayConfig::from_source(builder.build()?)
    }

    #[test]
    fn test_default_values() {
        let config = config_with(&[("token", "secret")]).unwrap();

        assert!(!config.use_sharding);
        assert!(config.annotation_configuration);
        assert!(!config.update_commands);
        assert!(!config.event_auto_register);
        assert_eq!(config.total_shards, None);
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.intents(), Intents::GUILDS);
    }

    #[test]
    fn test_blank_token_is_fatal() {
        let err = config_with(&[("token", "   ")]).unwrap_err();
        assert!(err.is_configuration_error());

        let err = config_with(&[]).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_string_overrides_are_parsed() {
        let config = config_with(&[
            ("token", "secret"),
            ("use_sharding", "true"),
            ("update_commands", "true"),
            ("total_shards", "4"),
        ])
        .unwrap();

        assert!(config.use_sharding);
        assert!(config.update_commands);
        assert_eq!(config.total_shards, Some(4));
    }

    #[test]
    fn test_zero_shards_rejected() {
        let err = config_with(&[("token", "secret"), ("total_shards", "0")]).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = config_with(&[("token", "very-secret-token")]).unwrap();
        assert!(!format!("{config:?}").contains("very-secret-token"));
    }
}
