//! Settings for the ledger binaries.
//!
//! Sources, lowest priority first: built-in defaults, an optional `wmtb.toml`
//! next to the binary's working directory, `WMTB_*` environment variables
//! (`WMTB_SERVER__PORT=8080`), and finally a bare `PORT` variable.

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

use crate::parser::{ParserOptions, ShorthandMode, TransactionParser};
use crate::rules::CategoryRules;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// No path means an in-memory ledger
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_string(),
        }
    }
}

impl LogSettings {
    /// Install the global `tracing` subscriber, writing to stderr.
    /// A second call is a no-op.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::new(format!(
            "wmtb={level},wmtb_server={level},tower_http={level}",
            level = self.level
        ));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserSettings {
    /// JSON rule table replacing the built-in one
    pub rules_path: Option<PathBuf>,
    pub shorthand: ShorthandMode,
}

impl ParserSettings {
    pub fn build_parser(&self) -> Result<TransactionParser> {
        let rules = match &self.rules_path {
            Some(path) => {
                let rules = CategoryRules::from_file(path)
                    .with_context(|| format!("Failed to load category rules from {}", path.display()))?;
                tracing::info!(path = %path.display(), rules = rules.rule_count(), "loaded category rules");
                rules
            }
            None => CategoryRules::builtin(),
        };

        if self.shorthand == ShorthandMode::Thousands {
            tracing::info!("k shorthand configured as thousands (15k = 15000)");
        }

        Ok(TransactionParser::with_options(
            rules,
            ParserOptions {
                shorthand: self.shorthand,
            },
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub log: LogSettings,
    pub parser: ParserSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("wmtb").required(false))
            .add_source(
                Environment::with_prefix("WMTB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        settings.try_deserialize()
    }

    /// Defaults overlaid with an inline TOML document
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
