use std::env;

use thiserror::Error;

use crate::blockchain::pow::{Difficulty, MAX_DIFFICULTY};

pub const DEFAULT_DIFFICULTY: u32 = 12;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Errors that can occur while reading configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Difficulty {0} exceeds the maximum of 256 bits")]
    DifficultyTooHigh(u32),
}

/// Runtime settings for the ledger service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Leading zero bits required of every mined block
    pub difficulty: Difficulty,

    pub host: String,

    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            difficulty: Difficulty::new(DEFAULT_DIFFICULTY),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Reads `LEDGER_DIFFICULTY`, `LEDGER_HOST` and `LEDGER_PORT`, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(value) = lookup("LEDGER_DIFFICULTY") {
            let bits = parse("LEDGER_DIFFICULTY", &value)?;
            if bits > MAX_DIFFICULTY {
                return Err(ConfigError::DifficultyTooHigh(bits));
            }
            config.difficulty = Difficulty::new(bits);
        }

        if let Some(value) = lookup("LEDGER_HOST") {
            config.host = value;
        }

        if let Some(value) = lookup("LEDGER_PORT") {
            config.port = parse("LEDGER_PORT", &value)?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
