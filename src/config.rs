//! Configuration management for the highlight engine

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::tree::HighlightConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub render: HighlightConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait before the first reconcile after a section mounts
    pub mount_delay: Duration,
    /// Wait after touch-end before committing the selection
    pub touch_settle_delay: Duration,
    /// Report a highlight as stale after this many unresolved reconciles
    pub max_unresolved_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mount_delay: Duration::from_millis(100),
            touch_settle_delay: Duration::from_millis(50),
            max_unresolved_attempts: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: SessionConfig::default(),
            render: HighlightConfig::default(),
            database: DatabaseConfig {
                url: "sqlite:./highlights.db".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for missing keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidValue { key, value }),
                None => Ok(default),
            }
        };

        let max_unresolved_attempts = match lookup("HIGHLIGHT_MAX_UNRESOLVED") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: "HIGHLIGHT_MAX_UNRESOLVED",
                        value,
                    })
                }
                Ok(n) => Some(n),
            },
            None => None,
        };

        Ok(Config {
            session: SessionConfig {
                mount_delay: millis("HIGHLIGHT_MOUNT_DELAY_MS", defaults.session.mount_delay)?,
                touch_settle_delay: millis(
                    "HIGHLIGHT_TOUCH_SETTLE_MS",
                    defaults.session.touch_settle_delay,
                )?,
                max_unresolved_attempts,
            },
            render: HighlightConfig {
                class_prefix: lookup("HIGHLIGHT_CLASS_PREFIX")
                    .unwrap_or(defaults.render.class_prefix),
                id_attribute: lookup("HIGHLIGHT_ID_ATTRIBUTE")
                    .unwrap_or(defaults.render.id_attribute),
                ..defaults.render
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.render.class_prefix, "ll-highlight");
        assert_eq!(config.database.url, "sqlite:./highlights.db");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HIGHLIGHT_MOUNT_DELAY_MS", "250"),
            ("HIGHLIGHT_TOUCH_SETTLE_MS", "0"),
            ("HIGHLIGHT_MAX_UNRESOLVED", "5"),
            ("HIGHLIGHT_CLASS_PREFIX", "hl"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]))
        .unwrap();

        assert_eq!(config.session.mount_delay, Duration::from_millis(250));
        assert_eq!(config.session.touch_settle_delay, Duration::ZERO);
        assert_eq!(config.session.max_unresolved_attempts, Some(5));
        assert_eq!(config.render.class_prefix, "hl");
        assert_eq!(config.render.id_attribute, "data-highlight-id");
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("HIGHLIGHT_MOUNT_DELAY_MS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "HIGHLIGHT_MOUNT_DELAY_MS",
                value: "soon".to_string(),
            }
        );

        assert!(Config::from_lookup(lookup(&[("HIGHLIGHT_MAX_UNRESOLVED", "0")])).is_err());
    }
}
