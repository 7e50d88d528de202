//! Integration configuration
//!
//! Settings come from a YAML file (`MARGE_AIRLY_CONFIG`, default
//! `/config/airly.yaml`) and are then overridden by environment variables:
//!
//! | key               | env                     | default                   |
//! |-------------------|-------------------------|---------------------------|
//! | api_key           | `AIRLY_API_KEY`         | required                  |
//! | installation_id   | `AIRLY_INSTALLATION_ID` | required                  |
//! | poll_minutes      | `AIRLY_POLL_MINUTES`    | 15                        |
//! | debug             | `AIRLY_DEBUG`           | false                     |
//! | schema            | `AIRLY_SCHEMA`          | v2                        |
//! | language          | `MARGE_LANGUAGE`        | en                        |
//! | api_base          |                         | https://airapi.airly.eu   |
//! | heartbeat_secs    |                         | 20                        |
//! | http_timeout_secs |                         | 30                        |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::integrations::airly::schema::SchemaVersion;

pub const DEFAULT_CONFIG_PATH: &str = "/config/airly.yaml";
pub const DEFAULT_API_BASE: &str = "https://airapi.airly.eu";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// On-disk shape. Everything optional so env can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    installation_id: Option<u32>,
    #[serde(default)]
    poll_minutes: Option<u64>,
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    schema: Option<SchemaVersion>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    heartbeat_secs: Option<u64>,
    #[serde(default)]
    http_timeout_secs: Option<u64>,
}

/// Validated settings, read-only for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct AirlyConfig {
    pub api_key: String,
    pub installation_id: u32,
    pub poll_interval: Duration,
    pub debug: bool,
    pub schema: SchemaVersion,
    pub language: String,
    pub api_base: String,
    pub heartbeat: Duration,
    pub http_timeout: Duration,
}

impl AirlyConfig {
    /// Load from `path` (skipped when the file does not exist) and apply
    /// overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse_raw(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using environment only");
            RawConfig::default()
        };

        apply_env(&mut raw, env)?;
        Self::from_raw(raw)
    }

    /// Parse YAML text without consulting the environment.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Self::from_raw(parse_raw(contents)?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let api_key = raw
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("api_key"))?;
        let installation_id = raw
            .installation_id
            .ok_or(ConfigError::Missing("installation_id"))?;

        let poll_minutes = raw.poll_minutes.unwrap_or(15);
        if poll_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_minutes",
                value: poll_minutes.to_string(),
            });
        }

        let heartbeat_secs = raw.heartbeat_secs.unwrap_or(20);
        if heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "heartbeat_secs",
                value: heartbeat_secs.to_string(),
            });
        }

        let api_base = raw
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            installation_id,
            poll_interval: Duration::from_secs(poll_minutes * 60),
            debug: raw.debug.unwrap_or(false),
            schema: raw.schema.unwrap_or_default(),
            language: raw.language.unwrap_or_else(|| "en".to_string()),
            api_base,
            heartbeat: Duration::from_secs(heartbeat_secs),
            http_timeout: Duration::from_secs(raw.http_timeout_secs.unwrap_or(30)),
        })
    }
}

fn parse_raw(contents: &str) -> Result<RawConfig, ConfigError> {
    // An empty file deserializes to unit, not a map.
    if contents.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

fn apply_env<F>(raw: &mut RawConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = env("AIRLY_API_KEY") {
        raw.api_key = Some(key);
    }
    if let Some(id) = env("AIRLY_INSTALLATION_ID") {
        raw.installation_id = Some(id.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "installation_id",
            value: id.clone(),
        })?);
    }
    if let Some(minutes) = env("AIRLY_POLL_MINUTES") {
        raw.poll_minutes = Some(minutes.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "poll_minutes",
            value: minutes.clone(),
        })?);
    }
    if let Some(debug) = env("AIRLY_DEBUG") {
        raw.debug = Some(matches!(
            debug.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "debug"
        ));
    }
    if let Some(schema) = env("AIRLY_SCHEMA") {
        raw.schema = Some(match schema.trim().to_ascii_lowercase().as_str() {
            "v1" => SchemaVersion::V1,
            "v2" => SchemaVersion::V2,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "schema",
                    value: schema,
                })
            }
        });
    }
    if let Some(lang) = env("MARGE_LANGUAGE") {
        raw.language = Some(lang);
    }
    Ok(())
}
