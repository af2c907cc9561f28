use crate::error::{AppError, Result};
use crate::model::{IntervalLength, SiteId, SiteSettings};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub kafka: KafkaConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    #[serde(default)]
    pub interval_minutes: IntervalLength,
    /// Offset of the site's local time from UTC, e.g. 600 for AEST.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl SiteConfig {
    pub fn settings(&self) -> Result<SiteSettings> {
        let utc_offset = self
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })?;

        Ok(SiteSettings::new(
            SiteId::new(self.id.clone()),
            self.interval_minutes,
            utc_offset,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Topic carrying day documents keyed by `YYYYMMDD`.
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        // Expand environment variables in the format $(VAR_NAME)
        let expanded = expand_env_vars(&content)?;

        let config: Config = serde_yaml::from_str(&expanded)?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.site.id.is_empty() {
            return Err(AppError::Config("Site id cannot be empty".to_string()));
        }

        if self.kafka.brokers.is_empty() {
            return Err(AppError::Config(
                "Kafka brokers cannot be empty".to_string(),
            ));
        }

        if self.kafka.topic.is_empty() {
            return Err(AppError::Config("Kafka topic cannot be empty".to_string()));
        }

        if self.kafka.group_id.is_empty() {
            return Err(AppError::Config(
                "Kafka group_id cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        if self.server.max_connections == 0 {
            return Err(AppError::Config(
                "Server max_connections cannot be 0".to_string(),
            ));
        }

        self.site.settings().map(|_| ())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)")
        .map_err(|e| AppError::Config(format!("Invalid placeholder pattern: {}", e)))?;

    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        // Unknown variables stay as written
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    Ok(expanded.into_owned())
}
