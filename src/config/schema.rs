//! Configuration schema types

use crate::config::SecretString;
use serde::Deserialize;

/// Where dispatched bundles go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Print each bundle to the console
    Console,
    /// Write each bundle to a JSON file
    File,
    /// Console and file
    Both,
    /// Push each bundle to a FHIR server as a transaction
    Server,
}

/// Main Meridian configuration, mapping to `meridian.toml`
#[derive(Debug, Deserialize)]
pub struct MeridianConfig {
    /// Application-level settings
    pub application: ApplicationConfig,

    /// Source database (read-only)
    pub source: SourceConfig,

    /// Batch assembly settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Output/sink settings
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MeridianConfig {
    /// Validates the configuration; any failure here is fatal at startup
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate()?;
        self.batch.validate()?;
        self.output.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of patients to process, by source row order; 0 means all
    #[serde(default)]
    pub patient_limit: u32,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Source database configuration
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: SecretString,
    /// Schema holding the clinical tables
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("source.host must not be empty".to_string());
        }
        if self.database.trim().is_empty() {
            return Err("source.database must not be empty".to_string());
        }
        if self.user.trim().is_empty() {
            return Err("source.user must not be empty".to_string());
        }
        if self.pool_size == 0 {
            return Err("source.pool_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Batch assembly configuration
#[derive(Debug, Deserialize)]
pub struct BatchConfig {
    /// Chunk flushes once its entry count exceeds this threshold
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Dispatch queue capacity; the producer backpressures when full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl BatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.threshold == 0 {
            return Err("batch.threshold must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("batch.queue_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Output/sink configuration
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output mode selecting the sink set
    pub mode: OutputMode,

    /// Directory bundles are written to (file / both modes)
    #[serde(default)]
    pub file_path: Option<String>,

    /// FHIR server base URL (server mode)
    #[serde(default)]
    pub fhir_server_url: Option<String>,

    /// Bearer token for the FHIR server, if it requires authentication
    #[serde(default)]
    pub fhir_server_token: Option<SecretString>,
}

impl OutputConfig {
    fn validate(&self) -> Result<(), String> {
        match self.mode {
            OutputMode::File | OutputMode::Both => {
                if self.file_path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                    return Err(
                        "output.file_path is required when output.mode is 'file' or 'both'"
                            .to_string(),
                    );
                }
            }
            OutputMode::Server => {
                let raw = self
                    .fhir_server_url
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        "output.fhir_server_url is required when output.mode is 'server'"
                            .to_string()
                    })?;
                url::Url::parse(raw)
                    .map_err(|e| format!("output.fhir_server_url is not a valid URL: {e}"))?;
            }
            OutputMode::Console => {}
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging with rotation
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Rotation policy: daily or hourly
    #[serde(default = "default_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path must not be empty when logging.local_enabled".into());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_log_path(),
            local_rotation: default_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "mimiciii".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_threshold() -> usize {
    15000
}

fn default_queue_capacity() -> usize {
    64
}

fn default_log_path() -> String {
    "logs".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml(mode: &str, extra: &str) -> String {
        format!(
            r#"
[application]
log_level = "info"

[source]
host = "localhost"
database = "mimic"
user = "reader"
password = "secret"

[output]
mode = "{mode}"
{extra}
"#
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config: MeridianConfig = toml::from_str(&minimal_toml("console", "")).unwrap();
        assert_eq!(config.batch.threshold, 15000);
        assert_eq!(config.batch.queue_capacity, 64);
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.schema, "mimiciii");
        assert!(!config.logging.local_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_mode_requires_path() {
        let config: MeridianConfig = toml::from_str(&minimal_toml("file", "")).unwrap();
        assert!(config.validate().is_err());

        let config: MeridianConfig =
            toml::from_str(&minimal_toml("file", "file_path = \"bundles\"")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_mode_requires_valid_url() {
        let config: MeridianConfig = toml::from_str(&minimal_toml("server", "")).unwrap();
        assert!(config.validate().is_err());

        let config: MeridianConfig =
            toml::from_str(&minimal_toml("server", "fhir_server_url = \"not a url\"")).unwrap();
        assert!(config.validate().is_err());

        let config: MeridianConfig = toml::from_str(&minimal_toml(
            "server",
            "fhir_server_url = \"https://fhir.example.org/baseDstu3\"",
        ))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml = minimal_toml("console", "").replace("\"info\"", "\"verbose\"");
        let config: MeridianConfig = toml::from_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut toml = minimal_toml("console", "");
        toml.push_str("\n[batch]\nthreshold = 0\n");
        let config: MeridianConfig = toml::from_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }
}
