//! Validate config command implementation

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(config) => {
                println!("Configuration is valid");
                config
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("  Error: {e}");
                return Ok(2);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Patients: {}",
            match config.application.patient_limit {
                0 => "all".to_string(),
                limit => limit.to_string(),
            }
        );
        println!(
            "  Source: {}:{}/{} (schema {})",
            config.source.host, config.source.port, config.source.database, config.source.schema
        );
        println!("  Chunk threshold: {}", config.batch.threshold);
        println!("  Queue capacity: {}", config.batch.queue_capacity);
        println!("  Output mode: {:?}", config.output.mode);
        if let Some(path) = &config.output.file_path {
            println!("  Output directory: {path}");
        }
        if let Some(url) = &config.output.fhir_server_url {
            println!("  FHIR server: {url}");
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_is_config_error() {
        let args = ValidateArgs {};
        let code = args.execute("/nonexistent/meridian.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
