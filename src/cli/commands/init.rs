//! Init command implementation
//!
//! Generates a sample configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "meridian.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("  Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, Self::sample_config()) {
            Ok(()) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set MERIDIAN_SOURCE_PASSWORD in the environment or a .env file");
                println!("  3. Validate: meridian validate-config");
                println!("  4. Run: meridian run");
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("  Error: {e}");
                Ok(5)
            }
        }
    }

    fn sample_config() -> String {
        r#"# Meridian Configuration File
# Clinical records to FHIR export tool

[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Number of patients to export, in source row order; 0 means all
patient_limit = 0

[source]
host = "localhost"
port = 5432
database = "mimic"
user = "mimic_reader"
password = "${MERIDIAN_SOURCE_PASSWORD}"
schema = "mimiciii"
pool_size = 4

[batch]
# Chunk flushes once its entry count exceeds this threshold
threshold = 15000
queue_capacity = 64

[output]
# Output mode: console | file | both | server
mode = "console"

# Directory bundles are written to (file / both modes)
# file_path = "bundles"

# FHIR server receiving transaction bundles (server mode).
# The server must support conditional creates.
# fhir_server_url = "https://fhir.example.org/baseDstu3"
# fhir_server_token = "${MERIDIAN_OUTPUT_FHIR_SERVER_TOKEN}"

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }
}
