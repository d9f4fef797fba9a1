//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Meridian using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Meridian - clinical records to FHIR export tool
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "meridian.toml", env = "MERIDIAN_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MERIDIAN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export patient records as FHIR transaction bundles
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
