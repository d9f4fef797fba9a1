//! Configuration management
//!
//! TOML-based configuration with environment variable substitution and
//! `MERIDIAN_*` overrides. Validation runs at load time so missing or
//! contradictory settings abort the run before any work begins.

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::load_config;
pub use schema::{
    ApplicationConfig, BatchConfig, LoggingConfig, MeridianConfig, OutputConfig, OutputMode,
    SourceConfig,
};
pub use secret::{SecretString, SecretValue};
