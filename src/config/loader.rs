//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MeridianConfig;
use crate::domain::errors::MeridianError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses into [`MeridianConfig`]
/// 4. Applies environment variable overrides (`MERIDIAN_*` prefix)
/// 5. Validates the configuration
pub fn load_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MeridianError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MeridianError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: MeridianConfig = toml::from_str(&contents)
        .map_err(|e| MeridianError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        MeridianError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`,
/// skipping comment lines
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MeridianError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the `MERIDIAN_*` prefix,
/// e.g. `MERIDIAN_BATCH_THRESHOLD` or `MERIDIAN_SOURCE_HOST`
fn apply_env_overrides(config: &mut MeridianConfig) {
    if let Ok(val) = std::env::var("MERIDIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("MERIDIAN_APPLICATION_PATIENT_LIMIT") {
        if let Ok(limit) = val.parse() {
            config.application.patient_limit = limit;
        }
    }

    if let Ok(val) = std::env::var("MERIDIAN_SOURCE_HOST") {
        config.source.host = val;
    }
    if let Ok(val) = std::env::var("MERIDIAN_SOURCE_PORT") {
        if let Ok(port) = val.parse() {
            config.source.port = port;
        }
    }
    if let Ok(val) = std::env::var("MERIDIAN_SOURCE_DATABASE") {
        config.source.database = val;
    }
    if let Ok(val) = std::env::var("MERIDIAN_SOURCE_USER") {
        config.source.user = val;
    }
    if let Ok(val) = std::env::var("MERIDIAN_SOURCE_PASSWORD") {
        config.source.password = secrecy::Secret::new(val.into());
    }

    if let Ok(val) = std::env::var("MERIDIAN_BATCH_THRESHOLD") {
        if let Ok(threshold) = val.parse() {
            config.batch.threshold = threshold;
        }
    }
    if let Ok(val) = std::env::var("MERIDIAN_BATCH_QUEUE_CAPACITY") {
        if let Ok(capacity) = val.parse() {
            config.batch.queue_capacity = capacity;
        }
    }

    if let Ok(val) = std::env::var("MERIDIAN_OUTPUT_FILE_PATH") {
        config.output.file_path = Some(val);
    }
    if let Ok(val) = std::env::var("MERIDIAN_OUTPUT_FHIR_SERVER_URL") {
        config.output.fhir_server_url = Some(val);
    }
    if let Ok(val) = std::env::var("MERIDIAN_OUTPUT_FHIR_SERVER_TOKEN") {
        config.output.fhir_server_token = Some(secrecy::Secret::new(val.into()));
    }

    if let Ok(val) = std::env::var("MERIDIAN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("MERIDIAN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("MERIDIAN_TEST_VAR", "test_value");
        let input = "password = \"${MERIDIAN_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result.trim(), "password = \"test_value\"");
        std::env::remove_var("MERIDIAN_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("MERIDIAN_MISSING_VAR");
        let input = "password = \"${MERIDIAN_MISSING_VAR}\"";
        assert!(substitute_env_vars(input).is_err());
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("MERIDIAN_COMMENTED_VAR");
        let input = "# password = \"${MERIDIAN_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "info"
patient_limit = 10

[source]
host = "localhost"
database = "mimic"
user = "reader"
password = "secret"

[output]
mode = "console"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.patient_limit, 10);
        assert_eq!(config.source.host, "localhost");
        assert_eq!(config.batch.threshold, 15000);
    }

    #[test]
    fn test_load_config_invalid_mode_combination() {
        let toml_content = r#"
[application]
log_level = "info"

[source]
host = "localhost"
database = "mimic"
user = "reader"
password = "secret"

[output]
mode = "file"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }
}
