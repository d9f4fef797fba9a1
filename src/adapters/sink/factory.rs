//! Sink factory
//!
//! Builds the active sink set from the output configuration. An empty or
//! uninstantiable sink set is a fatal configuration error: a run with no
//! destination must abort before any work begins.

use crate::adapters::sink::{ConsoleSink, FhirServerSink, FileSink, Sink};
use crate::config::{OutputConfig, OutputMode};
use crate::domain::{MeridianError, Result};
use std::sync::Arc;

/// Builds the sink set selected by the output mode
pub fn build_sinks(output: &OutputConfig) -> Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    match output.mode {
        OutputMode::Console => {
            sinks.push(Arc::new(ConsoleSink::new()));
        }
        OutputMode::File => {
            sinks.push(Arc::new(file_sink(output)?));
        }
        OutputMode::Both => {
            sinks.push(Arc::new(ConsoleSink::new()));
            sinks.push(Arc::new(file_sink(output)?));
        }
        OutputMode::Server => {
            let url = output
                .fhir_server_url
                .clone()
                .ok_or_else(|| missing("output.fhir_server_url", "server"))?;
            sinks.push(Arc::new(FhirServerSink::new(
                url,
                output.fhir_server_token.clone(),
            )?));
        }
    }

    if sinks.is_empty() {
        return Err(MeridianError::Configuration(
            "No sink could be configured for the selected output mode".to_string(),
        ));
    }

    tracing::info!(
        sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Configured sinks"
    );
    Ok(sinks)
}

fn file_sink(output: &OutputConfig) -> Result<FileSink> {
    let path = output
        .file_path
        .as_deref()
        .ok_or_else(|| missing("output.file_path", "file"))?;
    FileSink::new(path)
}

fn missing(key: &str, mode: &str) -> MeridianError {
    MeridianError::Configuration(format!("{key} is required for output mode '{mode}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(mode: OutputMode) -> OutputConfig {
        OutputConfig {
            mode,
            file_path: None,
            fhir_server_url: None,
            fhir_server_token: None,
        }
    }

    #[test]
    fn test_console_mode_builds_single_sink() {
        let sinks = build_sinks(&output(OutputMode::Console)).unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "console");
    }

    #[test]
    fn test_both_mode_builds_console_and_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = output(OutputMode::Both);
        config.file_path = Some(dir.path().to_string_lossy().to_string());

        let sinks = build_sinks(&config).unwrap();
        let names: Vec<_> = sinks.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["console", "file"]);
    }

    #[test]
    fn test_file_mode_without_path_is_fatal() {
        let result = build_sinks(&output(OutputMode::File));
        assert!(matches!(result, Err(MeridianError::Configuration(_))));
    }

    #[test]
    fn test_server_mode_without_url_is_fatal() {
        let result = build_sinks(&output(OutputMode::Server));
        assert!(matches!(result, Err(MeridianError::Configuration(_))));
    }
}
