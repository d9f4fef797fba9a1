//! Run command implementation
//!
//! Wires the full export together: configuration, sinks, the dispatch
//! queue, the consumer task and the producer pipeline.

use crate::adapters::sink::build_sinks;
use crate::adapters::source::{PostgresSource, RecordSource};
use crate::config::load_config;
use crate::core::Pipeline;
use crate::dispatch::{self, Consumer};
use clap::Args;
use std::sync::Arc;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the number of patients to export (0 = all)
    #[arg(long)]
    pub patients: Option<u32>,

    /// Override the chunk threshold
    #[arg(long)]
    pub threshold: Option<usize>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path, "Starting export run");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        if let Some(patients) = self.patients {
            tracing::info!(patients, "Overriding patient limit from CLI");
            config.application.patient_limit = patients;
        }
        if let Some(threshold) = self.threshold {
            tracing::info!(threshold, "Overriding chunk threshold from CLI");
            config.batch.threshold = threshold;
        }
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration error: {e}");
            return Ok(2);
        }

        let sinks = match build_sinks(&config.output) {
            Ok(sinks) => sinks,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build sinks");
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let source: Arc<dyn RecordSource> = Arc::new(PostgresSource::new(&config.source)?);

        let (sender, receiver) = dispatch::channel(config.batch.queue_capacity);
        let consumer = Consumer::new(sinks);
        let consumer_task = tokio::spawn(async move { consumer.run(receiver).await });

        let pipeline = Pipeline::new(
            source,
            sender,
            config.batch.threshold,
            config.application.patient_limit,
        );
        let run_result = pipeline.run().await;

        let stats = consumer_task
            .await
            .map_err(|e| anyhow::anyhow!("consumer task panicked: {e}"))?;

        let summary = match run_result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Export run failed");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        println!("Export finished:");
        println!("  Patients:    {}", summary.patients);
        println!("  Admissions:  {}", summary.admissions);
        println!("  Chunks:      {}", summary.chunks);
        println!("  Delivered:   {}", stats.delivered);
        if summary.patients_skipped > 0 || summary.entities_skipped > 0 {
            println!(
                "  Skipped:     {} patients, {} entities",
                summary.patients_skipped, summary.entities_skipped
            );
        }
        if stats.failed > 0 {
            println!("  Failed deliveries: {}", stats.failed);
            return Ok(3);
        }
        Ok(0)
    }
}
