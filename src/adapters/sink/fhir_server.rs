//! FHIR server sink
//!
//! Pushes each serialized bundle to a FHIR server base endpoint as a
//! transaction POST, with optional bearer-token authentication.

use crate::adapters::sink::Sink;
use crate::dispatch::message::DispatchMessage;
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Delivers bundles to a FHIR server transaction endpoint
pub struct FhirServerSink {
    client: reqwest::Client,
    base_url: String,
    token: Option<crate::config::SecretString>,
}

impl FhirServerSink {
    /// Creates the sink; transaction bundles can be large, so the request
    /// timeout is generous
    pub fn new(base_url: String, token: Option<crate::config::SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1500))
            .build()
            .map_err(|e| {
                MeridianError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl Sink for FhirServerSink {
    fn name(&self) -> &'static str {
        "fhir-server"
    }

    async fn deliver(&self, message: &DispatchMessage) -> Result<()> {
        let mut request = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/fhir+json")
            .body(message.payload.clone());

        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret().as_ref());
        }

        let response = request.send().await.map_err(|e| {
            MeridianError::Dispatch(format!(
                "Transaction POST for bundle {} failed: {e}",
                message.sequence_label
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeridianError::Dispatch(format!(
                "FHIR server rejected bundle {}: {} {}",
                message.sequence_label,
                status,
                body.chars().take(512).collect::<String>()
            )));
        }

        Ok(())
    }
}
