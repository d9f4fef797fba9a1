//! Destination sinks
//!
//! A [`Sink`] accepts one serialized transaction bundle at a time. The
//! output mode selects which sinks are active for a run; the consumer fans
//! every dispatched message out to all of them. Retry and backoff, if any,
//! belong to the destination side, not here.

pub mod console;
pub mod factory;
pub mod fhir_server;
pub mod file;

pub use console::ConsoleSink;
pub use factory::build_sinks;
pub use fhir_server::FhirServerSink;
pub use file::FileSink;

use crate::dispatch::message::DispatchMessage;
use crate::domain::Result;
use async_trait::async_trait;

/// Destination for dispatched transaction bundles
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short sink name for log lines
    fn name(&self) -> &'static str;

    /// Delivers one serialized bundle
    ///
    /// # Errors
    ///
    /// Returns a `Dispatch` error when the destination rejects the bundle;
    /// the consumer logs it and continues.
    async fn deliver(&self, message: &DispatchMessage) -> Result<()>;
}
