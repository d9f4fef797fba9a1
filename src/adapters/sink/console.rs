//! Console sink

use crate::adapters::sink::Sink;
use crate::dispatch::message::DispatchMessage;
use crate::domain::Result;
use async_trait::async_trait;

/// Prints each bundle to stdout
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn deliver(&self, message: &DispatchMessage) -> Result<()> {
        println!("--- bundle {} ---", message.sequence_label);
        println!("{}", message.payload);
        Ok(())
    }
}
