//! File sink

use crate::adapters::sink::Sink;
use crate::dispatch::message::DispatchMessage;
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes each bundle to `bundle<sequence_label>.json` under a directory
#[derive(Debug)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    /// Creates the sink, creating the target directory if needed
    pub fn new(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|e| {
            MeridianError::Configuration(format!(
                "Failed to create output directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        Ok(Self { directory })
    }

    fn file_path(&self, sequence_label: &str) -> PathBuf {
        self.directory.join(format!("bundle{sequence_label}.json"))
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn deliver(&self, message: &DispatchMessage) -> Result<()> {
        let path = self.file_path(&message.sequence_label);
        tokio::fs::write(&path, &message.payload)
            .await
            .map_err(|e| {
                MeridianError::Dispatch(format!("Failed to write {}: {}", path.display(), e))
            })
    }
}
