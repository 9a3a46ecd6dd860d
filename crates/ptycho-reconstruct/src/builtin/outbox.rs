use chrono::Utc;
use ptycho_core::error::Result;
use ptycho_core::models::ReconstructInput;
use ptycho_core::ports::RemoteExecutor;
use ptycho_store::io;
use std::path::{Path, PathBuf};

/// Drops matched inputs into a directory for an external transfer agent
#[derive(Debug, Clone)]
pub struct OutboxRemoteExecutor {
    directory: PathBuf,
}

impl OutboxRemoteExecutor {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl RemoteExecutor for OutboxRemoteExecutor {
    fn submit(&self, input: ReconstructInput, label: &str) -> Result<()> {
        let label: String = label
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        let file_name = format!("{}-{}.input.json", label, Utc::now().format("%Y%m%dT%H%M%S%3f"));
        let path = self.directory.join(file_name);

        io::write_value(&path, &input)?;
        tracing::info!("Submitted \"{}\" to remote outbox {}", label, path.display());
        Ok(())
    }
}
