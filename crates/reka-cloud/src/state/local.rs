//! State document on the local filesystem

use super::{State, StateBackend};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// JSON state file at a fixed path
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn get_state(&self) -> Result<State> {
        if !fs::try_exists(&self.path).await? {
            tracing::debug!(path = %self.path.display(), "State file not found, returning empty state");
            return Ok(State::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(State::new());
        }
        let state: State = serde_json::from_str(&content).map_err(|e| {
            CloudError::StateError(format!("{} is not a valid state file: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            current = state.count_current(),
            desired = state.count_desired(),
            "Loaded state"
        );
        Ok(state)
    }

    async fn write_state(&self, state: &State) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
            && !fs::try_exists(dir).await?
        {
            fs::create_dir_all(dir).await?;
        }

        // written next to the target, then renamed over it
        let temp = self.temp_path();
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
