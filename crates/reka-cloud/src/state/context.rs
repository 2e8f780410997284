use super::{ProvidersState, State, StateBackend};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// The state backend chosen at startup and the state loaded from it.
///
/// Opened once per process; every pass reconciles into the in-memory state
/// and writes the whole document back.
pub struct ReconciliationContext {
    backend: Arc<dyn StateBackend>,
    state: State,
}

impl ReconciliationContext {
    /// Read the state document once
    pub async fn open(backend: Arc<dyn StateBackend>) -> Result<Self> {
        let state = backend.get_state().await?;
        info!(
            location = %backend.location(),
            current = state.count_current(),
            desired = state.count_desired(),
            "State loaded"
        );
        Ok(Self { backend, state })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Merge freshly fetched resources into the in-memory state
    pub fn reconcile(&mut self, current: ProvidersState) {
        self.state.reconcile(current);
    }

    /// Write the in-memory state through the backend
    pub async fn persist(&self) -> Result<()> {
        self.backend.write_state(&self.state).await?;
        info!(
            location = %self.backend.location(),
            current = self.state.count_current(),
            desired = self.state.count_desired(),
            "State persisted"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ReconciliationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationContext")
            .field("location", &self.backend.location())
            .field("state", &self.state)
            .finish()
    }
}
