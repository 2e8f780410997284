//! Current/Desired state document and reconciliation
//!
//! `Current` is what the last pass observed. `Desired` accumulates every
//! resource ever observed and keeps the first copy seen, so attributes
//! needed to resume a resource (a node pool's size, for example) survive
//! while the resource is stopped. Entries are never removed from `Desired`.

pub mod context;
pub mod local;
pub mod remote;

pub use context::ReconciliationContext;
pub use local::LocalBackend;
pub use remote::{BlobStore, MemoryBlobStore, RemoteBackend};

use crate::error::Result;
use crate::resource::{Resource, Resources};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Resources per provider, then per manager
pub type ProvidersState = BTreeMap<String, Resources>;

/// The persisted state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct State {
    pub current: ProvidersState,
    pub desired: ProvidersState,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `Current` with `current` and union it into `Desired` by UUID
    pub fn reconcile(&mut self, current: ProvidersState) {
        self.current = current;

        for (provider, managers) in &self.current {
            let desired_provider = self.desired.entry(provider.clone()).or_default();
            for (manager, resources) in managers {
                match desired_provider.get_mut(manager) {
                    None => {
                        desired_provider.insert(manager.clone(), resources.clone());
                    }
                    Some(desired) => {
                        let mut known: HashSet<String> =
                            desired.iter().map(|r| r.uuid.clone()).collect();
                        for resource in resources {
                            if known.insert(resource.uuid.clone()) {
                                desired.push(resource.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    /// The desired entry for a resource, if one was ever recorded
    pub fn desired_resource(&self, provider: &str, manager: &str, uuid: &str) -> Option<&Resource> {
        self.desired
            .get(provider)?
            .get(manager)?
            .iter()
            .find(|r| r.uuid == uuid)
    }

    pub fn current_resources(&self, provider: &str) -> Option<&Resources> {
        self.current.get(provider)
    }

    pub fn count_current(&self) -> usize {
        count(&self.current)
    }

    pub fn count_desired(&self) -> usize {
        count(&self.desired)
    }
}

fn count(state: &ProvidersState) -> usize {
    state.values().map(crate::resource::count_resources).sum()
}

/// Where the state document is read from and written to
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Load the document. A missing document is an empty state.
    async fn get_state(&self) -> Result<State>;

    /// Overwrite the whole document
    async fn write_state(&self, state: &State) -> Result<()>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}
