//! Reka resource lifecycle engine
//!
//! Discovers cloud resources through per-type managers, decides from
//! temporal policies whether each one should be stopped, resumed or
//! destroyed, applies those actions and keeps a Current/Desired view of
//! what exists for later resumption.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   reka CLI                       │
//! │               (reka run / validate)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │ run_pass
//! ┌─────────────────▼───────────────────────────────┐
//! │                  reka-cloud                      │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │   RuleSet    │  │  Provider (fan-out/join) │ │
//! │  │ rules/tags   │  │  Manager capability sets │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  ReconciliationContext: Current/Desired  │   │
//! │  │  LocalBackend | RemoteBackend(BlobStore) │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ reka-cloud-aws│
//! │  ec2, s3, S3  │
//! │  blob store   │
//! └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod manager;
pub mod pass;
pub mod provider;
pub mod resource;
pub mod rules;
pub mod state;

// Re-exports
pub use action::{Action, ActionPlan, PlanSummary};
pub use error::{CloudError, Result};
pub use manager::{Capability, CapabilitySet, Destroyer, Fetcher, Manager, StopperResumer};
pub use pass::{PassOptions, PassReport, ProviderReport, run_pass};
pub use provider::{DEFAULT_CALL_TIMEOUT, FetchOutcome, ManagerErrors, Operation, Provider};
pub use resource::{Attributes, Resource, Resources, Status, SubResources, Tags, resource_uri};
pub use rules::{
    Clock, Condition, Decision, DecisionSource, ExcludeRule, FixedClock, Rule, RuleSet,
    SharedClock, SystemClock,
};
pub use state::{
    BlobStore, LocalBackend, MemoryBlobStore, ProvidersState, ReconciliationContext,
    RemoteBackend, State, StateBackend,
};
