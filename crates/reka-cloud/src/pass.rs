//! One reconciliation pass
//!
//! fetch → classify → stop → resume → destroy → reconcile → persist

use crate::action::{ActionPlan, PlanSummary};
use crate::error::Result;
use crate::provider::{ManagerErrors, Provider};
use crate::resource::{Resources, count_resources};
use crate::rules::RuleSet;
use crate::state::{ProvidersState, ReconciliationContext, State};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct PassOptions {
    /// Classify and reconcile only: no manager mutations, no persistence
    pub dry_run: bool,
}

/// What happened to one provider during a pass
#[derive(Debug, Default)]
pub struct ProviderReport {
    pub fetched: usize,
    pub fetch_errors: ManagerErrors,
    pub plan: ActionPlan,
    pub stop_errors: ManagerErrors,
    pub resume_errors: ManagerErrors,
    pub destroy_errors: ManagerErrors,
}

impl ProviderReport {
    pub fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }

    pub fn error_count(&self) -> usize {
        self.fetch_errors.len()
            + self.stop_errors.len()
            + self.resume_errors.len()
            + self.destroy_errors.len()
    }
}

/// Outcome of a pass, per provider
#[derive(Debug, Default)]
pub struct PassReport {
    pub providers: BTreeMap<String, ProviderReport>,
    pub dry_run: bool,
    pub persisted: bool,
}

impl PassReport {
    pub fn has_errors(&self) -> bool {
        self.providers.values().any(|p| p.error_count() > 0)
    }

    pub fn fetched(&self) -> usize {
        self.providers.values().map(|p| p.fetched).sum()
    }
}

/// Run one pass over `providers`.
///
/// Fetch and mutation failures are recorded in the report; only a state
/// write failure makes the pass itself fail.
#[tracing::instrument(skip_all, fields(providers = providers.len(), dry_run = options.dry_run))]
pub async fn run_pass(
    providers: &[Provider],
    rules: &RuleSet,
    ctx: &mut ReconciliationContext,
    options: PassOptions,
) -> Result<PassReport> {
    let fetched = join_all(providers.iter().map(|p| p.fetch_all())).await;

    let mut report = PassReport {
        dry_run: options.dry_run,
        ..Default::default()
    };
    let mut current = ProvidersState::new();

    for (provider, outcome) in providers.iter().zip(fetched) {
        let mut plan = provider.plan(&outcome.resources, rules);
        plan.resume = with_desired_attributes(ctx.state(), provider.name(), &plan.resume);
        let mut provider_report = ProviderReport {
            fetched: count_resources(&outcome.resources),
            fetch_errors: outcome.errors,
            ..Default::default()
        };

        info!(
            provider = %provider.name(),
            fetched = provider_report.fetched,
            plan = %plan.summary(),
            "Resources classified"
        );

        if options.dry_run {
            info!(provider = %provider.name(), "Dry run, skipping actions");
        } else {
            provider_report.stop_errors = provider.stop_resources(&plan.stop).await;
            provider_report.resume_errors = provider.resume_resources(&plan.resume).await;
            provider_report.destroy_errors = provider.destroy_resources(&plan.destroy).await;
        }

        provider_report.plan = plan;
        current.insert(provider.name().to_string(), outcome.resources);
        report
            .providers
            .insert(provider.name().to_string(), provider_report);
    }

    ctx.reconcile(current);
    if options.dry_run {
        return Ok(report);
    }

    ctx.persist().await?;
    report.persisted = true;

    if report.has_errors() {
        warn!("Pass finished with errors");
    } else {
        info!(fetched = report.fetched(), "Pass finished");
    }
    Ok(report)
}

/// Overlay the attributes recorded in Desired onto a resume batch, so managers
/// restore what was there before the stop (e.g. a node pool's size)
fn with_desired_attributes(state: &State, provider: &str, resumable: &Resources) -> Resources {
    resumable
        .iter()
        .map(|(manager, resources)| {
            let restored = resources
                .iter()
                .map(|resource| {
                    let mut resource = resource.clone();
                    if let Some(desired) = state.desired_resource(provider, manager, &resource.uuid) {
                        resource.attributes.extend(desired.attributes.clone());
                    }
                    resource
                })
                .collect();
            (manager.clone(), restored)
        })
        .collect()
}
