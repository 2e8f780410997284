//! Provider orchestrator
//!
//! A [`Provider`] owns the managers of one cloud account. Every fetch and
//! mutation fans out one task per manager, bounds each call with a deadline
//! and joins them all before returning. Results are collected from the
//! joined tasks, so no map is ever shared between tasks. A failing or
//! hung manager only loses its own contribution.

use crate::action::{Action, ActionPlan};
use crate::error::{CloudError, Result};
use crate::manager::{Capability, Destroyer, Manager, StopperResumer};
use crate::resource::{Resource, Resources};
use crate::rules::RuleSet;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Deadline applied to manager calls unless configured otherwise (the default refresh interval)
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(4 * 3600);

/// Errors keyed by manager name
pub type ManagerErrors = BTreeMap<String, CloudError>;

/// Mutating operation on a batch of resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Stop,
    Resume,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Stop => "stop",
            Operation::Resume => "resume",
            Operation::Destroy => "destroy",
        }
    }

    fn capability(&self) -> Capability {
        match self {
            Operation::Stop | Operation::Resume => Capability::StopResume,
            Operation::Destroy => Capability::Destroy,
        }
    }
}

enum Call {
    Destroy(Arc<dyn Destroyer>),
    Stop(Arc<dyn StopperResumer>),
    Resume(Arc<dyn StopperResumer>),
}

impl Call {
    async fn run(self, resources: Vec<Resource>) -> Result<()> {
        match self {
            Call::Destroy(destroyer) => destroyer.destroy(&resources).await,
            Call::Stop(stopper) => stopper.stop(&resources).await,
            Call::Resume(resumer) => resumer.resume(&resources).await,
        }
    }
}

/// Resources fetched from every manager plus the managers that failed
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub resources: Resources,
    pub errors: ManagerErrors,
}

/// One cloud account/project and its managers
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    managers: BTreeMap<String, Manager>,
    call_timeout: Duration,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managers: BTreeMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_manager(mut self, manager: Manager) -> Result<Self> {
        self.add_manager(manager)?;
        Ok(self)
    }

    pub fn add_manager(&mut self, manager: Manager) -> Result<()> {
        if self.managers.contains_key(manager.name()) {
            return Err(CloudError::InvalidConfig(format!(
                "manager `{}` registered twice for provider `{}`",
                manager.name(),
                self.name
            )));
        }
        self.managers.insert(manager.name().to_string(), manager);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn managers(&self) -> impl Iterator<Item = &Manager> {
        self.managers.values()
    }

    pub fn manager(&self, name: &str) -> Result<&Manager> {
        self.managers
            .get(name)
            .ok_or_else(|| CloudError::ManagerNotFound(format!("{}.{}", self.name, name)))
    }

    /// Fetch every manager concurrently, keeping the per-manager errors
    #[tracing::instrument(skip(self), fields(provider = %self.name))]
    pub async fn fetch_all(&self) -> FetchOutcome {
        let calls = self.managers.values().map(|manager| {
            let fetcher = manager.fetcher().clone();
            let name = manager.name().to_string();
            let call = async move { fetcher.get_all().await };
            (name.clone(), self.spawn_with_deadline(name, "fetch", call))
        });
        let (names, handles): (Vec<_>, Vec<_>) = calls.unzip();

        let mut outcome = FetchOutcome::default();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(resources) => {
                    debug!(manager = %name, count = resources.len(), "Fetched resources");
                    outcome.resources.insert(name, resources);
                }
                Err(e) => {
                    error!(manager = %name, error = %e, "Failed to fetch resources");
                    let e = match e {
                        CloudError::Timeout(_) | CloudError::Task(_) | CloudError::Fetch { .. } => e,
                        other => CloudError::Fetch {
                            manager: name.clone(),
                            message: other.to_string(),
                        },
                    };
                    outcome.errors.insert(name, e);
                }
            }
        }

        info!(
            managers = outcome.resources.len(),
            failed = outcome.errors.len(),
            "Fetch complete"
        );
        outcome
    }

    /// Resources of every manager; failing managers contribute nothing
    pub async fn get_all_resources(&self) -> Resources {
        self.fetch_all().await.resources
    }

    /// Resources the rules want destroyed, limited to managers that can destroy
    pub fn get_destroyable_resources(&self, resources: &Resources, rules: &RuleSet) -> Resources {
        self.select(resources, rules, Action::Destroy, Capability::Destroy)
    }

    /// Resources the rules want stopped, limited to managers that can stop
    pub fn get_stoppable_resources(&self, resources: &Resources, rules: &RuleSet) -> Resources {
        self.select(resources, rules, Action::Stop, Capability::StopResume)
    }

    /// Resources the rules want resumed, limited to managers that can resume
    pub fn get_resumable_resources(&self, resources: &Resources, rules: &RuleSet) -> Resources {
        self.select(resources, rules, Action::Resume, Capability::StopResume)
    }

    /// Resources flagged `Unused` by their manager
    pub fn get_unused_resources(&self, resources: &Resources) -> Resources {
        resources
            .iter()
            .filter_map(|(manager, list)| {
                let unused: Vec<Resource> = list.iter().filter(|r| r.is_unused()).cloned().collect();
                (!unused.is_empty()).then(|| (manager.clone(), unused))
            })
            .collect()
    }

    /// Classify every resource once into stop/resume/destroy buckets
    pub fn plan(&self, resources: &Resources, rules: &RuleSet) -> ActionPlan {
        let mut plan = ActionPlan::default();

        for (manager_name, list) in resources {
            let Some(manager) = self.managers.get(manager_name) else {
                warn!(provider = %self.name, manager = %manager_name, "Skipping resources of unknown manager");
                continue;
            };

            for resource in list {
                let Some(decision) = rules.decide(resource) else {
                    continue;
                };
                let bucket = match decision.action {
                    Action::Stop if manager.is_stoppable() => &mut plan.stop,
                    Action::Resume if manager.is_stoppable() => &mut plan.resume,
                    Action::Destroy if manager.is_destroyable() => &mut plan.destroy,
                    Action::DoNothing => continue,
                    action => {
                        debug!(
                            resource = %resource,
                            %action,
                            "Manager lacks the capability for the matched action"
                        );
                        continue;
                    }
                };
                debug!(
                    resource = %resource,
                    action = %decision.action,
                    source = %decision.source,
                    "Resource matched"
                );
                bucket
                    .entry(manager_name.clone())
                    .or_default()
                    .push(resource.clone());
            }
        }

        plan
    }

    pub async fn destroy_resources(&self, resources: &Resources) -> ManagerErrors {
        self.mutate(Operation::Destroy, resources).await
    }

    pub async fn stop_resources(&self, resources: &Resources) -> ManagerErrors {
        self.mutate(Operation::Stop, resources).await
    }

    pub async fn resume_resources(&self, resources: &Resources) -> ManagerErrors {
        self.mutate(Operation::Resume, resources).await
    }

    fn select(
        &self,
        resources: &Resources,
        rules: &RuleSet,
        action: Action,
        capability: Capability,
    ) -> Resources {
        resources
            .iter()
            .filter(|(manager, _)| {
                self.managers
                    .get(*manager)
                    .is_some_and(|m| m.has_capability(capability))
            })
            .filter_map(|(manager, list)| {
                let selected: Vec<Resource> = list
                    .iter()
                    .filter(|r| rules.resource_action(r) == action)
                    .cloned()
                    .collect();
                (!selected.is_empty()).then(|| (manager.clone(), selected))
            })
            .collect()
    }

    #[tracing::instrument(skip_all, fields(provider = %self.name, operation = %operation))]
    async fn mutate(&self, operation: Operation, resources: &Resources) -> ManagerErrors {
        let mut errors = ManagerErrors::new();
        let mut names = Vec::new();
        let mut handles = Vec::new();

        for (manager_name, list) in resources {
            if list.is_empty() {
                continue;
            }
            let manager = match self.manager(manager_name) {
                Ok(manager) => manager,
                Err(e) => {
                    errors.insert(manager_name.clone(), e);
                    continue;
                }
            };

            let call = match operation {
                Operation::Destroy => manager.destroyer().cloned().map(Call::Destroy),
                Operation::Stop => manager.stopper_resumer().cloned().map(Call::Stop),
                Operation::Resume => manager.stopper_resumer().cloned().map(Call::Resume),
            };
            let Some(call) = call else {
                if operation == Operation::Destroy {
                    errors.insert(
                        manager_name.clone(),
                        CloudError::MissingCapability {
                            manager: manager_name.clone(),
                            capability: operation.capability().to_string(),
                        },
                    );
                } else {
                    debug!(manager = %manager_name, "Manager cannot stop or resume, skipping");
                }
                continue;
            };

            info!(manager = %manager_name, count = list.len(), "Applying {}", operation);
            let batch = list.clone();
            names.push(manager_name.clone());
            handles.push(self.spawn_with_deadline(
                manager_name.clone(),
                operation.as_str(),
                call.run(batch),
            ));
        }

        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!(manager = %name, error = %e, "Failed to {} resources", operation);
                let e = match e {
                    CloudError::Timeout(_) | CloudError::Task(_) | CloudError::Mutation { .. } => e,
                    other => CloudError::mutation(&name, operation.to_string(), other.to_string()),
                };
                errors.insert(name, e);
            }
        }

        errors
    }

    /// Run `call` on its own task, bounded by the call timeout
    fn spawn_with_deadline<T, F>(
        &self,
        manager: String,
        operation: &'static str,
        call: F,
    ) -> impl Future<Output = Result<T>> + use<T, F>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let deadline = self.call_timeout;
        let provider = self.name.clone();
        let span = info_span!("manager", provider = %provider, manager = %manager);
        let task = tokio::spawn(
            async move {
                match tokio::time::timeout(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(CloudError::Timeout(format!(
                        "{} on {}.{} did not finish within {:?}",
                        operation, provider, manager, deadline
                    ))),
                }
            }
            .instrument(span),
        );

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(CloudError::Task(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Fetcher;
    use crate::resource::Status;
    use crate::rules::FixedClock;
    use async_trait::async_trait;
    use reka_config::{ActiveDurationConfig, ConditionConfig, Config, RuleConfig};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Fake {
        resources: Vec<Resource>,
        fail_fetch: bool,
        fail_mutation: bool,
        hang: bool,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl Fake {
        fn with(resources: Vec<Resource>) -> Arc<Self> {
            Arc::new(Self {
                resources,
                ..Default::default()
            })
        }

        fn record(&self, op: &str, resources: &[Resource]) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((op.to_string(), resources.len()));
            if self.fail_mutation {
                return Err(CloudError::Backend("api said no".to_string()));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for Fake {
        async fn get_all(&self) -> Result<Vec<Resource>> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_fetch {
                return Err(CloudError::Backend("credentials expired".to_string()));
            }
            Ok(self.resources.clone())
        }
    }

    #[async_trait]
    impl Destroyer for Fake {
        async fn destroy(&self, resources: &[Resource]) -> Result<()> {
            self.record("destroy", resources)
        }
    }

    #[async_trait]
    impl StopperResumer for Fake {
        async fn stop(&self, resources: &[Resource]) -> Result<()> {
            self.record("stop", resources)
        }

        async fn resume(&self, resources: &[Resource]) -> Result<()> {
            self.record("resume", resources)
        }
    }

    fn running(uuid: &str, manager: &str) -> Resource {
        Resource::new(uuid, "aws", manager).with_status(Status::Running)
    }

    fn office_hours_at(rfc3339: &str) -> RuleSet {
        let config = Config {
            rules: vec![RuleConfig {
                name: "office-hours".to_string(),
                condition: ConditionConfig {
                    active_duration: Some(ActiveDurationConfig {
                        start_time: "09:00".to_string(),
                        stop_time: "17:00".to_string(),
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        RuleSet::from_config_with_clock(&config, Arc::new(FixedClock::parse(rfc3339).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_isolates_failing_manager() {
        let broken = Arc::new(Fake {
            fail_fetch: true,
            ..Default::default()
        });
        let provider = Provider::new("aws")
            .with_manager(Manager::full("ec2", "EC2", Fake::with(vec![running("i-1", "ec2")])))
            .unwrap()
            .with_manager(Manager::full("s3", "S3", Fake::with(vec![])))
            .unwrap()
            .with_manager(Manager::new("eks", "EKS", broken))
            .unwrap();

        let outcome = provider.fetch_all().await;
        assert_eq!(outcome.resources.len(), 2);
        assert_eq!(outcome.resources["ec2"].len(), 1);
        assert!(outcome.resources["s3"].is_empty());
        assert!(matches!(outcome.errors.get("eks"), Some(CloudError::Fetch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let hung = Arc::new(Fake {
            hang: true,
            ..Default::default()
        });
        let provider = Provider::new("aws")
            .with_call_timeout(Duration::from_secs(5))
            .with_manager(Manager::new("slow", "Slow", hung))
            .unwrap()
            .with_manager(Manager::full("ec2", "EC2", Fake::with(vec![running("i-1", "ec2")])))
            .unwrap();

        let outcome = provider.fetch_all().await;
        assert_eq!(outcome.resources.len(), 1);
        assert!(matches!(outcome.errors.get("slow"), Some(CloudError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_stop_skips_managers_without_capability() {
        let fetch_only = Fake::with(vec![]);
        let full = Fake::with(vec![]);
        let provider = Provider::new("aws")
            .with_manager(Manager::new("s3", "S3", fetch_only.clone()).with_destroyer(fetch_only.clone()))
            .unwrap()
            .with_manager(Manager::full("ec2", "EC2", full.clone()))
            .unwrap();

        let resources = Resources::from([
            ("s3".to_string(), vec![running("b", "s3")]),
            ("ec2".to_string(), vec![running("i-1", "ec2"), running("i-2", "ec2")]),
        ]);
        let errors = provider.stop_resources(&resources).await;

        assert!(errors.is_empty());
        assert!(fetch_only.calls().is_empty());
        assert_eq!(full.calls(), vec![("stop".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_mutation_errors_are_collected_per_manager() {
        let failing = Arc::new(Fake {
            fail_mutation: true,
            ..Default::default()
        });
        let healthy = Fake::with(vec![]);
        let provider = Provider::new("aws")
            .with_manager(Manager::full("ec2", "EC2", failing))
            .unwrap()
            .with_manager(Manager::full("ebs", "EBS", healthy.clone()))
            .unwrap();

        let resources = Resources::from([
            ("ec2".to_string(), vec![running("i-1", "ec2")]),
            ("ebs".to_string(), vec![running("vol-1", "ebs")]),
            ("rds".to_string(), vec![running("db-1", "rds")]),
        ]);
        let errors = provider.destroy_resources(&resources).await;

        assert_eq!(healthy.calls(), vec![("destroy".to_string(), 1)]);
        assert!(matches!(
            errors.get("ec2"),
            Some(CloudError::Mutation { operation, .. }) if operation == "destroy"
        ));
        assert!(matches!(errors.get("rds"), Some(CloudError::ManagerNotFound(_))));
        assert!(!errors.contains_key("ebs"));
    }

    #[tokio::test]
    async fn test_destroy_without_capability_is_an_error() {
        let provider = Provider::new("aws")
            .with_manager(Manager::new("ami", "AMI", Fake::with(vec![])))
            .unwrap();
        let resources = Resources::from([("ami".to_string(), vec![running("ami-1", "ami")])]);

        let errors = provider.destroy_resources(&resources).await;
        assert!(matches!(errors.get("ami"), Some(CloudError::MissingCapability { .. })));
    }

    #[test]
    fn test_classification_respects_capabilities() {
        let noop = Fake::with(vec![]);
        let provider = Provider::new("aws")
            .with_manager(Manager::new("s3", "S3", noop.clone()).with_destroyer(noop.clone()))
            .unwrap()
            .with_manager(Manager::full("ec2", "EC2", noop))
            .unwrap();
        let rules = office_hours_at("2024-05-01T20:00:00+00:00");

        let resources = Resources::from([
            ("s3".to_string(), vec![running("b", "s3")]),
            ("ec2".to_string(), vec![running("i-1", "ec2")]),
        ]);

        let stoppable = provider.get_stoppable_resources(&resources, &rules);
        assert_eq!(stoppable.keys().collect::<Vec<_>>(), vec!["ec2"]);
        assert!(provider.get_resumable_resources(&resources, &rules).is_empty());
        assert!(provider.get_destroyable_resources(&resources, &rules).is_empty());

        let plan = provider.plan(&resources, &rules);
        assert_eq!(plan.summary().stop, 1);
        assert_eq!(plan.stop["ec2"][0].uuid, "i-1");
    }

    #[test]
    fn test_unused_resources() {
        let provider = Provider::new("aws");
        let resources = Resources::from([(
            "ebs".to_string(),
            vec![
                Resource::new("vol-1", "aws", "ebs").with_status(Status::Unused),
                running("vol-2", "ebs"),
            ],
        )]);
        let unused = provider.get_unused_resources(&resources);
        assert_eq!(unused["ebs"].len(), 1);
        assert_eq!(unused["ebs"][0].uuid, "vol-1");
    }

    #[test]
    fn test_duplicate_manager_rejected() {
        let noop = Fake::with(vec![]);
        let result = Provider::new("aws")
            .with_manager(Manager::new("ec2", "EC2", noop.clone()))
            .unwrap()
            .with_manager(Manager::new("ec2", "EC2 again", noop));
        assert!(matches!(result, Err(CloudError::InvalidConfig(_))));
        assert!(matches!(
            Provider::new("aws").manager("nope"),
            Err(CloudError::ManagerNotFound(name)) if name == "aws.nope"
        ));
    }
}
