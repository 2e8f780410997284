//! Resource managers and their capability sets
//!
//! A manager is the per-resource-type adapter of a provider (EC2, S3, EKS, ...).
//! What a manager can do is an explicit set of capabilities rather than a
//! property of its type: every manager can fetch, most can destroy, and only
//! some can stop and resume. The orchestrator checks membership before it
//! calls into a capability.

use crate::error::Result;
use crate::resource::Resource;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Lists every resource of one kind
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Resource>>;
}

/// Permanently removes resources
#[async_trait]
pub trait Destroyer: Send + Sync {
    async fn destroy(&self, resources: &[Resource]) -> Result<()>;
}

/// Pauses and resumes resources without destroying them
#[async_trait]
pub trait StopperResumer: Send + Sync {
    async fn stop(&self, resources: &[Resource]) -> Result<()>;

    async fn resume(&self, resources: &[Resource]) -> Result<()>;
}

/// A single manager capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Fetch,
    Destroy,
    StopResume,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Fetch => write!(f, "fetch"),
            Capability::Destroy => write!(f, "destroy"),
            Capability::StopResume => write!(f, "stop/resume"),
        }
    }
}

/// The capabilities a manager instance provides
pub type CapabilitySet = BTreeSet<Capability>;

/// A resource manager: name plus its capability implementations
#[derive(Clone)]
pub struct Manager {
    name: String,
    long_name: String,
    fetcher: Arc<dyn Fetcher>,
    destroyer: Option<Arc<dyn Destroyer>>,
    stopper: Option<Arc<dyn StopperResumer>>,
}

impl Manager {
    /// A fetch-only manager
    pub fn new(
        name: impl Into<String>,
        long_name: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            long_name: long_name.into(),
            fetcher,
            destroyer: None,
            stopper: None,
        }
    }

    pub fn with_destroyer(mut self, destroyer: Arc<dyn Destroyer>) -> Self {
        self.destroyer = Some(destroyer);
        self
    }

    /// Stop/resume is only offered together with destroy
    pub fn with_lifecycle(
        mut self,
        destroyer: Arc<dyn Destroyer>,
        stopper: Arc<dyn StopperResumer>,
    ) -> Self {
        self.destroyer = Some(destroyer);
        self.stopper = Some(stopper);
        self
    }

    /// Convenience for one type implementing every capability
    pub fn full<T>(name: impl Into<String>, long_name: impl Into<String>, inner: Arc<T>) -> Self
    where
        T: Fetcher + Destroyer + StopperResumer + 'static,
    {
        Self::new(name, long_name, inner.clone()).with_lifecycle(inner.clone(), inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn destroyer(&self) -> Option<&Arc<dyn Destroyer>> {
        self.destroyer.as_ref()
    }

    pub fn stopper_resumer(&self) -> Option<&Arc<dyn StopperResumer>> {
        self.stopper.as_ref()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::from([Capability::Fetch]);
        if self.destroyer.is_some() {
            set.insert(Capability::Destroy);
        }
        if self.stopper.is_some() {
            set.insert(Capability::StopResume);
        }
        set
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::Fetch => true,
            Capability::Destroy => self.destroyer.is_some(),
            Capability::StopResume => self.stopper.is_some(),
        }
    }

    pub fn is_destroyable(&self) -> bool {
        self.has_capability(Capability::Destroy)
    }

    pub fn is_stoppable(&self) -> bool {
        self.has_capability(Capability::StopResume)
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.name)
            .field("long_name", &self.long_name)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl fmt::Display for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Fetcher for Noop {
        async fn get_all(&self) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl Destroyer for Noop {
        async fn destroy(&self, _resources: &[Resource]) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl StopperResumer for Noop {
        async fn stop(&self, _resources: &[Resource]) -> Result<()> {
            Ok(())
        }

        async fn resume(&self, _resources: &[Resource]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_fetch_only_manager() {
        let manager = Manager::new("ami", "Amazon Machine Images", Arc::new(Noop));
        assert_eq!(manager.capabilities(), CapabilitySet::from([Capability::Fetch]));
        assert!(!manager.is_destroyable());
        assert!(!manager.is_stoppable());
    }

    #[test]
    fn test_destroyable_manager() {
        let noop = Arc::new(Noop);
        let manager = Manager::new("s3", "Simple Storage Service", noop.clone()).with_destroyer(noop);
        assert!(manager.is_destroyable());
        assert!(!manager.is_stoppable());
        assert!(!manager.capabilities().contains(&Capability::StopResume));
    }

    #[test]
    fn test_full_manager() {
        let manager = Manager::full("ec2", "Elastic Compute Cloud", Arc::new(Noop));
        assert_eq!(
            manager.capabilities(),
            CapabilitySet::from([Capability::Fetch, Capability::Destroy, Capability::StopResume])
        );
        assert_eq!(manager.to_string(), "ec2");
        assert_eq!(manager.long_name(), "Elastic Compute Cloud");
    }

    #[test]
    fn test_stoppable_manager_is_always_destroyable() {
        let noop = Arc::new(Noop);
        let manager =
            Manager::new("gke", "Google Kubernetes Engine", noop.clone()).with_lifecycle(noop.clone(), noop);
        assert!(manager.is_stoppable());
        assert!(manager.is_destroyable());
        assert_eq!(manager.capabilities().len(), 3);
    }
}
