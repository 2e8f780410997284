//! Resource model
//!
//! A [`Resource`] is one observed cloud entity (instance, bucket, cluster,
//! volume, ...). Resources are produced by manager fetch calls on every pass
//! and only outlive the pass as entries of the persisted state document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form resource tags
pub type Tags = BTreeMap<String, String>;

/// Resource attributes (e.g. a node pool's desired size)
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Child resources keyed by the manager name that owns their kind
pub type SubResources = BTreeMap<String, Vec<Resource>>;

/// Resources of one provider keyed by manager name
pub type Resources = BTreeMap<String, Vec<Resource>>;

/// Total number of resources across all managers
pub fn count_resources(resources: &Resources) -> usize {
    resources.values().map(Vec::len).sum()
}

/// Resource URI used to match rule and exclude-rule resource filters:
/// `lowercase(provider).lowercase(manager)`
pub fn resource_uri(provider: &str, manager: &str) -> String {
    format!("{}.{}", provider.to_lowercase(), manager.to_lowercase())
}

/// Status of a resource
///
/// Driven entirely by the provider; the engine only reads it.
/// `Pending → Running → {Stopping → Stopped → Running | ShuttingDown → Destroyed}`,
/// plus `Unused` (running but idle) and `Error` (introspection failed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    Running,
    ShuttingDown,
    Destroyed,
    Stopping,
    Stopped,
    Unused,
    Error,
}

impl Status {
    /// CSS-ish class for presenting the status
    pub fn style_class(&self) -> &'static str {
        match self {
            Status::Running => "success",
            Status::Pending | Status::ShuttingDown | Status::Stopping => "info",
            _ => "danger",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Running => write!(f, "running"),
            Status::ShuttingDown => write!(f, "shutting-down"),
            Status::Destroyed => write!(f, "destroyed"),
            Status::Stopping => write!(f, "stopping"),
            Status::Stopped => write!(f, "stopped"),
            Status::Unused => write!(f, "unused"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// An observed cloud resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Resource {
    /// Unique within its (provider, manager) pair. Some kinds use IDs, others names.
    #[serde(rename = "UUID")]
    pub uuid: String,

    pub provider_name: String,

    /// Name of the manager that fetched this resource
    pub manager_name: String,

    pub region: String,

    pub zone: String,

    pub status: Status,

    /// When the resource was created on the provider
    pub creation_date: DateTime<Utc>,

    pub tags: Tags,

    pub attributes: Attributes,

    /// Parts of this resource that cannot stand alone (e.g. a cluster's node groups).
    /// They are acted upon together with their parent.
    pub sub_resources: SubResources,
}

impl Resource {
    pub fn new(
        uuid: impl Into<String>,
        provider_name: impl Into<String>,
        manager_name: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            provider_name: provider_name.into(),
            manager_name: manager_name.into(),
            creation_date: Utc::now(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn with_creation_date(mut self, creation_date: DateTime<Utc>) -> Self {
        self.creation_date = creation_date;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_sub_resources(mut self, manager: impl Into<String>, children: Vec<Resource>) -> Self {
        self.sub_resources.insert(manager.into(), children);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.status == Status::Stopped
    }

    pub fn is_unused(&self) -> bool {
        self.status == Status::Unused
    }

    /// `provider.manager`, lowercased
    pub fn uri(&self) -> String {
        resource_uri(&self.provider_name, &self.manager_name)
    }

    /// Whether every `key=value` in `tags` is present on the resource
    pub fn has_tags(&self, tags: &Tags) -> bool {
        tags.iter()
            .all(|(k, v)| self.tags.get(k).map(|actual| actual == v).unwrap_or(false))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}:{}>", self.manager_name, self.uuid)
    }
}
