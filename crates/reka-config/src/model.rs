//! Configuration data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Refresh interval used when the document does not set one (hours)
pub const DEFAULT_REFRESH_INTERVAL_HOURS: u32 = 4;

/// State file used when no `state-backend` node is present
pub const DEFAULT_STATE_PATH: &str = "reka-state.json";

/// Top-level reka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hours between reconciliation passes
    pub refresh_interval: u32,

    /// Directory for log files (optional)
    pub log_path: Option<PathBuf>,

    /// Enabled providers, in declaration order
    pub providers: Vec<ProviderConfig>,

    /// Where the Current/Desired state document lives
    pub state_backend: StateBackendConfig,

    /// Lifecycle rules, in declaration order
    pub rules: Vec<RuleConfig>,

    /// Exclude rules
    pub exclude: Vec<ExcludeRuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL_HOURS,
            log_path: None,
            providers: Vec::new(),
            state_backend: StateBackendConfig::default(),
            rules: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Refresh interval as a [`Duration`]
    pub fn refresh_interval_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval) * 3600)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Names of the enabled providers
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Per-provider credentials and region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (e.g. "aws")
    pub name: String,

    /// Default region for the provider's managers
    pub region: Option<String>,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,
}

impl ProviderConfig {
    /// Static credentials are only used when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

/// Kind of state backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    #[default]
    Local,
    S3,
    Gs,
    AzBlob,
}

impl StateBackendKind {
    /// Whether the state document lives in object storage
    pub fn is_remote(&self) -> bool {
        !matches!(self, StateBackendKind::Local)
    }
}

impl fmt::Display for StateBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateBackendKind::Local => write!(f, "local"),
            StateBackendKind::S3 => write!(f, "s3"),
            StateBackendKind::Gs => write!(f, "gs"),
            StateBackendKind::AzBlob => write!(f, "azblob"),
        }
    }
}

impl FromStr for StateBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "local" => Ok(StateBackendKind::Local),
            "s3" => Ok(StateBackendKind::S3),
            "gs" => Ok(StateBackendKind::Gs),
            "azblob" => Ok(StateBackendKind::AzBlob),
            other => Err(ConfigError::InvalidConfig(format!(
                "unknown state-backend type `{}` (expected local, s3, gs or azblob)",
                other
            ))),
        }
    }
}

/// State backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateBackendConfig {
    pub kind: StateBackendKind,

    /// File path (local) or object key (remote)
    pub path: String,

    /// Bucket/container name for remote backends
    pub bucket: Option<String>,

    pub region: Option<String>,
}

impl Default for StateBackendConfig {
    fn default() -> Self {
        Self {
            kind: StateBackendKind::Local,
            path: DEFAULT_STATE_PATH.to_string(),
            bucket: None,
            region: None,
        }
    }
}

/// A lifecycle rule as written in the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,

    pub condition: ConditionConfig,

    /// Tags a resource must carry (all of them) for the rule to apply
    pub tags: BTreeMap<String, String>,

    /// Resource URIs (`provider.manager`) the rule is limited to; empty means all
    pub resources: Vec<String>,

    pub region: Option<String>,
}

/// Raw condition block of a rule. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub active_duration: Option<ActiveDurationConfig>,

    pub termination_date: Option<String>,

    pub termination_policy: Option<String>,
}

impl ConditionConfig {
    /// Number of condition kinds that are set
    pub fn count(&self) -> usize {
        [
            self.active_duration.is_some(),
            self.termination_date.is_some(),
            self.termination_policy.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDurationConfig {
    pub start_time: String,
    pub stop_time: String,
}

/// Resources matching an exclude rule are ignored by every lifecycle rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRuleConfig {
    pub name: String,

    pub region: Option<String>,

    pub tags: BTreeMap<String, String>,

    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_count() {
        let mut condition = ConditionConfig::default();
        assert_eq!(condition.count(), 0);

        condition.termination_date = Some("2030-01-01".to_string());
        assert_eq!(condition.count(), 1);

        condition.termination_policy = Some("unused".to_string());
        assert_eq!(condition.count(), 2);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!(
            "S3".parse::<StateBackendKind>().unwrap(),
            StateBackendKind::S3
        );
        assert_eq!(
            "".parse::<StateBackendKind>().unwrap(),
            StateBackendKind::Local
        );
        assert!("ftp".parse::<StateBackendKind>().is_err());
        assert!(StateBackendKind::AzBlob.is_remote());
        assert!(!StateBackendKind::Local.is_remote());
    }

    #[test]
    fn test_static_credentials_require_both_halves() {
        let mut provider = ProviderConfig {
            name: "aws".to_string(),
            access_key_id: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(provider.static_credentials().is_none());

        provider.secret_access_key = Some("secret".to_string());
        assert_eq!(provider.static_credentials(), Some(("AKIA", "secret")));
    }

    #[test]
    fn test_refresh_interval_duration() {
        let config = Config::default();
        assert_eq!(config.refresh_interval_duration(), Duration::from_secs(4 * 3600));
    }
}
