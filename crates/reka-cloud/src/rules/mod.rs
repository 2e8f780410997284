//! Rule engine
//!
//! Rules come from the config file and are validated once at load; any
//! invalid rule aborts loading. For each resource the engine returns the
//! first non-`DoNothing` action, walking configured rules in declaration
//! order and then the lifecycle tags carried by the resource itself.
//! Resources matching an exclude rule are never acted upon.

pub mod clock;
pub mod condition;
pub mod tags;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock, system_clock};
pub use condition::{ActiveWindow, Condition, TerminationPolicy};
pub use tags::TAG_NAMESPACE;

use crate::action::Action;
use crate::error::{CloudError, Result};
use crate::resource::{Resource, Tags};
use chrono::{DateTime, FixedOffset};
use reka_config::{Config, ExcludeRuleConfig, RuleConfig};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

/// A validated lifecycle rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub condition: Condition,
    /// Tags a resource must carry, all of them
    pub tags: Tags,
    /// Lowercased resource URIs; empty allows every resource
    pub resources: Vec<String>,
    pub region: Option<String>,
}

impl Rule {
    /// Convert a config rule, resolving relative dates against `now`
    pub fn from_config(config: &RuleConfig, now: DateTime<FixedOffset>) -> Result<Self> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(CloudError::invalid_rule("<unnamed>", "rule name must not be empty"));
        }

        let condition = Condition::from_config(&config.condition, now)
            .map_err(|reason| CloudError::invalid_rule(name, reason))?;

        Ok(Self {
            name: name.to_string(),
            condition,
            tags: config.tags.clone(),
            resources: normalize_uris(&config.resources),
            region: normalize_region(config.region.as_deref()),
        })
    }

    /// Whether the rule's resource, region and tag filters admit `resource`
    pub fn applies_to(&self, resource: &Resource) -> bool {
        uri_allowed(&self.resources, resource)
            && region_allowed(self.region.as_deref(), resource)
            && resource.has_tags(&self.tags)
    }

    pub fn check(&self, resource: &Resource, now: DateTime<FixedOffset>) -> Action {
        if !self.applies_to(resource) {
            return Action::DoNothing;
        }
        self.condition.evaluate(resource, now)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.condition)
    }
}

/// Resources matching every filter of an exclude rule are left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeRule {
    pub name: String,
    pub region: Option<String>,
    pub tags: Tags,
    pub resources: Vec<String>,
}

impl ExcludeRule {
    pub fn from_config(config: &ExcludeRuleConfig) -> Self {
        Self {
            name: config.name.trim().to_string(),
            region: normalize_region(config.region.as_deref()),
            tags: config.tags.clone(),
            resources: normalize_uris(&config.resources),
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        uri_allowed(&self.resources, resource)
            && region_allowed(self.region.as_deref(), resource)
            && resource.has_tags(&self.tags)
    }
}

/// Which rule produced a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionSource {
    Rule(String),
    Tag(&'static str),
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::Rule(name) => write!(f, "rule `{}`", name),
            DecisionSource::Tag(kind) => write!(f, "tag `{}{}`", TAG_NAMESPACE, kind),
        }
    }
}

/// Action picked for a resource and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub source: DecisionSource,
}

/// The loaded rules, exclude rules and the clock they are evaluated against
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    exclude: Vec<ExcludeRule>,
    clock: SharedClock,
}

impl RuleSet {
    /// Build a rule set, rejecting duplicate rule names
    pub fn new(rules: Vec<Rule>, exclude: Vec<ExcludeRule>, clock: SharedClock) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(CloudError::DuplicateRule(rule.name.clone()));
            }
        }

        Ok(Self {
            rules,
            exclude,
            clock,
        })
    }

    /// A rule set with nothing in it; only resource tags can trigger actions
    pub fn empty(clock: SharedClock) -> Self {
        Self {
            rules: Vec::new(),
            exclude: Vec::new(),
            clock,
        }
    }

    /// Load every rule of `config` against the system clock
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_clock(config, system_clock())
    }

    /// Load every rule of `config`. All or nothing: the first invalid rule is returned as an error.
    #[tracing::instrument(skip_all, fields(rules = config.rules.len(), exclude = config.exclude.len()))]
    pub fn from_config_with_clock(config: &Config, clock: SharedClock) -> Result<Self> {
        let now = clock.now();
        let rules = config
            .rules
            .iter()
            .map(|rule| Rule::from_config(rule, now))
            .collect::<Result<Vec<_>>>()?;
        let exclude = config.exclude.iter().map(ExcludeRule::from_config).collect();

        let set = Self::new(rules, exclude, clock)?;
        for rule in &set.rules {
            debug!(rule = %rule, "Loaded rule");
        }
        info!(rules = set.rules.len(), exclude = set.exclude.len(), "Rules loaded");
        Ok(set)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn exclude_rules(&self) -> &[ExcludeRule] {
        &self.exclude
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn is_excluded(&self, resource: &Resource) -> bool {
        self.exclude.iter().any(|rule| rule.matches(resource))
    }

    /// First non-`DoNothing` decision for `resource`, if any
    pub fn decide(&self, resource: &Resource) -> Option<Decision> {
        if self.is_excluded(resource) {
            return None;
        }

        let now = self.clock.now();
        let from_rules = self.rules.iter().find_map(|rule| {
            let action = rule.check(resource, now);
            (action != Action::DoNothing).then(|| Decision {
                action,
                source: DecisionSource::Rule(rule.name.clone()),
            })
        });
        if from_rules.is_some() {
            return from_rules;
        }

        tags::tag_conditions(resource, *now.offset())
            .into_iter()
            .find_map(|condition| {
                let action = condition.evaluate(resource, now);
                (action != Action::DoNothing).then(|| Decision {
                    action,
                    source: DecisionSource::Tag(condition.kind()),
                })
            })
    }

    /// The action to take on `resource`
    pub fn resource_action(&self, resource: &Resource) -> Action {
        self.decide(resource)
            .map(|decision| decision.action)
            .unwrap_or_default()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules)
            .field("exclude", &self.exclude)
            .finish()
    }
}

fn normalize_uris(uris: &[String]) -> Vec<String> {
    uris.iter()
        .map(|uri| uri.trim().to_lowercase())
        .filter(|uri| !uri.is_empty())
        .collect()
}

fn normalize_region(region: Option<&str>) -> Option<String> {
    region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_lowercase)
}

fn uri_allowed(uris: &[String], resource: &Resource) -> bool {
    uris.is_empty() || uris.contains(&resource.uri())
}

fn region_allowed(region: Option<&str>, resource: &Resource) -> bool {
    region.is_none_or(|region| resource.region.eq_ignore_ascii_case(region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Status;
    use reka_config::{ActiveDurationConfig, ConditionConfig};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn clock_at(rfc3339: &str) -> SharedClock {
        Arc::new(FixedClock::parse(rfc3339).unwrap())
    }

    fn window_rule(name: &str, resources: &[&str]) -> RuleConfig {
        RuleConfig {
            name: name.to_string(),
            condition: ConditionConfig {
                active_duration: Some(ActiveDurationConfig {
                    start_time: "09:00".to_string(),
                    stop_time: "17:00".to_string(),
                }),
                ..Default::default()
            },
            resources: resources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn date_rule(name: &str, date: &str) -> RuleConfig {
        RuleConfig {
            name: name.to_string(),
            condition: ConditionConfig {
                termination_date: Some(date.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn config(rules: Vec<RuleConfig>, exclude: Vec<ExcludeRuleConfig>) -> Config {
        Config {
            rules,
            exclude,
            ..Default::default()
        }
    }

    #[test]
    fn test_allow_list_filters_by_uri() {
        let set = RuleSet::from_config_with_clock(
            &config(vec![window_rule("ec2-only", &["AWS.EC2"])], vec![]),
            clock_at("2024-05-01T20:00:00+00:00"),
        )
        .unwrap();

        let bucket = Resource::new("b", "aws", "s3")
            .with_status(Status::Running)
            .with_tag("env", "dev");
        let instance = Resource::new("i-1", "aws", "ec2").with_status(Status::Running);

        assert_eq!(set.resource_action(&bucket), Action::DoNothing);
        assert_eq!(set.resource_action(&instance), Action::Stop);
    }

    #[test]
    fn test_rule_tags_must_all_match() {
        let mut rule = window_rule("dev-hours", &[]);
        rule.tags = BTreeMap::from([
            ("env".to_string(), "dev".to_string()),
            ("team".to_string(), "web".to_string()),
        ]);
        let set = RuleSet::from_config_with_clock(
            &config(vec![rule], vec![]),
            clock_at("2024-05-01T20:00:00+00:00"),
        )
        .unwrap();

        let partial = Resource::new("i-1", "aws", "ec2")
            .with_status(Status::Running)
            .with_tag("env", "dev");
        let full = partial.clone().with_tag("team", "web");

        assert_eq!(set.resource_action(&partial), Action::DoNothing);
        assert_eq!(set.resource_action(&full), Action::Stop);
    }

    #[test]
    fn test_region_filter() {
        let mut rule = date_rule("expire", "2020-01-01");
        rule.region = Some("us-east-2".to_string());
        let set = RuleSet::from_config_with_clock(
            &config(vec![rule], vec![]),
            clock_at("2024-05-01T12:00:00+00:00"),
        )
        .unwrap();

        let ohio = Resource::new("i-1", "aws", "ec2").with_region("US-EAST-2");
        let oregon = Resource::new("i-2", "aws", "ec2").with_region("us-west-2");
        assert_eq!(set.resource_action(&ohio), Action::Destroy);
        assert_eq!(set.resource_action(&oregon), Action::DoNothing);
    }

    #[test]
    fn test_exclude_rule_wins() {
        let exclude = ExcludeRuleConfig {
            name: "protected".to_string(),
            tags: BTreeMap::from([("keep".to_string(), "true".to_string())]),
            resources: vec!["aws.ec2".to_string()],
            ..Default::default()
        };
        let set = RuleSet::from_config_with_clock(
            &config(vec![date_rule("expire", "2020-01-01")], vec![exclude]),
            clock_at("2024-05-01T12:00:00+00:00"),
        )
        .unwrap();

        let kept = Resource::new("i-1", "aws", "ec2")
            .with_tag("keep", "true")
            .with_tag("reka-destruction-policy", "unused")
            .with_status(Status::Unused);
        let other_kind = Resource::new("b", "aws", "s3").with_tag("keep", "true");
        let untagged = Resource::new("i-2", "aws", "ec2");

        assert!(set.is_excluded(&kept));
        assert_eq!(set.resource_action(&kept), Action::DoNothing);
        assert_eq!(set.resource_action(&other_kind), Action::Destroy);
        assert_eq!(set.resource_action(&untagged), Action::Destroy);
    }

    #[test]
    fn test_declaration_order_decides() {
        let mut window = window_rule("office-hours", &[]);
        window.tags = BTreeMap::from([("env".to_string(), "dev".to_string())]);
        let set = RuleSet::from_config_with_clock(
            &config(vec![window, date_rule("expire", "2020-01-01")], vec![]),
            clock_at("2024-05-01T20:00:00+00:00"),
        )
        .unwrap();

        let dev = Resource::new("i-1", "aws", "ec2")
            .with_status(Status::Running)
            .with_tag("env", "dev");
        let decision = set.decide(&dev).unwrap();
        assert_eq!(decision.action, Action::Stop);
        assert_eq!(decision.source, DecisionSource::Rule("office-hours".to_string()));

        let prod = Resource::new("i-2", "aws", "ec2").with_status(Status::Running);
        assert_eq!(set.resource_action(&prod), Action::Destroy);
    }

    #[test]
    fn test_tag_conditions_apply_after_rules() {
        let set = RuleSet::empty(clock_at("2024-05-01T20:00:00+00:00"));
        let tagged = Resource::new("i-1", "aws", "ec2")
            .with_status(Status::Running)
            .with_tag("Reka-Active-Duration", "09:00-17:00");

        let decision = set.decide(&tagged).unwrap();
        assert_eq!(decision.action, Action::Stop);
        assert_eq!(decision.source.to_string(), "tag `reka-active-duration`");
        assert!(set.decide(&Resource::new("i-2", "aws", "ec2")).is_none());
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let result = RuleSet::from_config_with_clock(
            &config(
                vec![date_rule("expire", "2030-01-01"), date_rule("expire", "2031-01-01")],
                vec![],
            ),
            clock_at("2024-05-01T12:00:00+00:00"),
        );
        assert!(matches!(result, Err(CloudError::DuplicateRule(name)) if name == "expire"));
    }

    #[test]
    fn test_invalid_rule_aborts_loading() {
        let mut both = date_rule("both", "2030-01-01");
        both.condition.termination_policy = Some("unused".to_string());
        let result = RuleSet::from_config_with_clock(
            &config(vec![date_rule("fine", "2030-01-01"), both], vec![]),
            clock_at("2024-05-01T12:00:00+00:00"),
        );
        assert!(matches!(result, Err(CloudError::InvalidRule { rule, .. }) if rule == "both"));

        let result = RuleSet::from_config_with_clock(
            &config(vec![date_rule("bad-date", "the day after")], vec![]),
            clock_at("2024-05-01T12:00:00+00:00"),
        );
        assert!(matches!(result, Err(CloudError::InvalidRule { .. })));

        let empty = RuleConfig {
            name: "nothing".to_string(),
            ..Default::default()
        };
        let result = RuleSet::from_config_with_clock(
            &config(vec![empty], vec![]),
            clock_at("2024-05-01T12:00:00+00:00"),
        );
        assert!(matches!(result, Err(CloudError::InvalidRule { .. })));
    }

    #[test]
    fn test_relative_date_resolves_at_load() {
        let set = RuleSet::from_config_with_clock(
            &config(vec![date_rule("soon", "10h")], vec![]),
            clock_at("2024-05-01T12:00:00+00:00"),
        )
        .unwrap();

        assert_eq!(
            set.rules()[0].condition,
            Condition::TerminationDate(
                DateTime::parse_from_rfc3339("2024-05-01T22:00:00+00:00").unwrap()
            )
        );
        assert_eq!(
            set.resource_action(&Resource::new("i-1", "aws", "ec2")),
            Action::DoNothing
        );
    }
}
