//! reka.kdl parser
//!
//! Turns the KDL document into a [`Config`]. Only structural checks happen
//! here; rule semantics are validated by the rule engine.

use crate::error::{ConfigError, Result};
use crate::model::{
    ActiveDurationConfig, Config, ExcludeRuleConfig, ProviderConfig, RuleConfig,
    StateBackendConfig,
};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parse a config file
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a config document from a string
pub fn parse_config(content: &str) -> Result<Config> {
    let doc: KdlDocument = content.parse()?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "refresh-interval" => {
                let hours = first_arg(node)
                    .and_then(|v| v.as_integer())
                    .ok_or_else(|| invalid("refresh-interval needs an integer (hours)"))?;
                if hours <= 0 || hours > i128::from(u32::MAX) {
                    return Err(invalid(format!(
                        "refresh-interval must be a positive number of hours, got {}",
                        hours
                    )));
                }
                config.refresh_interval = hours as u32;
            }
            "log-path" => {
                let path = first_string(node)
                    .ok_or_else(|| invalid("log-path needs a path argument"))?;
                config.log_path = Some(PathBuf::from(path));
            }
            "provider" => {
                let provider = parse_provider(node)?;
                if config.provider(&provider.name).is_some() {
                    return Err(invalid(format!(
                        "provider `{}` is declared more than once",
                        provider.name
                    )));
                }
                config.providers.push(provider);
            }
            "state-backend" => {
                config.state_backend = parse_state_backend(node)?;
            }
            "rule" => {
                config.rules.push(parse_rule(node)?);
            }
            "exclude" => {
                config.exclude.push(parse_exclude(node)?);
            }
            other => {
                warn!(node = %other, "Ignoring unknown config node");
            }
        }
    }

    debug!(
        providers = config.providers.len(),
        rules = config.rules.len(),
        exclude = config.exclude.len(),
        "Parsed config"
    );
    Ok(config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfig(message.into())
}

fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn first_string(node: &KdlNode) -> Option<String> {
    first_arg(node).and_then(value_to_string)
}

/// All positional arguments of a node as strings
fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| value_to_string(e.value()))
        .collect()
}

/// Named property of a node as a string
fn property(node: &KdlNode, key: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value() == key).unwrap_or(false))
        .and_then(|e| value_to_string(e.value()))
}

/// Tag values may be written as strings, integers or booleans
fn value_to_string(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        return Some(s.to_string());
    }
    if let Some(i) = value.as_integer() {
        return Some(i.to_string());
    }
    value.as_bool().map(|b| b.to_string())
}

fn node_name(node: &KdlNode, kind: &str) -> Result<String> {
    first_string(node)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| invalid(format!("{} needs a name", kind)))
}

fn parse_provider(node: &KdlNode) -> Result<ProviderConfig> {
    let mut provider = ProviderConfig {
        name: node_name(node, "provider")?.to_lowercase(),
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "region" => provider.region = first_string(child),
                "access-key-id" => provider.access_key_id = first_string(child),
                "secret-access-key" => provider.secret_access_key = first_string(child),
                other => {
                    warn!(provider = %provider.name, key = %other, "Ignoring unknown provider setting")
                }
            }
        }
    }

    Ok(provider)
}

fn parse_state_backend(node: &KdlNode) -> Result<StateBackendConfig> {
    let mut backend = StateBackendConfig::default();

    if let Some(kind) = property(node, "type") {
        backend.kind = kind.parse()?;
    }
    if let Some(path) = property(node, "path") {
        backend.path = path;
    }
    backend.bucket = property(node, "bucket");
    backend.region = property(node, "region");

    if backend.path.trim().is_empty() {
        return Err(invalid("state-backend path must not be empty"));
    }
    if backend.kind.is_remote() && backend.bucket.as_deref().unwrap_or("").is_empty() {
        return Err(invalid(format!(
            "state-backend type=\"{}\" needs a bucket",
            backend.kind
        )));
    }

    Ok(backend)
}

fn parse_tags(node: &KdlNode) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let value = first_string(child).unwrap_or_default();
            tags.insert(child.name().value().to_string(), value);
        }
    }
    tags
}

/// `active-duration start="09:00" stop="17:00"` or `active-duration "09:00-17:00"`
fn parse_active_duration(rule: &str, node: &KdlNode) -> Result<ActiveDurationConfig> {
    if let (Some(start_time), Some(stop_time)) = (property(node, "start"), property(node, "stop"))
    {
        return Ok(ActiveDurationConfig {
            start_time,
            stop_time,
        });
    }

    let window = first_string(node).ok_or_else(|| {
        invalid(format!(
            "rule `{}`: active-duration needs start/stop properties or a HH:MM-HH:MM argument",
            rule
        ))
    })?;
    let parts: Vec<&str> = window.split('-').map(str::trim).collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(format!(
            "rule `{}`: active-duration `{}` must have the form HH:MM-HH:MM",
            rule, window
        )));
    }

    Ok(ActiveDurationConfig {
        start_time: parts[0].to_string(),
        stop_time: parts[1].to_string(),
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T, rule: &str, key: &str) -> Result<()> {
    if slot.is_some() {
        return Err(invalid(format!(
            "rule `{}`: {} is specified more than once",
            rule, key
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_rule(node: &KdlNode) -> Result<RuleConfig> {
    let mut rule = RuleConfig {
        name: node_name(node, "rule")?,
        ..Default::default()
    };

    let Some(children) = node.children() else {
        return Ok(rule);
    };

    for child in children.nodes() {
        let key = child.name().value();
        match key {
            "active-duration" => {
                let window = parse_active_duration(&rule.name, child)?;
                set_once(&mut rule.condition.active_duration, window, &rule.name, key)?;
            }
            "destruction-date" | "termination-date" => {
                let date = first_string(child).ok_or_else(|| {
                    invalid(format!("rule `{}`: {} needs a value", rule.name, key))
                })?;
                set_once(&mut rule.condition.termination_date, date, &rule.name, key)?;
            }
            "destruction-policy" | "termination-policy" => {
                let policy = first_string(child).ok_or_else(|| {
                    invalid(format!("rule `{}`: {} needs a value", rule.name, key))
                })?;
                set_once(&mut rule.condition.termination_policy, policy, &rule.name, key)?;
            }
            "tags" => rule.tags.extend(parse_tags(child)),
            "resources" => rule.resources.extend(string_args(child)),
            "region" => rule.region = first_string(child),
            other => {
                return Err(invalid(format!(
                    "rule `{}`: unknown setting `{}`",
                    rule.name, other
                )));
            }
        }
    }

    Ok(rule)
}

fn parse_exclude(node: &KdlNode) -> Result<ExcludeRuleConfig> {
    let mut exclude = ExcludeRuleConfig {
        name: node_name(node, "exclude")?,
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "tags" => exclude.tags.extend(parse_tags(child)),
                "resources" => exclude.resources.extend(string_args(child)),
                "region" => exclude.region = first_string(child),
                other => {
                    return Err(invalid(format!(
                        "exclude `{}`: unknown setting `{}`",
                        exclude.name, other
                    )));
                }
            }
        }
    }

    Ok(exclude)
}
