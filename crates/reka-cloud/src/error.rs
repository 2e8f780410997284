//! Lifecycle engine error types

use thiserror::Error;

/// Lifecycle engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Rule with name `{0}` already exists")]
    DuplicateRule(String),

    #[error("Failed to fetch {manager} resources: {message}")]
    Fetch { manager: String, message: String },

    #[error("{operation} failed for {manager}: {message}")]
    Mutation {
        manager: String,
        operation: String,
        message: String,
    },

    #[error("Manager {manager} does not support {capability}")]
    MissingCapability { manager: String, capability: String },

    #[error("Manager not found: {0}")]
    ManagerNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("State backend error: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] reka_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn mutation(
        manager: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CloudError::Mutation {
            manager: manager.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
