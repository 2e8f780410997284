//! Startup wiring shared by the commands: config, logging, providers, state backend

use anyhow::{Context, bail};
use reka_cloud::{LocalBackend, Provider, StateBackend};
use reka_config::{Config, StateBackendKind};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Providers this build knows how to construct
pub const SUPPORTED_PROVIDERS: &[&str] = &[reka_cloud_aws::PROVIDER_NAME];

/// Discover and parse the config file
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = reka_config::find_config_file(explicit)?;
    let config = reka_config::parse_config_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Install the global subscriber: stderr by default, or an append-only file
pub fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_env_filter(filter())
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter())
                .init();
        }
    }
    Ok(())
}

/// Fail on providers this build cannot construct
pub fn check_providers(config: &Config) -> anyhow::Result<()> {
    for provider in &config.providers {
        if !SUPPORTED_PROVIDERS.contains(&provider.name.as_str()) {
            bail!(
                "unsupported provider `{}` (supported: {})",
                provider.name,
                SUPPORTED_PROVIDERS.join(", ")
            );
        }
    }
    Ok(())
}

/// Build every enabled provider
pub async fn build_providers(config: &Config, call_timeout: Duration) -> anyhow::Result<Vec<Provider>> {
    check_providers(config)?;

    let mut providers = Vec::with_capacity(config.providers.len());
    for provider in &config.providers {
        let built = reka_cloud_aws::build_provider(provider, call_timeout)
            .await
            .with_context(|| format!("failed to set up provider `{}`", provider.name))?;
        providers.push(built);
    }
    Ok(providers)
}

/// Fail on state backends this build cannot open
pub fn check_state_backend(config: &Config) -> anyhow::Result<()> {
    match config.state_backend.kind {
        StateBackendKind::Local | StateBackendKind::S3 => Ok(()),
        kind => bail!("state backend `{}` is not supported (use local or s3)", kind),
    }
}

/// Open the state backend selected in the config
pub async fn open_state_backend(config: &Config) -> anyhow::Result<Arc<dyn StateBackend>> {
    check_state_backend(config)?;

    let backend: Arc<dyn StateBackend> = match config.state_backend.kind {
        StateBackendKind::S3 => Arc::new(
            reka_cloud_aws::s3_state_backend(&config.state_backend)
                .await
                .context("failed to set up s3 state backend")?,
        ),
        _ => Arc::new(LocalBackend::new(&config.state_backend.path)),
    };
    Ok(backend)
}
