use crate::app;
use colored::Colorize;
use reka_config::{Config, ProviderConfig};

/// Markdown table of every manager the configured (or supported) providers register
pub async fn handle(explicit: Option<&std::path::Path>) -> anyhow::Result<()> {
    let mut config = match reka_config::find_config_file(explicit) {
        Ok(path) => reka_config::parse_config_file(&path)?,
        Err(e) if explicit.is_some() => return Err(e.into()),
        Err(_) => Config::default(),
    };
    if config.providers.is_empty() {
        config.providers = app::SUPPORTED_PROVIDERS
            .iter()
            .map(|name| ProviderConfig {
                name: (*name).to_string(),
                region: Some(reka_cloud_aws::context::DEFAULT_REGION.to_string()),
                ..Default::default()
            })
            .collect();
    }

    let providers = app::build_providers(&config, config.refresh_interval_duration()).await?;

    println!("{}", "Supported resources".bold());
    println!();
    println!("| Provider | Resource | Name | Destroyable | Stoppable |");
    println!("|----------|----------|------|-------------|-----------|");
    for provider in &providers {
        for manager in provider.managers() {
            println!(
                "| {} | {} | {} | {} | {} |",
                provider.name(),
                manager.name(),
                manager.long_name(),
                mark(manager.is_destroyable()),
                mark(manager.is_stoppable()),
            );
        }
    }

    Ok(())
}

fn mark(flag: bool) -> &'static str {
    if flag { "✓" } else { "✗" }
}
