use crate::app;
use colored::Colorize;
use reka_cloud::RuleSet;
use std::path::Path;

pub async fn handle(explicit: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating configuration...".blue());

    let path = match reka_config::find_config_file(explicit) {
        Ok(path) => path,
        Err(e) => fail("Config file not found", &e),
    };
    println!("Config file: {}", path.display().to_string().cyan());

    let config = match reka_config::parse_config_file(&path) {
        Ok(config) => config,
        Err(e) => fail("Config error", &e),
    };

    let rules = match RuleSet::from_config(&config) {
        Ok(rules) => rules,
        Err(e) => fail("Rule error", &e),
    };

    if let Err(e) = app::check_providers(&config) {
        fail("Provider error", &e);
    }
    if let Err(e) = app::check_state_backend(&config) {
        fail("State backend error", &e);
    }

    println!("{}", "✓ Configuration is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Refresh interval: {}h", config.refresh_interval);
    println!("  Providers: {}", config.providers.len());
    for provider in &config.providers {
        let region = provider.region.as_deref().unwrap_or("(default)");
        println!("    - {} (region: {})", provider.name.cyan(), region);
    }
    println!("  Rules: {}", rules.len());
    for rule in rules.rules() {
        println!("    - {} ({})", rule.name.cyan(), rule.condition);
    }
    println!("  Exclude rules: {}", rules.exclude_rules().len());
    for exclude in rules.exclude_rules() {
        println!("    - {}", exclude.name.cyan());
    }
    println!(
        "  State backend: {} ({})",
        config.state_backend.kind,
        config.state_backend.path
    );

    Ok(())
}

fn fail(title: &str, error: &dyn std::fmt::Display) -> ! {
    eprintln!();
    eprintln!("{}", format!("✗ {}", title).red().bold());
    eprintln!("  {}", error);
    std::process::exit(1);
}
