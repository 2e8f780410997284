use crate::app;
use colored::Colorize;
use reka_cloud::{PassOptions, PassReport, ReconciliationContext, RuleSet, run_pass};
use reka_config::Config;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

pub struct RunOptions {
    pub once: bool,
    pub dry_run: bool,
    pub call_timeout: Option<Duration>,
}

pub async fn handle(config: Config, options: RunOptions) -> anyhow::Result<()> {
    let rules = RuleSet::from_config(&config)?;
    let refresh = config.refresh_interval_duration();
    let call_timeout = options.call_timeout.unwrap_or(refresh);
    let providers = app::build_providers(&config, call_timeout).await?;
    let backend = app::open_state_backend(&config).await?;
    let mut ctx = ReconciliationContext::open(backend).await?;

    tracing::info!(
        providers = ?config.provider_names(),
        rules = rules.len(),
        refresh_hours = config.refresh_interval,
        call_timeout_secs = call_timeout.as_secs(),
        "Starting reka"
    );

    let pass_options = PassOptions {
        dry_run: options.dry_run,
    };

    if options.once {
        let report = run_pass(&providers, &rules, &mut ctx, pass_options).await?;
        print_report(&report);
        return Ok(());
    }

    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = run_pass(&providers, &rules, &mut ctx, pass_options).await?;
                print_report(&report);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn print_report(report: &PassReport) {
    let header = if report.dry_run {
        "Pass complete (dry run)".yellow().bold()
    } else {
        "Pass complete".green().bold()
    };
    println!("{}", header);

    for (name, provider) in &report.providers {
        println!(
            "  {}: {} fetched, {}",
            name.cyan(),
            provider.fetched,
            provider.summary()
        );
        let errors = provider
            .fetch_errors
            .iter()
            .chain(&provider.stop_errors)
            .chain(&provider.resume_errors)
            .chain(&provider.destroy_errors);
        for (manager, error) in errors {
            println!("    {} {}: {}", "✗".red(), manager, error);
        }
    }

    if report.persisted {
        println!("  state saved");
    }
}
