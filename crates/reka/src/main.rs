mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reka")]
#[command(about = "Stop, resume and reap cloud resources from lifecycle rules", long_about = None)]
struct Cli {
    /// Config file (defaults to REKA_CONFIG_PATH, ./reka.kdl, ~/.config/reka/reka.kdl)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile resources every refresh interval
    Run {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
        /// Classify only: no stop/resume/destroy calls, state is not written
        #[arg(long)]
        dry_run: bool,
        /// Deadline for each manager call (defaults to the refresh interval)
        #[arg(long)]
        call_timeout_secs: Option<u64>,
    },
    /// Validate the config file and its rules
    Validate,
    /// List supported resources and their capabilities
    Resources,
    /// Print the persisted state document
    State {
        /// Only print the Desired section
        #[arg(long)]
        desired: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            once,
            dry_run,
            call_timeout_secs,
        } => {
            let config = app::load_config(cli.config.as_deref())?;
            let log_file = cli
                .log_file
                .or_else(|| config.log_path.as_ref().map(|dir| dir.join("reka.log")));
            app::init_logging(log_file.as_deref())?;

            let options = commands::run::RunOptions {
                once,
                dry_run,
                call_timeout: call_timeout_secs.map(std::time::Duration::from_secs),
            };
            commands::run::handle(config, options).await?;
        }
        Commands::Validate => {
            app::init_logging(cli.log_file.as_deref())?;
            commands::validate::handle(cli.config.as_deref()).await?;
        }
        Commands::Resources => {
            app::init_logging(cli.log_file.as_deref())?;
            commands::resources::handle(cli.config.as_deref()).await?;
        }
        Commands::State { desired } => {
            app::init_logging(cli.log_file.as_deref())?;
            let config = app::load_config(cli.config.as_deref())?;
            commands::state::handle(&config, desired).await?;
        }
        Commands::Version => {
            println!("reka {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
