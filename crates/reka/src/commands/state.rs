use crate::app;
use reka_cloud::StateBackend;
use reka_config::Config;

/// Print the persisted state document as JSON
pub async fn handle(config: &Config, desired_only: bool) -> anyhow::Result<()> {
    let backend = app::open_state_backend(config).await?;
    let state = backend.get_state().await?;
    tracing::debug!(location = %backend.location(), "State loaded");

    let json = if desired_only {
        serde_json::to_string_pretty(&serde_json::json!({ "Desired": state.desired }))?
    } else {
        serde_json::to_string_pretty(&state)?
    };
    println!("{}", json);
    Ok(())
}
