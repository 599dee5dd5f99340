//! Effective configuration display.

use anyhow::Result;
use console::style;
use serde_json::json;
use tungs_core::session::RetryPolicy;
use tungs_infra::filesystem::config_path;
use tungs_types::profile::Plan;

use super::output::print_json;
use crate::state::AppState;

/// Print the configuration in effect, after defaults and overrides.
///
/// The API token is never printed, only whether one is set.
pub async fn show(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;
    let path = config_path(&state.data_dir);
    let has_token = config.backend.api_token.is_some();
    let retry = RetryPolicy::from(&config.retry);

    if json {
        return print_json(&json!({
            "config_path": path.display().to_string(),
            "config_file_exists": tokio::fs::try_exists(&path).await.unwrap_or(false),
            "api_token_set": has_token,
            "config": config,
        }));
    }

    println!();
    println!("  {} {}", style("Config:").bold(), style(path.display()).cyan());
    println!();
    println!("  {}", style("── Backend ──").dim());
    println!("  URL:        {}", config.backend.base_url);
    println!("  Timeout:    {}s", config.backend.timeout_secs);
    println!(
        "  API token:  {}",
        if has_token {
            style("set").green()
        } else {
            style("not set").dim()
        }
    );
    println!();
    println!("  {}", style("── Quota ──").dim());
    for plan in Plan::ALL {
        println!("  {:<10}  {}", plan.as_str(), config.quota.limit(plan));
    }
    println!();
    println!("  {}", style("── Retry ──").dim());
    println!("  Retries:    {}", retry.max_retries());
    println!("  Backoff:    {}ms", retry.backoff().as_millis());
    println!();
    println!("  {}", style("── Cache ──").dim());
    println!("  Key:        {}", config.cache.key);
    println!();

    Ok(())
}
