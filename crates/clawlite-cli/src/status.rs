//! `clawlite status` — show configuration and provider status.

use anyhow::Result;
use colored::Colorize;

use clawlite_core::config::{get_config_path, load_config};
use clawlite_providers::registry::PROVIDERS;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "ClawLite Status".cyan().bold());
    println!();

    let config_exists = config_path.exists();
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_exists {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    let workspace = std::path::Path::new(&config.workspace);
    println!(
        "  {:<18} {} {}",
        "Workspace:".bold(),
        workspace.display(),
        if workspace.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    let state = std::path::Path::new(&config.state);
    println!(
        "  {:<18} {} {}",
        "State:".bold(),
        state.display(),
        if state.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    println!("  {:<18} {}", "Model:".bold(), config.agents.defaults.model);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.agents.defaults.temperature).dimmed(),
        format!("{}", config.agents.defaults.max_tokens).dimmed(),
    );

    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = config.providers.to_map();

    for spec in PROVIDERS {
        let status = if let Some(prov_config) = providers_map.get(spec.name) {
            if prov_config.is_configured() {
                format!("{} (key set)", "✓".green())
            } else {
                "· not configured".dimmed().to_string()
            }
        } else {
            "· not configured".dimmed().to_string()
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    println!();
    let brave_status = if config.tools.web.search.api_key.is_empty() {
        "· not configured".dimmed().to_string()
    } else {
        format!("{} (key set)", "✓".green())
    };
    println!("  {:<18} {}", "Brave Search:".bold(), brave_status);

    println!();
    println!(
        "  {:<18} http://{}:{} {}",
        "Gateway:".bold(),
        config.gateway.host,
        config.gateway.port,
        if config.gateway.bearer_token.is_empty() {
            "(no bearer token set)".red().to_string()
        } else {
            "✓ bearer token set".green().to_string()
        }
    );

    println!();

    Ok(())
}
