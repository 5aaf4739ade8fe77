//! `clawlite channels` — show chat channel configuration status.
//!
//! Only Telegram is wired to a working channel implementation; see
//! `clawlite-channels`'s own documentation for which channels are
//! feature-gated but not built out.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use clawlite_core::config::load_config;

/// Channels subcommands.
#[derive(Subcommand)]
pub enum ChannelsCommands {
    /// Show configured channel accounts and their status
    Status,
}

/// Dispatch a channels subcommand.
pub fn dispatch(cmd: ChannelsCommands) -> Result<()> {
    match cmd {
        ChannelsCommands::Status => channel_status(),
    }
}

fn channel_status() -> Result<()> {
    let config = load_config(None);

    println!();
    println!("{}", "  Channels".cyan().bold());
    println!();

    let telegram = &config.channels.telegram;
    if !telegram.enabled || telegram.accounts.is_empty() {
        println!("  {:<12} {}", "telegram".bold(), "· not configured".dimmed());
    } else {
        println!("  {:<12}", "telegram".bold());
        for account in &telegram.accounts {
            let status = if account.token.is_empty() {
                "✗ no token set".red().to_string()
            } else {
                format!("{} (token set)", "✓".green())
            };
            let allowlist = if account.allowed_users.is_empty() {
                "all users".dimmed().to_string()
            } else {
                format!("{} allowed user(s)", account.allowed_users.len())
            };
            println!("    {:<16} {:<24} {}", account.name, status, allowlist);
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_module_compiles() {}
}
