//! Configuration management command
//!
//! Provides CLI interface to view and edit the host configuration.

use anyhow::{Context, Result};
use cli_lib::config::{self, HostConfig};
use owo_colors::OwoColorize;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = config::load()?;
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    println!("{}", "canopy Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[watcher]".yellow());
    println!(
        "  {} = {} {}",
        "stability_threshold_ms".cyan(),
        config.watcher.stability_threshold_ms,
        format!("({}ms without size change)", config.watcher.stability_threshold_ms).dimmed()
    );
    println!("  {} = {}", "poll_interval_ms".cyan(), config.watcher.poll_interval_ms);
    println!(
        "  {} = {} {}",
        "use_polling".cyan(),
        config.watcher.use_polling,
        if cfg!(target_os = "macos") {
            "(always on for macOS)".dimmed().to_string()
        } else {
            String::new()
        }
    );

    println!("\n{}", "[watcher.ignore]".yellow());
    println!("  {} = {}", "use_gitignore".cyan(), config.watcher.ignore.use_gitignore);
    println!(
        "  {} = {:?}",
        "additional_patterns".cyan(),
        config.watcher.ignore.additional_patterns
    );

    println!("\n{}", "[workspace]".yellow());
    println!("  {} = {:?}", "state_dir".cyan(), config.workspace.state_dir);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  stability_threshold_ms: 50-60,000");
    println!("  poll_interval_ms: 10-10,000 (below stability_threshold_ms)");
    println!("  state_dir: a single relative directory name");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = config::load()?;
    println!("{}", get_value(&config, key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = config::load()?;
    set_value(&mut config, key, value)?;

    // Validate before saving
    config.validate().context("Invalid configuration value")?;

    config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    println!("{}", "Note: restart running watchers for changes to take effect".yellow());

    Ok(())
}

/// Print where the config lives and whether it is in effect
pub async fn run_path() -> Result<()> {
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    if config_path.exists() {
        // Parse it so a broken file shows up here rather than at `canopy watch`
        HostConfig::load_from(&config_path)?;
        println!("{} {}", config_path.display(), "(loaded)".green());
    } else {
        println!("{} {}", config_path.display(), "(absent, defaults in effect)".dimmed());
    }
    Ok(())
}

/// Write the commented defaults to the config path, or to stdout
pub async fn run_init(force: bool, stdout: bool) -> Result<()> {
    if stdout {
        print!("{}", HostConfig::example());
        return Ok(());
    }

    let config_path = config::config_file_path().context("Could not determine config file path")?;
    if config::init_at(&config_path, force)? {
        println!("{} Wrote {}", "✓".green(), config_path.display());
    } else {
        println!(
            "{} already exists, pass --force to replace it",
            config_path.display().yellow()
        );
    }
    Ok(())
}

fn get_value(config: &HostConfig, key: &str) -> Result<String> {
    let value = match key {
        "watcher.stability_threshold_ms" => config.watcher.stability_threshold_ms.to_string(),
        "watcher.poll_interval_ms" => config.watcher.poll_interval_ms.to_string(),
        "watcher.use_polling" => config.watcher.use_polling.to_string(),
        "watcher.ignore.use_gitignore" => config.watcher.ignore.use_gitignore.to_string(),
        "watcher.ignore.additional_patterns" => config.watcher.ignore.additional_patterns.join(","),
        "workspace.state_dir" => config.workspace.state_dir.clone(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'canopy config list' to see available keys.",
            key
        ),
    };
    Ok(value)
}

fn set_value(config: &mut HostConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "watcher.stability_threshold_ms" => {
            config.watcher.stability_threshold_ms =
                value.parse().context("Invalid value: must be a positive integer")?;
        }
        "watcher.poll_interval_ms" => {
            config.watcher.poll_interval_ms =
                value.parse().context("Invalid value: must be a positive integer")?;
        }
        "watcher.use_polling" => {
            config.watcher.use_polling = value.parse().context("Invalid value: must be 'true' or 'false'")?;
        }
        "watcher.ignore.use_gitignore" => {
            config.watcher.ignore.use_gitignore =
                value.parse().context("Invalid value: must be 'true' or 'false'")?;
        }
        "watcher.ignore.additional_patterns" => {
            config.watcher.ignore.additional_patterns = value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        "workspace.state_dir" => config.workspace.state_dir = value.to_string(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'canopy config list' to see available keys.",
            key
        ),
    }
    Ok(())
}
