//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use nfex_core::models::NfexConfig;

use super::default_config_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a configuration value
    Get {
        /// Dotted key (e.g., "batch.failure_policy")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Dotted key (e.g., "report.print_cap")
        key: String,
        /// New value, as JSON or a bare string
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(&path, init_args.force),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

fn load_or_default(path: &Path) -> anyhow::Result<NfexConfig> {
    if path.exists() {
        Ok(NfexConfig::from_file(path)?)
    } else {
        Ok(NfexConfig::default())
    }
}

/// Look up a dotted key in the JSON form of the configuration.
fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.').try_fold(json, |current, part| {
        current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

/// Replace the value at a dotted key and check the result still parses.
fn update(config: &NfexConfig, key: &str, value: Value) -> anyhow::Result<NfexConfig> {
    let mut json = serde_json::to_value(config)?;
    let (parent_key, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };

    let mut parent = &mut json;
    if let Some(parent_key) = parent_key {
        for part in parent_key.split('.') {
            parent = parent
                .get_mut(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;
        }
    }

    let object = parent
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Cannot set value at non-object path: {}", key))?;
    if !object.contains_key(leaf) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    object.insert(leaf.to_string(), value);

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }

    let config = load_or_default(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    NfexConfig::default().save(path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        path.display()
    );

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(load_or_default(path)?)?;
    println!("{}", serde_json::to_string_pretty(lookup(&json, key)?)?);

    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let config = update(&load_or_default(path)?, key, parsed.clone())?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed)?
    );

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'nfex config init' to create a configuration file.");
    }

    Ok(())
}
