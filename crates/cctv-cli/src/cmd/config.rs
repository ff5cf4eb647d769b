use crate::output::print_json;
use cctv_core::config::{Config, WarnLevel};
use clap::Subcommand;
use std::path::Path;

use super::load_config;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config (file merged with defaults)
    Show,

    /// Validate the config for common mistakes
    Check,

    /// Write a default config file if none exists
    Init,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(path, json),
        ConfigSubcommand::Check => check(path, json),
        ConfigSubcommand::Init => init(path),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(path)?;
    if json {
        print_json(&config)
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path) -> anyhow::Result<()> {
    let data = serde_yaml::to_string(&Config::default())?;
    if cctv_core::io::write_if_missing(path, data.as_bytes())? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("{} already exists; leaving it unchanged", path.display());
    }
    Ok(())
}
