use crate::output::print_json;
use anyhow::Context;
use carecomp_core::config::{Config, WarnLevel};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    println!("instance:      {}", config.instance.name);
    println!("server:        {}:{}", config.server.bind, config.server.port);
    println!("due soon days: {}", config.rules.due_soon_days);
    let disabled: Vec<String> = config
        .default_flags
        .resolved()
        .into_iter()
        .filter(|(_, on)| !on)
        .map(|(m, _)| m.to_string())
        .collect();
    if disabled.is_empty() {
        println!("default flags: all modules on");
    } else {
        println!("default flags: off for {}", disabled.join(", "));
    }
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
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
