//! `teambalance config`: validate and scaffold balance configuration.

use std::path::Path;

use anyhow::{Context, Result, bail};
use teambalance_core::{BalanceConfig, BalanceSettings};

use crate::commands::OutputFormat;

/// Load a config file, or the defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<BalanceSettings> {
    let config = match path {
        Some(path) => BalanceConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BalanceConfig::default(),
    };
    Ok(config.resolve()?)
}

pub fn check(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let settings = load_settings(path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&settings)?),
        OutputFormat::Text => print!("{}", format_settings(&settings)),
    }
    Ok(())
}

pub fn init(output: &Path) -> Result<()> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let content = BalanceConfig::default().to_toml_string()?;
    std::fs::write(output, content).with_context(|| format!("writing {}", output.display()))?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

pub fn format_settings(settings: &BalanceSettings) -> String {
    let mut out = String::new();
    out.push_str(&format!("mode             {:?}\n", settings.mode));
    out.push_str(&format!("unbalance_limit  {}", settings.unbalance_limit));
    if !settings.limit_enabled() {
        out.push_str(" (balancing disabled)");
    }
    out.push('\n');
    out.push_str(&format!("settle_delay     {:?}\n", settings.settle_delay));
    out.push_str(&format!(
        "query_lifetime   {:?} (+{:?} travel slack)\n",
        settings.query_lifetime, settings.travel_slack
    ));
    out.push_str(&format!("incentive_bonus  {}\n", settings.incentive_bonus));
    out.push_str(&format!("developer        {}\n", settings.developer));
    out
}
