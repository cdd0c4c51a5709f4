//! `teambalance simulate`: replay a scripted session.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::commands::OutputFormat;
use crate::commands::config::load_settings;
use crate::report::format_report;
use crate::scenario::{Scenario, Simulation};

pub fn simulate(scenario_path: &Path, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let settings = load_settings(config)?;
    let scenario = Scenario::from_file(scenario_path)
        .with_context(|| format!("loading scenario {}", scenario_path.display()))?;

    info!(scenario = %scenario_path.display(), "running simulation");
    let report = Simulation::new(&scenario, settings)?.run()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", format_report(&report)),
    }
    Ok(())
}
