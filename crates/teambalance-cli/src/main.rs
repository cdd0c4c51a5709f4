//! teambalance: inspect balance configuration and replay scripted
//! sessions through the balance controller.
//!
//! # Usage
//!
//! ```text
//! teambalance config init --output balance.toml
//! teambalance config check --config balance.toml
//! teambalance simulate --scenario scenarios/uneven_join.toml --format json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use commands::OutputFormat;

mod commands;
mod report;
mod scenario;

#[derive(Parser)]
#[command(
    name = "teambalance",
    about = "Volunteer-based team balancing",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or generate balance configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Replay a scripted session through the controller on a virtual clock.
    ///
    /// The scenario lists sides, participants, and timed events. Each tick
    /// applies due events, delivers due auto-replies, then ticks the
    /// controller.
    Simulate {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
        /// Balance config file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load, validate, and print the effective settings
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Write the default configuration
    Init {
        #[arg(short, long, default_value = "balance.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,teambalance=debug"))?;
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Check { config, format } => {
                commands::config::check(config.as_deref(), format)
            }
            ConfigAction::Init { output } => commands::config::init(&output),
        },
        Commands::Simulate {
            scenario,
            config,
            format,
        } => commands::simulate::simulate(&scenario, config.as_deref(), format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_is_validated() {
        let cli = Cli::try_parse_from([
            "teambalance",
            "simulate",
            "--scenario",
            "s.toml",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Simulate {
                format: OutputFormat::Json,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["teambalance", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Check {
                    format: OutputFormat::Text,
                    ..
                }
            }
        ));

        assert!(
            Cli::try_parse_from(["teambalance", "config", "check", "--format", "jsno"]).is_err()
        );
        assert!(
            Cli::try_parse_from([
                "teambalance",
                "simulate",
                "--scenario",
                "s.toml",
                "--format",
                "yaml"
            ])
            .is_err()
        );
    }
}
