// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchyard - cost-aware query routing.
//!
//! Operator CLI over the router's configuration and persisted state.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod classify;
mod report;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchyard_config::SwitchyardConfig;
use switchyard_cost::ReportPeriod;
use tracing_subscriber::EnvFilter;

/// Switchyard - cost-aware query routing.
#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and storage.
    Check,
    /// Show how a query would be classified, without routing it.
    Classify {
        /// Query text.
        text: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Spend, savings, and path counts from the cost ledger.
    Report {
        /// Reporting window: today, month, budget, or all.
        #[arg(long, default_value = "budget")]
        period: ReportPeriod,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Learned per-class statistics for each configured provider.
    Profiles {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            switchyard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.engine.log_level);

    let use_color = !cli.plain && std::io::stdout().is_terminal();
    let result = match cli.command {
        Commands::Check => check::run_check(&config, use_color).await,
        Commands::Classify { text, json } => classify::run_classify(&config, &text, json),
        Commands::Report { period, json } => {
            report::run_report(&config, period, json, use_color).await
        }
        Commands::Profiles { json } => report::run_profiles(&config, json, use_color).await,
    };

    if let Err(e) = result {
        eprintln!("switchyard: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<SwitchyardConfig, Vec<switchyard_config::ConfigError>> {
    match path {
        Some(path) => switchyard_config::load_and_validate_path(path),
        None => switchyard_config::load_and_validate(),
    }
}

/// `RUST_LOG` wins; otherwise our crates log at `level` and everything else at warn.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_filter(level: &str) -> String {
    format!("switchyard={level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_defaults_to_budget_period() {
        let cli = Cli::try_parse_from(["switchyard", "report"]).unwrap();
        match cli.command {
            Commands::Report { period, json } => {
                assert_eq!(period, ReportPeriod::Budget);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn report_period_parses_snake_case() {
        let cli =
            Cli::try_parse_from(["switchyard", "report", "--period", "today", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report {
                period: ReportPeriod::Today,
                json: true
            }
        ));
        assert!(Cli::try_parse_from(["switchyard", "report", "--period", "weekly"]).is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "switchyard",
            "classify",
            "hello there",
            "--plain",
            "--config",
            "/tmp/switchyard.toml",
        ])
        .unwrap();
        assert!(cli.plain);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/switchyard.toml")));
    }

    #[test]
    fn default_filter_scopes_level_to_our_crates() {
        assert_eq!(default_filter("debug"), "switchyard=debug,warn");
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.toml");
        std::fs::write(
            &path,
            "[[providers]]\nid = \"local-small\"\ntier = \"free\"\ncost_per_unit = 0.0005\n",
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].id, "local-small");
    }
}
