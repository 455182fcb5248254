//! xrisk CLI - exposure, VaR and SIMM runs
//!
//! # Commands
//!
//! - `xrisk exposure` - simulate the configured portfolio and print EPE/ENE
//!   profiles and XVA per netting set
//! - `xrisk var --sensitivities <file> --covariance <file>` - parametric VaR
//! - `xrisk simm --crif <file> --simm-config <file>` - SIMM per netting set
//!
//! As the service layer, this crate only wires configuration and files into
//! the library crates.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use config::Config;

/// xrisk cross-asset exposure and risk analytics
#[derive(Parser)]
#[command(name = "xrisk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; the embedded default when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate, build the NPV cube and aggregate exposures and XVA
    Exposure {
        /// Monte Carlo samples, overriding the configuration
        #[arg(short, long)]
        samples: Option<usize>,

        /// Path generator seed, overriding the configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Write the simulated scenarios to this CSV file
        #[arg(long)]
        write_scenarios: Option<PathBuf>,
    },

    /// Parametric VaR from a sensitivity file and a covariance file
    Var {
        /// Sensitivity CSV
        #[arg(long)]
        sensitivities: PathBuf,

        /// Covariance CSV (Factor1,Factor2,Covariance)
        #[arg(long)]
        covariance: PathBuf,

        /// Trade to portfolio CSV (TradeId,PortfolioId); one portfolio per trade when omitted
        #[arg(long)]
        portfolios: Option<PathBuf>,

        /// Portfolio filter, exact or prefix ending in `*`
        #[arg(long)]
        filter: Option<String>,
    },

    /// SIMM from a CRIF file
    Simm {
        /// CRIF CSV
        #[arg(long)]
        crif: PathBuf,

        /// SIMM parameters (TOML)
        #[arg(long)]
        simm_config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())
        .context("loading configuration")?
        .with_env_override()
        .context("applying environment overrides")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Exposure {
            samples,
            seed,
            write_scenarios,
        } => {
            let mut config = config;
            if let Some(n) = samples {
                config.run.samples = n;
            }
            if let Some(s) = seed {
                config.run.seed = s;
            }
            config.validate().context("validating configuration")?;
            commands::exposure::run(&config, write_scenarios.as_deref())
        }
        Commands::Var {
            sensitivities,
            covariance,
            portfolios,
            filter,
        } => commands::var::run(&config, &sensitivities, &covariance, portfolios.as_deref(), filter.as_deref()),
        Commands::Simm { crif, simm_config } => commands::simm::run(&crif, &simm_config),
    }
}
