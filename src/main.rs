use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;

use rust_ndnd_common::Name;
use rust_ndnd_daemon::fw::strategy::make_unversioned_strategy_name;
use rust_ndnd_daemon::fw::unsolicited_data_policy::make_policy;
use rust_ndnd_daemon::mgmt::{attach_management, AcceptAllAuthenticator};
use rust_ndnd_daemon::{Forwarder, Runtime};

/// NDN forwarding daemon
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Path to the daemon configuration file (TOML)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DaemonConfig {
    /// Content store capacity in packets.
    cs_capacity: usize,
    /// What to do with Data matching no pending Interest.
    unsolicited_data_policy: String,
    /// Strategy governing the root namespace.
    default_strategy: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cs_capacity: 65536,
            unsolicited_data_policy: "drop-all".to_string(),
            default_strategy: "best-route".to_string(),
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DaemonConfig> {
    let Some(path) = path else {
        return Ok(DaemonConfig::default());
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path.clone()))
        .build()
        .with_context(|| format!("failed to read {}", path.display()))?;
    settings
        .try_deserialize()
        .context("invalid daemon configuration")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let config = load_config(cli.config.as_ref())?;

    let local = tokio::task::LocalSet::new();
    local.run_until(run(config)).await
}

async fn run(config: DaemonConfig) -> Result<()> {
    let runtime = Runtime::new(Instant::now());
    let mut forwarder = Forwarder::new(runtime.clone());

    forwarder.cs().set_capacity(config.cs_capacity, runtime.now());
    match make_policy(&config.unsolicited_data_policy) {
        Some(policy) => forwarder.set_unsolicited_data_policy(policy),
        None => warn!(
            "unknown unsolicited-data policy {:?}, keeping drop-all",
            config.unsolicited_data_policy
        ),
    }
    forwarder
        .strategy_choice()
        .insert(
            &Name::new(),
            &make_unversioned_strategy_name(&config.default_strategy),
        )
        .with_context(|| format!("unknown strategy {:?}", config.default_strategy))?;

    let mut dispatcher = attach_management(&mut forwarder, Box::new(AcceptAllAuthenticator));
    info!(
        "ndnd running; cs capacity {}, management at /localhost/nfd",
        config.cs_capacity
    );

    loop {
        runtime.process_posts(&mut forwarder);
        dispatcher.process_pending(&mut forwarder);
        runtime
            .scheduler()
            .advance_to(&mut forwarder, Instant::now());

        let idle = runtime
            .scheduler()
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(100))
            .min(Duration::from_millis(100));

        tokio::select! {
            _ = tokio::time::sleep(idle) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}
