use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};
use tokio::sync::watch;

use safety_band_monitor_lib::adapters::{
    CommandDialer, ConsolePrompter, FileStatusStore, GpsdLocationProvider,
};
use safety_band_monitor_lib::config::{AppConfig, CONFIG_FILE_NAME};
use safety_band_monitor_lib::core::bluetooth::{BleStatus, BluestBackend};
use safety_band_monitor_lib::core::ports::{Collaborators, UserSession};
use safety_band_monitor_lib::core::safety::SafetyStatus;
use safety_band_monitor_lib::logging;
use safety_band_monitor_lib::state::AppState;

#[derive(Parser)]
#[command(about, version)]
struct Args {
    /// Path of the JSON config file
    #[arg(long, short = 'c', default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Signed-in user; overrides `session.user_id` from the config
    #[arg(long, short = 'u')]
    user: Option<String>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Write the effective config back to `--config` and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level)?;

    let mut config = AppConfig::load_config(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(user) = args.user {
        config.session.user_id = Some(user);
    }

    if args.write_default_config {
        config.save_config(&args.config).await?;
        info!("Config written to {}", args.config.display());
        return Ok(());
    }

    let Some(user_id) = config.session.user_id.clone() else {
        warn!("No user signed in. Pass --user or set session.user_id.");
        return Ok(());
    };

    let backend = Arc::new(BluestBackend::new().await?);
    let collaborators = Collaborators {
        store: Arc::new(FileStatusStore::new(config.store.directory.clone())),
        prompter: Arc::new(ConsolePrompter::new()),
        telephony: Arc::new(CommandDialer::new(&config.escalation)?),
        location: Arc::new(GpsdLocationProvider::new(&config.location)),
    };

    let mut state = AppState::start(UserSession::new(user_id), &config, backend, collaborators);
    let display = tokio::spawn(display_status(state.ble_status(), state.safety()));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    display.abort();
    state.shutdown().await;
    Ok(())
}

/// Logs the wearer-facing labels whenever they change.
async fn display_status(
    mut ble_status: watch::Receiver<BleStatus>,
    mut safety: watch::Receiver<SafetyStatus>,
) {
    loop {
        let status = *safety.borrow_and_update();
        info!(
            "Bluetooth: {} | status: {} (temperature ok: {}, heart rate ok: {}, fall ok: {})",
            *ble_status.borrow_and_update(),
            if status.is_safe() { "safe" } else { "unsafe" },
            status.temperature_ok,
            status.heart_rate_ok,
            status.fall_ok
        );

        tokio::select! {
            changed = ble_status.changed() => if changed.is_err() { break },
            changed = safety.changed() => if changed.is_err() { break },
        }
    }
}
