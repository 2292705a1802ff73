//! wardend keeps a screen-hosted Minecraft server backed up: it warns the
//! players, stops the server once a day, archives the server directory,
//! restarts the server, pushes the archive to Dropbox, and trims old remote
//! backups.

mod config;
mod control;
mod cycle;
mod daemon;
mod lock;
mod retention;
mod schedule;
mod store;
#[cfg(test)]
mod testutil;

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{CONFIG_FILE, CREDENTIALS_FILE, Config, DropboxKeys};
use control::ScreenControl;
use cycle::{CycleContext, CycleOptions};
use schedule::Schedule;
use schedule::overrides::{FileTriggerOverride, SIDE_FILE};
use warden_dropbox::DropboxClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        error!("wardend exited: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let Some(config) = config::load_or_init::<Config>(Path::new(CONFIG_FILE))? else {
        info!("wrote a template {CONFIG_FILE}, fill it in and restart");
        return Ok(());
    };
    let Some(keys) = config::load_or_init::<DropboxKeys>(Path::new(CREDENTIALS_FILE))? else {
        info!("wrote a template {CREDENTIALS_FILE}, fill it in and restart");
        return Ok(());
    };
    config.validate()?;
    keys.validate()?;

    let _lock = match lock::acquire(&config.staging_path) {
        Ok(guard) => guard,
        Err(err) if err.kind() == ErrorKind::WouldBlock => {
            warn!("another wardend already holds the lock, exiting");
            return Ok(());
        }
        Err(err) => return Err(err).context("could not take the daemon lock"),
    };

    let store = DropboxClient::new(&keys.app_key, &keys.app_secret, &keys.refresh_token)?;
    let control = ScreenControl::new(
        &config.minecraft_server_screen_name,
        config.source_path.clone(),
    );
    let side = FileTriggerOverride::new(config.staging_path.join(SIDE_FILE));

    info!(
        "wardend watching screen session {:?}, backing up {} to {}",
        config.minecraft_server_screen_name,
        config.source_path.display(),
        config.dropbox_dest_path
    );

    let daemon = daemon::Daemon {
        schedule: Schedule::default(),
        trigger_override: Arc::new(side),
        cycle: CycleContext {
            control: Arc::new(control),
            store: Arc::new(store),
            source: config.source_path.clone(),
            staging: config.staging_path.clone(),
            dest_folder: config.dropbox_dest_path.clone(),
            options: CycleOptions::default(),
        },
        keep_backups: retention::KEEP_BACKUPS,
    };
    daemon::run(&daemon).await
}
