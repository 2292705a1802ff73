//! One backup cycle: warn the players, stop the server, archive the server
//! directory, bring the server back, then push the archives out.

pub mod archive;
pub mod upload;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::info;

use crate::control::ServerControl;
use crate::schedule::{WarningPlan, fire_warnings};
use crate::store::RemoteStore;

/// Cycle tunables. The grace period covers the server's save-and-exit after
/// the `stop` command.
pub struct CycleOptions {
    pub shutdown_grace: Duration,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(100),
        }
    }
}

/// Everything a cycle touches.
pub struct CycleContext {
    pub control: Arc<dyn ServerControl>,
    pub store: Arc<dyn RemoteStore>,
    pub source: PathBuf,
    pub staging: PathBuf,
    pub dest_folder: String,
    pub options: CycleOptions,
}

/// Runs one complete cycle for an already fixed trigger. The server restarts
/// as soon as the archive is written; uploads happen afterwards and never
/// hold the restart back.
pub async fn run_cycle(ctx: &CycleContext, trigger: DateTime<Utc>) -> Result<()> {
    let plan = WarningPlan::for_trigger(trigger);
    fire_warnings(trigger, &plan, ctx.control.as_ref()).await;
    ctx.control.send("stop").await;

    info!(
        "waiting {}s for the server to save and exit...",
        ctx.options.shutdown_grace.as_secs()
    );
    sleep(ctx.options.shutdown_grace).await;
    info!("waited");

    let name = archive::archive_file_name(trigger);
    let mut pending = archive::find_leftovers(&ctx.staging, &name)?;

    let dest = ctx.staging.join(&name);
    info!("archiving {} to {name}...", ctx.source.display());
    archive::pack_directory(&ctx.source, &dest).await?;
    info!("archived");
    pending.push(dest);

    info!("restarting server...");
    ctx.control.restart().await;

    upload::upload_archives(ctx.store.as_ref(), &ctx.dest_folder, &pending).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::{RESTART_MARKER, RecordingControl};
    use crate::store::testing::MemoryStore;
    use crate::testutil::unique_temp_dir;
    use chrono::TimeZone;
    use std::fs;

    #[tokio::test]
    async fn cycle_stops_archives_restarts_then_uploads() {
        let dir = unique_temp_dir("cycle");
        let source = dir.join("server");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("server.properties"), b"motd=hi").expect("write");
        let staging = dir.join("staging");
        fs::create_dir_all(&staging).expect("mkdir");
        fs::write(staging.join("2024-01-01 00_00 backup.tar"), b"old").expect("write");

        let control = Arc::new(RecordingControl::new());
        let store = Arc::new(MemoryStore::new());
        let ctx = CycleContext {
            control: control.clone(),
            store: store.clone(),
            source,
            staging: staging.clone(),
            dest_folder: "/backups".to_string(),
            options: CycleOptions {
                shutdown_grace: Duration::ZERO,
            },
        };
        let trigger = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        run_cycle(&ctx, trigger).await.expect("cycle");

        let events = control.events();
        assert_eq!(events.len(), 15);
        assert_eq!(events[13], "stop");
        assert_eq!(events[14], RESTART_MARKER);
        assert_eq!(
            store.uploads(),
            [
                "/backups/2024-01-01 00_00 backup.tar",
                "/backups/2024-06-01 12_00 backup.tar"
            ]
        );
        assert!(!staging.join("2024-01-01 00_00 backup.tar").exists());
        assert!(!staging.join("2024-06-01 12_00 backup.tar").exists());
    }
}
