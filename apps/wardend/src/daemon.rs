use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::cycle::{self, CycleContext};
use crate::retention;
use crate::schedule::overrides::TriggerOverride;
use crate::schedule::{self, Schedule};

/// The daemon: an endless chain of scheduled backup cycles.
pub struct Daemon {
    pub schedule: Schedule,
    pub trigger_override: Arc<dyn TriggerOverride>,
    pub cycle: CycleContext,
    pub keep_backups: usize,
}

/// Runs backup cycles until one of them fails.
pub async fn run(daemon: &Daemon) -> Result<()> {
    loop {
        run_once(daemon).await?;
    }
}

/// One iteration: wait for the next trigger to fix, run the cycle, then trim
/// expired remote backups.
pub async fn run_once(daemon: &Daemon) -> Result<()> {
    info!("--------------------------------------------------");
    let trigger =
        schedule::resolve_trigger(&daemon.schedule, daemon.trigger_override.as_ref()).await?;
    cycle::run_cycle(&daemon.cycle, trigger).await?;
    retention::reconcile(
        daemon.cycle.store.as_ref(),
        &daemon.cycle.dest_folder,
        daemon.keep_backups,
    )
    .await
}
