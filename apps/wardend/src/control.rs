use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use warden_screen::ScreenSession;

/// Launch line for the managed server, typed into a fresh detached screen
/// session on restart. Aikar's flags, 10 GiB heap.
const LAUNCH_COMMAND: &str = "java -Xms10G -Xmx10G -XX:+UseG1GC \
    -XX:+ParallelRefProcEnabled -XX:MaxGCPauseMillis=200 \
    -XX:+UnlockExperimentalVMOptions -XX:+DisableExplicitGC -XX:+AlwaysPreTouch \
    -XX:G1NewSizePercent=30 -XX:G1MaxNewSizePercent=40 -XX:G1HeapRegionSize=8M \
    -XX:G1ReservePercent=20 -XX:G1HeapWastePercent=5 -XX:G1MixedGCCountTarget=4 \
    -XX:InitiatingHeapOccupancyPercent=15 -XX:G1MixedGCLiveThresholdPercent=90 \
    -XX:G1RSetUpdatingPauseTimePercent=5 -XX:SurvivorRatio=32 \
    -XX:+PerfDisableSharedMem -XX:MaxTenuringThreshold=1 \
    -Dusing.aikars.flags=https://mcflags.emc.gs -Daikars.new.flags=true \
    -jar server.jar nogui";

/// Capability the scheduler and backup cycle use to reach the managed
/// server. Both operations are fire-and-forget, matching the underlying
/// terminal injection: delivery is never confirmed.
#[async_trait]
pub trait ServerControl: Send + Sync {
    /// Types a command line into the server console.
    async fn send(&self, command: &str);
    /// Brings the server back up after a backup shutdown.
    async fn restart(&self);
}

/// Production implementation driving a GNU screen session.
pub struct ScreenControl {
    session: ScreenSession,
    server_dir: PathBuf,
}

impl ScreenControl {
    pub fn new(session_name: &str, server_dir: PathBuf) -> Self {
        Self {
            session: ScreenSession::new(session_name),
            server_dir,
        }
    }
}

#[async_trait]
impl ServerControl for ScreenControl {
    async fn send(&self, command: &str) {
        self.session.send(command).await;
    }

    async fn restart(&self) {
        info!("restarting server in screen session {:?}", self.session.name());
        self.session
            .launch_detached(&self.server_dir, LAUNCH_COMMAND)
            .await;
    }
}
