use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Handle to a named GNU screen session acting as the server's control
/// terminal.
///
/// Both operations are fire-and-forget: screen gives no feedback about
/// whether the server consumed the input, so failures are logged at warn
/// level and swallowed. Callers must not assume a command was received.
pub struct ScreenSession {
    name: String,
}

impl ScreenSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Types `line` followed by an Enter keystroke into the session.
    pub async fn send(&self, line: &str) {
        let payload = stuff_payload(line);
        let result = Command::new("screen")
            .args(["-S", &self.name, "-X", "stuff", &payload])
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                debug!("sent {:?} to screen session {:?}", line, self.name);
            }
            Ok(status) => {
                warn!(
                    "screen session {:?} did not accept {:?} ({})",
                    self.name, line, status
                );
            }
            Err(err) => warn!("failed to invoke screen for session {:?}: {}", self.name, err),
        }
    }

    /// Starts a new detached session under this name running `command`
    /// through `bash -c`, with `dir` as the working directory.
    pub async fn launch_detached(&self, dir: &Path, command: &str) {
        let result = Command::new("screen")
            .current_dir(dir)
            .args(["-S", &self.name, "-dm", "bash", "-c", command])
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                debug!("launched detached screen session {:?} in {:?}", self.name, dir);
            }
            Ok(status) => {
                warn!(
                    "screen refused to launch session {:?} in {:?} ({})",
                    self.name, dir, status
                );
            }
            Err(err) => warn!("failed to invoke screen for session {:?}: {}", self.name, err),
        }
    }
}

/// Payload for `screen -X stuff`: the line plus a carriage return, which
/// screen replays as an Enter keystroke.
fn stuff_payload(line: &str) -> String {
    format!("{line}\r")
}
