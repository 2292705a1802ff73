use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Side file next to the staging directory holding the currently scheduled
/// trigger. Operators overwrite it to move the next backup.
pub const SIDE_FILE: &str = "next_backup.txt";

const SIDE_FILE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Lets an operator move a scheduled trigger while the daemon waits on it.
#[async_trait]
pub trait TriggerOverride: Send + Sync {
    /// Announces the default trigger so the operator has a value to edit.
    async fn publish(&self, trigger: DateTime<Utc>) -> Result<()>;

    /// Reads the operator's current choice, `None` when nothing is published.
    async fn read(&self) -> Result<Option<DateTime<Utc>>>;
}

pub struct FileTriggerOverride {
    path: PathBuf,
}

impl FileTriggerOverride {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TriggerOverride for FileTriggerOverride {
    async fn publish(&self, trigger: DateTime<Utc>) -> Result<()> {
        let stamp = trigger.format(SIDE_FILE_FORMAT).to_string();
        // Write-then-rename so a reader never sees a half-written stamp.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, stamp.as_bytes())
            .await
            .with_context(|| format!("could not write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("could not publish trigger to {}", self.path.display()))
    }

    async fn read(&self) -> Result<Option<DateTime<Utc>>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("could not read {}", self.path.display()));
            }
        };
        let parsed = NaiveDateTime::parse_from_str(raw.trim(), SIDE_FILE_FORMAT)
            .with_context(|| format!("bad timestamp in {}: {raw:?}", self.path.display()))?;
        Ok(Some(parsed.and_utc()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TriggerOverride;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Override that always answers with a fixed value and records what the
    /// scheduler published.
    pub struct FixedOverride {
        value: Option<DateTime<Utc>>,
        published: Mutex<Vec<DateTime<Utc>>>,
    }

    impl FixedOverride {
        pub fn some(value: DateTime<Utc>) -> Self {
            Self {
                value: Some(value),
                published: Mutex::new(Vec::new()),
            }
        }

        pub fn published(&self) -> Vec<DateTime<Utc>> {
            self.published.lock().expect("published lock").clone()
        }
    }

    #[async_trait]
    impl TriggerOverride for FixedOverride {
        async fn publish(&self, trigger: DateTime<Utc>) -> Result<()> {
            self.published.lock().expect("published lock").push(trigger);
            Ok(())
        }

        async fn read(&self) -> Result<Option<DateTime<Utc>>> {
            Ok(self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileTriggerOverride, TriggerOverride};
    use crate::testutil::unique_temp_dir;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn published_trigger_reads_back_unchanged() {
        let dir = unique_temp_dir("override");
        let side = FileTriggerOverride::new(dir.join("next_backup.txt"));
        let trigger = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        side.publish(trigger).await.expect("publish");
        assert_eq!(side.read().await.expect("read"), Some(trigger));
    }

    #[tokio::test]
    async fn missing_side_file_reads_as_none() {
        let dir = unique_temp_dir("override-missing");
        let side = FileTriggerOverride::new(dir.join("next_backup.txt"));
        assert_eq!(side.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn garbage_in_the_side_file_is_an_error() {
        let dir = unique_temp_dir("override-garbage");
        let path = dir.join("next_backup.txt");
        tokio::fs::write(&path, "tomorrow-ish").await.expect("write");

        let side = FileTriggerOverride::new(path);
        let err = side.read().await.expect_err("parse failure");
        assert!(err.to_string().contains("bad timestamp"));
    }
}
