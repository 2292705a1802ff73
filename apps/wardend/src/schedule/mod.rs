//! Backup scheduling: the daily trigger, the warning countdown before a
//! shutdown, and the side-file override loop that lets an operator move the
//! next trigger until the countdown begins.

pub mod overrides;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use tokio::time::{Duration, sleep};
use tracing::info;

use crate::control::ServerControl;
use overrides::TriggerOverride;

/// How often the pending trigger is re-read while it can still be moved.
const FIX_POLL: Duration = Duration::from_secs(5);

/// How often the countdown checks for the next due warning.
const WARNING_POLL: Duration = Duration::from_millis(100);

/// Daily backup schedule anchored to a fixed UTC wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub backup_time: NaiveTime,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            backup_time: NaiveTime::MIN,
        }
    }
}

impl Schedule {
    /// Next occurrence of the backup time at or after `now` rolls to
    /// tomorrow; a trigger for this very instant is treated as already
    /// passed.
    pub fn next_trigger(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.backup_time).and_utc();
        if today <= now {
            today + ChronoDuration::days(1)
        } else {
            today
        }
    }
}

/// Countdown messages sent to the server console ahead of a trigger, ordered
/// by decreasing lead time.
pub struct WarningPlan {
    entries: Vec<(ChronoDuration, String)>,
}

impl WarningPlan {
    pub fn for_trigger(trigger: DateTime<Utc>) -> Self {
        let mut entries = Vec::new();
        let restart_notice = format!(
            "say Warning: Server will restart at UTC {} for a backup.",
            trigger.format("%Y-%m-%dT%H:%M")
        );
        entries.push((ChronoDuration::seconds(1000), restart_notice.clone()));
        entries.push((ChronoDuration::seconds(100), restart_notice));
        for seconds in [50, 40, 30, 20, 10, 5, 4, 3, 2, 1] {
            entries.push((ChronoDuration::seconds(seconds), format!("say {seconds}")));
        }
        entries.push((ChronoDuration::milliseconds(500), "say Shutdown.".to_string()));
        Self { entries }
    }

    /// Longest lead time in the plan; once `trigger - lead` has passed the
    /// trigger can no longer be moved.
    pub fn lead(&self) -> ChronoDuration {
        self.entries[0].0
    }

    pub fn entries(&self) -> &[(ChronoDuration, String)] {
        &self.entries
    }
}

/// Waits until a trigger is fixed and returns it.
///
/// The schedule's default is published for the operator to edit, then the
/// override is polled until the first warning of the resolved trigger comes
/// due. Whatever the override holds at that point wins, even a moment in the
/// past.
pub async fn resolve_trigger(
    schedule: &Schedule,
    side: &dyn TriggerOverride,
) -> Result<DateTime<Utc>> {
    let default = schedule.next_trigger(Utc::now());
    side.publish(default).await?;
    info!("next backup scheduled for {default}");

    let mut announced = Some(default);
    loop {
        let trigger = side.read().await?.unwrap_or(default);
        if announced != Some(trigger) {
            info!("next backup moved to {trigger}");
            announced = Some(trigger);
        }
        let lead = WarningPlan::for_trigger(trigger).lead();
        if Utc::now() >= trigger - lead {
            info!("server backup fixed to {trigger}");
            return Ok(trigger);
        }
        sleep(FIX_POLL).await;
    }
}

/// Plays the warning countdown for `trigger` against the server console.
/// Warnings whose moment already passed on entry are sent immediately, in
/// plan order.
pub async fn fire_warnings(
    trigger: DateTime<Utc>,
    plan: &WarningPlan,
    control: &dyn ServerControl,
) {
    for (lead, message) in plan.entries() {
        let due = trigger - *lead;
        while Utc::now() < due {
            sleep(WARNING_POLL).await;
        }
        control.send(message).await;
    }
}
