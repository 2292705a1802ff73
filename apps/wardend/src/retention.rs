use anyhow::{Result, bail};
use tracing::{error, info};

use crate::store::{RemoteStore, remote_path};

/// How many archives the destination folder keeps.
pub const KEEP_BACKUPS: usize = 30;

/// Names that fall out of the retention window: everything but the `keep`
/// newest tar files, oldest first. Name order is chronological because
/// archive names start with the timestamp.
pub fn expired(names: &[String], keep: usize) -> Vec<String> {
    let mut tars: Vec<String> = names
        .iter()
        .filter(|name| name.ends_with(".tar"))
        .cloned()
        .collect();
    tars.sort();
    tars.truncate(tars.len().saturating_sub(keep));
    tars
}

/// Deletes expired archives from the destination folder. A failed deletion
/// does not stop the sweep; the failures surface as one error at the end.
pub async fn reconcile(store: &dyn RemoteStore, dest_folder: &str, keep: usize) -> Result<()> {
    info!("checking {dest_folder} for expired backups...");
    let names = store.list_folder(dest_folder).await?;
    let tar_count = names.iter().filter(|name| name.ends_with(".tar")).count();
    let doomed = expired(&names, keep);
    info!("{} of {} remote backups expired", doomed.len(), tar_count);

    let mut failed = 0usize;
    for name in &doomed {
        let remote = remote_path(dest_folder, name);
        match store.delete(&remote).await {
            Ok(()) => info!("deleted {remote}"),
            Err(err) => {
                error!("could not delete {remote}: {err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!(
            "{failed} of {} expired backups could not be deleted",
            doomed.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{KEEP_BACKUPS, expired, reconcile};
    use crate::store::testing::MemoryStore;

    fn january_archives(days: u32) -> Vec<String> {
        (1..=days)
            .map(|day| format!("2023-01-{day:02} 00_00 backup.tar"))
            .collect()
    }

    #[test]
    fn one_over_the_window_expires_exactly_one() {
        let names = january_archives(31);
        assert_eq!(
            expired(&names, KEEP_BACKUPS),
            ["2023-01-01 00_00 backup.tar"]
        );
    }

    #[test]
    fn a_full_window_expires_nothing() {
        let names = january_archives(30);
        assert!(expired(&names, KEEP_BACKUPS).is_empty());
    }

    #[test]
    fn overfull_folders_lose_their_oldest() {
        let mut names = january_archives(35);
        names.reverse();
        let doomed = expired(&names, KEEP_BACKUPS);
        assert_eq!(doomed, january_archives(5));
    }

    #[test]
    fn non_archives_never_expire() {
        let mut names = january_archives(31);
        names.push("notes.txt".to_string());
        names.push("world".to_string());
        assert_eq!(expired(&names, KEEP_BACKUPS).len(), 1);
    }

    #[tokio::test]
    async fn sweep_deletes_the_oldest_remote_archive() {
        let store = MemoryStore::new();
        store.seed("/backups", &january_archives(31));

        reconcile(&store, "/backups", KEEP_BACKUPS)
            .await
            .expect("sweep");

        assert_eq!(store.deleted(), ["/backups/2023-01-01 00_00 backup.tar"]);
        assert_eq!(store.file_count(), 30);
    }

    #[tokio::test]
    async fn failed_deletions_are_reported_after_the_sweep() {
        let store = MemoryStore::new();
        store.seed("/backups", &january_archives(33));
        store.fail_delete("/backups/2023-01-02 00_00 backup.tar");

        let err = reconcile(&store, "/backups", KEEP_BACKUPS)
            .await
            .expect_err("one deletion failed");

        assert!(err.to_string().contains("1 of 3"));
        assert_eq!(store.deleted().len(), 2);
        assert_eq!(store.file_count(), 31);
    }

    #[tokio::test]
    async fn missing_destination_folder_is_an_error() {
        let store = MemoryStore::new();
        store.mark_folder_missing();

        let err = reconcile(&store, "/backups", KEEP_BACKUPS)
            .await
            .expect_err("listing failed");

        assert!(err.to_string().contains("not found"));
    }
}
