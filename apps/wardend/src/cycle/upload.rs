use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{error, info};

use crate::store::{RemoteStore, remote_path};
use warden_dropbox::ErrorClass;

/// Pushes staged archives to the destination folder.
///
/// A transient upload failure keeps the local file so the next cycle can
/// retry it; any other failure aborts the batch. After a successful upload
/// the local copy is removed, except that a permission error on the removal
/// is logged and the file left behind.
pub async fn upload_archives(
    store: &dyn RemoteStore,
    dest_folder: &str,
    archives: &[PathBuf],
) -> Result<()> {
    for local in archives {
        let Some(name) = local.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let remote = remote_path(dest_folder, name);
        info!("uploading {name} to {remote}...");
        match store.upload(local, &remote).await {
            Ok(()) => info!("uploaded {name}"),
            Err(err) if err.class() == ErrorClass::Transient => {
                error!("upload of {name} failed, keeping it for the next cycle: {err}");
                continue;
            }
            Err(err) => return Err(err).with_context(|| format!("upload of {name} failed")),
        }
        match tokio::fs::remove_file(local).await {
            Ok(()) => info!("removed local copy of {name}"),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                error!("could not remove local copy of {name}: {err}");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("could not remove {}", local.display()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::upload_archives;
    use crate::store::testing::MemoryStore;
    use crate::testutil::unique_temp_dir;
    use std::fs;

    #[tokio::test]
    async fn transient_failures_keep_their_local_archives() {
        let staging = unique_temp_dir("upload-transient");
        let mut archives = Vec::new();
        for day in 1..=4 {
            let path = staging.join(format!("2024-01-0{day} 00_00 backup.tar"));
            fs::write(&path, b"tar").expect("write");
            archives.push(path);
        }
        let store = MemoryStore::new();
        store.fail_upload_transient("/backups/2024-01-02 00_00 backup.tar");
        store.fail_upload_transient("/backups/2024-01-04 00_00 backup.tar");

        upload_archives(&store, "/backups", &archives)
            .await
            .expect("batch survives transient failures");

        assert!(store.contains("/backups/2024-01-01 00_00 backup.tar"));
        assert!(store.contains("/backups/2024-01-03 00_00 backup.tar"));
        assert_eq!(store.file_count(), 2);
        assert!(!archives[0].exists());
        assert!(archives[1].exists());
        assert!(!archives[2].exists());
        assert!(archives[3].exists());
    }

    #[tokio::test]
    async fn unexpected_failures_abort_and_keep_the_file() {
        let staging = unique_temp_dir("upload-unexpected");
        let path = staging.join("2024-01-01 00_00 backup.tar");
        fs::write(&path, b"tar").expect("write");
        let store = MemoryStore::new();
        store.fail_upload_unexpected("/backups/2024-01-01 00_00 backup.tar");

        let err = upload_archives(&store, "/backups", std::slice::from_ref(&path))
            .await
            .expect_err("unexpected failures propagate");

        assert!(err.to_string().contains("upload of"));
        assert!(path.exists());
    }
}
