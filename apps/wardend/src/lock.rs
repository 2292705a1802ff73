use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOCK_FILE: &str = "wardend.lock";

/// Held for the process lifetime; dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
}

/// Takes the single-instance lock for a staging directory. Fails with
/// `WouldBlock` when another daemon already holds it.
pub fn acquire(staging_dir: &Path) -> std::io::Result<LockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(staging_dir.join(LOCK_FILE))?;

    file.try_lock_exclusive()?;
    Ok(LockGuard { _file: file })
}

#[cfg(test)]
mod tests {
    use super::acquire;
    use crate::testutil::unique_temp_dir;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let dir = unique_temp_dir("lock");

        let guard = acquire(&dir).expect("first lock");
        let err = acquire(&dir).expect_err("second lock while held");
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

        drop(guard);
        acquire(&dir).expect("relock after release");

        let _ = std::fs::remove_dir_all(dir);
    }
}
