use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamp half of an archive name, truncated to the minute.
const NAME_FORMAT: &str = "%Y-%m-%d %H_%M";

const NAME_SUFFIX: &str = " backup.tar";

/// Archive filename for a backup triggered at `trigger`.
pub fn archive_file_name(trigger: DateTime<Utc>) -> String {
    format!("{}{NAME_SUFFIX}", trigger.format(NAME_FORMAT))
}

/// Recovers the trigger a leftover archive was created for. Seconds are not
/// stored in the name, so the result is floored to the minute.
pub fn parse_archive_name(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(NAME_SUFFIX)?;
    let parsed = NaiveDateTime::parse_from_str(stem, NAME_FORMAT).ok()?;
    Some(parsed.and_utc())
}

/// Tar archives in the staging directory left behind by earlier cycles,
/// sorted by name. `exclude` is the archive the current cycle is about to
/// write.
pub fn find_leftovers(staging: &Path, exclude: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = fs::read_dir(staging)
        .with_context(|| format!("could not scan {}", staging.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".tar") || name == exclude {
            continue;
        }
        match parse_archive_name(name) {
            Some(origin) => debug!("found leftover archive {name} from {origin}"),
            None => debug!("found leftover archive {name}"),
        }
        found.push(entry.path());
    }
    found.sort();
    Ok(found)
}

/// Packs `source` recursively into a fresh uncompressed tar at `dest`. The
/// directory's own name becomes the root inside the archive.
pub async fn pack_directory(source: &Path, dest: &Path) -> Result<()> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = fs::File::create(&dest)
            .with_context(|| format!("could not create {}", dest.display()))?;
        let mut builder = tar::Builder::new(file);
        let root = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        builder
            .append_dir_all(&root, &source)
            .with_context(|| format!("could not archive {}", source.display()))?;
        builder.finish().context("could not finish archive")?;
        Ok(())
    })
    .await
    .context("archive task failed")??;
    Ok(())
}
