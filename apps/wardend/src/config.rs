use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const CREDENTIALS_FILE: &str = "dropbox_api.json";

/// Daemon settings, loaded once at startup from `config.json` in the
/// working directory. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote folder the archives land in, e.g. `/minecraft/backups`.
    pub dropbox_dest_path: String,
    /// Name of the screen session the server runs in.
    pub minecraft_server_screen_name: String,
    /// Directory that gets archived (the server directory).
    pub source_path: PathBuf,
    /// Where archives are staged before upload; also holds the side file
    /// and the daemon lock.
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dropbox_dest_path: String::new(),
            minecraft_server_screen_name: String::new(),
            source_path: PathBuf::new(),
            staging_path: default_staging_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.dropbox_dest_path.is_empty()
            || self.minecraft_server_screen_name.is_empty()
            || self.source_path.as_os_str().is_empty()
        {
            anyhow::bail!("{CONFIG_FILE} is incomplete, fill in all values");
        }
        Ok(())
    }
}

/// Dropbox app credentials from `dropbox_api.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropboxKeys {
    pub app_key: String,
    pub app_secret: String,
    pub refresh_token: String,
}

impl DropboxKeys {
    pub fn validate(&self) -> Result<()> {
        if self.app_key.is_empty() || self.app_secret.is_empty() || self.refresh_token.is_empty()
        {
            anyhow::bail!("{CREDENTIALS_FILE} is incomplete, fill in all values");
        }
        Ok(())
    }
}

/// Loads a JSON settings file. When the file is missing, a pretty-printed
/// template with default values is written in its place and `None` comes
/// back so the caller can exit and let the operator fill it in.
pub fn load_or_init<T>(path: &Path) -> Result<Option<T>>
where
    T: Default + Serialize + DeserializeOwned,
{
    let raw = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let template = serde_json::to_string_pretty(&T::default())
                .context("failed to serialize settings template")?;
            fs::write(path, template)
                .with_context(|| format!("failed to write template {}", path.display()))?;
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn default_staging_path() -> PathBuf {
    PathBuf::from(".")
}
