use async_trait::async_trait;
use std::path::Path;

use warden_dropbox::{DropboxClient, StorageError};

/// Remote storage capability: the three calls the backup cycle and the
/// retention pass need.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), StorageError>;
    async fn list_folder(&self, folder: &str) -> Result<Vec<String>, StorageError>;
    async fn delete(&self, remote_path: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl RemoteStore for DropboxClient {
    async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), StorageError> {
        DropboxClient::upload(self, local, remote_path).await
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        DropboxClient::list_folder(self, folder).await
    }

    async fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        DropboxClient::delete(self, remote_path).await
    }
}

/// Joins the destination folder and an archive filename into a remote path
/// with exactly one leading slash.
pub fn remote_path(folder: &str, name: &str) -> String {
    let trimmed = folder.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{name}")
    } else {
        format!("/{trimmed}/{name}")
    }
}
