//! Minimal Dropbox HTTP API v2 client covering what the backup daemon
//! needs: refresh-token auth, file upload (session-chunked above one
//! chunk), folder listing, and deletion.

mod auth;
mod error;

pub use error::{ErrorClass, StorageError};

use reqwest::{Client, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use url::Url;

use auth::TokenCache;
use error::classify_response;

const API_BASE: &str = "https://api.dropboxapi.com";
const CONTENT_BASE: &str = "https://content.dropboxapi.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RPC_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// Upload chunk size. Files at most this large go through the single-call
/// upload endpoint (which caps at 150 MiB); larger ones go through an
/// upload session one chunk at a time, so a multi-gigabyte world archive
/// never sits in memory whole.
const UPLOAD_CHUNK: usize = 16 * 1024 * 1024;

pub struct DropboxClient {
    client: Client,
    api_base: Url,
    content_base: Url,
    tokens: TokenCache,
}

#[derive(Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    mute: bool,
}

impl<'a> UploadArg<'a> {
    fn overwrite(path: &'a str) -> Self {
        // A retried leftover replaces the earlier copy instead of landing
        // as a "name (1).tar" duplicate.
        Self {
            path,
            mode: "overwrite",
            mute: true,
        }
    }
}

#[derive(Serialize)]
struct SessionStartArg {
    close: bool,
}

#[derive(Deserialize)]
struct SessionStartResult {
    session_id: String,
}

#[derive(Serialize)]
struct SessionCursor<'a> {
    session_id: &'a str,
    offset: u64,
}

#[derive(Serialize)]
struct SessionAppendArg<'a> {
    cursor: SessionCursor<'a>,
    close: bool,
}

#[derive(Serialize)]
struct SessionFinishArg<'a> {
    cursor: SessionCursor<'a>,
    commit: UploadArg<'a>,
}

#[derive(Serialize)]
struct ListFolderArg<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct ListFolderContinueArg<'a> {
    cursor: &'a str,
}

#[derive(Deserialize)]
struct ListFolderResult {
    entries: Vec<FolderEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Deserialize)]
struct FolderEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
}

#[derive(Serialize)]
struct DeleteArg<'a> {
    path: &'a str,
}

impl DropboxClient {
    pub fn new(
        app_key: &str,
        app_secret: &str,
        refresh_token: &str,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            client: Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?,
            api_base: Url::parse(API_BASE)?,
            content_base: Url::parse(CONTENT_BASE)?,
            tokens: TokenCache::new(
                app_key.to_string(),
                app_secret.to_string(),
                refresh_token.to_string(),
            ),
        })
    }

    /// Uploads a local file to `remote_path`, replacing any existing file
    /// of that name.
    pub async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();
        if size <= UPLOAD_CHUNK as u64 {
            let mut body = Vec::with_capacity(size as usize);
            file.read_to_end(&mut body).await?;
            return self.upload_single(remote_path, body).await;
        }
        self.upload_session(remote_path, &mut file).await
    }

    async fn upload_single(&self, remote_path: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let response = self
            .content_request("/2/files/upload", &UploadArg::overwrite(remote_path))
            .await?
            .body(body)
            .send()
            .await?;
        check_response("files/upload", remote_path, response).await?;
        Ok(())
    }

    async fn upload_session(
        &self,
        remote_path: &str,
        file: &mut tokio::fs::File,
    ) -> Result<(), StorageError> {
        let response = self
            .content_request(
                "/2/files/upload_session/start",
                &SessionStartArg { close: false },
            )
            .await?
            .body(Vec::new())
            .send()
            .await?;
        let response = check_response("upload_session/start", remote_path, response).await?;
        let started: SessionStartResult = response.json().await?;

        let mut offset = 0u64;
        let mut buffer = vec![0u8; UPLOAD_CHUNK];
        loop {
            let read = read_chunk(file, &mut buffer).await?;
            if read == 0 {
                break;
            }
            let arg = SessionAppendArg {
                cursor: SessionCursor {
                    session_id: &started.session_id,
                    offset,
                },
                close: false,
            };
            let response = self
                .content_request("/2/files/upload_session/append_v2", &arg)
                .await?
                .body(buffer[..read].to_vec())
                .send()
                .await?;
            check_response("upload_session/append_v2", remote_path, response).await?;
            offset += read as u64;
        }

        let arg = SessionFinishArg {
            cursor: SessionCursor {
                session_id: &started.session_id,
                offset,
            },
            commit: UploadArg::overwrite(remote_path),
        };
        let response = self
            .content_request("/2/files/upload_session/finish", &arg)
            .await?
            .body(Vec::new())
            .send()
            .await?;
        check_response("upload_session/finish", remote_path, response).await?;
        Ok(())
    }

    /// Names of the files directly inside `folder`, across all listing
    /// pages. The folder must exist; a missing one is a `NotFound` error.
    /// Entries other than files (subfolders, deletions) are skipped.
    pub async fn list_folder(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        let path = api_folder_path(folder);
        let mut names = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let (op, response) = match &cursor {
                None => (
                    "files/list_folder",
                    self.rpc_request("/2/files/list_folder", &ListFolderArg { path: &path })
                        .await?
                        .send()
                        .await?,
                ),
                Some(value) => (
                    "files/list_folder/continue",
                    self.rpc_request(
                        "/2/files/list_folder/continue",
                        &ListFolderContinueArg { cursor: value },
                    )
                    .await?
                    .send()
                    .await?,
                ),
            };
            let response = check_response(op, folder, response).await?;
            let page: ListFolderResult = response.json().await?;

            let ListFolderResult {
                entries,
                cursor: next_cursor,
                has_more,
            } = page;
            for entry in entries {
                if entry.tag == "file" {
                    names.push(entry.name);
                }
            }
            if !has_more {
                break;
            }
            cursor = Some(next_cursor);
        }

        Ok(names)
    }

    pub async fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        let response = self
            .rpc_request("/2/files/delete_v2", &DeleteArg { path: remote_path })
            .await?
            .send()
            .await?;
        check_response("files/delete_v2", remote_path, response).await?;
        Ok(())
    }

    async fn rpc_request(
        &self,
        route: &'static str,
        arg: &impl Serialize,
    ) -> Result<RequestBuilder, StorageError> {
        let bearer = self.tokens.bearer(&self.client, &self.api_base).await?;
        let url = self.api_base.join(route)?;
        Ok(self
            .client
            .post(url)
            .bearer_auth(bearer)
            .json(arg)
            .timeout(RPC_TIMEOUT))
    }

    async fn content_request(
        &self,
        route: &'static str,
        arg: &impl Serialize,
    ) -> Result<RequestBuilder, StorageError> {
        let bearer = self.tokens.bearer(&self.client, &self.api_base).await?;
        let url = self.content_base.join(route)?;
        let arg = serde_json::to_string(arg)?;
        Ok(self
            .client
            .post(url)
            .bearer_auth(bearer)
            .header("Dropbox-API-Arg", arg)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .timeout(CHUNK_TIMEOUT))
    }
}

async fn check_response(
    op: &'static str,
    path: &str,
    response: Response,
) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_response(op, path, status, &body))
}

/// Dropbox wants the account root as the empty string and every other
/// folder with a leading slash and no trailing one.
fn api_folder_path(folder: &str) -> String {
    let trimmed = folder.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("/{trimmed}")
}

async fn read_chunk(
    file: &mut tokio::fs::File,
    buffer: &mut [u8],
) -> Result<usize, StorageError> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::{api_folder_path, FolderEntry, ListFolderResult, UploadArg};

    #[test]
    fn folder_paths_are_normalized_for_the_api() {
        assert_eq!(api_folder_path(""), "");
        assert_eq!(api_folder_path("/"), "");
        assert_eq!(api_folder_path("/minecraft/backups"), "/minecraft/backups");
        assert_eq!(api_folder_path("minecraft/backups/"), "/minecraft/backups");
    }

    #[test]
    fn upload_arg_serializes_to_api_arg_header_shape() {
        let arg = UploadArg::overwrite("/backups/2024-01-01 00_00 backup.tar");
        let json = serde_json::to_string(&arg).expect("serialize upload arg");
        assert_eq!(
            json,
            r#"{"path":"/backups/2024-01-01 00_00 backup.tar","mode":"overwrite","mute":true}"#
        );
    }

    #[test]
    fn listing_page_parses_and_keeps_only_files() {
        let body = r#"{
            "entries": [
                {".tag": "file", "name": "2024-01-01 00_00 backup.tar", "id": "id:1"},
                {".tag": "folder", "name": "old", "id": "id:2"},
                {".tag": "file", "name": "notes.txt", "id": "id:3"}
            ],
            "cursor": "AAA",
            "has_more": false
        }"#;
        let page: ListFolderResult = serde_json::from_str(body).expect("parse listing");
        let files: Vec<&FolderEntry> = page
            .entries
            .iter()
            .filter(|entry| entry.tag == "file")
            .collect();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "2024-01-01 00_00 backup.tar");
        assert!(!page.has_more);
        assert_eq!(page.cursor, "AAA");
    }
}
