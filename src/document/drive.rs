//! Google Drive byte store (Drive v3 REST, resumable uploads).

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::progress::{ProgressReporter, UploadCancel};
use super::storage::{ByteStore, StoredObject};
use crate::config::{GoogleConfig, DRIVE_CHUNK_GRANULARITY};
use crate::pool::StorageAccount;
use crate::{DocpoolError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    web_content_link: Option<String>,
}

/// Byte store writing to the Drive of each pooled account.
pub struct DriveByteStore {
    client: Client,
    api_url: String,
    upload_url: String,
    chunk_size: usize,
}

impl DriveByteStore {
    /// Create a store. The chunk size is rounded down to a multiple of 256 KiB.
    pub fn new(client: Client, config: &GoogleConfig, chunk_size: usize) -> Self {
        let chunk_size =
            (chunk_size / DRIVE_CHUNK_GRANULARITY).max(1) * DRIVE_CHUNK_GRANULARITY;
        Self {
            client,
            api_url: config.drive_api_url.trim_end_matches('/').to_string(),
            upload_url: config.drive_upload_url.trim_end_matches('/').to_string(),
            chunk_size,
        }
    }

    /// Effective upload chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_url, urlencoding::encode(file_id))
    }

    async fn start_session(
        &self,
        account: &StorageAccount,
        name: &str,
        mime_type: &str,
        total: usize,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/files", self.upload_url))
            .query(&[("uploadType", "resumable"), ("fields", "id,webContentLink")])
            .bearer_auth(&account.access_credential)
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", total.to_string())
            .json(&json!({ "name": name, "mimeType": mime_type }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(remote_error("upload session", response.status()));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DocpoolError::BackendUnavailable(
                    "remote: upload session has no location".to_string(),
                )
            })
    }

    async fn abort_session(&self, session_url: &str) {
        // Drive answers 499 to a cancelled session.
        if let Err(e) = self.client.delete(session_url).send().await {
            warn!(error = %e, "Failed to cancel Drive upload session");
        }
    }

    async fn send_chunk(
        &self,
        session_url: &str,
        content: &[u8],
        offset: usize,
        total: usize,
    ) -> Result<Response> {
        let content_range = if total == 0 {
            "bytes */0".to_string()
        } else {
            format!("bytes {}-{}/{}", offset, offset + content.len() - 1, total)
        };

        let response = self
            .client
            .put(session_url)
            .header(CONTENT_RANGE, content_range)
            .body(content.to_vec())
            .send()
            .await?;
        Ok(response)
    }

    fn stored_object(file: DriveFile) -> StoredObject {
        let download_url = file.web_content_link.unwrap_or_else(|| {
            format!(
                "https://drive.google.com/uc?id={}&export=download",
                urlencoding::encode(&file.id)
            )
        });
        StoredObject {
            location: file.id,
            download_url,
        }
    }
}

fn remote_error(what: &str, status: StatusCode) -> DocpoolError {
    DocpoolError::BackendUnavailable(format!("remote: {what} returned {status}"))
}

/// Parse the `Range: bytes=0-N` header of a 308 into the next offset.
fn next_offset(range: Option<&str>) -> Option<usize> {
    let end = range?.strip_prefix("bytes=")?.split_once('-')?.1;
    end.parse::<usize>().ok().map(|e| e + 1)
}

#[async_trait]
impl ByteStore for DriveByteStore {
    async fn put(
        &self,
        account: &StorageAccount,
        name: &str,
        mime_type: &str,
        content: &[u8],
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<StoredObject> {
        let total = content.len();
        let session_url = self.start_session(account, name, mime_type, total).await?;
        debug!(account_id = account.id, size = total, "Drive upload session started");

        let mut offset = 0usize;
        loop {
            if cancel.is_cancelled() {
                self.abort_session(&session_url).await;
                return Err(DocpoolError::Cancelled);
            }

            let end = (offset + self.chunk_size).min(total);
            let response = self
                .send_chunk(&session_url, &content[offset..end], offset, total)
                .await?;

            match response.status() {
                StatusCode::PERMANENT_REDIRECT => {
                    let range = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
                    // no Range header means nothing was persisted yet
                    let persisted = next_offset(range).unwrap_or(0);
                    if persisted <= offset || persisted >= total {
                        self.abort_session(&session_url).await;
                        warn!(
                            account_id = account.id,
                            offset,
                            persisted,
                            size = total,
                            "Drive upload session stopped advancing"
                        );
                        return Err(DocpoolError::BackendUnavailable(format!(
                            "remote: upload stalled at byte {persisted} of {total}"
                        )));
                    }
                    offset = persisted;
                    progress.report_bytes(offset as u64, total as u64);
                }
                status if status.is_success() => {
                    let file: DriveFile = response.json().await?;
                    progress.report(100);
                    debug!(account_id = account.id, file_id = %file.id, "Drive upload finished");
                    return Ok(Self::stored_object(file));
                }
                status => {
                    self.abort_session(&session_url).await;
                    return Err(remote_error("upload chunk", status));
                }
            }
        }
    }

    async fn get(&self, account: &StorageAccount, location: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.file_url(location))
            .query(&[("alt", "media")])
            .bearer_auth(&account.access_credential)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DocpoolError::NotFound(format!("drive file {location}"))),
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            status => Err(remote_error("download", status)),
        }
    }

    async fn delete(&self, account: &StorageAccount, location: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.file_url(location))
            .bearer_auth(&account.access_credential)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(file_id = %location, "Drive file already gone");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            status => Err(remote_error("delete", status)),
        }
    }
}
