//! On-disk cache storage.
//!
//! Each store is a directory under the storage root. Each entry is one file
//! named after the SHA-1 of its request key, holding a JSON metadata line
//! followed by the raw response body. Entries are written to a temporary
//! file and renamed into place, so a reader never sees a half-written entry.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::debug;

use super::{CacheStorage, CapturedResponse, RequestKey, StorageError};

const ENTRY_EXTENSION: &str = "entry";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    captured_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store names become directory names, so keep them to a safe alphabet.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(StorageError::InvalidName(name.to_string()))
        }
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_file_name(key: &RequestKey) -> String {
        let mut hasher = Sha1::new();
        hasher.update(key.as_str().as_bytes());
        format!("{:x}.{}", hasher.finalize(), ENTRY_EXTENSION)
    }

    fn encode(key: &RequestKey, response: &CapturedResponse) -> Result<Vec<u8>, StorageError> {
        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            captured_at: response.captured_at,
        };
        let mut bytes = serde_json::to_vec(&meta)?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&response.body);
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> Result<(RequestKey, CapturedResponse), StorageError> {
        let split = bytes.iter().position(|&b| b == b'\n').ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "cache entry has no metadata line")
        })?;
        let meta: EntryMeta = serde_json::from_slice(&bytes[..split])?;
        let response = CapturedResponse {
            status: meta.status,
            headers: meta.headers,
            body: bytes[split + 1..].to_vec(),
            captured_at: meta.captured_at,
        };
        Ok((meta.key, response))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<(), StorageError> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if Self::validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn match_request(
        &self,
        name: &str,
        key: &RequestKey,
    ) -> Result<Option<CapturedResponse>, StorageError> {
        let path = self.store_dir(name)?.join(Self::entry_file_name(key));
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (stored_key, response) = Self::decode(&bytes)?;
        if &stored_key != key {
            debug!(cache = name, key = %key, stored = %stored_key, "Cache entry key mismatch");
            return Ok(None);
        }
        Ok(Some(response))
    }

    async fn put(
        &self,
        name: &str,
        key: &RequestKey,
        response: &CapturedResponse,
    ) -> Result<(), StorageError> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir).await?;

        let bytes = Self::encode(key, response)?;
        let final_path = dir.join(Self::entry_file_name(key));
        let tmp_id = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_path = dir.join(format!(".tmp-{}-{}", std::process::id(), tmp_id));

        let written = match fs::write(&tmp_path, &bytes).await {
            Ok(()) => fs::rename(&tmp_path, &final_path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // A failed write can leave a partial temp file behind
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, StorageError> {
        let store = self.store_dir(name)?;
        let mut dir = match fs::read_dir(&store).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotOpen(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match Self::decode(&bytes) {
                Ok((key, _)) => keys.push(key),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry")
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
