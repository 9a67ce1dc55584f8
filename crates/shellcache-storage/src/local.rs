//! Local disk namespace store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::backend::{CacheStorage, compute_sha256, ensure_storable, validate_namespace};
use crate::error::StorageError;
use crate::response::{CachedResponse, ResponseKind};

/// Sequence for unique temp file names within this process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

const ENTRY_EXTENSION: &str = "entry";

/// Header line written at the start of each entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    key: String,
    url: String,
    status: u16,
    kind: ResponseKind,
    headers: Vec<StoredHeader>,
    size: u64,
    sha256: String,
    stored_at: DateTime<Utc>,
}

/// Response header with its raw value bytes hex-encoded
#[derive(Debug, Serialize, Deserialize)]
struct StoredHeader {
    name: String,
    value: String,
}

/// Local disk namespace store
///
/// Layout: `<base_path>/namespaces/<hex(namespace)>/<sha256(key)>.entry`.
/// Each entry file holds one compact JSON metadata line followed by the
/// body bytes, and is replaced with a single rename. Concurrent writers
/// to one key therefore resolve last-write-wins.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(base_path.join("namespaces")).await?;

        info!("Initialized local cache storage at {:?}", base_path);

        Ok(Self { base_path })
    }

    fn namespaces_path(&self) -> PathBuf {
        self.base_path.join("namespaces")
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.namespaces_path().join(hex::encode(namespace.as_bytes()))
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_path(namespace).join(format!(
            "{}.{}",
            compute_sha256(key.as_bytes()),
            ENTRY_EXTENSION
        ))
    }

    /// Write a file atomically via a uniquely named temp file
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("{}-{}.tmp", std::process::id(), seq));
        fs::write(&temp_path, data).await?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    /// Read only the metadata line of an entry file
    async fn read_metadata(path: &Path) -> Result<Option<EntryMetadata>, StorageError> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut line = Vec::new();
        BufReader::new(file).read_until(b'\n', &mut line).await?;
        Ok(Some(serde_json::from_slice(&line)?))
    }

    async fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Split an entry file into its metadata line and body
fn split_entry(key: &str, data: &[u8]) -> Result<(EntryMetadata, Bytes), StorageError> {
    let newline = data
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| StorageError::Corrupt {
            key: key.to_string(),
            reason: "missing metadata line".to_string(),
        })?;
    let meta = serde_json::from_slice(&data[..newline])?;
    Ok((meta, Bytes::copy_from_slice(&data[newline + 1..])))
}

fn encode_entry(meta: &EntryMetadata, body: &[u8]) -> Result<Vec<u8>, StorageError> {
    // Compact JSON never contains a raw newline
    let mut data = serde_json::to_vec(meta)?;
    data.reserve(body.len() + 1);
    data.push(b'\n');
    data.extend_from_slice(body);
    Ok(data)
}

fn encode_headers(headers: &HeaderMap) -> Vec<StoredHeader> {
    headers
        .iter()
        .map(|(name, value)| StoredHeader {
            name: name.as_str().to_string(),
            value: hex::encode(value.as_bytes()),
        })
        .collect()
}

fn decode_headers(key: &str, stored: &[StoredHeader]) -> Result<HeaderMap, StorageError> {
    let mut headers = HeaderMap::with_capacity(stored.len());
    for header in stored {
        let corrupt = |reason: String| StorageError::Corrupt {
            key: key.to_string(),
            reason,
        };
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| corrupt(format!("bad header name {}: {}", header.name, e)))?;
        let raw = hex::decode(&header.value)
            .map_err(|e| corrupt(format!("bad header encoding for {}: {}", name, e)))?;
        let value = HeaderValue::from_bytes(&raw)
            .map_err(|e| corrupt(format!("bad header value for {}: {}", name, e)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl CacheStorage for LocalStorage {
    async fn open(&self, namespace: &str) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        fs::create_dir_all(self.namespace_path(namespace)).await?;
        Ok(())
    }

    async fn has(&self, namespace: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.namespace_path(namespace)).await?)
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(self.namespaces_path()).await?;

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let decoded = hex::decode(file_name.to_string_lossy().as_bytes())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(name) => names.push(name),
                None => warn!("Skipping unrecognized namespace directory {:?}", file_name),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, namespace: &str) -> Result<bool, StorageError> {
        let path = self.namespace_path(namespace);
        debug!("Deleting namespace {} at {:?}", namespace, path);

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn match_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, StorageError> {
        let path = self.entry_path(namespace, key);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let (meta, body) = match split_entry(key, &data) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Unreadable cache entry for {} ({}), dropping it", key, e);
                Self::remove_if_exists(&path).await?;
                return Ok(None);
            }
        };

        if compute_sha256(&body) != meta.sha256 {
            warn!("Body checksum mismatch for {}, dropping entry", key);
            Self::remove_if_exists(&path).await?;
            return Ok(None);
        }

        let status = StatusCode::from_u16(meta.status).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(CachedResponse {
            url: meta.url,
            status,
            headers: decode_headers(key, &meta.headers)?,
            body,
            kind: meta.kind,
        }))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: CachedResponse,
    ) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        ensure_storable(key, &response)?;

        fs::create_dir_all(self.namespace_path(namespace)).await?;

        debug!(
            "Writing {} bytes for {} into {}",
            response.body.len(),
            key,
            namespace
        );

        let meta = EntryMetadata {
            key: key.to_string(),
            url: response.url.clone(),
            status: response.status.as_u16(),
            kind: response.kind,
            headers: encode_headers(&response.headers),
            size: response.body.len() as u64,
            sha256: compute_sha256(&response.body),
            stored_at: Utc::now(),
        };

        let data = encode_entry(&meta, &response.body)?;
        Self::write_atomic(&self.entry_path(namespace, key), &data).await
    }

    async fn delete_entry(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        Self::remove_if_exists(&self.entry_path(namespace, key)).await
    }

    async fn entry_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let mut dir = match fs::read_dir(self.namespace_path(namespace)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_metadata(&path).await {
                Ok(Some(meta)) => keys.push(meta.key),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache entry {:?}: {}", path, e),
            }
        }

        keys.sort();
        Ok(keys)
    }
}
