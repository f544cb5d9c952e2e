//! File-per-key durable backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

use crate::{Result, StorageBackend, StoreError};

const EXTENSION: &str = "json";

/// Durable backend storing one file per key.
///
/// Each namespace is a directory under the base path. Keys are
/// percent-encoded into file names so that separators like `/` stay inside a
/// single directory level. Writes go to a temporary file that is then renamed
/// over the target, so a reader never observes a half-written value. Every
/// write gets its own temporary file; concurrent writers to one key race only
/// on the rename, and the last rename wins.
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_path: PathBuf,
    temp_seq: Arc<AtomicU64>,
}

impl FileBackend {
    /// Creates a backend rooted at `base_path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::CreateDir {
                path: base_path.clone(),
                source: e,
            })?;
        Ok(Self {
            base_path,
            temp_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Returns the base path for storage.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.base_path.join(encode_key(namespace))
    }

    fn key_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_path(namespace)
            .join(format!("{}.{EXTENSION}", encode_key(key)))
    }

    /// Unique sibling of `path` for one write. Never carries the data extension.
    fn temp_path(&self, path: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("{}.{seq}.tmp", std::process::id()))
    }

    async fn list_files(&self, namespace: &str) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.namespace_path(namespace);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::ReadDir { path: dir, source: e }),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::ReadDir {
                path: dir.clone(),
                source: e,
            })?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_key)
            else {
                continue;
            };
            files.push((key, path));
        }
        Ok(files)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let dir = self.namespace_path(namespace);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;

        let path = self.key_path(namespace, key);
        let temp_path = self.temp_path(&path);
        if let Err(e) = fs::write(&temp_path, value).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::WriteFile {
                path: temp_path,
                source: e,
            });
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::WriteFile { path, source: e });
        }
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(namespace, key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFile { path, source: e }),
        }
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let path = self.key_path(namespace, key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::DeleteFile { path, source: e }),
        }
    }

    async fn scan(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .list_files(namespace)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self, namespace: &str) -> Result<usize> {
        let files = self.list_files(namespace).await?;
        let count = files.len();
        for (_, path) in files {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::DeleteFile { path, source: e }),
            }
        }
        Ok(count)
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Reverses [`encode_key`], returning `None` on malformed input.
fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_encoding() {
        let key = "EURUSD/2026-01-20";
        let encoded = encode_key(key);

        assert_eq!(encoded, "EURUSD%2F2026-01-20");
        assert_eq!(decode_key(&encoded).unwrap(), key);
        assert_eq!(decode_key("candles%3A1m").unwrap(), "candles:1m");
        assert!(decode_key("bad%2").is_none());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        backend
            .put("ticks", "EURUSD/2026-01-20", b"[]".to_vec())
            .await
            .unwrap();

        let value = backend.get("ticks", "EURUSD/2026-01-20").await.unwrap();
        assert_eq!(value, Some(b"[]".to_vec()));
        assert!(backend.get("ticks", "missing").await.unwrap().is_none());
        assert!(temp_dir.path().join("ticks").exists());
    }

    #[tokio::test]
    async fn test_scan_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        for key in ["GBPUSD/2026-01-02", "EURUSD/2026-01-02", "EURUSD/2026-01-01"] {
            backend.put("meta", key, b"{}".to_vec()).await.unwrap();
        }

        let keys = backend.scan("meta", "EURUSD/").await.unwrap();
        assert_eq!(keys, vec!["EURUSD/2026-01-01", "EURUSD/2026-01-02"]);
        assert!(backend.scan("empty", "").await.unwrap().is_empty());

        assert_eq!(backend.clear("meta").await.unwrap(), 3);
        assert!(backend.scan("meta", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        backend.put("ns", "k", b"v".to_vec()).await.unwrap();
        assert!(backend.delete("ns", "k").await.unwrap());
        assert!(!backend.delete("ns", "k").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_same_key() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        for round in 0..20u32 {
            let writers: Vec<_> = (0..4u32)
                .map(|writer| {
                    let backend = backend.clone();
                    tokio::spawn(async move {
                        let value = format!("{{\"round\":{round},\"writer\":{writer}}}");
                        backend
                            .put("cache", "candles:EURUSD:5m", value.into_bytes())
                            .await
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let stored = backend.get("cache", "candles:EURUSD:5m").await.unwrap().unwrap();
            let stored = String::from_utf8(stored).unwrap();
            assert!(stored.starts_with(&format!("{{\"round\":{round},")), "{stored}");
        }

        let mut leftovers = Vec::new();
        let mut entries = fs::read_dir(temp_dir.path().join("cache")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            leftovers.push(entry.file_name());
        }
        assert_eq!(leftovers.len(), 1, "{leftovers:?}");
        assert_eq!(
            backend.scan("cache", "").await.unwrap(),
            vec!["candles:EURUSD:5m"]
        );
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend = FileBackend::new(temp_dir.path()).await.unwrap();
            backend.put("ns", "k", b"v".to_vec()).await.unwrap();
        }
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();
        assert_eq!(backend.get("ns", "k").await.unwrap(), Some(b"v".to_vec()));
    }
}
