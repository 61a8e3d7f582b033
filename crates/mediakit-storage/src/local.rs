//! Local filesystem storage gateway.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{validate_filename, StorageError, StorageResult, StoredFile};

/// Byte stream handed to the HTTP layer for downloads.
pub type DownloadStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Upper bound on collision-avoidance retries when deriving a filename.
const MAX_FILENAME_ATTEMPTS: u64 = 64;

/// Storage gateway over a single root directory.
///
/// All writes are atomic (temp file then rename) so concurrent readers never
/// observe a partially written file; reads and writes for different files
/// need no further coordination.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    canonical_root: PathBuf,
    download_base: String,
}

impl LocalStorage {
    /// Create a new gateway rooted at `root`.
    ///
    /// # Arguments
    /// * `root` - storage root directory, created if absent
    /// * `download_base` - URL prefix that `download_url` values are built from
    pub async fn new(root: impl Into<PathBuf>, download_base: String) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        let canonical_root = root.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            root,
            canonical_root,
            download_base,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/{}", self.download_base.trim_end_matches('/'), filename)
    }

    /// Persist `bytes` under a collision-free name derived from `base_name`.
    ///
    /// The final filename is `<stem>_<millis>.<ext>`; the timestamp suffix
    /// guarantees uniqueness without caller coordination.
    #[tracing::instrument(skip(self, bytes), fields(size_bytes = bytes.len()))]
    pub async fn store(&self, base_name: &str, bytes: &[u8]) -> StorageResult<StoredFile> {
        // Strip any path components the caller smuggled into the base name
        let base = Path::new(base_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidFilename("empty base name".to_string()))?;
        validate_filename(base)?;

        let start_millis = Utc::now().timestamp_millis() as u64;
        let (filename, path) = self.reserve_filename(base, start_millis).await?;

        let tmp_path = self.root.join(format!(".{}.tmp", filename));
        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::StoreFailed(format!("Failed to create {}: {}", tmp_path.display(), e))
        })?;
        file.write_all(bytes).await.map_err(|e| {
            StorageError::StoreFailed(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::StoreFailed(format!("Failed to sync {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "Failed to rename {} to {}: {}",
                tmp_path.display(),
                path.display(),
                e
            ))
        })?;

        let meta = fs::metadata(&path).await?;
        let stored = self.stored_file(filename, path, &meta);

        tracing::info!(
            filename = %stored.filename,
            size_bytes = stored.size,
            "Artifact stored"
        );

        Ok(stored)
    }

    /// Resolve and open a file for download.
    ///
    /// Order matters: lexical filename rejection runs before any filesystem
    /// call; the canonical path is then checked for containment inside the
    /// storage root (defense against symlink and normalization tricks).
    #[tracing::instrument(skip(self))]
    pub async fn open_download(&self, filename: &str) -> StorageResult<(StoredFile, DownloadStream)> {
        let path = self.resolve(filename)?;

        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(filename.to_string())
            } else {
                StorageError::ReadFailed(format!("Failed to stat {}: {}", path.display(), e))
            }
        })?;
        if !meta.is_file() {
            return Err(StorageError::InvalidFilename(
                "path is not a regular file".to_string(),
            ));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let stored = self.stored_file(filename.to_string(), path, &meta);

        let reader = tokio_util::io::ReaderStream::new(file);
        let stream = reader.map(|result| {
            result.map_err(|e| StorageError::ReadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok((stored, Box::pin(stream)))
    }

    /// Enumerate the storage root non-recursively, newest modified first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            // In-flight temp files and other dotfiles are not artifacts
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(filename = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            files.push(self.stored_file(name, entry.path(), &meta));
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    /// Validate, join, canonicalize, and verify containment in the root.
    fn resolve(&self, filename: &str) -> StorageResult<PathBuf> {
        validate_filename(filename)?;

        let candidate = self.root.join(filename);
        let canonical = match candidate.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Nothing to contain-check; the lexical checks already passed
                return Err(StorageError::NotFound(filename.to_string()));
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to canonicalize {}: {}",
                    candidate.display(),
                    e
                )))
            }
        };

        if canonical.strip_prefix(&self.canonical_root).is_err() {
            return Err(StorageError::InvalidFilename(
                "filename resolves outside the storage root".to_string(),
            ));
        }

        Ok(canonical)
    }

    /// Find an unused `<stem>_<millis>.<ext>` name, bumping the timestamp on
    /// the (rare) collision.
    async fn reserve_filename(
        &self,
        base: &str,
        start_millis: u64,
    ) -> StorageResult<(String, PathBuf)> {
        for attempt in 0..MAX_FILENAME_ATTEMPTS {
            let millis = start_millis + attempt;
            let filename = match base.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, millis, ext),
                _ => format!("{}_{}", base, millis),
            };
            let path = self.root.join(&filename);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                return Ok((filename, path));
            }
        }
        Err(StorageError::StoreFailed(format!(
            "Could not derive a collision-free filename for {}",
            base
        )))
    }

    fn stored_file(&self, filename: String, path: PathBuf, meta: &std::fs::Metadata) -> StoredFile {
        let download_url = self.download_url(&filename);
        let mime_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        StoredFile {
            filename,
            size: meta.len(),
            mime_type,
            created: to_utc(meta.created().or_else(|_| meta.modified())),
            modified: to_utc(meta.modified()),
            path,
            download_url,
        }
    }
}

fn to_utc(time: std::io::Result<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE_URL: &str = "http://localhost:8080/v1/storage/download";

    async fn storage(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), BASE_URL.to_string())
            .await
            .unwrap()
    }

    async fn read_all(mut stream: DownloadStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn store_then_download_returns_exact_bytes() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let data = b"not actually an mp4".to_vec();
        let stored = storage.store("clip.mp4", &data).await.unwrap();

        assert!(stored.filename.starts_with("clip_"));
        assert!(stored.filename.ends_with(".mp4"));
        assert_eq!(stored.mime_type, "video/mp4");
        assert_eq!(stored.size, data.len() as u64);
        assert!(stored.download_url.ends_with(&stored.filename));

        let (meta, stream) = storage.open_download(&stored.filename).await.unwrap();
        assert_eq!(meta.size, data.len() as u64);
        assert_eq!(read_all(stream).await, data);
    }

    #[tokio::test]
    async fn repeated_store_of_same_base_name_never_collides() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let a = storage.store("clip.mp4", b"one").await.unwrap();
        let b = storage.store("clip.mp4", b"two").await.unwrap();
        assert_ne!(a.filename, b.filename);

        let (_, stream) = storage.open_download(&a.filename).await.unwrap();
        assert_eq!(read_all(stream).await, b"one");
    }

    #[tokio::test]
    async fn path_components_in_base_name_are_stripped() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let stored = storage.store("nested/dir/clip.mp4", b"data").await.unwrap();
        assert!(stored.filename.starts_with("clip_"));
        assert!(!stored.filename.contains('/'));
    }

    #[tokio::test]
    async fn traversal_download_rejected_before_filesystem_access() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let result = storage.open_download("../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));

        let result = storage.open_download("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));

        let result = storage.open_download("clip\u{0007}.mp4").await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_the_root_is_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let storage = storage(&dir).await;

        let target = outside.path().join("secret.txt");
        std::fs::write(&target, b"secret").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("escape.txt")).unwrap();

        let result = storage.open_download("escape.txt").await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let result = storage.open_download("nope.mp4").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_orders_newest_modified_first() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let first = storage.store("a.txt", b"a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let second = storage.store("b.txt", b"b").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let third = storage.store("c.txt", b"c").await.unwrap();

        let files = storage.list().await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                third.filename.as_str(),
                second.filename.as_str(),
                first.filename.as_str()
            ]
        );
    }

    #[tokio::test]
    async fn list_skips_directories_and_dotfiles() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        storage.store("visible.txt", b"x").await.unwrap();
        std::fs::create_dir(dir.path().join("jobs")).unwrap();
        std::fs::write(dir.path().join(".partial.tmp"), b"x").unwrap();

        let files = storage.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].filename.starts_with("visible_"));
    }
}
