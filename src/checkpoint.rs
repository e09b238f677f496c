//! Per-category checkpoint files.
//!
//! A checkpoint is the highest identifier that was successfully processed for a
//! category. It lives in `<dir>/<category>_last_read_id` as a bare decimal
//! string. Writes go to a temporary sibling first and are renamed into place,
//! so a reader sees either the old value or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument};

use crate::error::CheckpointError;
use crate::models::{Category, Identifier};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{}_last_read_id", category))
    }

    /// Read the last checkpointed identifier.
    ///
    /// Returns `Ok(None)` when no checkpoint has been written yet. Anything
    /// other than a decimal integer (surrounding whitespace allowed) is
    /// reported as [`CheckpointError::Malformed`].
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self, category: Category) -> Result<Option<Identifier>, CheckpointError> {
        let path = self.path_for(category);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No checkpoint yet");
                return Ok(None);
            }
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };

        match contents.trim().parse::<Identifier>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(CheckpointError::Malformed {
                category,
                path,
                contents,
            }),
        }
    }

    /// Overwrite the checkpoint for `category` with `id`.
    #[instrument(level = "debug", skip(self))]
    pub async fn save(&self, category: Category, id: Identifier) -> Result<(), CheckpointError> {
        let path = self.path_for(category);
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CheckpointError::Io {
                path: self.dir.clone(),
                source,
            })?;
        write_atomic(&path, id.to_string().as_bytes())
            .await
            .map_err(|source| CheckpointError::Io { path, source })
    }
}

/// Write `data` to a temporary sibling of `path`, then rename it over `path`.
pub async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.load(Category::Cryptic).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested"));
        store.save(Category::Prize, 21650).await.unwrap();
        assert_eq!(store.load(Category::Prize).await.unwrap(), Some(21650));
        assert_eq!(store.load(Category::Cryptic).await.unwrap(), None);

        let raw = std::fs::read_to_string(store.path_for(Category::Prize)).unwrap();
        assert_eq!(raw, "21650");
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(Category::Cryptic, 5).await.unwrap();
        store.save(Category::Cryptic, 6).await.unwrap();
        assert_eq!(store.load(Category::Cryptic).await.unwrap(), Some(6));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_load_tolerates_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.path_for(Category::Cryptic), "27412\n").unwrap();
        assert_eq!(store.load(Category::Cryptic).await.unwrap(), Some(27412));
    }

    #[tokio::test]
    async fn test_load_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.path_for(Category::Cryptic), "twenty").unwrap();
        let err = store.load(Category::Cryptic).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Malformed { ref contents, .. } if contents == "twenty"));
    }

    #[tokio::test]
    async fn test_load_empty_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.path_for(Category::Prize), "").unwrap();
        assert!(matches!(
            store.load(Category::Prize).await,
            Err(CheckpointError::Malformed { .. })
        ));
    }
}
