//! Atomic file writes shared by the backing stores.
//!
//! Writes go to a sibling temp file which is then renamed over the target,
//! so readers observe either the previous or the new contents, never a
//! partial write.

use std::path::Path;

use crate::error::PersistenceError;

pub(crate) async fn ensure_parent_dir(path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::from_io("create_dir", e))?;
    }
    Ok(())
}

pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    ensure_parent_dir(path).await?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, contents)
        .await
        .map_err(|e| PersistenceError::from_io("write_temp", e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| PersistenceError::from_io("rename", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/state.json");

        write_atomic(&path, "{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, "old").await.unwrap();
        write_atomic(&path, "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
