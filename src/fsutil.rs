//! Existence and directory helpers shared by the gate and the pipeline.

use crate::error::IiifError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// True only if `path` exists and is non-empty.
///
/// A zero-byte file (an interrupted write, a tool that crashed after
/// `create`) counts as absent so the page is retried.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    match std::fs::metadata(path.as_ref()) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

/// The directory pages of a run are written to.
///
/// `base` itself, or `base/vol.<volume_id>` when a volume id is given.
pub fn volume_dir(base: &Path, volume_id: Option<&str>) -> PathBuf {
    match volume_id {
        Some(id) if !id.is_empty() => base.join(format!("vol.{id}")),
        _ => base.to_path_buf(),
    }
}

/// Create the save directory for a run. Idempotent.
pub fn ensure_directory(base: &Path, volume_id: Option<&str>) -> Result<PathBuf, IiifError> {
    let dir = volume_dir(base, volume_id);
    std::fs::create_dir_all(&dir).map_err(|e| IiifError::DirectoryCreate {
        path: dir.clone(),
        source: e,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o777)) {
            warn!("Could not open up permissions on {}: {}", dir.display(), e);
        }
    }
    debug!("Save directory: {}", dir.display());
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(!file_exists(&path));
        std::fs::write(&path, b"jpeg").unwrap();
        assert!(file_exists(&path));
    }

    #[test]
    fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!file_exists(dir.path().join("nope")));
    }

    #[test]
    fn ensure_directory_with_volume() {
        let dir = tempfile::tempdir().unwrap();
        let created = ensure_directory(dir.path(), Some("2")).unwrap();
        assert_eq!(created, dir.path().join("vol.2"));
        assert!(created.is_dir());
        // second call is a no-op
        let again = ensure_directory(dir.path(), Some("2")).unwrap();
        assert_eq!(again, created);
    }

    #[test]
    fn ensure_directory_without_volume() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("books");
        let created = ensure_directory(&base, None).unwrap();
        assert_eq!(created, base);
        assert!(base.is_dir());
    }

    #[test]
    fn empty_volume_id_means_base() {
        let base = Path::new("/tmp/books");
        assert_eq!(volume_dir(base, Some("")), base.to_path_buf());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_directory_opens_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let created = ensure_directory(dir.path(), Some("1")).unwrap();
        let mode = std::fs::metadata(&created).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
