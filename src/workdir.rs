//! Working directory preparation
//!
//! The engine writes its checkpoints into the working directory, so it must
//! exist and be writable by every simulation worker before the first stage.
//! No privilege escalation happens here: the caller needs write access to the
//! parent directory.

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Create `path` (and parents) if missing. Succeeds when it already exists.
pub fn ensure_work_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        tracing::debug!(path = %path.display(), "working directory already present");
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| PipelineError::fs("create", path, e))?;
    tracing::debug!(path = %path.display(), "created working directory");
    Ok(())
}

/// Apply `mode` to the working directory and everything below it, like
/// `chmod -R`. The directory itself may be a symlink; links found inside it
/// are neither followed nor changed.
#[cfg(unix)]
pub fn open_permissions(path: &Path, mode: u32) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| PipelineError::fs("stat", path, e))?;
    set_mode_recursive(path, &metadata, mode)?;
    tracing::debug!(path = %path.display(), mode = format!("{mode:o}"), "permissions set");
    Ok(())
}

#[cfg(unix)]
fn set_mode_recursive(path: &Path, metadata: &fs::Metadata, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // Open the directory up before listing it
    let mut perms = metadata.permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
        .map_err(|e| PipelineError::fs("set permissions on", path, e))?;

    if !metadata.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(path).map_err(|e| PipelineError::fs("list", path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::fs("list", path, e))?;
        let child = entry.path();
        let child_meta =
            fs::symlink_metadata(&child).map_err(|e| PipelineError::fs("stat", &child, e))?;
        if child_meta.file_type().is_symlink() {
            continue;
        }
        set_mode_recursive(&child, &child_meta, mode)?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn open_permissions(path: &Path, mode: u32) -> Result<()> {
    fs::metadata(path).map_err(|e| PipelineError::fs("stat", path, e))?;
    tracing::debug!(
        path = %path.display(),
        mode = format!("{mode:o}"),
        "permission bits not supported on this platform, skipping"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_work_dir_creates_nested() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("runs").join("post");

        ensure_work_dir(&post).unwrap();
        assert!(post.is_dir());
    }

    #[test]
    fn test_ensure_work_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("post");
        fs::create_dir(&post).unwrap();
        fs::write(post.join("dump1.pruebas"), "keep").unwrap();

        ensure_work_dir(&post).unwrap();
        ensure_work_dir(&post).unwrap();

        assert_eq!(fs::read_to_string(post.join("dump1.pruebas")).unwrap(), "keep");
    }

    #[test]
    fn test_ensure_work_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("post");
        fs::write(&post, "not a dir").unwrap();

        let err = ensure_work_dir(&post).unwrap_err();
        assert!(matches!(err, PipelineError::Filesystem { op: "create", .. }));
    }

    #[test]
    fn test_open_permissions_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        assert!(open_permissions(&temp.path().join("post"), 0o777).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_permissions_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let post = temp.path().join("post");
        ensure_work_dir(&post).unwrap();

        open_permissions(&post, 0o777).unwrap();
        let mode = fs::metadata(&post).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);

        // Running again is harmless
        open_permissions(&post, 0o777).unwrap();
        let mode = fs::metadata(&post).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }

    #[cfg(unix)]
    #[test]
    fn test_open_permissions_reaches_existing_entries() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let post = temp.path().join("post");
        let nested = post.join("restart");
        fs::create_dir_all(&nested).unwrap();
        fs::write(post.join("old.dat"), "left from last run").unwrap();
        fs::write(nested.join("dump1.pruebas"), "").unwrap();
        fs::set_permissions(post.join("old.dat"), fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(nested.join("dump1.pruebas"), fs::Permissions::from_mode(0o600))
            .unwrap();
        fs::set_permissions(&nested, fs::Permissions::from_mode(0o700)).unwrap();

        open_permissions(&post, 0o777).unwrap();

        for path in [post.join("old.dat"), nested.clone(), nested.join("dump1.pruebas")] {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o777, "{}", path.display());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_open_permissions_leaves_symlink_targets_alone() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside.dat");
        fs::write(&outside, "").unwrap();
        fs::set_permissions(&outside, fs::Permissions::from_mode(0o600)).unwrap();
        let post = temp.path().join("post");
        fs::create_dir(&post).unwrap();
        std::os::unix::fs::symlink(&outside, post.join("link.pruebas")).unwrap();

        open_permissions(&post, 0o777).unwrap();

        let mode = fs::metadata(&outside).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
