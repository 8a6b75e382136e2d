//! File-system helpers shared by the applier, the secrets backend and the
//! plan builder.
use std::path::Path;

use crate::error::{Result, SyncError};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    Ok(())
}

/// Remove whatever exists at `path` (file, symlink or directory tree).
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| SyncError::io(path, e))
}

/// Recursively copy a directory tree.
///
/// `.git` directories are skipped.  Symlinks within the source tree are
/// followed, so their contents are materialised in the destination.
/// File permissions are carried over by [`std::fs::copy`].
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| SyncError::io(dst, e))?;
    for entry in std::fs::read_dir(src).map_err(|e| SyncError::io(src, e))? {
        let entry = entry.map_err(|e| SyncError::io(src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|e| SyncError::io(&src_path, e))?;
        }
    }
    Ok(())
}

/// Replace `dst` with a copy of `src` (file or directory).
///
/// # Errors
///
/// Returns an error if the old destination cannot be removed or the copy
/// fails.
pub fn replace_with_copy(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        remove_existing(dst)?;
        copy_dir_recursive(src, dst)
    } else {
        ensure_parent_dir(dst)?;
        if dst.is_dir() {
            remove_existing(dst)?;
        }
        std::fs::copy(src, dst).map_err(|e| SyncError::io(src, e))?;
        Ok(())
    }
}

/// Permission bits of `path`, or `None` on platforms without Unix modes.
#[must_use]
pub fn file_mode(path: &Path) -> Option<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        path.metadata().ok().map(|m| m.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

/// Set the permission bits of `path`.  A no-op on platforms without Unix
/// modes.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| SyncError::io(path, e))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Read a file if it exists.
///
/// # Errors
///
/// Returns an error for any read failure other than "not found".
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ensure_parent_dir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("file.txt");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn remove_existing_handles_missing_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        remove_existing(&dir.path().join("nope")).unwrap();

        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        remove_existing(&file).unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("t");
        std::fs::create_dir_all(tree.join("inner")).unwrap();
        std::fs::write(tree.join("inner").join("f"), "x").unwrap();
        remove_existing(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[test]
    fn copy_dir_recursive_copies_nested_and_skips_git() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::create_dir_all(src.join(".git")).unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();
        std::fs::write(src.join("sub").join("b.txt"), "b").unwrap();
        std::fs::write(src.join(".git").join("HEAD"), "ref").unwrap();

        let dst = dir.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dst.join("sub").join("b.txt")).unwrap(), "b");
        assert!(!dst.join(".git").exists());
    }

    #[test]
    fn replace_with_copy_drops_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("keep"), "1").unwrap();
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("stale"), "0").unwrap();

        replace_with_copy(&src, &dst).unwrap();
        assert!(dst.join("keep").exists());
        assert!(!dst.join("stale").exists());
    }

    #[test]
    fn read_optional_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_optional(&dir.path().join("x")).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn mode_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("secret");
        std::fs::write(&file, "s").unwrap();
        set_mode(&file, 0o600).unwrap();
        assert_eq!(file_mode(&file), Some(0o600));
    }
}
