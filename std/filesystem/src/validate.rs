//! Path validation and security for the filesystem tools.
//!
//! All filesystem operations must pass through [`validate_path`] (or
//! [`validate_entry_path`] for deletions) to ensure the requested path is
//! within the server's allowed directories.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from path validation.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The path is outside all allowed directories.
    #[error("path not allowed: {}", .0.display())]
    NotAllowed(PathBuf),
    /// The path contains a null byte.
    #[error("path contains null byte")]
    NullByte,
    /// An I/O error occurred during path resolution.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidateError {
    /// Whether the path (or its parent) does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ValidateError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Validate that a path is within the allowed directories.
///
/// Steps:
/// 1. Reject paths containing null bytes
/// 2. Canonicalize the path (resolves symlinks, `..`, etc.)
///    - If the path does not exist, canonicalize the parent directory instead
/// 3. Verify the canonical path starts with one of the allowed directories
pub fn validate_path(path: &str, allowed_dirs: &[PathBuf]) -> Result<PathBuf, ValidateError> {
    if path.contains('\0') {
        return Err(ValidateError::NullByte);
    }
    confine(Path::new(path), allowed_dirs)
}

/// Like [`validate_path`], but never follows the final path component.
///
/// Used for deletions so that removing a symlink removes the link, and the
/// check applies to where the link lives rather than where it points.
pub fn validate_entry_path(path: &str, allowed_dirs: &[PathBuf]) -> Result<PathBuf, ValidateError> {
    if path.contains('\0') {
        return Err(ValidateError::NullByte);
    }
    let path = Path::new(path);
    let canonical = canonical_parent_join(path)?;
    ensure_allowed(canonical, allowed_dirs)
}

/// Canonicalize an already-split path and check it against the allowed
/// directories.
pub fn confine(path: &Path, allowed_dirs: &[PathBuf]) -> Result<PathBuf, ValidateError> {
    let canonical = if path.exists() {
        path.canonicalize()?
    } else {
        canonical_parent_join(path)?
    };
    ensure_allowed(canonical, allowed_dirs)
}

fn canonical_parent_join(path: &Path) -> Result<PathBuf, ValidateError> {
    let parent = path.parent().ok_or_else(|| {
        ValidateError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "parent directory not found",
        ))
    })?;
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let canon_parent = parent.canonicalize()?;
    let file_name = path.file_name().ok_or_else(|| {
        ValidateError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no file name",
        ))
    })?;
    Ok(canon_parent.join(file_name))
}

fn ensure_allowed(canonical: PathBuf, allowed_dirs: &[PathBuf]) -> Result<PathBuf, ValidateError> {
    let allowed = allowed_dirs.iter().any(|dir| canonical.starts_with(dir));
    if !allowed {
        return Err(ValidateError::NotAllowed(canonical));
    }
    Ok(canonical)
}

/// Canonicalize a list of directory paths, skipping any that don't exist.
pub fn canonicalize_dirs(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.into_iter()
        .filter_map(|d| match d.canonicalize() {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                tracing::warn!(dir = %d.display(), error = %e, "ignoring unusable allowed directory");
                None
            }
        })
        .collect()
}
