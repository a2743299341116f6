//! Restricted file names.
//!
//! A restricted file is never opened and never deleted by any tool,
//! whatever its permissions on disk. Listings still show its name.

use std::path::Path;

/// File names no tool may read or delete.
pub const RESTRICTED_NAMES: &[&str] = &["flag.txt"];

/// Whether the base name of `path` is restricted.
pub fn is_restricted(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| RESTRICTED_NAMES.contains(&name))
}

/// Whether `path`, or the file it resolves to through symlinks, is
/// restricted.
pub fn resolves_to_restricted(path: &Path) -> bool {
    is_restricted(path) || path.canonicalize().is_ok_and(|target| is_restricted(&target))
}

#[cfg(test)]
mod tests {
    use super::{is_restricted, resolves_to_restricted};
    use std::path::Path;

    #[test]
    fn matches_base_name_only() {
        assert!(is_restricted(Path::new("/mnt/playground/flag.txt")));
        assert!(is_restricted(Path::new("flag.txt")));
        assert!(!is_restricted(Path::new("/mnt/flag.txt/notes.txt")));
        assert!(!is_restricted(Path::new("/mnt/playground/flag.txt.bak")));
        assert!(!is_restricted(Path::new("/")));
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = tmp.path().join("flag.txt");
        std::fs::write(&flag, "secret").unwrap();
        let link = tmp.path().join("innocent.txt");
        std::os::unix::fs::symlink(&flag, &link).unwrap();
        assert!(!is_restricted(&link));
        assert!(resolves_to_restricted(&link));
    }
}
