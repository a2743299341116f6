//! Synchronous implementations of the filesystem tools.
//!
//! Every public function confines its paths to the allowed directories,
//! enforces the restricted-name policy, and never fails: errors come back
//! as text starting with `"Error: "`, either as the whole result or embedded
//! per entry in batch results. These functions block and are meant to run on
//! the blocking thread pool.

use crate::policy::{is_restricted, resolves_to_restricted};
use crate::validate::{ValidateError, confine, validate_entry_path, validate_path};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key used for the error entry when a batch read fails as a whole.
pub const ERROR_KEY: &str = "Error";

/// Failure of a single filesystem operation.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("No such file or directory: '{0}'")]
    NoSuchFileOrDirectory(String),
    #[error("No such file: '{0}'")]
    NoSuchFile(String),
    #[error("No such directory: '{0}'")]
    NoSuchDirectory(String),
    #[error("Directory not empty: '{0}'")]
    NotEmpty(String),
    #[error("Refusing to delete sandbox root: '{0}'")]
    SandboxRoot(String),
    #[error("Access to '{0}' is restricted.")]
    Restricted(String),
    #[error("{source}: '{path}'")]
    Unreadable { path: String, source: io::Error },
    #[error("{0}")]
    Path(#[from] ValidateError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Render an error the way the agent expects to see it.
pub fn report<E: std::fmt::Display>(err: E) -> String {
    format!("Error: {err}")
}

/// Resolve `raw` inside the sandbox; a missing path becomes `missing`.
fn sandboxed(raw: &str, allowed_dirs: &[PathBuf], missing: FsError) -> Result<PathBuf, FsError> {
    match validate_path(raw, allowed_dirs) {
        Ok(path) => Ok(path),
        Err(e) if e.is_not_found() => Err(missing),
        Err(e) => Err(e.into()),
    }
}

fn restricted(path: &Path) -> FsError {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    FsError::Restricted(name)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Names of the direct children of `dir_path`, in enumeration order.
pub fn list_directory(dir_path: &str, allowed_dirs: &[PathBuf]) -> Vec<String> {
    try_list_directory(dir_path, allowed_dirs).unwrap_or_else(|e| vec![report(e)])
}

fn try_list_directory(dir_path: &str, allowed_dirs: &[PathBuf]) -> Result<Vec<String>, FsError> {
    let missing = || FsError::NoSuchFileOrDirectory(dir_path.to_owned());
    let dir = sandboxed(dir_path, allowed_dirs, missing())?;
    if !dir.is_dir() {
        return Err(missing());
    }

    let names = readable(&dir, fs::read_dir(&dir)?)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    Ok(names)
}

/// Full UTF-8 content of one file.
///
/// Restricted names are refused before any filesystem access.
pub fn get_file_content(file_path: &str, allowed_dirs: &[PathBuf]) -> String {
    try_get_file_content(file_path, allowed_dirs).unwrap_or_else(report)
}

fn try_get_file_content(file_path: &str, allowed_dirs: &[PathBuf]) -> Result<String, FsError> {
    let requested = Path::new(file_path);
    if is_restricted(requested) {
        return Err(restricted(requested));
    }

    let missing = || FsError::NoSuchFile(file_path.to_owned());
    let path = sandboxed(file_path, allowed_dirs, missing())?;
    if is_restricted(&path) {
        return Err(restricted(&path));
    }
    if !path.is_file() {
        return Err(missing());
    }
    Ok(fs::read_to_string(&path)?)
}

/// Every directory and file reachable from `dir_path`, as
/// `(directories, files)` in depth-first pre-order.
///
/// The root is the first directory. On failure, including any directory in
/// the tree that cannot be listed, the error is the only element of the
/// directory list.
pub fn list_directory_recursive(
    dir_path: &str,
    allowed_dirs: &[PathBuf],
) -> (Vec<String>, Vec<String>) {
    try_list_directory_recursive(dir_path, allowed_dirs)
        .unwrap_or_else(|e| (vec![report(e)], Vec::new()))
}

fn try_list_directory_recursive(
    dir_path: &str,
    allowed_dirs: &[PathBuf],
) -> Result<(Vec<String>, Vec<String>), FsError> {
    let missing = || FsError::NoSuchFileOrDirectory(dir_path.to_owned());
    let root = sandboxed(dir_path, allowed_dirs, missing())?;
    if !root.is_dir() {
        return Err(missing());
    }

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    walk(root, allowed_dirs, |visit| {
        match visit {
            Visit::Dir(path) => dirs.push(display(path)),
            Visit::File(path) => files.push(display(path)),
            Visit::Unreadable(path, source) => return Err(unreadable(path, source)),
        }
        Ok(())
    })?;
    Ok((dirs, files))
}

/// Contents of every regular file directly inside `dir_path`, keyed by
/// absolute path.
///
/// Restricted files are skipped; a file that cannot be read maps to its
/// error text.
pub fn read_files_in_directory(dir_path: &str, allowed_dirs: &[PathBuf]) -> BTreeMap<String, String> {
    try_read_files_in_directory(dir_path, allowed_dirs).unwrap_or_else(error_map)
}

fn try_read_files_in_directory(
    dir_path: &str,
    allowed_dirs: &[PathBuf],
) -> Result<BTreeMap<String, String>, FsError> {
    let missing = || FsError::NoSuchFileOrDirectory(dir_path.to_owned());
    let dir = sandboxed(dir_path, allowed_dirs, missing())?;
    if !dir.is_dir() {
        return Err(missing());
    }

    let mut contents = BTreeMap::new();
    let entries = children(&dir, allowed_dirs).map_err(|source| unreadable(&dir, source))?;
    for (path, kind) in entries {
        if kind == NodeKind::File {
            read_into(&path, &mut contents);
        }
    }
    Ok(contents)
}

/// Contents of every regular file in the tree under `dir_path`, keyed by
/// absolute path.
///
/// Restricted files are skipped. A file that cannot be read, or a
/// subdirectory that cannot be listed, maps to its error text. A root that
/// cannot be listed fails the whole call.
pub fn read_files_recursively(dir_path: &str, allowed_dirs: &[PathBuf]) -> BTreeMap<String, String> {
    try_read_files_recursively(dir_path, allowed_dirs).unwrap_or_else(error_map)
}

fn try_read_files_recursively(
    dir_path: &str,
    allowed_dirs: &[PathBuf],
) -> Result<BTreeMap<String, String>, FsError> {
    let missing = || FsError::NoSuchFileOrDirectory(dir_path.to_owned());
    let root = sandboxed(dir_path, allowed_dirs, missing())?;
    if !root.is_dir() {
        return Err(missing());
    }

    let mut contents = BTreeMap::new();
    walk(root, allowed_dirs, |visit| {
        match visit {
            Visit::Dir(_) => {}
            Visit::File(path) => read_into(path, &mut contents),
            Visit::Unreadable(path, e) => {
                tracing::debug!(dir = %path.display(), error = %e, "failed to list directory");
                contents.insert(display(path), report(e));
            }
        }
        Ok(())
    })?;
    Ok(contents)
}

fn read_into(path: &Path, contents: &mut BTreeMap<String, String>) {
    if resolves_to_restricted(path) {
        return;
    }
    let value = fs::read_to_string(path).unwrap_or_else(|e| {
        tracing::debug!(file = %path.display(), error = %e, "failed to read file");
        report(e)
    });
    contents.insert(display(path), value);
}

fn unreadable(path: &Path, source: io::Error) -> FsError {
    FsError::Unreadable {
        path: display(path),
        source,
    }
}

fn error_map(err: FsError) -> BTreeMap<String, String> {
    BTreeMap::from([(ERROR_KEY.to_owned(), report(err))])
}

/// Remove exactly one regular file.
pub fn delete_file(file_path: &str, allowed_dirs: &[PathBuf]) -> String {
    try_delete_file(file_path, allowed_dirs).unwrap_or_else(report)
}

fn try_delete_file(file_path: &str, allowed_dirs: &[PathBuf]) -> Result<String, FsError> {
    let requested = Path::new(file_path);
    if is_restricted(requested) {
        return Err(restricted(requested));
    }

    let missing = || FsError::NoSuchFile(file_path.to_owned());
    let path = match validate_entry_path(file_path, allowed_dirs) {
        Ok(path) => path,
        Err(e) if e.is_not_found() => return Err(missing()),
        Err(e) => return Err(e.into()),
    };
    if resolves_to_restricted(&path) {
        return Err(restricted(&path));
    }
    if !path.is_file() {
        return Err(missing());
    }

    fs::remove_file(&path)?;
    tracing::info!(file = %path.display(), "deleted file");
    Ok(format!("File '{file_path}' deleted successfully."))
}

/// Remove exactly one directory, and only if it is empty.
pub fn delete_folder(folder_path: &str, allowed_dirs: &[PathBuf]) -> String {
    try_delete_folder(folder_path, allowed_dirs).unwrap_or_else(report)
}

fn try_delete_folder(folder_path: &str, allowed_dirs: &[PathBuf]) -> Result<String, FsError> {
    let missing = || FsError::NoSuchDirectory(folder_path.to_owned());
    let path = match validate_entry_path(folder_path, allowed_dirs) {
        Ok(path) => path,
        Err(e) if e.is_not_found() => return Err(missing()),
        Err(e) => return Err(e.into()),
    };
    let is_dir = fs::symlink_metadata(&path).is_ok_and(|meta| meta.is_dir());
    if !is_dir {
        return Err(missing());
    }
    if allowed_dirs.contains(&path) {
        return Err(FsError::SandboxRoot(folder_path.to_owned()));
    }
    if fs::read_dir(&path)?.next().is_some() {
        return Err(FsError::NotEmpty(folder_path.to_owned()));
    }

    fs::remove_dir(&path)?;
    tracing::info!(dir = %path.display(), "deleted directory");
    Ok(format!("Directory '{folder_path}' deleted successfully."))
}

/// How a directory entry is treated by the walker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    File,
    Dir,
    /// A symlink to a directory: reported, never descended.
    LinkedDir,
}

enum Visit<'a> {
    Dir(&'a Path),
    File(&'a Path),
    Unreadable(&'a Path, io::Error),
}

/// Depth-first pre-order walk from `root` using an explicit stack.
///
/// Children are visited in enumeration order. Stack depth does not grow
/// with nesting depth of the tree. A root that cannot be listed is an error;
/// any other directory that cannot be listed goes to `visit`, which may stop
/// the walk by returning an error.
fn walk(
    root: PathBuf,
    allowed_dirs: &[PathBuf],
    mut visit: impl FnMut(Visit<'_>) -> Result<(), FsError>,
) -> Result<(), FsError> {
    let entries = children(&root, allowed_dirs).map_err(|source| unreadable(&root, source))?;
    visit(Visit::Dir(&root))?;
    let mut pending: Vec<_> = entries.into_iter().rev().collect();

    while let Some((path, kind)) = pending.pop() {
        match kind {
            NodeKind::File => visit(Visit::File(&path))?,
            NodeKind::LinkedDir => visit(Visit::Dir(&path))?,
            NodeKind::Dir => {
                visit(Visit::Dir(&path))?;
                match children(&path, allowed_dirs) {
                    Ok(entries) => pending.extend(entries.into_iter().rev()),
                    Err(e) => visit(Visit::Unreadable(&path, e))?,
                }
            }
        }
    }
    Ok(())
}

/// Classified direct children of `dir`. Entries that are neither files nor
/// directories, and symlinks leading out of the sandbox, are left out.
fn children(dir: &Path, allowed_dirs: &[PathBuf]) -> io::Result<Vec<(PathBuf, NodeKind)>> {
    let entries = readable(dir, fs::read_dir(dir)?)
        .filter_map(|entry| classify(&entry, allowed_dirs).map(|kind| (entry.path(), kind)))
        .collect();
    Ok(entries)
}

/// The entries of a directory listing that could be read. An entry that
/// fails is logged and dropped; the rest of the listing still counts.
fn readable<T>(
    dir: &Path,
    entries: impl IntoIterator<Item = io::Result<T>>,
) -> impl Iterator<Item = T> {
    entries.into_iter().filter_map(move |entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
            None
        }
    })
}

fn classify(entry: &fs::DirEntry, allowed_dirs: &[PathBuf]) -> Option<NodeKind> {
    let file_type = entry.file_type().ok()?;
    if file_type.is_dir() {
        return Some(NodeKind::Dir);
    }
    if file_type.is_file() {
        return Some(NodeKind::File);
    }
    if !file_type.is_symlink() {
        return None;
    }

    let path = entry.path();
    let target = match confine(&path, allowed_dirs) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(link = %path.display(), error = %e, "skipping symlink");
            return None;
        }
    };
    let meta = fs::metadata(&target).ok()?;
    if meta.is_dir() {
        Some(NodeKind::LinkedDir)
    } else if meta.is_file() {
        Some(NodeKind::File)
    } else {
        None
    }
}
