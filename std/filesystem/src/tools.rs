//! Tool implementations for the filesystem MCP server.
//!
//! Each tool hands its operation from [`ops`](crate::ops) to the blocking
//! thread pool so slow disks never stall the async runtime.

use crate::FilesystemServer;
use crate::ops::{self, report};
use rmcp::{
    handler::server::wrapper::Parameters,
    schemars::{self, JsonSchema},
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Parameters for tools operating on a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirPathParams {
    /// Exact absolute path of the directory.
    pub dir_path: String,
}

/// Parameters for tools operating on a single file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilePathParams {
    /// Exact absolute path of the file.
    pub file_path: String,
}

/// Parameters for deleting a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FolderPathParams {
    /// Exact absolute path of the directory to delete.
    pub folder_path: String,
}

#[tool_router]
impl FilesystemServer {
    /// Create a new filesystem server with the given allowed directories.
    pub fn new(allowed_dirs: Vec<PathBuf>) -> Self {
        let allowed_dirs = crate::validate::canonicalize_dirs(allowed_dirs);
        Self {
            allowed_dirs: allowed_dirs.into(),
            tool_router: Self::tool_router(),
        }
    }

    /// List the names of files and directories directly inside a directory.
    #[tool(
        description = "List the files and subdirectories in a directory (non-recursive). Returns a JSON array of names, or a single error message"
    )]
    async fn list_directory(&self, Parameters(params): Parameters<DirPathParams>) -> String {
        let entries = self
            .blocking(
                move |dirs| ops::list_directory(&params.dir_path, dirs),
                |err| vec![err],
            )
            .await;
        to_json(&entries)
    }

    /// Read one file as UTF-8 text.
    #[tool(description = "Return the content of a file as text, or an error message")]
    async fn get_file_content(&self, Parameters(params): Parameters<FilePathParams>) -> String {
        self.blocking(
            move |dirs| ops::get_file_content(&params.file_path, dirs),
            |err| err,
        )
        .await
    }

    /// Recursively list all directories and files under a directory.
    #[tool(
        description = "Recursively list all directories and files under a directory. Returns a JSON array [directories, files]; on failure the directory list holds the error message"
    )]
    async fn list_directory_recursive(
        &self,
        Parameters(params): Parameters<DirPathParams>,
    ) -> String {
        let listing = self
            .blocking(
                move |dirs| ops::list_directory_recursive(&params.dir_path, dirs),
                |err| (vec![err], Vec::new()),
            )
            .await;
        to_json(&listing)
    }

    /// Read every file directly inside a directory.
    #[tool(
        description = "Read the content of all files directly inside a directory (non-recursive). Returns a JSON object mapping file path to content or error message"
    )]
    async fn read_files_in_directory(&self, Parameters(params): Parameters<DirPathParams>) -> String {
        let contents = self
            .blocking(
                move |dirs| ops::read_files_in_directory(&params.dir_path, dirs),
                error_object,
            )
            .await;
        to_json(&contents)
    }

    /// Read every file in a directory tree.
    #[tool(
        description = "Recursively read the content of all files in a directory and its subdirectories. Returns a JSON object mapping file path to content or error message"
    )]
    async fn read_files_recursively(&self, Parameters(params): Parameters<DirPathParams>) -> String {
        let contents = self
            .blocking(
                move |dirs| ops::read_files_recursively(&params.dir_path, dirs),
                error_object,
            )
            .await;
        to_json(&contents)
    }

    /// Delete one regular file.
    #[tool(
        description = "Delete a single file. Only use when the user explicitly asked for the deletion"
    )]
    async fn delete_file(&self, Parameters(params): Parameters<FilePathParams>) -> String {
        self.blocking(
            move |dirs| ops::delete_file(&params.file_path, dirs),
            |err| err,
        )
        .await
    }

    /// Delete one empty directory.
    #[tool(
        description = "Delete an empty directory. Non-empty directories are refused. Only use when the user explicitly asked for the deletion"
    )]
    async fn delete_folder(&self, Parameters(params): Parameters<FolderPathParams>) -> String {
        self.blocking(
            move |dirs| ops::delete_folder(&params.folder_path, dirs),
            |err| err,
        )
        .await
    }

    /// List the allowed directories this server can access.
    #[tool(description = "List the directories that this server is allowed to access")]
    async fn list_allowed_directories(&self) -> String {
        self.allowed_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FilesystemServer {
    /// Run `op` on the blocking pool. If the task dies, `on_failure` turns
    /// the error text into a result of the same shape.
    async fn blocking<T, F>(&self, op: F, on_failure: impl FnOnce(String) -> T) -> T
    where
        T: Send + 'static,
        F: FnOnce(&[PathBuf]) -> T + Send + 'static,
    {
        let dirs = Arc::clone(&self.allowed_dirs);
        match tokio::task::spawn_blocking(move || op(&dirs)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "filesystem task failed");
                on_failure(report(e))
            }
        }
    }
}

fn error_object(err: String) -> std::collections::BTreeMap<String, String> {
    std::collections::BTreeMap::from([(ops::ERROR_KEY.to_owned(), err)])
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(report)
}
