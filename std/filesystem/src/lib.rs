//! MCP tools for sandboxed filesystem access by the OS agent.
//!
//! All operations are restricted to a set of allowed directories configured
//! at server startup, refuse to read or delete restricted files, and report
//! failures as text beginning with `"Error:"` instead of protocol errors.

use rmcp::{
    ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool_handler,
};
use std::path::PathBuf;
use std::sync::Arc;

pub mod ops;
pub mod policy;
pub mod tools;
pub mod validate;

/// MCP filesystem server with directory-level access control.
#[derive(Debug, Clone)]
pub struct FilesystemServer {
    pub(crate) allowed_dirs: Arc<[PathBuf]>,
    pub(crate) tool_router: ToolRouter<Self>,
}

impl FilesystemServer {
    /// The canonical directories this server may touch.
    pub fn allowed_dirs(&self) -> &[PathBuf] {
        &self.allowed_dirs
    }
}

#[tool_handler]
impl ServerHandler for FilesystemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "osagent-filesystem".into(),
                title: Some("OS Agent Filesystem Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Filesystem tools confined to the allowed directories. Pass exact absolute \
                 paths. A result starting with \"Error:\" means the call failed; do not retry \
                 the same path."
                    .into(),
            ),
        }
    }
}
