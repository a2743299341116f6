//! OS agent MCP server.
//!
//! Serves the sandboxed filesystem tools over streamable HTTP. Every request
//! to the MCP endpoint must carry a bearer token that the identity provider
//! reports as active for this resource; tokens are checked by introspection
//! on each request.

pub mod app;
pub mod config;

pub use app::{router, run};
pub use config::Config;
