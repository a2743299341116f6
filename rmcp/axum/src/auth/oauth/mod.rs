//! OAuth 2.1 resource server support for MCP servers.
//!
//! - **Protected Resource Metadata** ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)):
//!   serve `/.well-known/oauth-protected-resource` so MCP clients can discover
//!   authorization servers.
//! - **Challenges**: 401 responses with a `WWW-Authenticate` header per
//!   [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750).
//! - **Resource indicators** ([RFC 8707](https://datatracker.ietf.org/doc/html/rfc8707)):
//!   canonical resource URLs and audience matching.

mod error;
mod metadata;
mod resource;

pub use error::{ResourceServerConfig, www_authenticate_401};
pub use metadata::{ProtectedResourceMetadata, metadata_router};
pub use resource::{
    RESOURCE_METADATA_PATH, check_resource_allowed, resource_metadata_url,
    resource_url_from_server_url,
};
