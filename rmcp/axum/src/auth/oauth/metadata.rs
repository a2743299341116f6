//! OAuth 2.0 Protected Resource Metadata (RFC 9728).
//!
//! Tells MCP clients which authorization server issues tokens for this
//! resource. Served unauthenticated at the well-known endpoint.
//!
//! ```rust,ignore
//! use rmcp_axum::auth::oauth::{ProtectedResourceMetadata, metadata_router};
//!
//! let metadata = ProtectedResourceMetadata::new(
//!     "http://localhost:8001/mcp",
//!     "http://keycloak:8080/realms/master",
//! )
//! .with_scope("mcp:tools");
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .merge(metadata_router(metadata));
//! ```

use super::resource::RESOURCE_METADATA_PATH;
use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

/// Protected Resource Metadata document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Canonical URI of this MCP server (the RFC 8707 resource indicator).
    pub resource: String,

    /// Authorization server(s) that can issue tokens for this resource.
    pub authorization_servers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Ways a client may present its token. Only `header` is accepted here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bearer_methods_supported: Vec<String>,

    /// Human-readable name of the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    /// Metadata for `resource`, protected by a single authorization server,
    /// accepting tokens in the `Authorization` header only.
    pub fn new(resource: impl Into<String>, authorization_server: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            authorization_servers: vec![authorization_server.into()],
            scopes_supported: Vec::new(),
            bearer_methods_supported: vec!["header".into()],
            resource_name: None,
            resource_documentation: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes_supported.push(scope.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }
}

/// Create an axum [`Router`] that serves the metadata at
/// `/.well-known/oauth-protected-resource` as `application/json`.
///
/// The document is serialized once, up front.
pub fn metadata_router(metadata: ProtectedResourceMetadata) -> Router {
    let body = match serde_json::to_string(&metadata) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize resource metadata");
            return Router::new().route(
                RESOURCE_METADATA_PATH,
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        }
    };
    Router::new().route(
        RESOURCE_METADATA_PATH,
        get(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "application/json")], body).into_response() }
        }),
    )
}
