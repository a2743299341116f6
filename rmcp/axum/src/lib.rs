//! # rmcp-axum
//!
//! Puts an [rmcp](https://docs.rs/rmcp) service behind OAuth bearer-token
//! checks on [axum](https://docs.rs/axum).
//!
//! - [`auth::AuthLayer`] runs an [`Authenticator`](auth::Authenticator) on
//!   every request and answers 401 with a discovery challenge on failure.
//! - [`auth::introspection::TokenVerifier`] (feature `introspection`, on by
//!   default) asks the authorization server whether a token is active
//!   (RFC 7662) and issued for this resource (RFC 8707).
//! - [`auth::oauth::metadata_router`] publishes the RFC 9728 metadata that
//!   the challenge points to.
//!
//! ```rust,ignore
//! use rmcp_axum::auth::{AuthLayer, BearerAuth, introspection::TokenVerifier};
//! use rmcp_axum::auth::oauth::{ProtectedResourceMetadata, ResourceServerConfig, metadata_router};
//!
//! let verifier = TokenVerifier::builder(
//!     "http://keycloak:8080/realms/master/protocol/openid-connect/token/introspect",
//!     "mcp_server",
//!     secret,
//! )
//! .server_url("http://localhost:8001/mcp")
//! .build()?;
//!
//! let challenge = ResourceServerConfig {
//!     resource_metadata_url: "http://localhost:8001/.well-known/oauth-protected-resource".into(),
//!     default_scope: Some("mcp:tools".into()),
//! };
//! let metadata = ProtectedResourceMetadata::new(
//!     "http://localhost:8001/mcp",
//!     "http://keycloak:8080/realms/master",
//! );
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .layer(AuthLayer::new(BearerAuth::new(verifier)).with_resource_server(challenge))
//!     .merge(metadata_router(metadata));
//! ```

pub use axum;

pub mod auth;
