//! Router assembly and server lifecycle.

use crate::config::Config;
use anyhow::{Context, Result, bail};
use axum::Router;
use osagent_filesystem::FilesystemServer;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp_axum::auth::{
    AuthLayer, BearerAuth,
    introspection::TokenVerifier,
    oauth::{
        ProtectedResourceMetadata, RESOURCE_METADATA_PATH, ResourceServerConfig, metadata_router,
        resource_metadata_url,
    },
};

/// Build the HTTP application: the MCP service behind bearer auth, plus the
/// unauthenticated protected-resource metadata.
pub fn router(config: &Config, server: FilesystemServer, verifier: TokenVerifier) -> Router {
    let server_url = config.server_url();

    let metadata = ProtectedResourceMetadata::new(
        verifier.resource_url().unwrap_or(&server_url),
        config.auth_base_url(),
    )
    .with_scope(&config.scope)
    .with_name("OS Agent Filesystem Server");

    let rs_config = ResourceServerConfig {
        resource_metadata_url: resource_metadata_url(&server_url)
            .unwrap_or_else(|| RESOURCE_METADATA_PATH.to_owned()),
        default_scope: Some(config.scope.clone()),
    };

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .nest_service(&config.mount_path, service)
        .layer(AuthLayer::new(BearerAuth::new(verifier)).with_resource_server(rs_config))
        .merge(metadata_router(metadata))
}

/// Start the server and run until interrupted.
pub async fn run(config: Config) -> Result<()> {
    let server = FilesystemServer::new(config.allowed_dirs.clone());
    if server.allowed_dirs().is_empty() {
        bail!(
            "none of the allowed directories exist: {:?}",
            config.allowed_dirs
        );
    }

    let verifier = TokenVerifier::builder(
        config.introspection_endpoint(),
        &config.client_id,
        &config.client_secret,
    )
    .server_url(config.server_url())
    .build()
    .context("failed to build introspection client")?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        mount_path = %config.mount_path,
        resource = %config.server_url(),
        introspection = %config.introspection_endpoint(),
        allowed_dirs = ?server.allowed_dirs(),
        "serving filesystem tools"
    );

    let app = router(&config, server, verifier);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use crate::app::router;
    use crate::config::Config;
    use axum::http::{Request, StatusCode, header};
    use axum::{Router, body::Body};
    use clap::Parser;
    use osagent_filesystem::FilesystemServer;
    use rmcp_axum::auth::introspection::TokenVerifier;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        _sandbox: tempfile::TempDir,
        _idp: MockServer,
        app: Router,
    }

    async fn fixture() -> Fixture {
        let idp = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .and(body_string("token=good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "client_id": "os-agent",
                "scope": "mcp:tools",
                "aud": "http://127.0.0.1:8001/mcp",
            })))
            .mount(&idp)
            .await;
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": false })))
            .mount(&idp)
            .await;

        let sandbox = tempfile::tempdir().unwrap();
        let introspect = format!("{}/introspect", idp.uri());
        let config = Config::try_parse_from([
            "osagent-mcp",
            "--host",
            "127.0.0.1",
            "--port",
            "8001",
            "--auth-host",
            "idp",
            "--auth-port",
            "8080",
            "--auth-realm",
            "master",
            "--client-secret",
            "s3cret",
            "--mount-path",
            "/mcp",
            "--scope",
            "mcp:tools",
            "--introspection-endpoint",
            &introspect,
            sandbox.path().to_str().unwrap(),
        ])
        .unwrap();

        let server = FilesystemServer::new(config.allowed_dirs.clone());
        let verifier = TokenVerifier::builder(
            config.introspection_endpoint(),
            &config.client_id,
            &config.client_secret,
        )
        .server_url(config.server_url())
        .build()
        .unwrap();

        Fixture {
            _sandbox: sandbox,
            _idp: idp,
            app: router(&config, server, verifier),
        }
    }

    fn initialize(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.0.0" }
            }
        });
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn metadata_is_public() {
        let fixture = fixture().await;
        let response = fixture
            .app
            .oneshot(
                Request::get("/.well-known/oauth-protected-resource")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let metadata: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(metadata["resource"], "http://127.0.0.1:8001/mcp");
        assert_eq!(
            metadata["authorization_servers"],
            json!(["http://idp:8080/realms/master"])
        );
        assert_eq!(metadata["scopes_supported"], json!(["mcp:tools"]));
    }

    #[tokio::test]
    async fn missing_token_is_challenged() {
        let fixture = fixture().await;
        let response = fixture.app.oneshot(initialize(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert_eq!(
            challenge,
            "Bearer resource_metadata=\"http://127.0.0.1:8001/.well-known/oauth-protected-resource\", scope=\"mcp:tools\""
        );
    }

    #[tokio::test]
    async fn inactive_token_is_unauthorized() {
        let fixture = fixture().await;
        let response = fixture.app.oneshot(initialize(Some("stale"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn active_token_reaches_mcp_service() {
        let fixture = fixture().await;
        let response = fixture.app.oneshot(initialize(Some("good"))).await.unwrap();
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
