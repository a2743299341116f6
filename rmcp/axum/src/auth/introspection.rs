//! OAuth 2.0 Token Introspection (RFC 7662) validator.
//!
//! Every bearer token is sent to the authorization server's introspection
//! endpoint, authenticated as a confidential client with HTTP Basic. A token
//! is accepted only if the server reports it `active` and its audience covers
//! this resource server (RFC 8707). Requires the `introspection` feature.
//!
//! ```rust,ignore
//! use rmcp_axum::auth::{AuthLayer, BearerAuth, introspection::TokenVerifier};
//!
//! let verifier = TokenVerifier::builder(
//!     "http://keycloak:8080/realms/master/protocol/openid-connect/token/introspect",
//!     "mcp_server",
//!     client_secret,
//! )
//! .server_url("http://localhost:8001/mcp")
//! .build()?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(AuthLayer::new(BearerAuth::new(verifier)));
//! ```

use crate::auth::Validator;
use crate::auth::oauth::{check_resource_allowed, resource_url_from_server_url};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

/// Overall deadline for one introspection request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for establishing the connection to the introspection endpoint.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on concurrent introspection requests.
pub const MAX_CONNECTIONS: usize = 10;

/// Idle keep-alive connections retained in the pool.
pub const MAX_IDLE_CONNECTIONS: usize = 5;

/// Client id reported when the introspection response names none.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Audience (`aud`) claim of a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Audience::Single(s)),
            Value::Array(items) => Some(Audience::Multiple(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// A token the authorization server reported as active.
///
/// Lives for a single request and is never cached.
#[derive(Clone, Debug)]
pub struct AccessToken {
    /// The bearer credential as presented.
    pub token: String,
    /// The client the token was issued to (`client_id`, then `azp`).
    pub client_id: String,
    /// Granted scopes.
    pub scopes: BTreeSet<String>,
    /// Expiration time (seconds since epoch).
    pub expires_at: Option<u64>,
    /// The audience the token was issued for.
    pub resource: Option<Audience>,
}

/// Authentication failed.
///
/// Carries no cause: callers learn only that the token was not accepted.
#[derive(Debug, Error)]
#[error("invalid or expired token")]
pub struct Rejected;

/// Why an introspection exchange failed. Logged, never returned to clients.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("introspection endpoint is not an absolute http(s) URL: {0}")]
    InvalidEndpoint(String),
    #[error("introspection request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("introspection endpoint returned {0}")]
    Status(StatusCode),
    #[error("malformed introspection response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The permit semaphore was closed. The client never closes it, so this
    /// only surfaces if that invariant is broken.
    #[error("introspection permit pool is closed")]
    Closed,
}

/// Introspection response (RFC 7662 §2.2).
///
/// Claims other than `active` are kept as raw JSON since providers disagree
/// on their encoding.
#[derive(Debug, Deserialize)]
pub struct IntrospectionResponse {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub scope: Option<Value>,
    #[serde(default)]
    pub client_id: Option<Value>,
    #[serde(default)]
    pub azp: Option<Value>,
    #[serde(default)]
    pub exp: Option<Value>,
    #[serde(default)]
    pub aud: Option<Value>,
}

impl IntrospectionResponse {
    fn into_access_token(self, token: &str) -> AccessToken {
        let client_id = [self.client_id, self.azp]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

        AccessToken {
            token: token.to_owned(),
            client_id,
            scopes: parse_scopes(self.scope.as_ref()),
            expires_at: self.exp.as_ref().and_then(parse_timestamp),
            resource: self.aud.and_then(Audience::from_value),
        }
    }
}

/// Scopes from either a space-delimited string or a list of strings.
fn parse_scopes(scope: Option<&Value>) -> BTreeSet<String> {
    match scope {
        Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn parse_timestamp(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// HTTP client for one introspection endpoint.
///
/// Owns its connection pool; dropping the client releases it.
pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: Option<Url>,
    raw_endpoint: String,
    client_id: String,
    client_secret: String,
    permits: Semaphore,
}

impl IntrospectionClient {
    /// Build a client with the standard timeouts and pool limits.
    ///
    /// An endpoint that is not an absolute `http`/`https` URL is accepted
    /// here but every [`introspect`](Self::introspect) call fails.
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .build()?;

        let raw_endpoint = endpoint.into();
        let endpoint = Url::parse(&raw_endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"));

        Ok(Self {
            http,
            endpoint,
            raw_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            permits: Semaphore::new(MAX_CONNECTIONS),
        })
    }

    /// Whether the configured endpoint is usable.
    pub fn has_valid_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Ask the authorization server about `token`.
    ///
    /// Makes exactly one attempt.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| IntrospectionError::InvalidEndpoint(self.raw_endpoint.clone()))?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IntrospectionError::Closed)?;

        let response = self
            .http
            .post(endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IntrospectionError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Builder for [`TokenVerifier`].
pub struct TokenVerifierBuilder {
    introspection_endpoint: String,
    client_id: String,
    client_secret: String,
    server_url: Option<String>,
}

impl TokenVerifierBuilder {
    /// Externally visible URL of this resource server.
    ///
    /// Token audiences are checked against its canonical form. Without it,
    /// any active token is accepted regardless of audience.
    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    /// Build the verifier and its HTTP client.
    pub fn build(self) -> Result<TokenVerifier, reqwest::Error> {
        let client = IntrospectionClient::new(
            self.introspection_endpoint,
            self.client_id,
            self.client_secret,
        )?;
        if !client.has_valid_endpoint() {
            tracing::warn!(
                endpoint = %client.raw_endpoint,
                "introspection endpoint is not an http(s) URL; all tokens will be rejected"
            );
        }

        let resource_url = self
            .server_url
            .as_deref()
            .and_then(resource_url_from_server_url);
        if resource_url.is_none() {
            tracing::warn!("no resource URL configured; token audiences will not be checked");
        }

        Ok(TokenVerifier {
            inner: Arc::new(TokenVerifierInner {
                client,
                server_url: self.server_url,
                resource_url,
            }),
        })
    }
}

struct TokenVerifierInner {
    client: IntrospectionClient,
    server_url: Option<String>,
    resource_url: Option<String>,
}

/// Validates bearer tokens by introspection.
#[derive(Clone)]
pub struct TokenVerifier {
    inner: Arc<TokenVerifierInner>,
}

impl TokenVerifier {
    /// Start building a verifier for the given introspection endpoint and
    /// confidential client credentials.
    pub fn builder(
        introspection_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> TokenVerifierBuilder {
        TokenVerifierBuilder {
            introspection_endpoint: introspection_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            server_url: None,
        }
    }

    /// Canonical URL of this resource server, if configured.
    pub fn resource_url(&self) -> Option<&str> {
        self.inner.resource_url.as_deref()
    }

    /// Verify `token`, producing an [`AccessToken`] or [`Rejected`].
    pub async fn verify(&self, token: &str) -> Result<AccessToken, Rejected> {
        let response = match self.inner.client.introspect(token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "token introspection failed");
                return Err(Rejected);
            }
        };

        if !response.active {
            tracing::debug!("token is not active");
            return Err(Rejected);
        }

        if !self.is_valid_resource(response.aud.as_ref()) {
            tracing::debug!(aud = ?response.aud, "token audience does not cover this resource");
            return Err(Rejected);
        }

        let access = response.into_access_token(token);
        tracing::debug!(client_id = %access.client_id, scopes = ?access.scopes, "token accepted");
        Ok(access)
    }

    /// Whether an `aud` claim covers this resource server.
    ///
    /// Vacuously true when no resource URL is configured or the claim is
    /// absent. A list matches if any string element matches; other JSON
    /// types never match.
    pub fn is_valid_resource(&self, aud: Option<&Value>) -> bool {
        let (Some(_), Some(resource_url)) = (&self.inner.server_url, &self.inner.resource_url)
        else {
            return true;
        };

        match aud {
            None | Some(Value::Null) => true,
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|a| check_resource_allowed(resource_url, a)),
            Some(Value::String(a)) => check_resource_allowed(resource_url, a),
            Some(_) => false,
        }
    }
}

impl Validator for TokenVerifier {
    type Claims = AccessToken;
    type Error = Rejected;

    async fn validate(&self, token: &str) -> Result<AccessToken, Rejected> {
        self.verify(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::{Audience, TokenVerifier, UNKNOWN_CLIENT};
    use base64::Engine;
    use serde_json::json;
    use std::collections::BTreeSet;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SERVER_URL: &str = "http://localhost:8001/mcp";

    fn verifier(server: &MockServer) -> TokenVerifier {
        TokenVerifier::builder(
            format!("{}/introspect", server.uri()),
            "mcp_server",
            "s3cret",
        )
        .server_url(SERVER_URL)
        .build()
        .unwrap()
    }

    async fn respond_with(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn sends_basic_auth_and_form_body() {
        let server = MockServer::start().await;
        let basic = base64::engine::general_purpose::STANDARD.encode("mcp_server:s3cret");
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .and(header("authorization", format!("Basic {basic}").as_str()))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "scope": "mcp:tools read",
                "client_id": "os-agent",
                "exp": 1_900_000_000u64,
                "aud": SERVER_URL,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = verifier(&server).verify("abc").await.unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.client_id, "os-agent");
        assert_eq!(
            token.scopes,
            BTreeSet::from(["mcp:tools".to_string(), "read".to_string()])
        );
        assert_eq!(token.expires_at, Some(1_900_000_000));
        assert_eq!(token.resource, Some(Audience::Single(SERVER_URL.into())));
    }

    #[tokio::test]
    async fn list_scope_and_azp_fallback() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "scope": ["mcp:tools", "read", 7],
                "client_id": "",
                "azp": "os-agent",
                "aud": ["account", SERVER_URL],
            })),
        )
        .await;

        let token = verifier(&server).verify("abc").await.unwrap();
        assert_eq!(token.client_id, "os-agent");
        assert_eq!(
            token.scopes,
            BTreeSet::from(["mcp:tools".to_string(), "read".to_string()])
        );
        assert_eq!(
            token.resource,
            Some(Audience::Multiple(vec!["account".into(), SERVER_URL.into()]))
        );
    }

    #[tokio::test]
    async fn minimal_active_response() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "active": true, "scope": null })),
        )
        .await;

        let token = verifier(&server).verify("abc").await.unwrap();
        assert_eq!(token.client_id, UNKNOWN_CLIENT);
        assert!(token.scopes.is_empty());
        assert_eq!(token.expires_at, None);
        assert_eq!(token.resource, None);
    }

    #[tokio::test]
    async fn inactive_token_is_rejected() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "active": false })),
        )
        .await;
        assert!(verifier(&server).verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn missing_active_flag_is_rejected() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "scope": "mcp:tools" })),
        )
        .await;
        assert!(verifier(&server).verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn non_200_is_rejected() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(401).set_body_json(json!({ "active": true })),
        )
        .await;
        assert!(verifier(&server).verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let server = MockServer::start().await;
        respond_with(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;
        assert!(verifier(&server).verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn audience_mismatch_is_rejected() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "aud": "http://localhost:9000/other",
            })),
        )
        .await;
        assert!(verifier(&server).verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_rejected() {
        let verifier = TokenVerifier::builder("http://127.0.0.1:1/introspect", "id", "secret")
            .server_url(SERVER_URL)
            .build()
            .unwrap();
        assert!(verifier.verify("abc").await.is_err());
    }

    #[tokio::test]
    async fn non_http_endpoint_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": true })))
            .expect(0)
            .mount(&server)
            .await;

        let endpoint = format!("ftp://{}/introspect", server.address());
        let verifier = TokenVerifier::builder(endpoint, "id", "secret")
            .build()
            .unwrap();
        assert!(verifier.verify("abc").await.is_err());

        let verifier = TokenVerifier::builder("/relative/introspect", "id", "secret")
            .build()
            .unwrap();
        assert!(verifier.verify("abc").await.is_err());

        server.verify().await;
    }

    #[test]
    fn resource_validation_rules() {
        let verifier = TokenVerifier::builder("http://idp/introspect", "id", "secret")
            .server_url(SERVER_URL)
            .build()
            .unwrap();
        assert_eq!(verifier.resource_url(), Some(SERVER_URL));

        assert!(verifier.is_valid_resource(None));
        assert!(verifier.is_valid_resource(Some(&json!(null))));
        assert!(verifier.is_valid_resource(Some(&json!(SERVER_URL))));
        assert!(verifier.is_valid_resource(Some(&json!("http://localhost:8001/"))));
        assert!(verifier.is_valid_resource(Some(&json!([1, "account", SERVER_URL]))));
        assert!(!verifier.is_valid_resource(Some(&json!([]))));
        assert!(!verifier.is_valid_resource(Some(&json!(["account"]))));
        assert!(!verifier.is_valid_resource(Some(&json!("http://localhost:8001/mcp/tools"))));
        assert!(!verifier.is_valid_resource(Some(&json!(42))));
        assert!(!verifier.is_valid_resource(Some(&json!({ "aud": SERVER_URL }))));
    }

    #[test]
    fn no_server_url_accepts_any_audience() {
        let verifier = TokenVerifier::builder("http://idp/introspect", "id", "secret")
            .build()
            .unwrap();
        assert_eq!(verifier.resource_url(), None);
        assert!(verifier.is_valid_resource(Some(&json!("http://elsewhere/"))));
        assert!(verifier.is_valid_resource(Some(&json!(42))));
    }
}
