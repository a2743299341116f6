//! Authentication middleware for MCP servers.
//!
//! [`AuthLayer`] checks every request with an [`Authenticator`] before it
//! reaches the wrapped service. Accepted requests carry the resulting claims
//! in their extensions, where handlers can pick them up with
//! `Extension<Claims>`. Rejected requests never reach the service: they get
//! a 401, with a `WWW-Authenticate` challenge pointing at the resource
//! metadata when a [`ResourceServerConfig`](oauth::ResourceServerConfig) is
//! attached.

mod bearer;

pub mod oauth;

#[cfg(feature = "introspection")]
pub mod introspection;

pub use bearer::BearerAuth;

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use oauth::{ResourceServerConfig, www_authenticate_401};
use std::task::{Context, Poll};

/// Trait for validating incoming MCP requests.
///
/// On success, `Claims` is inserted into `http::Extensions`.
pub trait Authenticator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful authentication.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on authentication failure.
    type Error: std::fmt::Display + Send;

    /// Validate the request and return claims, or an error.
    fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> impl Future<Output = Result<Self::Claims, Self::Error>> + Send;
}

/// Trait for validating a credential string (e.g., a Bearer token).
///
/// Wrap an implementation in [`BearerAuth`] to have the credential pulled
/// out of the `Authorization` header. The introspection-backed
/// [`TokenVerifier`](introspection::TokenVerifier) is the stock
/// implementation.
pub trait Validator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful validation.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on validation failure.
    type Error: std::fmt::Display + Send;

    /// Validate the credential string and return claims, or an error.
    fn validate(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Self::Claims, Self::Error>> + Send;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<A> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
}

impl<A> AuthLayer<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            resource_server: None,
        }
    }

    /// Attach OAuth resource server metadata to 401 responses.
    ///
    /// When set, rejected requests carry a `WWW-Authenticate` header with
    /// `resource_metadata` and `scope` parameters.
    pub fn with_resource_server(mut self, config: ResourceServerConfig) -> Self {
        self.resource_server = Some(config);
        self
    }
}

impl<A, S> tower::Layer<S> for AuthLayer<A>
where
    A: Clone,
{
    type Service = AuthService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            authenticator: self.authenticator.clone(),
            resource_server: self.resource_server.clone(),
            inner,
        }
    }
}

/// Tower service that authenticates every request before forwarding it.
///
/// Each request is authenticated on its own; nothing is cached between
/// requests.
#[derive(Clone)]
pub struct AuthService<A, S> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
    inner: S,
}

impl<A, S, B> tower::Service<Request<B>> for AuthService<A, S>
where
    A: Authenticator,
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let resource_server = self.resource_server.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            match authenticator.authenticate(&parts).await {
                Ok(claims) => {
                    let mut req = Request::from_parts(parts, body);
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(err) => {
                    tracing::debug!(
                        method = %parts.method,
                        path = %parts.uri.path(),
                        reason = %err,
                        "request rejected"
                    );
                    Ok(unauthorized(resource_server.as_ref(), &err.to_string()))
                }
            }
        })
    }
}

fn unauthorized(
    resource_server: Option<&ResourceServerConfig>,
    message: &str,
) -> Response<axum::body::Body> {
    let mut response = Response::new(axum::body::Body::from(message.to_owned()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    if let Some(config) = resource_server {
        response
            .headers_mut()
            .insert(http::header::WWW_AUTHENTICATE, www_authenticate_401(config));
    }
    response
}
