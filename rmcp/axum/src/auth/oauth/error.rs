//! `WWW-Authenticate` challenges for MCP resource servers.
//!
//! Builds the header required by
//! [RFC 6750 §3](https://datatracker.ietf.org/doc/html/rfc6750#section-3) and
//! [RFC 9728 §5.1](https://datatracker.ietf.org/doc/html/rfc9728#name-www-authenticate-response)
//! so that a client rejected with 401 can find the authorization server.

use http::HeaderValue;

/// Configuration for an MCP server acting as an OAuth 2.1 resource server.
#[derive(Clone, Debug)]
pub struct ResourceServerConfig {
    /// URL to the Protected Resource Metadata document (RFC 9728).
    pub resource_metadata_url: String,
    /// Scope advertised in 401 challenges.
    pub default_scope: Option<String>,
}

/// Build a `WWW-Authenticate` header value for a 401 Unauthorized response.
///
/// Format: `Bearer resource_metadata="<url>"[, scope="<scopes>"]`
pub fn www_authenticate_401(config: &ResourceServerConfig) -> HeaderValue {
    let mut value = format!(
        "Bearer resource_metadata=\"{}\"",
        quoted(&config.resource_metadata_url),
    );
    if let Some(ref scope) = config.default_scope {
        value.push_str(&format!(", scope=\"{}\"", quoted(scope)));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

/// Strip characters that cannot appear inside a quoted-string parameter.
fn quoted(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect()
}
