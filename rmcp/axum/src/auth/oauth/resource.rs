//! Resource indicators ([RFC 8707](https://datatracker.ietf.org/doc/html/rfc8707)).
//!
//! A token's audience names the resource server it was issued for. These
//! helpers derive the canonical resource URL of a server and decide whether an
//! audience value covers it.

use url::Url;

/// Path of the Protected Resource Metadata document (RFC 9728).
pub const RESOURCE_METADATA_PATH: &str = "/.well-known/oauth-protected-resource";

/// Canonical resource URL for a server URL.
///
/// Scheme and host are lower-cased and the fragment is dropped. Returns
/// `None` if `server_url` is not an absolute URL.
pub fn resource_url_from_server_url(server_url: &str) -> Option<String> {
    let mut url = Url::parse(server_url).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

/// URL of the metadata document served at the origin of `server_url`.
pub fn resource_metadata_url(server_url: &str) -> Option<String> {
    let url = Url::parse(server_url).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    let origin = url.origin().ascii_serialization();
    Some(format!("{origin}{RESOURCE_METADATA_PATH}"))
}

/// Whether `configured` (typically a token audience) covers `requested`.
///
/// Origins (scheme, host, port) must be equal. The configured path must be
/// equal to or a parent of the requested path, compared on `/` boundaries so
/// that `/mcp` covers `/mcp/x` but not `/mcpx`. Unparseable input never
/// matches.
pub fn check_resource_allowed(requested: &str, configured: &str) -> bool {
    let (Ok(requested), Ok(configured)) = (Url::parse(requested), Url::parse(configured)) else {
        return false;
    };

    if requested.scheme() != configured.scheme()
        || requested.host_str().map(str::to_ascii_lowercase)
            != configured.host_str().map(str::to_ascii_lowercase)
        || requested.port_or_known_default() != configured.port_or_known_default()
    {
        return false;
    }

    let requested_path = requested.path();
    let configured_path = configured.path();
    if requested_path.len() < configured_path.len() {
        return false;
    }

    with_trailing_slash(requested_path).starts_with(&with_trailing_slash(configured_path))
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::{check_resource_allowed, resource_metadata_url, resource_url_from_server_url};

    #[test]
    fn canonicalizes_server_url() {
        assert_eq!(
            resource_url_from_server_url("HTTP://Example.COM:8001/mcp#frag").as_deref(),
            Some("http://example.com:8001/mcp")
        );
        assert_eq!(resource_url_from_server_url("not a url"), None);
    }

    #[test]
    fn metadata_url_uses_origin() {
        assert_eq!(
            resource_metadata_url("http://0.0.0.0:8001/mcp").as_deref(),
            Some("http://0.0.0.0:8001/.well-known/oauth-protected-resource")
        );
    }

    #[test]
    fn audience_covers_same_and_child_paths() {
        assert!(check_resource_allowed("https://a.example/mcp", "https://a.example/mcp"));
        assert!(check_resource_allowed("https://a.example/mcp/", "https://a.example/mcp"));
        assert!(check_resource_allowed("https://a.example/mcp/x", "https://a.example/mcp"));
        assert!(check_resource_allowed("https://a.example/mcp", "https://A.EXAMPLE/"));
    }

    #[test]
    fn audience_rejects_siblings_and_other_origins() {
        assert!(!check_resource_allowed("https://a.example/mcpx", "https://a.example/mcp"));
        assert!(!check_resource_allowed("https://a.example/other", "https://a.example/mcp"));
        assert!(!check_resource_allowed("https://a.example/mcp", "https://b.example/mcp"));
        assert!(!check_resource_allowed("https://a.example/mcp", "http://a.example/mcp"));
        assert!(!check_resource_allowed("https://a.example:8443/mcp", "https://a.example/mcp"));
        assert!(!check_resource_allowed("https://a.example/", "https://a.example/mcp"));
    }

    #[test]
    fn garbage_never_matches() {
        assert!(!check_resource_allowed("https://a.example/mcp", "mcp_server"));
        assert!(!check_resource_allowed("", ""));
    }
}
