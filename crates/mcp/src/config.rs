//! Server configuration from command-line flags and environment variables.

use clap::Parser;
use std::path::PathBuf;

/// OS agent MCP server: filesystem tools behind OAuth token introspection.
#[derive(Parser, Debug, Clone)]
#[command(name = "osagent-mcp", version, about)]
pub struct Config {
    /// Interface to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// Identity provider host.
    #[arg(long, env = "AUTH_HOST", default_value = "keycloak")]
    pub auth_host: String,

    /// Identity provider port.
    #[arg(long, env = "AUTH_PORT", default_value_t = 8080)]
    pub auth_port: u16,

    /// Identity provider realm.
    #[arg(long, env = "AUTH_REALM", default_value = "master")]
    pub auth_realm: String,

    /// OAuth client id used to call the introspection endpoint.
    #[arg(long, env = "OAUTH_CLIENT_ID", default_value = "mcp_server")]
    pub client_id: String,

    /// OAuth client secret used to call the introspection endpoint.
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Scope advertised to clients.
    #[arg(long, env = "MCP_SCOPE", default_value = "mcp:tools")]
    pub scope: String,

    /// Path the MCP endpoint is served under.
    #[arg(long, env = "MOUNT_PATH", default_value = "/mcp", value_parser = parse_mount_path)]
    pub mount_path: String,

    /// Externally visible URL of the MCP endpoint, if it differs from
    /// `http://{host}:{port}{mount_path}`.
    #[arg(long, env = "SERVER_URL")]
    pub public_url: Option<String>,

    /// Token introspection endpoint, if it differs from the realm default.
    #[arg(long, env = "INTROSPECTION_ENDPOINT")]
    pub introspection_endpoint: Option<String>,

    /// Directories the tools may access.
    #[arg(env = "ALLOWED_DIRS", value_delimiter = ',', default_value = "/mnt/playground")]
    pub allowed_dirs: Vec<PathBuf>,
}

impl Config {
    /// Address to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Externally visible URL of the MCP endpoint; the resource tokens must
    /// be issued for.
    pub fn server_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}{}", self.host, self.port, self.mount_path),
        }
    }

    /// Base URL of the identity provider realm.
    pub fn auth_base_url(&self) -> String {
        format!(
            "http://{}:{}/realms/{}",
            self.auth_host, self.auth_port, self.auth_realm
        )
    }

    /// Where clients obtain tokens (client-credentials grant).
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.auth_base_url())
    }

    /// Where this server checks tokens.
    pub fn introspection_endpoint(&self) -> String {
        match &self.introspection_endpoint {
            Some(url) => url.clone(),
            None => format!("{}/introspect", self.token_endpoint()),
        }
    }
}

fn parse_mount_path(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err("mount path must start with '/'".into());
    }
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("mount path must not be the root".into());
    }
    Ok(trimmed.to_owned())
}
