use std::time::Duration;

/// Huddle API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When unset the server runs on the in-memory store.
    pub database_url: Option<String>,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Outbound frame buffer per event stream. A subscriber that falls this far
    /// behind is disconnected.
    pub stream_buffer: usize,
    /// Interval between SSE keep-alive comments.
    pub keepalive_interval: Duration,
    /// Interval of the closed-writer sweep. `None` disables the sweeper.
    pub sweep_interval: Option<Duration>,
    /// Require workspace membership to open a workspace event stream.
    pub workspace_membership_check: bool,
    /// Base URL of the identity service. Its signing keys are read from
    /// `{identity_url}/.well-known/jwks.json` and it is the expected `iss` of
    /// login assertions.
    pub identity_url: String,
    /// Expected `aud` of login assertions.
    pub identity_audience: String,
    /// Expose `POST /api/v1/auth/token`, which mints a token for any user id.
    /// Local development only.
    pub dev_login: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 4100,
            stream_buffer: 256,
            keepalive_interval: Duration::from_secs(15),
            sweep_interval: Some(Duration::from_secs(60)),
            workspace_membership_check: false,
            identity_url: "http://localhost:3000".to_string(),
            identity_audience: "huddle-api".to_string(),
            dev_login: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            port: parsed_var("PORT").unwrap_or(defaults.port),
            stream_buffer: parsed_var::<usize>("STREAM_BUFFER")
                .map(|n| n.max(1))
                .unwrap_or(defaults.stream_buffer),
            keepalive_interval: parsed_var::<u64>("STREAM_KEEPALIVE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.keepalive_interval),
            sweep_interval: match parsed_var::<u64>("SWEEP_INTERVAL_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.sweep_interval,
            },
            workspace_membership_check: parsed_var("WORKSPACE_MEMBERSHIP_CHECK")
                .unwrap_or(defaults.workspace_membership_check),
            identity_url: std::env::var("IDENTITY_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.identity_url),
            identity_audience: std::env::var("AUTH_AUDIENCE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.identity_audience),
            dev_login: parsed_var("DEV_LOGIN").unwrap_or(defaults.dev_login),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
