use std::env;
use std::time::Duration;

/// Remote service configuration.
///
/// Reads from `GOALPOST_API_URL`, `GOALPOST_SESSION`, `GOALPOST_TOKEN` and
/// `GOALPOST_TIMEOUT_SECS`, falling back to `http://localhost:5000/api`
/// without credentials when unset.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Raw `Cookie` header value carrying the session (e.g. `session=...`).
    pub session_cookie: Option<String>,
    /// Bearer token sent in the `Authorization` header.
    pub auth_token: Option<String>,
    /// Transport timeout for a single request.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// The default base URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "http://localhost:5000/api";

    /// The default per-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let base_url =
            env::var("GOALPOST_API_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let timeout_secs = env::var("GOALPOST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            session_cookie: env::var("GOALPOST_SESSION").ok(),
            auth_token: env::var("GOALPOST_TOKEN").ok(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_cookie: None,
            auth_token: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join a request path onto the base URL.
    ///
    /// Tolerates a trailing slash on the base and a missing leading slash on
    /// the path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url() {
        let cfg = RemoteConfig::new(RemoteConfig::DEFAULT_URL);
        assert_eq!(cfg.base_url, "http://localhost:5000/api");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(cfg.session_cookie.is_none());
        assert!(cfg.auth_token.is_none());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let cfg = RemoteConfig::new("http://example.test/api/");
        assert_eq!(cfg.url("/goals"), "http://example.test/api/goals");
        assert_eq!(cfg.url("tasks/3"), "http://example.test/api/tasks/3");
    }

    #[test]
    fn builders_set_credentials() {
        let cfg = RemoteConfig::new("http://remote:8080")
            .with_session_cookie("session=abc")
            .with_auth_token("tok")
            .with_timeout(Duration::from_secs(2));
        assert_eq!(cfg.session_cookie.as_deref(), Some("session=abc"));
        assert_eq!(cfg.auth_token.as_deref(), Some("tok"));
        assert_eq!(cfg.timeout, Duration::from_secs(2));
    }
}
