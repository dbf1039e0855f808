//! Configuration file management for goalpost.
//!
//! Provides a TOML-based config file at `~/.config/goalpost/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use goalpost_core::{CoordinatorConfig, ReorderScope};
use goalpost_remote::RemoteConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub remote: RemoteSection,
    #[serde(default)]
    pub reorder: ReorderSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteSection {
    pub url: String,
    /// Raw `Cookie` header value, e.g. `session=abc123`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReorderSection {
    #[serde(default)]
    pub scope: ReorderScope,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the goalpost config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/goalpost` or
/// `~/.config/goalpost`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("goalpost");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("goalpost")
}

/// Return the path to the goalpost config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since the file may hold a
/// session cookie or token.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GoalpostConfig {
    pub remote: RemoteConfig,
    pub coordinator: CoordinatorConfig,
}

impl GoalpostConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API URL: `cli_api_url` > `GOALPOST_API_URL` > `remote.url` > `RemoteConfig::DEFAULT_URL`
    /// - Session / token: `GOALPOST_SESSION` / `GOALPOST_TOKEN` > `remote.session` / `remote.token`
    /// - Timeout: `GOALPOST_TIMEOUT_SECS` > `remote.timeout_secs` > `RemoteConfig::DEFAULT_TIMEOUT_SECS`
    /// - Reorder scope: `reorder.scope` > cross-group
    pub fn resolve(cli_api_url: Option<&str>) -> Result<Self> {
        Self::resolve_with(cli_api_url, load_config().ok())
    }

    fn resolve_with(cli_api_url: Option<&str>, file_config: Option<ConfigFile>) -> Result<Self> {
        let remote_file = file_config.as_ref().map(|c| &c.remote);

        let base_url = if let Some(url) = cli_api_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("GOALPOST_API_URL") {
            url
        } else if let Some(section) = remote_file {
            section.url.clone()
        } else {
            RemoteConfig::DEFAULT_URL.to_string()
        };

        let session = std::env::var("GOALPOST_SESSION")
            .ok()
            .or_else(|| remote_file.and_then(|s| s.session.clone()));
        let token = std::env::var("GOALPOST_TOKEN")
            .ok()
            .or_else(|| remote_file.and_then(|s| s.token.clone()));

        let timeout_secs = match std::env::var("GOALPOST_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("GOALPOST_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => remote_file
                .and_then(|s| s.timeout_secs)
                .unwrap_or(RemoteConfig::DEFAULT_TIMEOUT_SECS),
        };

        let mut remote = RemoteConfig::new(base_url).with_timeout(Duration::from_secs(timeout_secs));
        if let Some(cookie) = session {
            remote = remote.with_session_cookie(cookie);
        }
        if let Some(token) = token {
            remote = remote.with_auth_token(token);
        }

        let coordinator = CoordinatorConfig {
            reorder_scope: file_config
                .map(|c| c.reorder.scope)
                .unwrap_or_default(),
        };

        Ok(Self {
            remote,
            coordinator,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
