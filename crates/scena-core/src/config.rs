use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::model::ProjectId;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Contents of `<config_dir>/scena/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            project: None,
            token: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "no project selected: pass --project, set SCENA_PROJECT, or set `project` in config.toml"
    )]
    MissingProject,
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingProject => ErrorCode::MissingProject,
        }
    }
}

/// Values given on the command line. `None` means "not passed".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub project: Option<String>,
    pub token: Option<String>,
    pub output: Option<String>,
    pub json: bool,
}

/// Configuration after file, environment and flags have been layered.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config_path: Option<PathBuf>,
    pub server_url: Option<String>,
    pub project: Option<ProjectId>,
    #[serde(serialize_with = "redact")]
    pub token: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub resolved_output: String,
}

impl EffectiveConfig {
    /// The selected project.
    ///
    /// # Errors
    ///
    /// Fails when no project was configured anywhere.
    pub fn require_project(&self) -> Result<&ProjectId, ConfigError> {
        self.project.as_ref().ok_or(ConfigError::MissingProject)
    }
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scena/config.toml"))
}

/// Read a config file; a missing file yields defaults.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_client_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ClientConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Layer the user config file, the process environment and `overrides`.
///
/// # Errors
///
/// Fails when the config file is unreadable or a numeric variable is
/// malformed.
pub fn resolve_config(overrides: &Overrides) -> Result<EffectiveConfig> {
    let path = user_config_path();
    let file = match &path {
        Some(p) => load_client_config(p)?,
        None => ClientConfig::default(),
    };
    let mut effective = layer(file, |key| std::env::var(key).ok(), overrides)?;
    effective.config_path = path;
    Ok(effective)
}

fn layer(
    file: ClientConfig,
    env: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<EffectiveConfig> {
    let pick = |flag: &Option<String>, var: &str, from_file: Option<String>| {
        flag.clone()
            .or_else(|| env(var).filter(|v| !v.trim().is_empty()))
            .or(from_file)
    };

    let server_url = pick(&overrides.server_url, "SCENA_URL", file.server_url)
        .map(|url| url.trim_end_matches('/').to_string());
    let project = pick(&overrides.project, "SCENA_PROJECT", file.project).map(ProjectId::new);
    let token = pick(&overrides.token, "SCENA_TOKEN", file.token);

    let poll_interval_ms = match env("SCENA_POLL_MS") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("SCENA_POLL_MS must be a number of milliseconds, got '{raw}'"))?,
        None => file.poll_interval_ms,
    };

    let resolved_output = resolve_output(
        overrides.json,
        overrides.output.clone(),
        env("FORMAT"),
        file.output,
    );

    Ok(EffectiveConfig {
        config_path: None,
        server_url,
        project,
        token,
        poll_interval_ms,
        request_timeout_ms: file.request_timeout_ms,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    cli_format: Option<String>,
    env_format: Option<String>,
    file_output: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    let chosen = [cli_format, env_format, file_output]
        .into_iter()
        .flatten()
        .find_map(|raw| normalize_output_mode(&raw));
    if let Some(mode) = chosen {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

#[allow(clippy::ref_option)]
fn redact<S: Serializer>(token: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match token {
        Some(_) => s.serialize_str("<set>"),
        None => s.serialize_none(),
    }
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
