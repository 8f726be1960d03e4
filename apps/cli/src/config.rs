use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::{http::DEFAULT_REQUEST_TIMEOUT, runtime::DEFAULT_MOVE_TIMEOUT, SessionConfig};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "board.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout: Duration,
    pub move_timeout: Duration,
    pub session_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api/".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            move_timeout: DEFAULT_MOVE_TIMEOUT,
            session_file: PathBuf::from(".board_session.json"),
        }
    }
}

impl Settings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            move_timeout: self.move_timeout,
            ..SessionConfig::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
    move_timeout_secs: Option<u64>,
    session_file: Option<PathBuf>,
}

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    load_settings_from(path, |key| std::env::var(key).ok())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse '{}'", path.display()))?;
            if let Some(v) = file_cfg.api_url {
                settings.api_url = v;
            }
            if let Some(v) = file_cfg.request_timeout_secs {
                settings.request_timeout = Duration::from_secs(v);
            }
            if let Some(v) = file_cfg.move_timeout_secs {
                settings.move_timeout = Duration::from_secs(v);
            }
            if let Some(v) = file_cfg.session_file {
                settings.session_file = v;
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    if let Some(v) = env("BOARD_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout = parse_secs("APP__REQUEST_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = env("APP__MOVE_TIMEOUT_SECS") {
        settings.move_timeout = parse_secs("APP__MOVE_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = env("APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }

    Ok(settings)
}

fn parse_secs(key: &str, raw: &str) -> anyhow::Result<Duration> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
    anyhow::ensure!(secs > 0, "{key} must be positive");
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
