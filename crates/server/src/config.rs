use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::token::TokenConfig;

pub const DEFAULT_CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            jwt_secret: "dev-board-secret".into(),
            access_ttl_seconds: 300,
            refresh_ttl_seconds: 24 * 60 * 60,
        }
    }
}

impl Settings {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret.clone(),
            access_ttl_seconds: self.access_ttl_seconds,
            refresh_ttl_seconds: self.refresh_ttl_seconds,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    jwt_secret: Option<String>,
    access_ttl_seconds: Option<i64>,
    refresh_ttl_seconds: Option<i64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
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
            if let Some(v) = file_cfg.bind_addr {
                settings.server_bind = v;
            }
            if let Some(v) = file_cfg.jwt_secret {
                settings.jwt_secret = v;
            }
            if let Some(v) = file_cfg.access_ttl_seconds {
                settings.access_ttl_seconds = ensure_positive("access_ttl_seconds", v)?;
            }
            if let Some(v) = file_cfg.refresh_ttl_seconds {
                settings.refresh_ttl_seconds = ensure_positive("refresh_ttl_seconds", v)?;
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__JWT_SECRET") {
        settings.jwt_secret = v;
    }
    if let Some(v) = env("APP__ACCESS_TTL_SECONDS") {
        settings.access_ttl_seconds = parse_seconds("APP__ACCESS_TTL_SECONDS", &v)?;
    }
    if let Some(v) = env("APP__REFRESH_TTL_SECONDS") {
        settings.refresh_ttl_seconds = parse_seconds("APP__REFRESH_TTL_SECONDS", &v)?;
    }

    Ok(settings)
}

fn parse_seconds(key: &str, raw: &str) -> anyhow::Result<i64> {
    let seconds = raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
    ensure_positive(key, seconds)
}

fn ensure_positive(key: &str, seconds: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(seconds > 0, "{key} must be positive, got {seconds}");
    Ok(seconds)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
