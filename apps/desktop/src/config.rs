use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "attack-demo.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub default_epsilon: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 60,
            default_epsilon: 0.05,
        }
    }
}

impl Settings {
    /// `None` when the timeout is configured as 0.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    service_url: Option<String>,
    request_timeout_secs: Option<u64>,
    default_epsilon: Option<f64>,
}

/// Defaults, then the config file, then environment overrides.
///
/// An explicitly passed `config_path` must exist; the default file is
/// optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.service_url = normalize_service_url(&settings.service_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.service_url {
        settings.service_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.default_epsilon {
        settings.default_epsilon = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ATTACK_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("APP__SERVICE_URL") {
        settings.service_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("APP__DEFAULT_EPSILON") {
        if let Ok(parsed) = v.trim().parse::<f64>() {
            settings.default_epsilon = parsed;
        }
    }
}

pub fn normalize_service_url(raw_service_url: &str) -> anyhow::Result<String> {
    let raw_service_url = raw_service_url.trim();
    if raw_service_url.is_empty() {
        return Ok(Settings::default().service_url);
    }

    let parsed = Url::parse(raw_service_url)
        .with_context(|| format!("invalid service url {raw_service_url:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "unsupported service url scheme {:?}; expected http or https",
            parsed.scheme()
        );
    }

    Ok(raw_service_url.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
