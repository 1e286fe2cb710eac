use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use client_core::session::DEFAULT_SUMMARY_BULLETS;
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_CONFIG_FILE: &str = "assistant.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub log_filter: String,
    pub summary_bullets: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            log_filter: "info".into(),
            summary_bullets: DEFAULT_SUMMARY_BULLETS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    log_filter: Option<String>,
    summary_bullets: Option<u32>,
}

impl Settings {
    fn apply_file(&mut self, raw: &str) -> Result<(), toml::de::Error> {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = file_cfg.log_filter {
            self.log_filter = v;
        }
        if let Some(v) = file_cfg.summary_bullets {
            self.summary_bullets = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("ASSISTANT_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = var("APP__API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = var("APP__LOG_FILTER") {
            self.log_filter = v;
        }
        if let Some(v) = var("APP__SUMMARY_BULLETS") {
            if let Ok(parsed) = v.trim().parse::<u32>() {
                self.summary_bullets = parsed;
            }
        }
    }

    /// Command-line flags win over everything else.
    pub fn apply_overrides(
        &mut self,
        api_base_url: Option<String>,
        log_filter: Option<String>,
        summary_bullets: Option<u32>,
    ) {
        if let Some(v) = api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = log_filter {
            self.log_filter = v;
        }
        if let Some(v) = summary_bullets {
            self.summary_bullets = v;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        let defaults = Settings::default();
        let base_url = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if base_url.is_empty() {
            defaults.api_base_url
        } else {
            base_url.to_string()
        };
        if self.log_filter.trim().is_empty() {
            self.log_filter = defaults.log_filter;
        }
        if self.summary_bullets == 0 {
            self.summary_bullets = defaults.summary_bullets;
        }
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => settings
            .apply_file(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings.normalize();
    Ok(settings)
}
