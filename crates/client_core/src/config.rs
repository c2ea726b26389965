use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::ApiGeneration;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "storefront.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_generation: ApiGeneration,
    pub request_timeout_ms: u64,
    /// Extra attempts for GET requests that fail at the network level.
    pub get_retries: u32,
    pub retry_delay_ms: u64,
    /// Pause before a list screen's very first request.
    pub initial_list_delay_ms: u64,
    pub reports_products_enabled: bool,
    pub reports_reviews_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_generation: ApiGeneration::Dokan,
            request_timeout_ms: 30_000,
            get_retries: 1,
            retry_delay_ms: 500,
            initial_list_delay_ms: 0,
            reports_products_enabled: true,
            reports_reviews_enabled: true,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn initial_list_delay(&self) -> Duration {
        Duration::from_millis(self.initial_list_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_generation: Option<String>,
    request_timeout_ms: Option<u64>,
    get_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    initial_list_delay_ms: Option<u64>,
    reports_products_enabled: Option<bool>,
    reports_reviews_enabled: Option<bool>,
}

/// Defaults, then `storefront.toml` in the working directory when present,
/// then environment overrides.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if Path::new(DEFAULT_SETTINGS_FILE).exists() {
        match load_settings_file(Path::new(DEFAULT_SETTINGS_FILE)) {
            Ok(file) => apply_file(&mut settings, file),
            Err(err) => warn!("ignoring {DEFAULT_SETTINGS_FILE}: {err:#}"),
        }
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Same layering as [`load_settings`] with an explicit settings file.
pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    apply_file(&mut settings, load_settings_file(path)?);
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn load_settings_file(path: &Path) -> anyhow::Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    parse_settings_file(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

fn parse_settings_file(raw: &str) -> anyhow::Result<FileSettings> {
    Ok(toml::from_str(raw)?)
}

fn apply_file(settings: &mut Settings, file: FileSettings) {
    if let Some(v) = file.api_generation.as_deref() {
        match ApiGeneration::parse(v) {
            Some(generation) => settings.api_generation = generation,
            None => warn!("unknown api_generation '{v}' in settings file"),
        }
    }
    if let Some(v) = file.request_timeout_ms {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = file.get_retries {
        settings.get_retries = v;
    }
    if let Some(v) = file.retry_delay_ms {
        settings.retry_delay_ms = v;
    }
    if let Some(v) = file.initial_list_delay_ms {
        settings.initial_list_delay_ms = v;
    }
    if let Some(v) = file.reports_products_enabled {
        settings.reports_products_enabled = v;
    }
    if let Some(v) = file.reports_reviews_enabled {
        settings.reports_reviews_enabled = v;
    }
}

/// `STOREFRONT_*` variables, with `APP__*` aliases taking precedence.
fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(&format!("APP__{name}")).or_else(|| lookup(&format!("STOREFRONT_{name}")));

    if let Some(v) = var("API_GENERATION") {
        if let Some(generation) = ApiGeneration::parse(&v) {
            settings.api_generation = generation;
        }
    }
    if let Some(v) = var("REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = var("GET_RETRIES").and_then(|v| v.parse().ok()) {
        settings.get_retries = v;
    }
    if let Some(v) = var("RETRY_DELAY_MS").and_then(|v| v.parse().ok()) {
        settings.retry_delay_ms = v;
    }
    if let Some(v) = var("INITIAL_LIST_DELAY_MS").and_then(|v| v.parse().ok()) {
        settings.initial_list_delay_ms = v;
    }
    if let Some(v) = var("REPORTS_PRODUCTS_ENABLED").and_then(|v| parse_flag(&v)) {
        settings.reports_products_enabled = v;
    }
    if let Some(v) = var("REPORTS_REVIEWS_ENABLED").and_then(|v| parse_flag(&v)) {
        settings.reports_reviews_enabled = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
