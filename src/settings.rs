use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

// Environment variable names for runtime overrides
const ENVIRONMENT_ENV: &str = "SENTIMENT_ENV";
const BASE_URL_ENV: &str = "SENTIMENT_BASE_URL";

pub const SETTINGS_FILE_NAME: &str = "sentiment_settings.json";

const PRODUCTION_BACKOFF: Backoff = Backoff::Exponential {
    initial_ms: 500,
    max_ms: 30_000,
};

/// Deployment profile, selected with `SENTIMENT_ENV`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "default" => Some(Environment::Development),
            "testing" | "test" => Some(Environment::Testing),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        match env::var(ENVIRONMENT_ENV) {
            Ok(value) => Environment::parse(&value).unwrap_or_else(|| {
                warn!(
                    "Ignoring unknown {} value '{}', using development",
                    ENVIRONMENT_ENV, value
                );
                Environment::Development
            }),
            Err(_) => Environment::Development,
        }
    }
}

/// Delay between the end of one recognition session and the next start.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Restart immediately.
    None,
    Fixed { delay_ms: u64 },
    /// Doubles per consecutive restart, capped at `max_ms`.
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::None
    }
}

impl Backoff {
    /// Delay before restart number `attempt` (1-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { initial_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(32);
                let delay = initial_ms.saturating_mul(1u64 << shift);
                Duration::from_millis(delay.min(max_ms))
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_inject_svg_pointer_events")]
    pub inject_svg_pointer_events: bool,
    #[serde(default = "default_fire_keyword")]
    pub fire_keyword: String,
    /// BCP 47 tag handed to the recognizer; `None` leaves it to the engine.
    #[serde(default)]
    pub recognition_lang: Option<String>,
    #[serde(default)]
    pub restart_backoff: Backoff,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: Option<u32>,
}

impl AppSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Apply profile defaults, then the base URL override (see [`base_url_from_env`]).
    pub fn apply_environment(&mut self, environment: Environment, base_url: Option<String>) {
        match environment {
            Environment::Development => {}
            Environment::Testing => {
                self.restart_backoff = Backoff::None;
                self.max_consecutive_failures = Some(1);
            }
            Environment::Production => {
                if self.restart_backoff == Backoff::None {
                    self.restart_backoff = PRODUCTION_BACKOFF;
                }
            }
        }

        if let Some(url) = base_url.as_deref().and_then(normalize_base_url) {
            debug!("Overriding base URL: {}", url);
            self.base_url = url;
        }
        // Endpoint paths are appended with a leading slash
        self.base_url = self.base_url.trim_end_matches('/').to_string();
    }
}

/// Raw value of `SENTIMENT_BASE_URL`, if set.
pub fn base_url_from_env() -> Option<String> {
    env::var(BASE_URL_ENV).ok()
}

fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.trim_end_matches('/').to_string())
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_text_length() -> usize {
    280
}

fn default_inject_svg_pointer_events() -> bool {
    true
}

fn default_fire_keyword() -> String {
    "fire".to_string()
}

fn default_max_consecutive_failures() -> Option<u32> {
    Some(5)
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        base_url: default_base_url(),
        debounce_ms: default_debounce_ms(),
        max_text_length: default_max_text_length(),
        inject_svg_pointer_events: default_inject_svg_pointer_events(),
        fire_keyword: default_fire_keyword(),
        recognition_lang: None,
        restart_backoff: Backoff::default(),
        max_consecutive_failures: default_max_consecutive_failures(),
    }
}

/// Read settings from `path`, writing the defaults there if the file is missing.
///
/// A file that fails to parse is left alone and the defaults are used.
pub fn load_or_create_settings(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        let defaults = get_default_settings();
        write_settings(path, &defaults)?;
        info!("Created default settings at {}", path.display());
        return Ok(defaults);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => {
            debug!("Found existing settings: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            warn!("Failed to parse settings at {}: {}", path.display(), e);
            Ok(get_default_settings())
        }
    }
}

pub fn write_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = get_default_settings();
        assert_eq!(settings.debounce(), Duration::from_millis(500));
        assert_eq!(settings.max_text_length, 280);
        assert_eq!(settings.fire_keyword, "fire");
        assert!(settings.inject_svg_pointer_events);
        assert_eq!(settings.restart_backoff, Backoff::None);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"debounce_ms": 250}"#).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.base_url, "http://127.0.0.1:5000");
        assert_eq!(settings.max_consecutive_failures, Some(5));
    }

    #[test]
    fn test_backoff_parses_tagged() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"restart_backoff": {"kind": "exponential", "initial_ms": 100, "max_ms": 1000}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.restart_backoff,
            Backoff::Exponential {
                initial_ms: 100,
                max_ms: 1000
            }
        );
    }

    #[test]
    fn test_backoff_delays() {
        assert_eq!(Backoff::None.delay(3), Duration::ZERO);
        assert_eq!(
            Backoff::Fixed { delay_ms: 250 }.delay(7),
            Duration::from_millis(250)
        );

        let exp = Backoff::Exponential {
            initial_ms: 100,
            max_ms: 1000,
        };
        assert_eq!(exp.delay(1), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(200));
        assert_eq!(exp.delay(4), Duration::from_millis(800));
        assert_eq!(exp.delay(5), Duration::from_millis(1000));
        assert_eq!(exp.delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("Production"), Some(Environment::Production));
        assert_eq!(Environment::parse(" test "), Some(Environment::Testing));
        assert_eq!(Environment::parse("default"), Some(Environment::Development));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn test_apply_environment_profiles() {
        let mut dev = get_default_settings();
        dev.apply_environment(Environment::Development, None);
        assert_eq!(dev, get_default_settings());

        let mut testing = get_default_settings();
        testing.restart_backoff = Backoff::Fixed { delay_ms: 10 };
        testing.apply_environment(Environment::Testing, None);
        assert_eq!(testing.restart_backoff, Backoff::None);
        assert_eq!(testing.max_consecutive_failures, Some(1));

        let mut prod = get_default_settings();
        prod.restart_backoff = Backoff::Fixed { delay_ms: 50 };
        prod.apply_environment(Environment::Production, None);
        assert_eq!(prod.restart_backoff, Backoff::Fixed { delay_ms: 50 });
    }

    #[test]
    fn test_apply_environment_base_url_override() {
        let mut prod = get_default_settings();
        prod.apply_environment(
            Environment::Production,
            Some("  http://scores:8080/ ".to_string()),
        );
        assert_eq!(prod.restart_backoff, PRODUCTION_BACKOFF);
        assert_eq!(prod.base_url, "http://scores:8080");

        // Blank overrides are ignored, but the configured URL is still normalized.
        let mut blank = get_default_settings();
        blank.base_url = "http://localhost:5000/".to_string();
        blank.apply_environment(Environment::Development, Some("   ".to_string()));
        assert_eq!(blank.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_recognition_lang_is_optional() {
        assert_eq!(get_default_settings().recognition_lang, None);
        let settings: AppSettings =
            serde_json::from_str(r#"{"recognition_lang": "en-US"}"#).unwrap();
        assert_eq!(settings.recognition_lang.as_deref(), Some("en-US"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let settings = load_or_create_settings(&path).unwrap();
        assert_eq!(settings, get_default_settings());
        assert!(path.exists());

        let mut changed = settings.clone();
        changed.debounce_ms = 100;
        write_settings(&path, &changed).unwrap();
        assert_eq!(load_or_create_settings(&path).unwrap().debounce_ms, 100);
    }

    #[test]
    fn test_load_unparsable_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "not json").unwrap();

        let settings = load_or_create_settings(&path).unwrap();
        assert_eq!(settings, get_default_settings());
        // The broken file is not overwritten.
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }
}
