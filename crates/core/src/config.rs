use std::env;
use std::time::Duration;
use crate::error::{AppError, Result};
use dotenvy::dotenv;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://device-frames.fly.dev";
pub const FALLBACK_CATEGORY: &str = "iOS";
pub const FALLBACK_DEVICE: &str = "iPhone 17 Pro";
pub const FALLBACK_VARIATION: &str = "Cosmic Orange";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The (category, device, variation) the cascade tries first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreferredDefaults {
    pub category: String,
    pub device: String,
    pub variation: String,
}

impl Default for PreferredDefaults {
    fn default() -> Self {
        Self {
            category: FALLBACK_CATEGORY.to_string(),
            device: FALLBACK_DEVICE.to_string(),
            variation: FALLBACK_VARIATION.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    pub defaults: PreferredDefaults,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = non_empty(lookup("FRAME_API_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(&base)
            .map_err(|e| AppError::config(format!("FRAME_API_BASE_URL '{}' is not a valid URL: {}", base, e)))?;

        let defaults = PreferredDefaults {
            category: non_empty(lookup("DEFAULT_CATEGORY")).unwrap_or_else(|| FALLBACK_CATEGORY.to_string()),
            device: non_empty(lookup("DEFAULT_DEVICE")).unwrap_or_else(|| FALLBACK_DEVICE.to_string()),
            variation: non_empty(lookup("DEFAULT_VARIATION")).unwrap_or_else(|| FALLBACK_VARIATION.to_string()),
        };

        let timeout_secs = match non_empty(lookup("FRAME_REQUEST_TIMEOUT_SECS")) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(AppError::config(format!(
                        "FRAME_REQUEST_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
        };

        Ok(Self {
            api_base_url,
            defaults,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_fallbacks() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://device-frames.fly.dev/");
        assert_eq!(config.defaults, PreferredDefaults::default());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn blank_defaults_are_ignored_and_values_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("DEFAULT_CATEGORY", "  iPad "),
            ("DEFAULT_DEVICE", "   "),
        ]))
        .unwrap();
        assert_eq!(config.defaults.category, "iPad");
        assert_eq!(config.defaults.device, FALLBACK_DEVICE);
    }

    #[test]
    fn rejects_bad_url_and_timeout() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("FRAME_API_BASE_URL", "not a url")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("FRAME_REQUEST_TIMEOUT_SECS", "0")])),
            Err(AppError::Config(_))
        ));
    }
}
