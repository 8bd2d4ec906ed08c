use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{
    ApiKey, ImageDetail, UpstreamSettings, DEFAULT_MAX_OBJECTS, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_MIN_OBJECTS,
};

const DEFAULT_MOCK_DELAY_MS: u64 = 1500;
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    api_key: Option<String>,
    upstream: Option<UpstreamConfigFile>,
    mock: Option<MockConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct UpstreamConfigFile {
    url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    image_detail: Option<ImageDetail>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MockConfigFile {
    delay_ms: Option<u64>,
    min_objects: Option<usize>,
    max_objects: Option<usize>,
    min_confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// `None` when absent, blank or the placeholder sentinel.
    pub api_key: Option<ApiKey>,
    pub upstream: UpstreamSettings,
    pub mock: MockSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockSettings {
    pub delay: Duration,
    pub min_objects: usize,
    pub max_objects: usize,
    pub min_confidence: f64,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_MOCK_DELAY_MS),
            min_objects: DEFAULT_MIN_OBJECTS,
            max_objects: DEFAULT_MAX_OBJECTS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            upstream: UpstreamSettings::default(),
            mock: MockSettings::default(),
        }
    }
}

impl DetectorConfig {
    /// Load from `$SPOT_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SPOT_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty());
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let defaults = UpstreamSettings::default();
        let upstream = file.upstream.unwrap_or_default();
        let mock = file.mock.unwrap_or_default();
        Self {
            api_key: file.api_key.and_then(ApiKey::new),
            upstream: UpstreamSettings {
                url: upstream.url.unwrap_or(defaults.url),
                model: upstream.model.unwrap_or(defaults.model),
                max_tokens: upstream.max_tokens.unwrap_or(defaults.max_tokens),
                temperature: upstream.temperature.unwrap_or(defaults.temperature),
                image_detail: upstream.image_detail.unwrap_or(defaults.image_detail),
                timeout: upstream
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            mock: MockSettings {
                delay: Duration::from_millis(mock.delay_ms.unwrap_or(DEFAULT_MOCK_DELAY_MS)),
                min_objects: mock.min_objects.unwrap_or(DEFAULT_MIN_OBJECTS),
                max_objects: mock.max_objects.unwrap_or(DEFAULT_MAX_OBJECTS),
                min_confidence: mock.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_value("OPENAI_API_KEY") {
            // A placeholder in the env still overrides a key from the file.
            self.api_key = ApiKey::new(key);
        }
        if let Some(url) = env_value("SPOT_API_URL") {
            self.upstream.url = url;
        }
        if let Some(model) = env_value("SPOT_MODEL") {
            self.upstream.model = model;
        }
        if let Some(max_tokens) = parse_env::<u32>("SPOT_MAX_TOKENS")? {
            self.upstream.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse_env::<f32>("SPOT_TEMPERATURE")? {
            self.upstream.temperature = temperature;
        }
        if let Some(detail) = env_value("SPOT_IMAGE_DETAIL") {
            self.upstream.image_detail = detail
                .parse()
                .map_err(|e| anyhow!("SPOT_IMAGE_DETAIL: {}", e))?;
        }
        if let Some(seconds) = parse_env::<u64>("SPOT_TIMEOUT_SECS")? {
            self.upstream.timeout = Duration::from_secs(seconds);
        }
        if let Some(delay_ms) = parse_env::<u64>("SPOT_MOCK_DELAY_MS")? {
            self.mock.delay = Duration::from_millis(delay_ms);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let url = url::Url::parse(&self.upstream.url)
            .with_context(|| format!("invalid upstream url '{}'", self.upstream.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported upstream scheme '{}'; expected http or https",
                url.scheme()
            ));
        }
        if self.upstream.model.trim().is_empty() {
            return Err(anyhow!("upstream model must not be empty"));
        }
        if self.upstream.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than zero"));
        }
        let temperature = self.upstream.temperature;
        if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(anyhow!(
                "temperature must be between 0 and {}",
                MAX_TEMPERATURE
            ));
        }
        if self.upstream.timeout.is_zero() {
            return Err(anyhow!("timeout must be greater than zero"));
        }
        if self.mock.min_objects == 0 || self.mock.min_objects > self.mock.max_objects {
            return Err(anyhow!(
                "mock object range must satisfy 1 <= min_objects <= max_objects"
            ));
        }
        let floor = self.mock.min_confidence;
        if !floor.is_finite() || !(0.0..1.0).contains(&floor) {
            return Err(anyhow!("mock min_confidence must be in [0, 1)"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_value(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value '{}'", key, value)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_contract() {
        let cfg = DetectorConfig::from_file(DetectorConfigFile::default());
        assert!(!cfg.is_configured());
        assert_eq!(cfg.upstream.model, "gpt-4o-mini");
        assert_eq!(cfg.upstream.max_tokens, 1000);
        assert_eq!(cfg.upstream.image_detail, ImageDetail::Low);
        assert_eq!(cfg.mock.delay, Duration::from_millis(1500));
        assert_eq!((cfg.mock.min_objects, cfg.mock.max_objects), (8, 12));
    }

    #[test]
    fn placeholder_key_in_file_is_unconfigured() {
        let file = DetectorConfigFile {
            api_key: Some(crate::detect::PLACEHOLDER_API_KEY.to_string()),
            ..DetectorConfigFile::default()
        };
        assert!(!DetectorConfig::from_file(file).is_configured());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = DetectorConfig::default();
        cfg.upstream.url = "ftp://example.com".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.upstream.temperature = 3.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.mock.min_objects = 13;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.mock.min_confidence = 1.0;
        assert!(cfg.validate().is_err());

        assert!(DetectorConfig::default().validate().is_ok());
    }
}
