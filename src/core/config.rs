use crate::core::errors::ConfigError;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Upper bound for the prefetch window
pub const MAX_PREFETCH_WINDOW: usize = 16;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Text recognition (Cloud Vision) configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub vision_api_key: Option<String>,
    pub language_hints: Vec<String>,
}

/// Translation service configuration as read from the environment.
///
/// Nothing here is validated up front; see [`Config::service_config`].
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub selected_service: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub google_api_key: Option<String>,
    pub deepl_api_key: Option<String>,
    pub timeout: Duration,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: String,
}

/// Prefetch configuration
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Number of pages after the cursor that get scheduled
    pub window: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub recognition: RecognitionConfig,
    pub translation: TranslationConfig,
    pub cache: CacheConfig,
    pub prefetch: PrefetchConfig,
}

/// Supported translation services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationService {
    Google,
    DeepL,
}

impl TranslationService {
    /// Identifier used as half of the cache key
    pub fn id(&self) -> &'static str {
        match self {
            TranslationService::Google => "google",
            TranslationService::DeepL => "deepL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "google" => Some(TranslationService::Google),
            "deepL" | "deepl" => Some(TranslationService::DeepL),
            _ => None,
        }
    }

    fn default_target_language(&self) -> &'static str {
        match self {
            TranslationService::Google => "en",
            TranslationService::DeepL => "EN-US",
        }
    }
}

impl fmt::Display for TranslationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Fully resolved settings for the selected translation service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service: TranslationService,
    pub source_language: Option<String>,
    pub target_language: String,
    pub api_key: String,
}

impl ServiceConfig {
    pub fn service_id(&self) -> &'static str {
        self.service.id()
    }
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let language_hints = env::var("VISION_LANGUAGE_HINTS")
            .ok()
            .map(|hints| {
                hints
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["ja".to_string()]);

        Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1420),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                log_level,
            },
            recognition: RecognitionConfig {
                vision_api_key: non_empty_var("VISION_API_KEY"),
                language_hints,
            },
            translation: TranslationConfig {
                selected_service: non_empty_var("TRANSLATION_SERVICE"),
                source_language: non_empty_var("SOURCE_LANGUAGE"),
                target_language: non_empty_var("TARGET_LANGUAGE"),
                google_api_key: non_empty_var("GOOGLE_TRANSLATE_API_KEY"),
                deepl_api_key: non_empty_var("DEEPL_API_KEY"),
                timeout: Duration::from_secs(
                    env::var("API_TIMEOUT_SECONDS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(60),
                ),
            },
            cache: CacheConfig {
                cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| ".mtl".to_string()),
            },
            prefetch: PrefetchConfig {
                window: env::var("PREFETCH_WINDOW")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
        }
    }

    /// Validate process-level settings. Service settings are resolved per page instead.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.prefetch.window > MAX_PREFETCH_WINDOW {
            return Err(ConfigError::InvalidPrefetchWindow {
                value: self.prefetch.window,
                max: MAX_PREFETCH_WINDOW,
            });
        }

        if self.translation.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        // Validate cache directory parent exists
        let cache_path = Path::new(&self.cache.cache_dir);
        if let Some(parent) = cache_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidCachePath(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    /// Resolve the selected translation service and its credentials.
    ///
    /// With no explicit selection, a lone DeepL key selects DeepL; anything
    /// else falls back to Google.
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let tl = &self.translation;

        let service = match tl.selected_service.as_deref() {
            Some(name) => TranslationService::parse(name)
                .ok_or_else(|| ConfigError::InvalidService(name.to_string()))?,
            None => match (&tl.google_api_key, &tl.deepl_api_key) {
                (None, Some(_)) => TranslationService::DeepL,
                _ => TranslationService::Google,
            },
        };

        let api_key = match service {
            TranslationService::Google => tl.google_api_key.clone(),
            TranslationService::DeepL => tl.deepl_api_key.clone(),
        }
        .ok_or_else(|| ConfigError::MissingTranslationKey {
            service: service.id().to_string(),
        })?;

        Ok(ServiceConfig {
            service,
            source_language: tl.source_language.clone(),
            target_language: tl
                .target_language
                .clone()
                .unwrap_or_else(|| service.default_target_language().to_string()),
            api_key,
        })
    }

    pub fn vision_api_key(&self) -> Result<&str, ConfigError> {
        self.recognition
            .vision_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVisionKey)
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn cache_dir(&self) -> &str {
        &self.cache.cache_dir
    }

    pub fn prefetch_window(&self) -> usize {
        self.prefetch.window
    }

    pub fn api_timeout(&self) -> Duration {
        self.translation.timeout
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(
        selected: Option<&str>,
        google: Option<&str>,
        deepl: Option<&str>,
    ) -> Config {
        Config {
            server: ServerConfig {
                port: 1420,
                host: "127.0.0.1".to_string(),
                log_level: Level::INFO,
            },
            recognition: RecognitionConfig {
                vision_api_key: Some("vision".to_string()),
                language_hints: vec!["ja".to_string()],
            },
            translation: TranslationConfig {
                selected_service: selected.map(str::to_string),
                source_language: None,
                target_language: None,
                google_api_key: google.map(str::to_string),
                deepl_api_key: deepl.map(str::to_string),
                timeout: Duration::from_secs(60),
            },
            cache: CacheConfig {
                cache_dir: ".mtl".to_string(),
            },
            prefetch: PrefetchConfig { window: 2 },
        }
    }

    #[test]
    fn test_explicit_service_selection() {
        let config = config_with(Some("deepL"), Some("g"), Some("d"));
        let service = config.service_config().unwrap();
        assert_eq!(service.service, TranslationService::DeepL);
        assert_eq!(service.api_key, "d");
        assert_eq!(service.target_language, "EN-US");
    }

    #[test]
    fn test_lone_deepl_key_selects_deepl() {
        let config = config_with(None, None, Some("d:fx"));
        let service = config.service_config().unwrap();
        assert_eq!(service.service_id(), "deepL");
    }

    #[test]
    fn test_google_default_target_language() {
        let config = config_with(None, Some("g"), None);
        let service = config.service_config().unwrap();
        assert_eq!(service.service_id(), "google");
        assert_eq!(service.target_language, "en");
    }

    #[test]
    fn test_no_keys_assumes_google_then_fails_for_key() {
        let config = config_with(None, None, None);
        match config.service_config() {
            Err(ConfigError::MissingTranslationKey { service }) => assert_eq!(service, "google"),
            other => panic!("expected missing google key, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_service_is_config_error() {
        let config = config_with(Some("babelfish"), Some("g"), None);
        assert!(matches!(
            config.service_config(),
            Err(ConfigError::InvalidService(_))
        ));
    }

    #[test]
    fn test_selected_service_without_key() {
        let config = config_with(Some("deepL"), Some("g"), None);
        assert!(matches!(
            config.service_config(),
            Err(ConfigError::MissingTranslationKey { .. })
        ));
    }

    #[test]
    fn test_prefetch_window_validation() {
        let mut config = config_with(None, None, None);
        config.prefetch.window = MAX_PREFETCH_WINDOW + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPrefetchWindow { .. })
        ));
    }
}
