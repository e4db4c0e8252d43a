//! Configuration settings for tubescript.

use super::Environment;
use crate::transcript::LanguagePreference;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub primary: PrimarySettings,
    pub fallback: FallbackSettings,
    pub cookies: CookieSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Language preference used when a request names none.
    pub languages: Vec<String>,
    /// Fall back to a machine translation when no track matches directly.
    pub allow_translation: bool,
    /// Directory for temporary files (cookie files, subtitle downloads).
    /// Uses the system temp directory when unset.
    pub temp_dir: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            languages: vec!["pt".to_string(), "en".to_string()],
            allow_translation: true,
            temp_dir: None,
        }
    }
}

/// Official transcript protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimarySettings {
    /// Upper bound for the whole primary attempt.
    pub timeout_seconds: u64,
    /// Pause between the watch page and the player request.
    pub request_delay_ms: u64,
    /// Accept-Language header; also decides the consent page language.
    pub accept_language: String,
    /// Browser user agent sent with the watch page request.
    pub user_agent: String,
}

impl Default for PrimarySettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            request_delay_ms: 0,
            accept_language: "en-US".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// yt-dlp subtitle fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Attempt the fallback tier when the primary tier fails.
    pub enabled: bool,
    /// Path or name of the yt-dlp binary.
    pub yt_dlp_path: String,
    /// Upper bound for the whole fallback attempt.
    pub timeout_seconds: u64,
    /// Subtitle format requested from yt-dlp.
    pub subtitle_format: String,
    /// Extra arguments passed to every yt-dlp call (e.g. `--proxy`).
    pub extra_args: Vec<String>,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            yt_dlp_path: "yt-dlp".to_string(),
            timeout_seconds: 120,
            subtitle_format: "json3".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Cookie credential sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Environment variable holding a base64-encoded cookies.txt.
    pub env_var: String,
    /// Browser to read cookies from when running interactively.
    pub browser: Option<String>,
    /// Path to a Netscape cookies.txt file.
    pub file: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            env_var: "YOUTUBE_COOKIES".to_string(),
            browser: None,
            file: None,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Environment variable holding the `X-API-Key` secret.
    pub api_key_env: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_key_env: "API_KEY".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => Self::expand_path(&p.to_string_lossy()),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::error::TubescriptError::Config(e.to_string()))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubescript")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        match &self.general.temp_dir {
            Some(dir) => Self::expand_path(dir),
            None => std::env::temp_dir(),
        }
    }

    /// Default language preference.
    pub fn languages(&self) -> LanguagePreference {
        LanguagePreference::new(&self.general.languages)
    }

    /// Overlay overrides captured from the environment.
    pub fn apply_env(&mut self, env: &Environment) {
        if let Some(languages) = &env.languages {
            let parsed = LanguagePreference::from_csv(languages);
            if !parsed.is_empty() {
                self.general.languages = parsed.into();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.languages().to_vec(), vec!["pt", "en"]);
        assert_eq!(settings.primary.timeout_seconds, 30);
        assert_eq!(settings.fallback.subtitle_format, "json3");
        assert_eq!(settings.cookies.env_var, "YOUTUBE_COOKIES");
        assert_eq!(settings.server.api_key_env, "API_KEY");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[general]\nlanguages = [\"es\"]\n\n[fallback]\nenabled = false\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.general.languages, vec!["es"]);
        assert!(!settings.fallback.enabled);
        assert_eq!(settings.fallback.yt_dlp_path, "yt-dlp");
        assert!(settings.general.allow_translation);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.cookies.browser = Some("firefox".to_string());
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(reloaded.cookies.browser.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_apply_env_languages() {
        let mut settings = Settings::default();
        let env = Environment {
            languages: Some("en, de".to_string()),
            ..Environment::default()
        };
        settings.apply_env(&env);
        assert_eq!(settings.general.languages, vec!["en", "de"]);

        let blank = Environment {
            languages: Some(" , ".to_string()),
            ..Environment::default()
        };
        settings.apply_env(&blank);
        assert_eq!(settings.general.languages, vec!["en", "de"]);
    }
}
