//! Process environment captured once at startup.

use super::Settings;

/// Environment variable overriding the default language preference.
pub const LANGUAGES_ENV: &str = "TUBESCRIPT_LANGUAGES";

/// Secrets and overrides read from the process environment.
///
/// Captured once and passed explicitly to the components that need it, so
/// request handling never reads environment variables.
#[derive(Clone, Default)]
pub struct Environment {
    /// Base64-encoded Netscape cookies.txt.
    pub cookie_bundle: Option<String>,
    /// Secret expected in the `X-API-Key` header.
    pub api_key: Option<String>,
    /// Comma-separated language list.
    pub languages: Option<String>,
    /// Attached to a terminal, so a local browser profile may be used.
    pub interactive: bool,
}

impl Environment {
    /// Read the variables named by `settings` from the process environment.
    pub fn capture(settings: &Settings) -> Self {
        Self {
            cookie_bundle: non_empty_var(&settings.cookies.env_var),
            api_key: non_empty_var(&settings.server.api_key_env),
            languages: non_empty_var(LANGUAGES_ENV),
            interactive: console::user_attended(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("cookie_bundle", &self.cookie_bundle.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("languages", &self.languages)
            .field("interactive", &self.interactive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let env = Environment {
            cookie_bundle: Some("c2VjcmV0".to_string()),
            api_key: Some("hunter2".to_string()),
            languages: Some("en".to_string()),
            interactive: false,
        };

        let debug = format!("{:?}", env);
        assert!(!debug.contains("c2VjcmV0"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("\"en\""));
    }
}
