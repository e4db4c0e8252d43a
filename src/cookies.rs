//! Cookie credential resolution for the subtitle fallback.
//!
//! Resolution order for one request:
//!
//! 1. an explicit override (cookie file path or browser name);
//! 2. a base64-encoded cookies.txt bundle from the environment;
//! 3. a cookies.txt file named in the configuration;
//! 4. a configured browser profile, only when attached to a terminal;
//! 5. no credential.
//!
//! File credentials always point at a private temporary copy owned by
//! [`ResolvedCookies`]. Dropping it (after the attempt, on error, or on
//! cancellation) deletes the file.

use crate::config::{CookieSettings, Environment, Settings};
use crate::error::{Result, TubescriptError};
use crate::sources::FallbackFetcher;
use crate::transcript::VideoId;
use base64::Engine;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Browsers yt-dlp can read cookies from.
const SUPPORTED_BROWSERS: &[&str] = &[
    "brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi", "whale",
];

/// Caller-supplied cookie source overriding the configured ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    /// Netscape cookies.txt on disk.
    File(PathBuf),
    /// Browser name, optionally with a profile (`firefox:work`).
    Browser(String),
}

impl std::str::FromStr for CookieSource {
    type Err = TubescriptError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TubescriptError::Credential(
                "Empty cookie source".to_string(),
            ));
        }
        if is_browser_spec(s) {
            Ok(CookieSource::Browser(s.to_lowercase()))
        } else {
            Ok(CookieSource::File(Settings::expand_path(s)))
        }
    }
}

fn is_browser_spec(spec: &str) -> bool {
    let name = spec.split(':').next().unwrap_or(spec).to_lowercase();
    SUPPORTED_BROWSERS.contains(&name.as_str())
}

/// A credential ready to attach to a yt-dlp invocation.
#[derive(Clone, PartialEq, Eq)]
pub enum CookieCredential {
    File(PathBuf),
    Browser(String),
}

impl CookieCredential {
    /// yt-dlp arguments attaching this credential.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CookieCredential::File(path) => {
                vec!["--cookies".to_string(), path.to_string_lossy().into_owned()]
            }
            CookieCredential::Browser(browser) => {
                vec!["--cookies-from-browser".to_string(), browser.clone()]
            }
        }
    }
}

impl std::fmt::Display for CookieCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieCredential::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                write!(f, "cookie file {}", name)
            }
            CookieCredential::Browser(browser) => write!(f, "browser profile {}", browser),
        }
    }
}

impl std::fmt::Debug for CookieCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CookieCredential({})", self)
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieOrigin {
    Override,
    Environment,
    ConfigFile,
    Browser,
    None,
}

impl std::fmt::Display for CookieOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieOrigin::Override => write!(f, "override"),
            CookieOrigin::Environment => write!(f, "environment"),
            CookieOrigin::ConfigFile => write!(f, "config file"),
            CookieOrigin::Browser => write!(f, "browser"),
            CookieOrigin::None => write!(f, "none"),
        }
    }
}

/// A credential scoped to one acquisition attempt.
#[derive(Debug)]
pub struct ResolvedCookies {
    credential: Option<CookieCredential>,
    origin: CookieOrigin,
    // Deleted on drop.
    _file: Option<NamedTempFile>,
}

impl ResolvedCookies {
    pub fn none() -> Self {
        Self {
            credential: None,
            origin: CookieOrigin::None,
            _file: None,
        }
    }

    fn browser(name: String, origin: CookieOrigin) -> Self {
        Self {
            credential: Some(CookieCredential::Browser(name)),
            origin,
            _file: None,
        }
    }

    fn temp_file(file: NamedTempFile, origin: CookieOrigin) -> Self {
        Self {
            credential: Some(CookieCredential::File(file.path().to_path_buf())),
            origin,
            _file: Some(file),
        }
    }

    pub fn credential(&self) -> Option<&CookieCredential> {
        self.credential.as_ref()
    }

    pub fn origin(&self) -> CookieOrigin {
        self.origin
    }
}

/// Outcome of probing a restricted video with the resolved credential.
#[derive(Debug, Clone, Serialize)]
pub struct CookieHealth {
    pub origin: CookieOrigin,
    pub credential: Option<String>,
    pub accessible: bool,
    pub title: Option<String>,
    pub error: Option<String>,
}

/// Produces a [`CookieCredential`] for the fallback tier.
#[derive(Clone)]
pub struct CookieResolver {
    settings: CookieSettings,
    bundle: Option<String>,
    interactive: bool,
    temp_dir: PathBuf,
}

impl CookieResolver {
    pub fn new(settings: &Settings, env: &Environment) -> Self {
        Self {
            settings: settings.cookies.clone(),
            bundle: env.cookie_bundle.clone(),
            interactive: env.interactive,
            temp_dir: settings.temp_dir(),
        }
    }

    /// Whether any credential source is configured.
    pub fn has_sources(&self) -> bool {
        self.bundle.is_some()
            || self.settings.file.is_some()
            || (self.interactive && self.settings.browser.is_some())
    }

    /// Resolve a credential for one request.
    ///
    /// A malformed bundle is an error; it never degrades into browser
    /// cookies, which may not exist on a headless host.
    pub fn resolve(&self, override_source: Option<&CookieSource>) -> Result<ResolvedCookies> {
        if let Some(source) = override_source {
            return match source {
                CookieSource::File(path) => {
                    let file = self.copy_cookie_file(path)?;
                    debug!("Using cookie file override");
                    Ok(ResolvedCookies::temp_file(file, CookieOrigin::Override))
                }
                CookieSource::Browser(name) => {
                    Ok(ResolvedCookies::browser(name.clone(), CookieOrigin::Override))
                }
            };
        }

        if let Some(bundle) = &self.bundle {
            let contents = decode_bundle(bundle)?;
            let file = self.write_temp(&contents)?;
            debug!("Decoded cookie bundle from environment");
            return Ok(ResolvedCookies::temp_file(file, CookieOrigin::Environment));
        }

        if let Some(path) = &self.settings.file {
            let file = self.copy_cookie_file(&Settings::expand_path(path))?;
            return Ok(ResolvedCookies::temp_file(file, CookieOrigin::ConfigFile));
        }

        if let Some(browser) = &self.settings.browser {
            if self.interactive {
                if !is_browser_spec(browser) {
                    return Err(TubescriptError::Credential(format!(
                        "Unsupported browser: {}",
                        browser
                    )));
                }
                return Ok(ResolvedCookies::browser(
                    browser.to_lowercase(),
                    CookieOrigin::Browser,
                ));
            }
            warn!("Ignoring browser cookies for {}: not running interactively", browser);
        }

        Ok(ResolvedCookies::none())
    }

    /// Check whether the resolved credential can open a restricted video.
    pub async fn check(
        &self,
        fetcher: &FallbackFetcher,
        video_id: &VideoId,
        override_source: Option<&CookieSource>,
    ) -> Result<CookieHealth> {
        let cookies = self.resolve(override_source)?;
        let credential = cookies.credential().map(|c| c.to_string());

        let health = match fetcher.fetch_title(video_id, cookies.credential()).await {
            Ok(title) => {
                info!("Cookie check succeeded for {}", video_id);
                CookieHealth {
                    origin: cookies.origin(),
                    credential,
                    accessible: true,
                    title: Some(title),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Cookie check failed for {}: {}", video_id, e);
                CookieHealth {
                    origin: cookies.origin(),
                    credential,
                    accessible: false,
                    title: None,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(health)
    }

    fn temp_builder(&self) -> Result<tempfile::Builder<'static, 'static>> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("tubescript-cookies-").suffix(".txt");
        Ok(builder)
    }

    fn write_temp(&self, contents: &str) -> Result<NamedTempFile> {
        let mut file = self.temp_builder()?.tempfile_in(&self.temp_dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    /// yt-dlp rewrites the cookie jar it is given, so it only ever sees a copy.
    fn copy_cookie_file(&self, path: &Path) -> Result<NamedTempFile> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TubescriptError::Credential(format!(
                "Cannot read cookie file {}: {}",
                path.display(),
                e
            ))
        })?;
        validate_netscape(&contents)?;
        self.write_temp(&contents)
    }
}

/// Decode a base64 cookies.txt bundle. Whitespace and line wrapping are ignored.
pub fn decode_bundle(bundle: &str) -> Result<String> {
    let compact: String = bundle.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    let contents = String::from_utf8(bytes).map_err(|_| {
        TubescriptError::Credential("Cookie bundle is not valid UTF-8 text".to_string())
    })?;
    validate_netscape(&contents)?;
    Ok(contents)
}

/// Check that `contents` looks like a Netscape cookies.txt.
pub fn validate_netscape(contents: &str) -> Result<()> {
    let has_cookie = contents.lines().any(|line| {
        let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
        !line.starts_with('#') && line.split('\t').count() == 7
    });

    if has_cookie {
        Ok(())
    } else {
        Err(TubescriptError::Credential(
            "Cookie data is not in Netscape cookies.txt format".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOKIES: &str = "# Netscape HTTP Cookie File\n\
        .youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabc123\n\
        #HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tdef456\n";

    fn encoded() -> String {
        base64::engine::general_purpose::STANDARD.encode(COOKIES)
    }

    fn resolver(
        dir: &Path,
        bundle: Option<String>,
        interactive: bool,
        browser: Option<&str>,
    ) -> CookieResolver {
        let mut settings = Settings::default();
        settings.general.temp_dir = Some(dir.to_string_lossy().into_owned());
        settings.cookies.browser = browser.map(str::to_string);
        let env = Environment {
            cookie_bundle: bundle,
            interactive,
            ..Environment::default()
        };
        CookieResolver::new(&settings, &env)
    }

    #[test]
    fn test_parse_cookie_source() {
        assert_eq!(
            "Firefox".parse::<CookieSource>().unwrap(),
            CookieSource::Browser("firefox".to_string())
        );
        assert_eq!(
            "chrome:Profile 1".parse::<CookieSource>().unwrap(),
            CookieSource::Browser("chrome:profile 1".to_string())
        );
        assert_eq!(
            "/tmp/cookies.txt".parse::<CookieSource>().unwrap(),
            CookieSource::File(PathBuf::from("/tmp/cookies.txt"))
        );
        assert!("  ".parse::<CookieSource>().is_err());
    }

    #[test]
    fn test_bundle_is_written_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), Some(encoded()), false, Some("firefox"));

        let resolved = resolver.resolve(None).unwrap();
        assert_eq!(resolved.origin(), CookieOrigin::Environment);

        let path = match resolved.credential() {
            Some(CookieCredential::File(path)) => path.clone(),
            other => panic!("expected file credential, got {:?}", other),
        };
        assert_eq!(std::fs::read_to_string(&path).unwrap(), COOKIES);

        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn test_wrapped_bundle_decodes() {
        let wrapped: String = encoded()
            .as_bytes()
            .chunks(20)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(decode_bundle(&wrapped).unwrap(), COOKIES);
    }

    #[test]
    fn test_bad_bundle_does_not_fall_back_to_browser() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), Some("%%%".to_string()), true, Some("chrome"));
        let err = resolver.resolve(None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Credential);

        let not_cookies = base64::engine::general_purpose::STANDARD.encode("hello");
        let resolver = resolver_with(dir.path(), not_cookies);
        assert!(matches!(
            resolver.resolve(None),
            Err(TubescriptError::Credential(_))
        ));
    }

    fn resolver_with(dir: &Path, bundle: String) -> CookieResolver {
        resolver(dir, Some(bundle), false, None)
    }

    #[test]
    fn test_browser_only_when_interactive() {
        let dir = tempfile::tempdir().unwrap();

        let headless = resolver(dir.path(), None, false, Some("firefox"));
        let resolved = headless.resolve(None).unwrap();
        assert!(resolved.credential().is_none());
        assert_eq!(resolved.origin(), CookieOrigin::None);

        let attended = resolver(dir.path(), None, true, Some("firefox"));
        let resolved = attended.resolve(None).unwrap();
        assert_eq!(
            resolved.credential(),
            Some(&CookieCredential::Browser("firefox".to_string()))
        );
    }

    #[test]
    fn test_override_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cookies.txt");
        std::fs::write(&source, COOKIES).unwrap();

        let resolver = resolver(dir.path(), Some(encoded()), false, None);
        let resolved = resolver
            .resolve(Some(&CookieSource::File(source.clone())))
            .unwrap();
        assert_eq!(resolved.origin(), CookieOrigin::Override);

        let copy = match resolved.credential() {
            Some(CookieCredential::File(path)) => path.clone(),
            other => panic!("expected file credential, got {:?}", other),
        };
        assert_ne!(copy, source);

        drop(resolved);
        assert!(!copy.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_credential_display_hides_location() {
        let credential = CookieCredential::File(PathBuf::from("/secret/dir/cookies.txt"));
        assert_eq!(credential.to_string(), "cookie file cookies.txt");
        assert!(!format!("{:?}", credential).contains("/secret"));
        assert_eq!(
            credential.to_args(),
            vec!["--cookies".to_string(), "/secret/dir/cookies.txt".to_string()]
        );
    }

    #[test]
    fn test_check_reports_unreachable_video() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), None, false, None);
        let fallback = crate::config::FallbackSettings {
            yt_dlp_path: "/nonexistent/yt-dlp".to_string(),
            ..Default::default()
        };
        let fetcher = FallbackFetcher::new(&fallback, dir.path());
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();

        let health = tokio_test::block_on(resolver.check(&fetcher, &id, None)).unwrap();
        assert!(!health.accessible);
        assert_eq!(health.origin, CookieOrigin::None);
        assert!(health.credential.is_none());
        assert!(health.error.unwrap().contains("/nonexistent/yt-dlp"));
    }
}
