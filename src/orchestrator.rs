//! Two-tier acquisition orchestrator.
//!
//! Runs the primary tier first. Any primary failure, including a timeout,
//! triggers exactly one fallback attempt with a freshly resolved cookie
//! credential. Tiers never run concurrently. When both fail the caller gets
//! a single error carrying both causes.

use crate::catalog::TrackCatalog;
use crate::config::{Environment, Settings};
use crate::cookies::{CookieResolver, CookieSource};
use crate::error::{Result, TubescriptError};
use crate::sources::{FallbackFetcher, FetchRequest, PrimaryFetcher, TranscriptSource};
use crate::transcript::{LanguagePreference, NormalizedTranscript, Tier, TranscriptTrack, VideoId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Which tiers a request may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TierMode {
    /// Primary, then fallback on failure.
    #[default]
    Auto,
    PrimaryOnly,
    FallbackOnly,
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Keep markup and line breaks in segment text.
    pub preserve_formatting: bool,
    /// Cookie source overriding the configured ones.
    pub cookies: Option<CookieSource>,
    pub mode: TierMode,
    /// Overrides `general.allow_translation` when set.
    pub allow_translation: Option<bool>,
}

/// A successful acquisition.
#[derive(Debug)]
pub struct Acquisition {
    pub transcript: NormalizedTranscript,
    /// Tier that produced the transcript.
    pub tier: Tier,
    /// Why the primary tier failed, when the fallback produced the result.
    pub primary_error: Option<TubescriptError>,
}

impl Acquisition {
    pub fn is_translated(&self) -> bool {
        self.transcript.is_translated()
    }
}

/// Tracks listed by one tier.
#[derive(Debug)]
pub struct TrackListing {
    pub video_id: String,
    pub tier: Tier,
    pub tracks: Vec<TranscriptTrack>,
    pub primary_error: Option<TubescriptError>,
}

/// Coordinates the primary and fallback tiers.
pub struct Orchestrator {
    settings: Settings,
    primary: Arc<dyn TranscriptSource>,
    fallback: Arc<dyn TranscriptSource>,
    cookies: CookieResolver,
    primary_timeout: Duration,
    fallback_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with the real tiers.
    pub fn new(settings: Settings, env: &Environment) -> Result<Self> {
        let primary: Arc<dyn TranscriptSource> = Arc::new(PrimaryFetcher::new(&settings.primary)?);
        let fallback: Arc<dyn TranscriptSource> = Arc::new(FallbackFetcher::new(
            &settings.fallback,
            settings.temp_dir(),
        ));
        let cookies = CookieResolver::new(&settings, env);

        Ok(Self::with_sources(settings, primary, fallback, cookies))
    }

    /// Create an orchestrator with custom tiers.
    pub fn with_sources(
        settings: Settings,
        primary: Arc<dyn TranscriptSource>,
        fallback: Arc<dyn TranscriptSource>,
        cookies: CookieResolver,
    ) -> Self {
        let primary_timeout = Duration::from_secs(settings.primary.timeout_seconds);
        let fallback_timeout = Duration::from_secs(settings.fallback.timeout_seconds);

        Self {
            settings,
            primary,
            fallback,
            cookies,
            primary_timeout,
            fallback_timeout,
        }
    }

    /// Override the per-tier timeouts.
    pub fn with_timeouts(mut self, primary: Duration, fallback: Duration) -> Self {
        self.primary_timeout = primary;
        self.fallback_timeout = fallback;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cookies(&self) -> &CookieResolver {
        &self.cookies
    }

    fn effective_languages(&self, languages: &LanguagePreference) -> LanguagePreference {
        if languages.is_empty() {
            self.settings.languages()
        } else {
            languages.clone()
        }
    }

    /// Fetch one transcript.
    ///
    /// An empty `languages` uses the configured default preference.
    #[instrument(skip(self, languages, options), fields(video_id = %video_id))]
    pub async fn fetch(
        &self,
        video_id: &VideoId,
        languages: &LanguagePreference,
        options: &FetchOptions,
    ) -> Result<Acquisition> {
        let languages = self.effective_languages(languages);
        let allow_translation = options
            .allow_translation
            .unwrap_or(self.settings.general.allow_translation);

        let run_primary = || self.fetch_primary(video_id, &languages, allow_translation);
        let run_fallback =
            || self.fetch_fallback(video_id, &languages, allow_translation, options.cookies.as_ref());

        let (transcript, tier, primary_error) = match options.mode {
            TierMode::PrimaryOnly => (run_primary().await?, Tier::Primary, None),
            TierMode::FallbackOnly => (run_fallback().await?, Tier::Fallback, None),
            TierMode::Auto => match run_primary().await {
                Ok(transcript) => (transcript, Tier::Primary, None),
                Err(primary_error) => {
                    warn!("Primary tier failed: {}", primary_error);
                    if !self.settings.fallback.enabled {
                        return Err(primary_error);
                    }

                    match run_fallback().await {
                        Ok(transcript) => (transcript, Tier::Fallback, Some(primary_error)),
                        Err(fallback_error) => {
                            warn!("Fallback tier failed: {}", fallback_error);
                            return Err(TubescriptError::CombinedAcquisitionFailure {
                                video_id: video_id.to_string(),
                                primary: Box::new(primary_error),
                                fallback: Box::new(fallback_error),
                            });
                        }
                    }
                }
            },
        };

        info!(
            "Acquired '{}' transcript via {} tier ({} segments)",
            transcript.language_code,
            tier,
            transcript.segments.len()
        );

        Ok(Acquisition {
            transcript: transcript.with_formatting(options.preserve_formatting),
            tier,
            primary_error,
        })
    }

    /// List the tracks a video offers, using the same tier policy as `fetch`.
    #[instrument(skip(self, options), fields(video_id = %video_id))]
    pub async fn list_tracks(
        &self,
        video_id: &VideoId,
        options: &FetchOptions,
    ) -> Result<TrackListing> {
        let run_primary = || self.list_primary(video_id);
        let run_fallback = || self.list_fallback(video_id, options.cookies.as_ref());

        let (catalog, tier, primary_error): (TrackCatalog, Tier, Option<TubescriptError>) =
            match options.mode {
                TierMode::PrimaryOnly => (run_primary().await?, Tier::Primary, None),
                TierMode::FallbackOnly => (run_fallback().await?, Tier::Fallback, None),
                TierMode::Auto => match run_primary().await {
                    Ok(catalog) => (catalog, Tier::Primary, None),
                    Err(primary_error) if !self.settings.fallback.enabled => {
                        return Err(primary_error)
                    }
                    Err(primary_error) => match run_fallback().await {
                        Ok(catalog) => (catalog, Tier::Fallback, Some(primary_error)),
                        Err(fallback_error) => {
                            return Err(TubescriptError::CombinedAcquisitionFailure {
                                video_id: video_id.to_string(),
                                primary: Box::new(primary_error),
                                fallback: Box::new(fallback_error),
                            })
                        }
                    },
                },
            };

        Ok(TrackListing {
            video_id: video_id.to_string(),
            tier,
            tracks: catalog.into_tracks(),
            primary_error,
        })
    }

    async fn fetch_primary(
        &self,
        video_id: &VideoId,
        languages: &LanguagePreference,
        allow_translation: bool,
    ) -> Result<NormalizedTranscript> {
        let request = FetchRequest::new(video_id, languages).allow_translation(allow_translation);
        with_timeout(Tier::Primary, self.primary_timeout, self.primary.fetch(&request)).await
    }

    async fn fetch_fallback(
        &self,
        video_id: &VideoId,
        languages: &LanguagePreference,
        allow_translation: bool,
        cookie_override: Option<&CookieSource>,
    ) -> Result<NormalizedTranscript> {
        // Lives until the attempt ends; dropping it removes any temporary cookie file.
        let cookies = self.cookies.resolve(cookie_override)?;
        if let Some(credential) = cookies.credential() {
            info!("Fallback using {} ({})", credential, cookies.origin());
        }

        let request = FetchRequest::new(video_id, languages)
            .with_credential(cookies.credential())
            .allow_translation(allow_translation);
        with_timeout(Tier::Fallback, self.fallback_timeout, self.fallback.fetch(&request)).await
    }

    async fn list_primary(&self, video_id: &VideoId) -> Result<TrackCatalog> {
        with_timeout(
            Tier::Primary,
            self.primary_timeout,
            self.primary.list_tracks(video_id, None),
        )
        .await
    }

    async fn list_fallback(
        &self,
        video_id: &VideoId,
        cookie_override: Option<&CookieSource>,
    ) -> Result<TrackCatalog> {
        let cookies = self.cookies.resolve(cookie_override)?;
        with_timeout(
            Tier::Fallback,
            self.fallback_timeout,
            self.fallback.list_tracks(video_id, cookies.credential()),
        )
        .await
    }
}

/// Bound one tier attempt. Dropping the attempt cancels it.
async fn with_timeout<T>(
    tier: Tier,
    limit: Duration,
    attempt: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, attempt)
        .await
        .map_err(|_| TubescriptError::Timeout {
            tier,
            seconds: limit.as_secs_f64(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieCredential;
    use crate::transcript::Segment;
    use async_trait::async_trait;
    use base64::Engine;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Outcome = Box<dyn Fn(&VideoId) -> Result<NormalizedTranscript> + Send + Sync>;

    struct StubSource {
        tier: Tier,
        outcome: Outcome,
        calls: AtomicUsize,
        delay: Option<Duration>,
        seen_cookie_file: Mutex<Option<(PathBuf, bool)>>,
    }

    impl StubSource {
        fn new(tier: Tier, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                tier,
                outcome,
                calls: AtomicUsize::new(0),
                delay: None,
                seen_cookie_file: Mutex::new(None),
            })
        }

        fn slow(tier: Tier, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                tier,
                outcome: ok_transcript(),
                calls: AtomicUsize::new(0),
                delay: Some(delay),
                seen_cookie_file: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptSource for StubSource {
        fn tier(&self) -> Tier {
            self.tier
        }

        async fn list_tracks(
            &self,
            video_id: &VideoId,
            _credential: Option<&CookieCredential>,
        ) -> Result<TrackCatalog> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(video_id)?;
            TrackCatalog::new(
                video_id.as_str(),
                vec![TranscriptTrack {
                    language_code: "en".to_string(),
                    language: "English".to_string(),
                    is_generated: false,
                    is_translatable: false,
                    translation_languages: Vec::new(),
                }],
            )
        }

        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<NormalizedTranscript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(CookieCredential::File(path)) = request.credential {
                *self.seen_cookie_file.lock().unwrap() = Some((path.clone(), path.exists()));
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.outcome)(request.video_id)
        }
    }

    fn ok_transcript() -> Outcome {
        Box::new(|id: &VideoId| {
            NormalizedTranscript::new(
                id.as_str(),
                "en",
                false,
                vec![Segment::new("hello\nthere", 0.0, 1.5)],
            )
        })
    }

    fn failing(make: fn(&VideoId) -> TubescriptError) -> Outcome {
        Box::new(move |id: &VideoId| Err(make(id)))
    }

    fn resolver(settings: &Settings, bundle: Option<String>) -> CookieResolver {
        let env = Environment {
            cookie_bundle: bundle,
            ..Environment::default()
        };
        CookieResolver::new(settings, &env)
    }

    fn orchestrator(primary: Arc<StubSource>, fallback: Arc<StubSource>) -> Orchestrator {
        let settings = Settings::default();
        let cookies = resolver(&settings, None);
        Orchestrator::with_sources(settings, primary, fallback, cookies)
    }

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = StubSource::new(Tier::Primary, ok_transcript());
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator = orchestrator(primary.clone(), fallback.clone());

        let acquisition = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(acquisition.tier, Tier::Primary);
        assert!(acquisition.primary_error.is_none());
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_blocked_primary_recovers_via_fallback() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::RequestBlocked(id.to_string())),
        );
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator = orchestrator(primary.clone(), fallback.clone());

        let acquisition = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(acquisition.tier, Tier::Fallback);
        assert!(matches!(
            acquisition.primary_error,
            Some(TubescriptError::RequestBlocked(_))
        ));
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_tiers_fail_with_combined_error() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::VideoUnplayable {
                video_id: id.to_string(),
                reason: "members-only".to_string(),
            }),
        );
        let fallback = StubSource::new(
            Tier::Fallback,
            failing(|id| TubescriptError::VideoUnplayable {
                video_id: id.to_string(),
                reason: "Join this channel".to_string(),
            }),
        );
        let orchestrator = orchestrator(primary.clone(), fallback.clone());

        let err = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap_err();

        match err {
            TubescriptError::CombinedAcquisitionFailure { primary, fallback, .. } => {
                assert!(matches!(*primary, TubescriptError::VideoUnplayable { .. }));
                assert!(matches!(*fallback, TubescriptError::VideoUnplayable { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_permanent_primary_failure_still_tries_fallback_once() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::TranscriptsDisabled(id.to_string())),
        );
        let fallback = StubSource::new(
            Tier::Fallback,
            failing(|id| TubescriptError::TranscriptsDisabled(id.to_string())),
        );
        let orchestrator = orchestrator(primary, fallback.clone());

        let result = orchestrator
            .fetch(&video(), &LanguagePreference::default(), &FetchOptions::default())
            .await;

        assert!(result.is_err());
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_timeout_is_fallback_eligible() {
        let primary = StubSource::slow(Tier::Primary, Duration::from_secs(5));
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator = orchestrator(primary, fallback.clone())
            .with_timeouts(Duration::from_millis(20), Duration::from_secs(5));

        let acquisition = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(acquisition.tier, Tier::Fallback);
        assert!(matches!(
            acquisition.primary_error,
            Some(TubescriptError::Timeout { tier: Tier::Primary, .. })
        ));
    }

    #[tokio::test]
    async fn test_fallback_timeout_is_terminal() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::RequestBlocked(id.to_string())),
        );
        let fallback = StubSource::slow(Tier::Fallback, Duration::from_secs(5));
        let orchestrator = orchestrator(primary, fallback)
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(20));

        let err = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap_err();

        match err {
            TubescriptError::CombinedAcquisitionFailure { fallback, .. } => {
                assert!(matches!(
                    *fallback,
                    TubescriptError::Timeout { tier: Tier::Fallback, .. }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_fallback_returns_primary_error() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::RequestBlocked(id.to_string())),
        );
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());

        let mut settings = Settings::default();
        settings.fallback.enabled = false;
        let cookies = resolver(&settings, None);
        let orchestrator =
            Orchestrator::with_sources(settings, primary, fallback.clone(), cookies);

        let err = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TubescriptError::RequestBlocked(_)));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_cookie_file_scoped_to_fallback_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = Some(dir.path().to_string_lossy().into_owned());

        let bundle = base64::engine::general_purpose::STANDARD
            .encode(".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tx\n");
        let cookies = resolver(&settings, Some(bundle));

        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::RequestBlocked(id.to_string())),
        );
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator =
            Orchestrator::with_sources(settings, primary, fallback.clone(), cookies);

        orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap();

        let (path, existed) = fallback.seen_cookie_file.lock().unwrap().clone().unwrap();
        assert!(existed);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_preserve_formatting_option() {
        let options = FetchOptions {
            preserve_formatting: true,
            ..FetchOptions::default()
        };
        let orchestrator = orchestrator(
            StubSource::new(Tier::Primary, ok_transcript()),
            StubSource::new(Tier::Fallback, ok_transcript()),
        );

        let kept = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &options)
            .await
            .unwrap();
        assert_eq!(kept.transcript.segments[0].text, "hello\nthere");

        let collapsed = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(collapsed.transcript.segments[0].text, "hello there");
    }

    #[tokio::test]
    async fn test_list_tracks_falls_back() {
        let primary = StubSource::new(
            Tier::Primary,
            failing(|id| TubescriptError::RequestBlocked(id.to_string())),
        );
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator = orchestrator(primary, fallback.clone());

        let listing = orchestrator
            .list_tracks(&video(), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(listing.tier, Tier::Fallback);
        assert_eq!(listing.tracks.len(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_only_mode() {
        let primary = StubSource::new(Tier::Primary, ok_transcript());
        let fallback = StubSource::new(Tier::Fallback, ok_transcript());
        let orchestrator = orchestrator(primary.clone(), fallback.clone());

        let options = FetchOptions {
            mode: TierMode::FallbackOnly,
            ..FetchOptions::default()
        };
        let acquisition = orchestrator
            .fetch(&video(), &LanguagePreference::new(["en"]), &options)
            .await
            .unwrap();

        assert_eq!(acquisition.tier, Tier::Fallback);
        assert_eq!(primary.calls(), 0);
    }
}
