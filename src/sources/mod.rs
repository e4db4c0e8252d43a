//! Transcript sources for tubescript.
//!
//! Provides a trait-based interface over the two acquisition tiers: the
//! official transcript protocol and the yt-dlp subtitle fallback.

mod fallback;
mod primary;

pub use fallback::{classify_stderr, validate_settings, FallbackFetcher, YtDlpRequest};
pub use primary::{assert_playability, parse_caption_list, CaptionTrack, PrimaryFetcher};

use crate::catalog::TrackCatalog;
use crate::cookies::CookieCredential;
use crate::error::Result;
use crate::transcript::{LanguagePreference, NormalizedTranscript, Tier, VideoId};
use async_trait::async_trait;

/// Everything a tier needs for one transcript fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub video_id: &'a VideoId,
    pub languages: &'a LanguagePreference,
    /// Attached by tiers that support authenticated access.
    pub credential: Option<&'a CookieCredential>,
    pub allow_translation: bool,
}

impl<'a> FetchRequest<'a> {
    pub fn new(video_id: &'a VideoId, languages: &'a LanguagePreference) -> Self {
        Self {
            video_id,
            languages,
            credential: None,
            allow_translation: true,
        }
    }

    pub fn with_credential(mut self, credential: Option<&'a CookieCredential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn allow_translation(mut self, allow: bool) -> Self {
        self.allow_translation = allow;
        self
    }
}

/// One acquisition tier.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Which tier this source implements.
    fn tier(&self) -> Tier;

    /// Enumerate the tracks the video currently offers.
    async fn list_tracks(
        &self,
        video_id: &VideoId,
        credential: Option<&CookieCredential>,
    ) -> Result<TrackCatalog>;

    /// Select a track for the request's languages and download it.
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<NormalizedTranscript>;
}
