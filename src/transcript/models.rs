//! Data models for transcripts.

use crate::error::{Result, TubescriptError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// Request Types
// ============================================================================

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:
                # Full YouTube URLs
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            # Bare video ID (11 characters)
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("video id regex is valid")
    })
}

impl VideoId {
    /// Parse a bare video ID or any common YouTube URL form.
    pub fn parse(input: &str) -> Result<Self> {
        let caps = video_id_regex()
            .captures(input.trim())
            .ok_or_else(|| TubescriptError::InvalidVideoId(input.to_string()))?;

        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| TubescriptError::InvalidVideoId(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Watch page URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = TubescriptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Ordered language codes, most preferred first. Duplicates keep their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LanguagePreference(Vec<String>);

impl LanguagePreference {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if !code.is_empty() && !seen.iter().any(|c| c == code) {
                seen.push(code.to_string());
            }
        }
        Self(seen)
    }

    /// Parse a comma-separated list such as `pt,en`.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl From<Vec<String>> for LanguagePreference {
    fn from(codes: Vec<String>) -> Self {
        Self::new(codes)
    }
}

impl From<LanguagePreference> for Vec<String> {
    fn from(pref: LanguagePreference) -> Self {
        pref.0
    }
}

/// Acquisition strategy that produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Official transcript protocol.
    Primary,
    /// Subtitle extraction through yt-dlp.
    Fallback,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::Fallback => write!(f, "fallback"),
        }
    }
}

// ============================================================================
// Track Metadata
// ============================================================================

/// A language a track can be machine-translated into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationLanguage {
    pub language_code: String,
    pub language: String,
}

/// One caption track offered for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTrack {
    /// Language code, e.g. `en` or `pt-BR`.
    pub language_code: String,
    /// Human-readable language name.
    pub language: String,
    /// Machine-generated (ASR) rather than human-authored.
    pub is_generated: bool,
    pub is_translatable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translation_languages: Vec<TranslationLanguage>,
}

impl TranscriptTrack {
    /// Translation target matching `language_code`, if the track supports it.
    pub fn translation_to(&self, language_code: &str) -> Option<&TranslationLanguage> {
        if !self.is_translatable {
            return None;
        }
        self.translation_languages
            .iter()
            .find(|t| t.language_code == language_code)
    }
}

// ============================================================================
// Core Transcript Types
// ============================================================================

/// One timed unit of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds. Zero for cue markers.
    pub duration: f64,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// The canonical transcript produced by either tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTranscript {
    pub video_id: String,
    /// Language actually delivered (the target language when translated).
    pub language_code: String,
    pub is_generated: bool,
    /// Source language when the track was machine-translated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_from: Option<String>,
    pub segments: Vec<Segment>,
}

impl NormalizedTranscript {
    /// Build a transcript, ordering segments by start time.
    ///
    /// Fails with `EmptyTranscript` when there are no segments. Overlapping
    /// segments are kept as they are; the sort is stable so equal start times
    /// retain their source order.
    pub fn new(
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        is_generated: bool,
        mut segments: Vec<Segment>,
    ) -> Result<Self> {
        let video_id = video_id.into();
        if segments.is_empty() {
            return Err(TubescriptError::EmptyTranscript(video_id));
        }

        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        Ok(Self {
            video_id,
            language_code: language_code.into(),
            is_generated,
            translated_from: None,
            segments,
        })
    }

    /// Mark this transcript as a translation of `source_language`.
    pub fn translated_from(mut self, source_language: impl Into<String>) -> Self {
        self.translated_from = Some(source_language.into());
        self
    }

    pub fn is_translated(&self) -> bool {
        self.translated_from.is_some()
    }

    /// End of the last cue in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.segments
            .iter()
            .map(Segment::end)
            .fold(0.0f64, f64::max)
    }

    /// Copy of this transcript with every segment's text normalized.
    pub fn with_formatting(&self, preserve_formatting: bool) -> Self {
        let mut copy = self.clone();
        if !preserve_formatting {
            for segment in &mut copy.segments {
                segment.text = normalize_text(&segment.text, false);
            }
        }
        copy
    }
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("markup regex is valid"))
}

/// Normalize segment text.
///
/// With `preserve_formatting` the text is returned verbatim. Otherwise markup
/// tags are removed and all whitespace, including line breaks, collapses to
/// single spaces.
pub fn normalize_text(text: &str, preserve_formatting: bool) -> String {
    if preserve_formatting {
        return text.to_string();
    }

    let stripped = markup_regex().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
