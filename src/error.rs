//! Error types for tubescript.

use crate::transcript::Tier;
use serde::Serialize;
use thiserror::Error;

/// Library-level error type for transcript acquisition.
#[derive(Error, Debug)]
pub enum TubescriptError {
    #[error("Transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("Video {0} is unavailable (removed, private or never existed)")]
    VideoUnavailable(String),

    #[error(
        "No transcript found for video {video_id} in [{}]; available languages: [{}]",
        .requested.join(", "),
        .available.join(", ")
    )]
    NoTranscriptFound {
        video_id: String,
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("Request for video {0} was blocked by YouTube (flagged IP or bot check)")]
    RequestBlocked(String),

    #[error("Video {0} requires a proof-of-origin token")]
    PoTokenRequired(String),

    #[error("Video {0} is age-restricted")]
    AgeRestricted(String),

    #[error("Video {video_id} is unplayable: {reason}")]
    VideoUnplayable { video_id: String, reason: String },

    #[error("Subtitle request for video {video_id} is misconfigured: {reason}")]
    FormatUnavailable { video_id: String, reason: String },

    #[error("Both tiers failed for video {video_id}\n  primary: {primary}\n  fallback: {fallback}")]
    CombinedAcquisitionFailure {
        video_id: String,
        primary: Box<TubescriptError>,
        fallback: Box<TubescriptError>,
    },

    #[error("Invalid YouTube video ID or URL: {0}")]
    InvalidVideoId(String),

    #[error("Transcript for video {0} has no segments")]
    EmptyTranscript(String),

    #[error("The {tier} tier timed out after {seconds}s")]
    Timeout { tier: Tier, seconds: f64 },

    #[error("Could not parse YouTube response: {0}")]
    Parse(String),

    #[error("Cookie credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failure class reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TranscriptsDisabled,
    VideoUnavailable,
    NoTranscriptFound,
    RequestBlocked,
    AgeRestricted,
    VideoUnplayable,
    FormatUnavailable,
    CombinedAcquisitionFailure,
    InvalidVideoId,
    EmptyTranscript,
    Timeout,
    Credential,
    Config,
    Tool,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TranscriptsDisabled => "transcripts_disabled",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::NoTranscriptFound => "no_transcript_found",
            ErrorKind::RequestBlocked => "request_blocked",
            ErrorKind::AgeRestricted => "age_restricted",
            ErrorKind::VideoUnplayable => "video_unplayable",
            ErrorKind::FormatUnavailable => "format_unavailable",
            ErrorKind::CombinedAcquisitionFailure => "combined_acquisition_failure",
            ErrorKind::InvalidVideoId => "invalid_video_id",
            ErrorKind::EmptyTranscript => "empty_transcript",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Credential => "credential",
            ErrorKind::Config => "config",
            ErrorKind::Tool => "tool",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TubescriptError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TranscriptsDisabled(_) => ErrorKind::TranscriptsDisabled,
            Self::VideoUnavailable(_) => ErrorKind::VideoUnavailable,
            Self::NoTranscriptFound { .. } => ErrorKind::NoTranscriptFound,
            Self::RequestBlocked(_) | Self::PoTokenRequired(_) => ErrorKind::RequestBlocked,
            Self::AgeRestricted(_) => ErrorKind::AgeRestricted,
            Self::VideoUnplayable { .. } => ErrorKind::VideoUnplayable,
            Self::FormatUnavailable { .. } => ErrorKind::FormatUnavailable,
            Self::CombinedAcquisitionFailure { .. } => ErrorKind::CombinedAcquisitionFailure,
            Self::InvalidVideoId(_) => ErrorKind::InvalidVideoId,
            Self::EmptyTranscript(_) => ErrorKind::EmptyTranscript,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Credential(_) | Self::Base64(_) => ErrorKind::Credential,
            Self::Config(_) | Self::TomlParse(_) => ErrorKind::Config,
            Self::ToolNotFound(_) | Self::ToolFailed(_) => ErrorKind::Tool,
            Self::Parse(_)
            | Self::InvalidInput(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Http(_) => ErrorKind::Internal,
        }
    }

    /// Languages that were available when no track matched the preference.
    pub fn available_languages(&self) -> Option<&[String]> {
        match self {
            Self::NoTranscriptFound { available, .. } => Some(available),
            Self::CombinedAcquisitionFailure {
                primary, fallback, ..
            } => fallback
                .available_languages()
                .or_else(|| primary.available_languages()),
            _ => None,
        }
    }

    /// Operator-facing suggestion for how to resolve this failure.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NoTranscriptFound { available, .. } if !available.is_empty() => Some(format!(
                "Retry with one of the available languages: {}",
                available.join(", ")
            )),
            Self::NoTranscriptFound { .. } => {
                Some("The video has no captions in any language".to_string())
            }
            Self::RequestBlocked(_) | Self::PoTokenRequired(_) => Some(
                "YouTube is rejecting requests from this network; configure a cookie bundle \
                 or run from a different IP"
                    .to_string(),
            ),
            Self::AgeRestricted(_) => {
                Some("Age-restricted videos need cookies from a signed-in account".to_string())
            }
            Self::VideoUnplayable { .. } => Some(
                "Members-only or login-gated content needs a valid cookie bundle \
                 (set YOUTUBE_COOKIES or pass --cookies)"
                    .to_string(),
            ),
            Self::TranscriptsDisabled(_) => {
                Some("The uploader has disabled captions for this video".to_string())
            }
            Self::VideoUnavailable(_) => {
                Some("Check the video ID; the video may be deleted or private".to_string())
            }
            Self::FormatUnavailable { .. } => Some(
                "Remove media format options from the fallback configuration; \
                 subtitle extraction never selects a media format"
                    .to_string(),
            ),
            Self::Credential(_) | Self::Base64(_) => Some(
                "Re-export cookies.txt from the browser and store it base64-encoded".to_string(),
            ),
            Self::ToolNotFound(_) => Some("Install yt-dlp: pip install -U yt-dlp".to_string()),
            Self::CombinedAcquisitionFailure { fallback, .. } => fallback.hint(),
            Self::Timeout { .. } => Some("Increase the tier timeout or retry later".to_string()),
            _ => None,
        }
    }
}

/// Result type alias for tubescript operations.
pub type Result<T> = std::result::Result<T, TubescriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_transcript_found_lists_available() {
        let err = TubescriptError::NoTranscriptFound {
            video_id: "abc".to_string(),
            requested: vec!["de".to_string()],
            available: vec!["en".to_string(), "pt".to_string()],
        };

        let message = err.to_string();
        assert!(message.contains("[de]"));
        assert!(message.contains("[en, pt]"));
        assert_eq!(err.kind(), ErrorKind::NoTranscriptFound);
        assert_eq!(
            err.available_languages(),
            Some(&["en".to_string(), "pt".to_string()][..])
        );
    }

    #[test]
    fn test_combined_failure_cites_both_tiers() {
        let err = TubescriptError::CombinedAcquisitionFailure {
            video_id: "abc".to_string(),
            primary: Box::new(TubescriptError::RequestBlocked("abc".to_string())),
            fallback: Box::new(TubescriptError::VideoUnplayable {
                video_id: "abc".to_string(),
                reason: "members-only".to_string(),
            }),
        };

        let message = err.to_string();
        assert!(message.contains("primary: Request for video abc was blocked"));
        assert!(message.contains("fallback: Video abc is unplayable: members-only"));
        assert!(err.hint().unwrap().contains("cookie"));
    }

    #[test]
    fn test_po_token_is_a_blocked_request() {
        let err = TubescriptError::PoTokenRequired("abc".to_string());
        assert_eq!(err.kind(), ErrorKind::RequestBlocked);
    }

    #[test]
    fn test_kind_name_matches_serialized_form() {
        for kind in [
            ErrorKind::NoTranscriptFound,
            ErrorKind::CombinedAcquisitionFailure,
            ErrorKind::InvalidVideoId,
        ] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, kind.as_str());
        }
    }

    #[test]
    fn test_combined_failure_carries_available_languages() {
        let missing = || TubescriptError::NoTranscriptFound {
            video_id: "abc".to_string(),
            requested: vec!["ja".to_string()],
            available: vec!["en".to_string(), "pt".to_string()],
        };

        let err = TubescriptError::CombinedAcquisitionFailure {
            video_id: "abc".to_string(),
            primary: Box::new(missing()),
            fallback: Box::new(TubescriptError::ToolNotFound("yt-dlp".to_string())),
        };
        assert_eq!(
            err.available_languages(),
            Some(&["en".to_string(), "pt".to_string()][..])
        );

        let err = TubescriptError::CombinedAcquisitionFailure {
            video_id: "abc".to_string(),
            primary: Box::new(TubescriptError::RequestBlocked("abc".to_string())),
            fallback: Box::new(TubescriptError::NoTranscriptFound {
                video_id: "abc".to_string(),
                requested: vec!["ja".to_string()],
                available: vec!["de".to_string()],
            }),
        };
        assert_eq!(err.available_languages(), Some(&["de".to_string()][..]));
    }
}
