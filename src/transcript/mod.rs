//! Transcript model, json3 parsing and output encoders.
//!
//! Every acquisition tier produces a [`NormalizedTranscript`]; everything
//! downstream (CLI output, HTTP responses, file export) works from that type.

mod format;
mod json3;
mod models;

pub use format::{
    decode_srt, decode_vtt, encode, encode_plain, encode_srt, encode_vtt, export, format_timestamp,
    parse_timestamp, segments, EncodeOptions, OutputFormat, TranscriptExport,
};
pub use json3::parse_json3;
pub use models::{
    normalize_text, LanguagePreference, NormalizedTranscript, Segment, Tier, TranscriptTrack,
    TranslationLanguage, VideoId,
};

use crate::error::{Result, TubescriptError};

/// Decode a segment list previously written with [`OutputFormat::Segments`].
pub fn decode_segments(input: &str) -> Result<Vec<Segment>> {
    serde_json::from_str(input)
        .map_err(|e| TubescriptError::Parse(format!("Invalid segment list: {}", e)))
}
