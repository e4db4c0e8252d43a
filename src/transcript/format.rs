//! Transcript output formatting (plain text, segment list, SRT, WebVTT, JSON).
//!
//! Encoders are pure functions over a [`NormalizedTranscript`]. SRT and WebVTT
//! have matching decoders so exported files can be read back.

use super::models::{normalize_text, NormalizedTranscript, Segment};
use crate::error::{Result, TubescriptError};
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Segments,
    Srt,
    Vtt,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" | "txt" => Ok(OutputFormat::Plain),
            "segments" => Ok(OutputFormat::Segments),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::Vtt),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown format: {}. Use plain, segments, srt, vtt, or json.",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Segments => write!(f, "segments"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl OutputFormat {
    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Plain => "txt",
            OutputFormat::Segments | OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        }
    }
}

/// Options read once per encode call.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Keep markup and line breaks verbatim instead of collapsing them.
    pub preserve_formatting: bool,
    /// Joiner between segments in plain text.
    pub separator: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            preserve_formatting: false,
            separator: " ".to_string(),
        }
    }
}

impl EncodeOptions {
    pub fn preserving(preserve_formatting: bool) -> Self {
        Self {
            preserve_formatting,
            ..Self::default()
        }
    }
}

/// JSON-serializable transcript for export.
#[derive(Debug, Serialize)]
pub struct TranscriptExport<'a> {
    pub video_id: &'a str,
    pub language_code: &'a str,
    pub is_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_from: Option<&'a str>,
    pub duration_seconds: f64,
    pub full_text: String,
    pub segments: Vec<Segment>,
}

/// Encode a transcript in the requested format.
pub fn encode(
    transcript: &NormalizedTranscript,
    format: OutputFormat,
    options: &EncodeOptions,
) -> Result<String> {
    ensure_segments(transcript)?;

    let encoded = match format {
        OutputFormat::Plain => encode_plain(transcript, options),
        OutputFormat::Segments => serde_json::to_string_pretty(&segments(transcript, options))?,
        OutputFormat::Srt => encode_srt(transcript, options),
        OutputFormat::Vtt => encode_vtt(transcript, options),
        OutputFormat::Json => serde_json::to_string_pretty(&export(transcript, options))?,
    };

    Ok(encoded)
}

fn ensure_segments(transcript: &NormalizedTranscript) -> Result<()> {
    if transcript.segments.is_empty() {
        return Err(TubescriptError::EmptyTranscript(transcript.video_id.clone()));
    }
    Ok(())
}

/// The segment list with text normalized per `options`.
pub fn segments(transcript: &NormalizedTranscript, options: &EncodeOptions) -> Vec<Segment> {
    transcript
        .segments
        .iter()
        .map(|s| Segment {
            text: normalize_text(&s.text, options.preserve_formatting),
            start: s.start,
            duration: s.duration,
        })
        .collect()
}

/// Build the JSON export view of a transcript.
pub fn export<'a>(transcript: &'a NormalizedTranscript, options: &EncodeOptions) -> TranscriptExport<'a> {
    TranscriptExport {
        video_id: &transcript.video_id,
        language_code: &transcript.language_code,
        is_generated: transcript.is_generated,
        translated_from: transcript.translated_from.as_deref(),
        duration_seconds: transcript.duration_seconds(),
        full_text: encode_plain(transcript, options),
        segments: segments(transcript, options),
    }
}

/// Join all segment texts with the configured separator.
pub fn encode_plain(transcript: &NormalizedTranscript, options: &EncodeOptions) -> String {
    transcript
        .segments
        .iter()
        .map(|s| normalize_text(&s.text, options.preserve_formatting))
        .collect::<Vec<_>>()
        .join(&options.separator)
}

/// Format as SRT (SubRip).
pub fn encode_srt(transcript: &NormalizedTranscript, options: &EncodeOptions) -> String {
    let mut output = String::new();

    for (i, segment) in transcript.segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start, ','),
            format_timestamp(segment.end(), ',')
        ));

        let text = normalize_text(&segment.text, options.preserve_formatting);
        output.push_str(&cue_payload(&text));
        output.push_str("\n\n");
    }

    output
}

/// Format as WebVTT.
pub fn encode_vtt(transcript: &NormalizedTranscript, options: &EncodeOptions) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for segment in &transcript.segments {
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start, '.'),
            format_timestamp(segment.end(), '.')
        ));

        let text = normalize_text(&segment.text, options.preserve_formatting);
        let escaped = if options.preserve_formatting {
            text.replace("-->", "--&gt;")
        } else {
            escape_vtt(&text)
        };
        output.push_str(&cue_payload(&escaped));
        output.push_str("\n\n");
    }

    output
}

/// Drop blank lines so the payload cannot terminate its cue early.
fn cue_payload(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_vtt(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_vtt(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&lrm;", "\u{200e}")
        .replace("&rlm;", "\u{200f}")
        .replace("&amp;", "&")
}

/// Format seconds as `HH:MM:SS<sep>mmm`, rounded to the millisecond.
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, ms)
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let stamp = stamp.trim().replace(',', ".");
    let (clock, millis) = stamp.split_once('.').unwrap_or((stamp.as_str(), "0"));

    let parts: Vec<u64> = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (hours, minutes, secs) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };

    let ms: u64 = format!("{:0<3}", millis).get(..3)?.parse().ok()?;
    let total_ms = hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(secs)?
        .checked_mul(1000)?
        .checked_add(ms)?;
    Some(total_ms as f64 / 1000.0)
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // WebVTT allows cue settings after the end stamp.
    let end = rest.split_whitespace().next()?;
    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    Some((start, end))
}

fn millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Decode an SRT document into segments.
pub fn decode_srt(input: &str) -> Result<Vec<Segment>> {
    let normalized = input.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty()).peekable();

        // Sequence number is optional in lenient decoding.
        if lines
            .peek()
            .is_some_and(|l| l.trim().chars().all(|c| c.is_ascii_digit()))
        {
            lines.next();
        }

        let Some(timing) = lines.next() else { continue };
        let (start, end) = parse_timing_line(timing).ok_or_else(|| {
            TubescriptError::Parse(format!("Invalid SRT timing line: {}", timing))
        })?;

        let text = lines.collect::<Vec<_>>().join("\n");
        segments.push(Segment::new(text, start, millis(end - start)));
    }

    Ok(segments)
}

/// Decode a WebVTT document into segments.
pub fn decode_vtt(input: &str) -> Result<Vec<Segment>> {
    let normalized = input.replace("\r\n", "\n");
    let mut blocks = normalized.split("\n\n");

    let header = blocks.next().unwrap_or_default();
    if !header.trim_start_matches('\u{feff}').starts_with("WEBVTT") {
        return Err(TubescriptError::Parse("Missing WEBVTT header".to_string()));
    }

    let mut segments = Vec::new();

    for block in blocks {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(timing_index) = lines.iter().position(|l| l.contains("-->")) else {
            // NOTE, STYLE and REGION blocks carry no cue.
            continue;
        };
        if timing_index > 1 {
            continue;
        }

        let (start, end) = parse_timing_line(lines[timing_index]).ok_or_else(|| {
            TubescriptError::Parse(format!("Invalid WebVTT timing line: {}", lines[timing_index]))
        })?;

        let text = lines[timing_index + 1..]
            .iter()
            .map(|l| unescape_vtt(l))
            .collect::<Vec<_>>()
            .join("\n");
        segments.push(Segment::new(text, start, millis(end - start)));
    }

    Ok(segments)
}
