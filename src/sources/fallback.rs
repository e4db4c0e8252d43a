//! Subtitle fallback through yt-dlp.
//!
//! Uses the player's subtitle delivery path instead of the transcript
//! protocol, and can carry cookies for members-only or age-gated videos.
//! Every invocation is subtitle-only; requests that would select a media
//! format are rejected before the process is spawned.

use super::{FetchRequest, TranscriptSource};
use crate::catalog::TrackCatalog;
use crate::config::FallbackSettings;
use crate::cookies::CookieCredential;
use crate::error::{Result, TubescriptError};
use crate::transcript::{
    decode_srt, decode_vtt, parse_json3, LanguagePreference, NormalizedTranscript, Segment, Tier,
    TranscriptTrack, TranslationLanguage, VideoId,
};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// yt-dlp options that select or post-process media and so conflict with
/// subtitle-only extraction.
const MEDIA_FORMAT_ARGS: &[&str] = &[
    "-f",
    "--format",
    "-S",
    "--format-sort",
    "--merge-output-format",
    "--remux-video",
    "--recode-video",
    "-x",
    "--extract-audio",
    "--audio-format",
    "--audio-quality",
];

/// Short media options, matched inside clusters like `-fbest` or `-vx`.
const MEDIA_SHORT_FLAGS: &[char] = &['f', 'S', 'x'];

/// Short options whose value may be attached, ending the cluster.
const VALUE_SHORT_FLAGS: &[char] = &['o', 'P', 'a', 'r', 'u', 'p', 'N', 'R', 'I'];

/// Subtitle formats the fallback can parse.
const SUPPORTED_SUB_FORMATS: &[&str] = &["json3", "vtt", "srt"];

fn is_media_arg(arg: &str) -> bool {
    let name = arg.split('=').next().unwrap_or(arg);
    if MEDIA_FORMAT_ARGS.contains(&name) {
        return true;
    }

    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    for flag in cluster.chars() {
        if MEDIA_SHORT_FLAGS.contains(&flag) {
            return true;
        }
        if VALUE_SHORT_FLAGS.contains(&flag) {
            return false;
        }
    }
    false
}

#[derive(Debug, Clone)]
enum Action {
    DumpInfo,
    WriteSubtitles {
        language: String,
        automatic: bool,
        format: String,
        output_dir: PathBuf,
    },
    PrintTitle,
    Version,
}

/// One yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpRequest {
    video_id: Option<String>,
    action: Action,
    media_format: Option<String>,
    credential: Option<CookieCredential>,
    extra_args: Vec<String>,
}

impl YtDlpRequest {
    fn new(video_id: Option<&VideoId>, action: Action) -> Self {
        Self {
            video_id: video_id.map(|v| v.as_str().to_string()),
            action,
            media_format: None,
            credential: None,
            extra_args: Vec::new(),
        }
    }

    /// Fetch video metadata, including the subtitle maps.
    pub fn dump_info(video_id: &VideoId) -> Self {
        Self::new(Some(video_id), Action::DumpInfo)
    }

    /// Write one subtitle track into `output_dir`.
    pub fn write_subtitles(
        video_id: &VideoId,
        language: impl Into<String>,
        automatic: bool,
        format: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            Some(video_id),
            Action::WriteSubtitles {
                language: language.into(),
                automatic,
                format: format.into(),
                output_dir: output_dir.into(),
            },
        )
    }

    /// Print the video title; used to test access.
    pub fn print_title(video_id: &VideoId) -> Self {
        Self::new(Some(video_id), Action::PrintTitle)
    }

    pub fn version() -> Self {
        Self::new(None, Action::Version)
    }

    /// Request a media format. Always rejected by [`validate`](Self::validate).
    pub fn media_format(mut self, format: impl Into<String>) -> Self {
        self.media_format = Some(format.into());
        self
    }

    pub fn credential(mut self, credential: Option<&CookieCredential>) -> Self {
        self.credential = credential.cloned();
        self
    }

    pub fn extra_args(mut self, args: &[String]) -> Self {
        self.extra_args = args.to_vec();
        self
    }

    fn video_label(&self) -> String {
        self.video_id.clone().unwrap_or_default()
    }

    /// Reject media selection alongside subtitle-only extraction.
    pub fn validate(&self) -> Result<()> {
        if let Some(format) = &self.media_format {
            return Err(TubescriptError::FormatUnavailable {
                video_id: self.video_label(),
                reason: format!(
                    "media format '{}' requested in subtitle-only mode",
                    format
                ),
            });
        }

        let conflicting = self.extra_args.iter().find(|arg| is_media_arg(arg));
        if let Some(arg) = conflicting {
            return Err(TubescriptError::FormatUnavailable {
                video_id: self.video_label(),
                reason: format!("option '{}' selects media in subtitle-only mode", arg),
            });
        }

        if let Action::WriteSubtitles { format, .. } = &self.action {
            if !SUPPORTED_SUB_FORMATS.contains(&format.as_str()) {
                return Err(TubescriptError::FormatUnavailable {
                    video_id: self.video_label(),
                    reason: format!("unsupported subtitle format '{}'", format),
                });
            }
        }

        Ok(())
    }

    /// Command-line arguments for this request.
    pub fn args(&self) -> Vec<String> {
        if matches!(self.action, Action::Version) {
            return vec!["--version".to_string()];
        }

        let mut args: Vec<String> = ["--no-warnings", "--no-playlist", "--skip-download"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(credential) = &self.credential {
            args.extend(credential.to_args());
        }
        args.extend(self.extra_args.iter().cloned());

        match &self.action {
            Action::DumpInfo => args.push("--dump-single-json".to_string()),
            Action::WriteSubtitles {
                language,
                automatic,
                format,
                output_dir,
            } => {
                let write = if *automatic { "--write-auto-subs" } else { "--write-subs" };
                args.push(write.to_string());
                args.extend([
                    "--sub-langs".to_string(),
                    language.clone(),
                    "--sub-format".to_string(),
                    format.clone(),
                    "-o".to_string(),
                    output_dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned(),
                ]);
            }
            Action::PrintTitle => {
                args.extend(["--print".to_string(), "title".to_string()]);
            }
            Action::Version => {}
        }

        if let Some(id) = &self.video_id {
            args.push("--".to_string());
            args.push(format!("https://www.youtube.com/watch?v={}", id));
        }

        args
    }
}

/// Check the configured subtitle format and extra arguments without running yt-dlp.
pub fn validate_settings(settings: &FallbackSettings) -> Result<()> {
    if !SUPPORTED_SUB_FORMATS.contains(&settings.subtitle_format.as_str()) {
        return Err(TubescriptError::FormatUnavailable {
            video_id: String::new(),
            reason: format!(
                "unsupported subtitle format '{}' (use {})",
                settings.subtitle_format,
                SUPPORTED_SUB_FORMATS.join(", ")
            ),
        });
    }

    YtDlpRequest::version()
        .extra_args(&settings.extra_args)
        .validate()
}

/// A fallback track with the key yt-dlp uses to download it.
#[derive(Debug, Clone)]
struct SubtitleTrack {
    track: TranscriptTrack,
    key: String,
}

/// yt-dlp subtitle extractor.
pub struct FallbackFetcher {
    settings: FallbackSettings,
    temp_dir: PathBuf,
}

impl FallbackFetcher {
    pub fn new(settings: &FallbackSettings, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings: settings.clone(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Validate and run one request, returning stdout.
    pub async fn run(&self, request: &YtDlpRequest) -> Result<String> {
        request.validate()?;

        let args = request.args();
        debug!("Running {} {}", self.settings.yt_dlp_path, args.join(" "));

        let output = Command::new(&self.settings.yt_dlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TubescriptError::ToolNotFound(self.settings.yt_dlp_path.clone())
                } else {
                    TubescriptError::ToolFailed(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&request.video_label(), &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Installed yt-dlp version.
    pub async fn tool_version(&self) -> Result<String> {
        let stdout = self.run(&YtDlpRequest::version()).await?;
        Ok(stdout.trim().to_string())
    }

    /// Title of the video, fetched with `credential` attached.
    pub async fn fetch_title(
        &self,
        video_id: &VideoId,
        credential: Option<&CookieCredential>,
    ) -> Result<String> {
        let request = YtDlpRequest::print_title(video_id)
            .credential(credential)
            .extra_args(&self.settings.extra_args);
        let stdout = self.run(&request).await?;
        Ok(stdout.trim().to_string())
    }

    async fn subtitle_tracks(
        &self,
        video_id: &VideoId,
        credential: Option<&CookieCredential>,
    ) -> Result<Vec<SubtitleTrack>> {
        let request = YtDlpRequest::dump_info(video_id)
            .credential(credential)
            .extra_args(&self.settings.extra_args);
        let stdout = self.run(&request).await?;

        let info: Value = serde_json::from_str(&stdout)
            .map_err(|e| TubescriptError::Parse(format!("Invalid yt-dlp metadata: {}", e)))?;
        Ok(parse_subtitle_maps(&info))
    }

    async fn download(
        &self,
        video_id: &VideoId,
        key: &str,
        automatic: bool,
        credential: Option<&CookieCredential>,
    ) -> Result<Option<Vec<Segment>>> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let output_dir = tempfile::Builder::new()
            .prefix("tubescript-subs-")
            .tempdir_in(&self.temp_dir)?;

        let format = self.settings.subtitle_format.as_str();
        let request =
            YtDlpRequest::write_subtitles(video_id, key, automatic, format, output_dir.path())
                .credential(credential)
                .extra_args(&self.settings.extra_args);
        self.run(&request).await?;

        let Some(path) = find_subtitle_file(output_dir.path(), format).await? else {
            return Ok(None);
        };
        let payload = tokio::fs::read_to_string(&path).await?;

        let segments = match format {
            "vtt" => decode_vtt(&payload)?,
            "srt" => decode_srt(&payload)?,
            _ => parse_json3(&payload)?,
        };
        Ok(Some(segments))
    }
}

#[async_trait]
impl TranscriptSource for FallbackFetcher {
    fn tier(&self) -> Tier {
        Tier::Fallback
    }

    #[instrument(skip(self, credential), fields(video_id = %video_id))]
    async fn list_tracks(
        &self,
        video_id: &VideoId,
        credential: Option<&CookieCredential>,
    ) -> Result<TrackCatalog> {
        let tracks = self.subtitle_tracks(video_id, credential).await?;
        TrackCatalog::new(
            video_id.as_str(),
            tracks.into_iter().map(|t| t.track).collect(),
        )
    }

    #[instrument(skip(self, request), fields(video_id = %request.video_id))]
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<NormalizedTranscript> {
        let video_id = request.video_id;
        let tracks = self.subtitle_tracks(video_id, request.credential).await?;
        if tracks.is_empty() {
            return Err(no_transcript(video_id, request.languages, Vec::new()));
        }

        let catalog = TrackCatalog::new(
            video_id.as_str(),
            tracks.iter().map(|t| t.track.clone()).collect(),
        )?;
        let selection = catalog.select_with(request.languages, request.allow_translation)?;
        let index = catalog
            .tracks()
            .iter()
            .position(|t| std::ptr::eq(t, selection.track))
            .unwrap_or_default();

        // yt-dlp exposes translations as separate automatic caption keys.
        let (key, automatic) = match selection.translation {
            Some(target) => (target.language_code.clone(), true),
            None => (tracks[index].key.clone(), selection.track.is_generated),
        };

        info!(
            "Downloading {} subtitles '{}' via yt-dlp",
            if automatic { "automatic" } else { "manual" },
            key
        );

        let segments = self
            .download(video_id, &key, automatic, request.credential)
            .await?
            .ok_or_else(|| no_transcript(video_id, request.languages, catalog.available_languages()))?;

        catalog.transcript(selection, request.languages, segments)
    }
}

fn no_transcript(
    video_id: &VideoId,
    languages: &LanguagePreference,
    available: Vec<String>,
) -> TubescriptError {
    TubescriptError::NoTranscriptFound {
        video_id: video_id.to_string(),
        requested: languages.to_vec(),
        available,
    }
}

async fn find_subtitle_file(dir: &Path, format: &str) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(format) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn track_name(formats: &Value, fallback: &str) -> String {
    formats
        .as_array()
        .and_then(|f| f.iter().find_map(|x| x.get("name").and_then(Value::as_str)))
        .unwrap_or(fallback)
        .to_string()
}

fn is_translation(formats: &Value) -> bool {
    formats.as_array().is_some_and(|f| {
        f.iter().any(|x| {
            x.get("url")
                .and_then(Value::as_str)
                .is_some_and(|u| u.contains("tlang="))
        })
    })
}

/// Build tracks from yt-dlp's `subtitles` and `automatic_captions` maps.
///
/// Manual subtitles become manual tracks. Automatic captions whose URL
/// carries a `tlang` parameter are machine translations and become
/// translation targets of the generated tracks.
fn parse_subtitle_maps(info: &Value) -> Vec<SubtitleTrack> {
    let mut tracks = Vec::new();

    if let Some(subtitles) = info.get("subtitles").and_then(Value::as_object) {
        for (key, formats) in subtitles {
            if key == "live_chat" {
                continue;
            }
            tracks.push(SubtitleTrack {
                track: TranscriptTrack {
                    language_code: key.clone(),
                    language: track_name(formats, key),
                    is_generated: false,
                    is_translatable: false,
                    translation_languages: Vec::new(),
                },
                key: key.clone(),
            });
        }
    }

    let mut generated = Vec::new();
    let mut targets = Vec::new();

    if let Some(automatic) = info.get("automatic_captions").and_then(Value::as_object) {
        for (key, formats) in automatic {
            if is_translation(formats) {
                targets.push(TranslationLanguage {
                    language_code: key.clone(),
                    language: track_name(formats, key),
                });
            } else {
                let code = key.strip_suffix("-orig").unwrap_or(key).to_string();
                generated.push(SubtitleTrack {
                    track: TranscriptTrack {
                        language: track_name(formats, &code),
                        language_code: code,
                        is_generated: true,
                        is_translatable: false,
                        translation_languages: Vec::new(),
                    },
                    key: key.clone(),
                });
            }
        }
    }

    for subtitle in &mut generated {
        let own = subtitle.track.language_code.clone();
        subtitle.track.translation_languages = targets
            .iter()
            .filter(|t| t.language_code != own)
            .cloned()
            .collect();
        subtitle.track.is_translatable = !subtitle.track.translation_languages.is_empty();
    }

    tracks.extend(generated);
    tracks
}

/// Map yt-dlp stderr onto the error taxonomy.
pub fn classify_stderr(video_id: &str, stderr: &str) -> TubescriptError {
    let lower = stderr.to_lowercase();
    let reason = error_line(stderr);
    let video_id = video_id.to_string();

    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["members-only", "members only", "join this channel", "available to members"]) {
        return TubescriptError::VideoUnplayable { video_id, reason };
    }
    if has(&["sign in to confirm your age", "age-restricted", "age restricted"]) {
        return TubescriptError::AgeRestricted(video_id);
    }
    if has(&["requested format is not available"]) {
        return TubescriptError::FormatUnavailable { video_id, reason };
    }
    if has(&["po token", "proof of origin"]) {
        return TubescriptError::PoTokenRequired(video_id);
    }
    if has(&["http error 429", "too many requests", "not a bot", "captcha"]) {
        return TubescriptError::RequestBlocked(video_id);
    }
    if has(&["private video", "video is private"]) {
        return TubescriptError::VideoUnavailable(video_id);
    }
    if has(&["granted access", "sign in"]) {
        return TubescriptError::VideoUnplayable { video_id, reason };
    }
    if has(&["video unavailable", "video is unavailable", "has been removed", "no longer available", "not a valid url"]) {
        return TubescriptError::VideoUnavailable(video_id);
    }

    TubescriptError::ToolFailed(reason)
}

/// The most specific `ERROR:` line, without yt-dlp's prefixes.
fn error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .trim();

    let line = line.strip_prefix("ERROR:").unwrap_or(line).trim();
    // Drop "[youtube] <id>: ".
    match line.strip_prefix('[').and_then(|rest| rest.split_once("]: ").or_else(|| rest.split_once("] "))) {
        Some((_, message)) => message
            .split_once(": ")
            .filter(|(id, _)| !id.contains(' '))
            .map(|(_, m)| m)
            .unwrap_or(message)
            .to_string(),
        None => line.to_string(),
    }
}
