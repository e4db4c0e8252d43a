//! Official transcript protocol (InnerTube player API).
//!
//! Flow: fetch the watch page (accepting the consent interstitial when shown),
//! read the InnerTube API key, ask the player endpoint for caption metadata,
//! then download the selected track as json3.

use super::{FetchRequest, TranscriptSource};
use crate::catalog::TrackCatalog;
use crate::config::PrimarySettings;
use crate::cookies::CookieCredential;
use crate::error::{Result, TubescriptError};
use crate::transcript::{
    parse_json3, NormalizedTranscript, Segment, Tier, TranscriptTrack, TranslationLanguage,
    VideoId,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const CONSENT_FORM: &str = "action=\"https://consent.youtube.com/s\"";
const ANDROID_CLIENT_VERSION: &str = "20.10.38";

/// A caption track together with its download URL.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub track: TranscriptTrack,
    pub base_url: String,
}

/// Client for the official transcript protocol.
pub struct PrimaryFetcher {
    client: reqwest::Client,
    jar: Arc<Jar>,
    request_delay: Duration,
}

impl PrimaryFetcher {
    pub fn new(settings: &PrimarySettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&settings.accept_language)
                .map_err(|e| TubescriptError::Config(format!("Invalid accept_language: {}", e)))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|e| TubescriptError::Config(format!("Invalid user_agent: {}", e)))?,
        );

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            jar,
            request_delay: Duration::from_millis(settings.request_delay_ms),
        })
    }

    async fn delay(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    async fn fetch_watch_page(&self, video_id: &VideoId) -> Result<String> {
        let url = video_id.watch_url();
        let html = self.get_text(&url, video_id).await?;

        if !html.contains(CONSENT_FORM) {
            return Ok(html);
        }

        debug!("Accepting consent interstitial for {}", video_id);
        self.accept_consent(&html, video_id)?;
        self.delay().await;

        let html = self.get_text(&url, video_id).await?;
        if html.contains(CONSENT_FORM) {
            return Err(TubescriptError::Parse(format!(
                "Consent page for video {} could not be bypassed",
                video_id
            )));
        }
        Ok(html)
    }

    fn accept_consent(&self, html: &str, video_id: &VideoId) -> Result<()> {
        let value = consent_value(html).ok_or_else(|| {
            TubescriptError::Parse(format!("No consent token on watch page for {}", video_id))
        })?;

        let origin = Url::parse("https://www.youtube.com")
            .map_err(|e| TubescriptError::Parse(e.to_string()))?;
        self.jar.add_cookie_str(
            &format!("CONSENT=YES+{}; Domain=.youtube.com; Path=/", value),
            &origin,
        );
        Ok(())
    }

    async fn get_text(&self, url: &str, video_id: &VideoId) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, video_id)?;
        Ok(response.text().await?)
    }

    async fn fetch_player(&self, video_id: &VideoId, api_key: &str) -> Result<Value> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": ANDROID_CLIENT_VERSION
                }
            },
            "videoId": video_id.as_str()
        });

        self.delay().await;

        let response = self
            .client
            .post(PLAYER_URL)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let response = check_status(response, video_id)?;
        Ok(response.json().await?)
    }

    async fn caption_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>> {
        let html = self.fetch_watch_page(video_id).await?;
        let api_key = extract_api_key(&html, video_id)?;
        let player = self.fetch_player(video_id, &api_key).await?;
        parse_caption_list(video_id.as_str(), &player)
    }

    async fn fetch_segments(
        &self,
        video_id: &VideoId,
        base_url: &str,
        translate_to: Option<&str>,
    ) -> Result<Vec<Segment>> {
        let url = segments_url(base_url, translate_to)?;
        if url.contains("exp=xpe") {
            return Err(TubescriptError::PoTokenRequired(video_id.to_string()));
        }

        self.delay().await;
        let payload = self.get_text(&url, video_id).await?;
        parse_json3(&payload)
    }
}

#[async_trait]
impl TranscriptSource for PrimaryFetcher {
    fn tier(&self) -> Tier {
        Tier::Primary
    }

    #[instrument(skip(self, _credential), fields(video_id = %video_id))]
    async fn list_tracks(
        &self,
        video_id: &VideoId,
        _credential: Option<&CookieCredential>,
    ) -> Result<TrackCatalog> {
        let tracks = self.caption_tracks(video_id).await?;
        TrackCatalog::new(
            video_id.as_str(),
            tracks.into_iter().map(|c| c.track).collect(),
        )
    }

    #[instrument(skip(self, request), fields(video_id = %request.video_id))]
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<NormalizedTranscript> {
        let video_id = request.video_id;
        let captions = self.caption_tracks(video_id).await?;
        let catalog = TrackCatalog::new(
            video_id.as_str(),
            captions.iter().map(|c| c.track.clone()).collect(),
        )?;

        let selection = catalog.select_with(request.languages, request.allow_translation)?;
        let index = catalog
            .tracks()
            .iter()
            .position(|t| std::ptr::eq(t, selection.track))
            .unwrap_or_default();
        let base_url = &captions[index].base_url;

        info!(
            "Selected {} track '{}'{}",
            if selection.track.is_generated { "generated" } else { "manual" },
            selection.track.language_code,
            match selection.translation {
                Some(target) => format!(" translated to '{}'", target.language_code),
                None => String::new(),
            }
        );

        let translate_to = selection.translation.map(|t| t.language_code.as_str());
        let segments = self.fetch_segments(video_id, base_url, translate_to).await?;

        catalog.transcript(selection, request.languages, segments)
    }
}

/// Map HTTP failures onto the error taxonomy.
fn check_status(response: reqwest::Response, video_id: &VideoId) -> Result<reqwest::Response> {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(TubescriptError::RequestBlocked(video_id.to_string()));
    }
    Ok(response.error_for_status()?)
}

fn consent_value(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"name="v" value="(.*?)""#).expect("consent regex is valid"));
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read the InnerTube API key from the watch page.
fn extract_api_key(html: &str, video_id: &VideoId) -> Result<String> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(TubescriptError::RequestBlocked(video_id.to_string()));
    }

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("api key regex is valid")
    });

    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TubescriptError::Parse(format!("No InnerTube API key on watch page for {}", video_id))
        })
}

/// Build the json3 download URL for a track, optionally translated.
fn segments_url(base_url: &str, translate_to: Option<&str>) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| TubescriptError::Parse(format!("Invalid caption URL: {}", e)))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt" && k != "tlang")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(kept);
        query.append_pair("fmt", "json3");
        if let Some(lang) = translate_to {
            query.append_pair("tlang", lang);
        }
    }

    Ok(url.into())
}

fn runs_text(value: &Value) -> Option<String> {
    if let Some(simple) = value.get("simpleText").and_then(Value::as_str) {
        return Some(simple.to_string());
    }
    let text: String = value
        .get("runs")?
        .as_array()?
        .iter()
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Fail unless the player response says the video is playable.
pub fn assert_playability(video_id: &str, player: &Value) -> Result<()> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("");
    let lowered = reason.to_lowercase();

    match status {
        "LOGIN_REQUIRED" => {
            if lowered.contains("not a bot") {
                return Err(TubescriptError::RequestBlocked(video_id.to_string()));
            }
            if lowered.contains("inappropriate") || lowered.contains("confirm your age") {
                return Err(TubescriptError::AgeRestricted(video_id.to_string()));
            }
            if lowered.contains("private") {
                return Err(TubescriptError::VideoUnavailable(video_id.to_string()));
            }
        }
        "ERROR" if lowered.contains("unavailable") => {
            return Err(TubescriptError::VideoUnavailable(video_id.to_string()));
        }
        _ => {}
    }

    let subreason = playability
        .pointer("/errorScreen/playerErrorMessageRenderer/subreason")
        .and_then(runs_text)
        .filter(|s| !s.is_empty());

    let reason = match (reason.is_empty(), subreason) {
        (true, Some(sub)) => sub,
        (false, Some(sub)) => format!("{} ({})", reason, sub),
        (false, None) => reason.to_string(),
        (true, None) => status.to_string(),
    };

    Err(TubescriptError::VideoUnplayable {
        video_id: video_id.to_string(),
        reason,
    })
}

/// Extract caption tracks from a player response.
pub fn parse_caption_list(video_id: &str, player: &Value) -> Result<Vec<CaptionTrack>> {
    assert_playability(video_id, player)?;

    let renderer = player
        .pointer("/captions/playerCaptionsTracklistRenderer")
        .ok_or_else(|| TubescriptError::TranscriptsDisabled(video_id.to_string()))?;

    let translation_languages: Vec<TranslationLanguage> = renderer
        .get("translationLanguages")
        .and_then(Value::as_array)
        .map(|languages| {
            languages
                .iter()
                .filter_map(|lang| {
                    let language_code = lang.get("languageCode")?.as_str()?.to_string();
                    let language = lang
                        .get("languageName")
                        .and_then(runs_text)
                        .unwrap_or_else(|| language_code.clone());
                    Some(TranslationLanguage {
                        language_code,
                        language,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let tracks = renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|caption| {
                    let language_code = caption.get("languageCode")?.as_str()?.to_string();
                    let base_url = caption.get("baseUrl")?.as_str()?.to_string();
                    let language = caption
                        .get("name")
                        .and_then(runs_text)
                        .unwrap_or_else(|| language_code.clone());
                    let is_generated = caption.get("kind").and_then(Value::as_str) == Some("asr");
                    let is_translatable = caption
                        .get("isTranslatable")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);

                    Some(CaptionTrack {
                        track: TranscriptTrack {
                            language_code,
                            language,
                            is_generated,
                            is_translatable,
                            translation_languages: if is_translatable {
                                translation_languages.clone()
                            } else {
                                Vec::new()
                            },
                        },
                        base_url,
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(tracks)
}
