//! HTTP transcript service.
//!
//! Exposes transcript acquisition over a small JSON API guarded by an
//! `X-API-Key` header.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Environment, Settings};
use crate::error::{ErrorKind, TubescriptError};
use crate::orchestrator::{Acquisition, FetchOptions, Orchestrator};
use crate::transcript::{encode_plain, EncodeOptions, LanguagePreference, Segment, Tier, TranscriptTrack, VideoId};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    /// `None` serves anonymously.
    api_key: Option<String>,
}

/// Run the HTTP transcript service.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    allow_anonymous: bool,
    settings: Settings,
    env: &Environment,
) -> anyhow::Result<()> {
    preflight::check(Operation::Serve {
        api_key: env.api_key.as_deref(),
        allow_anonymous,
    })?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let api_key = if allow_anonymous {
        None
    } else {
        env.api_key.clone()
    };

    let orchestrator = Orchestrator::new(settings, env)?;
    let app = router(Arc::new(AppState {
        orchestrator,
        api_key,
    }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("tubescript API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Transcript", "POST /transcript");
    Output::kv("Tracks", "GET  /tracks/{video_id}");
    println!();
    if allow_anonymous {
        Output::warning("Serving without an API key.");
    }
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/transcript", post(transcript))
        .route("/tracks/{video_id}", get(tracks))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct TranscriptRequest {
    /// YouTube URL or video ID
    video_id: String,
    /// Preferred languages, most preferred first. Empty uses the configured default.
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    preserve_formatting: bool,
    #[serde(default)]
    allow_translation: Option<bool>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    video_id: String,
    language: String,
    is_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    translated_from: Option<String>,
    tier: Tier,
    transcript: Vec<Segment>,
    full_text: String,
}

#[derive(Serialize)]
struct TracksResponse {
    video_id: String,
    tier: Tier,
    tracks: Vec<TranscriptTrack>,
}

#[derive(Serialize)]
struct TierFailure {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_languages: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_languages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary: Option<TierFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<TierFailure>,
}

impl ErrorResponse {
    fn from_error(err: &TubescriptError) -> Self {
        let (primary, fallback) = match err {
            TubescriptError::CombinedAcquisitionFailure {
                primary, fallback, ..
            } => (Some(tier_failure(primary)), Some(tier_failure(fallback))),
            _ => (None, None),
        };

        Self {
            kind: err.kind().as_str(),
            message: err.to_string(),
            hint: err.hint(),
            available_languages: err.available_languages().map(<[String]>::to_vec),
            primary,
            fallback,
        }
    }

    fn forbidden() -> Self {
        Self {
            kind: "forbidden",
            message: "Invalid API Key".to_string(),
            hint: None,
            available_languages: None,
            primary: None,
            fallback: None,
        }
    }
}

fn tier_failure(err: &TubescriptError) -> TierFailure {
    TierFailure {
        kind: err.kind(),
        message: err.to_string(),
        available_languages: err.available_languages().map(<[String]>::to_vec),
    }
}

/// HTTP status for a failure class.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidVideoId => StatusCode::BAD_REQUEST,
        ErrorKind::VideoUnavailable | ErrorKind::NoTranscriptFound | ErrorKind::EmptyTranscript => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::TranscriptsDisabled
        | ErrorKind::VideoUnplayable
        | ErrorKind::AgeRestricted
        | ErrorKind::RequestBlocked => StatusCode::FORBIDDEN,
        ErrorKind::CombinedAcquisitionFailure | ErrorKind::Tool => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::FormatUnavailable
        | ErrorKind::Credential
        | ErrorKind::Config
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &TubescriptError) -> Response {
    (status_for(err.kind()), Json(ErrorResponse::from_error(err))).into_response()
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == expected)
}

fn transcript_response(acquisition: Acquisition, preserve_formatting: bool) -> TranscriptResponse {
    let options = EncodeOptions {
        preserve_formatting,
        separator: if preserve_formatting { "\n" } else { " " }.to_string(),
    };
    let full_text = encode_plain(&acquisition.transcript, &options);
    let transcript = acquisition.transcript;

    TranscriptResponse {
        video_id: transcript.video_id,
        language: transcript.language_code,
        is_generated: transcript.is_generated,
        translated_from: transcript.translated_from,
        tier: acquisition.tier,
        transcript: transcript.segments,
        full_text,
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "tubescript",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/transcript", "/tracks/{video_id}"],
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn transcript(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TranscriptRequest>,
) -> Response {
    if !authorized(&headers, state.api_key.as_deref()) {
        warn!("Rejected transcript request with invalid API key");
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::forbidden())).into_response();
    }

    let video_id = match VideoId::parse(&req.video_id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let options = FetchOptions {
        preserve_formatting: req.preserve_formatting,
        allow_translation: req.allow_translation,
        ..FetchOptions::default()
    };
    let languages = LanguagePreference::new(&req.languages);

    match state.orchestrator.fetch(&video_id, &languages, &options).await {
        Ok(acquisition) => {
            info!("Served {} via {} tier", video_id, acquisition.tier);
            Json(transcript_response(acquisition, req.preserve_formatting)).into_response()
        }
        Err(e) => {
            warn!("Transcript request for {} failed: {}", video_id, e);
            error_response(&e)
        }
    }
}

async fn tracks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
) -> Response {
    if !authorized(&headers, state.api_key.as_deref()) {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::forbidden())).into_response();
    }

    let video_id = match VideoId::parse(&video_id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .orchestrator
        .list_tracks(&video_id, &FetchOptions::default())
        .await
    {
        Ok(listing) => Json(TracksResponse {
            video_id: listing.video_id,
            tier: listing.tier,
            tracks: listing.tracks,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}
