//! tubescript - YouTube Transcript Acquisition and Normalization
//!
//! Fetches a video's transcript in the caller's preferred language and
//! returns it as an ordered list of timed segments.
//!
//! # Overview
//!
//! Acquisition runs in two tiers:
//! - The primary tier speaks YouTube's transcript protocol directly (watch
//!   page, player API, timed-text download).
//! - The fallback tier extracts subtitles through yt-dlp and can carry a
//!   cookie credential for members-only or age-gated videos.
//!
//! The fallback runs once when the primary fails for any reason. Both tiers
//! produce the same [`transcript::NormalizedTranscript`], which can be
//! rendered as plain text, a segment list, SRT, WebVTT or JSON.
//!
//! # Architecture
//!
//! - `transcript` - Video IDs, segments, normalization and output formats
//! - `catalog` - Track listing and language selection
//! - `sources` - The two acquisition tiers behind a common trait
//! - `cookies` - Cookie credential resolution for the fallback tier
//! - `orchestrator` - Tier sequencing, timeouts and error combination
//! - `config` - Settings file and environment overrides
//! - `cli` - Command-line interface and HTTP service
//!
//! # Example
//!
//! ```rust,no_run
//! use tubescript::config::{Environment, Settings};
//! use tubescript::orchestrator::{FetchOptions, Orchestrator};
//! use tubescript::transcript::{LanguagePreference, VideoId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let env = Environment::capture(&settings);
//!     let orchestrator = Orchestrator::new(settings, &env)?;
//!
//!     let video_id = VideoId::parse("https://youtu.be/dQw4w9WgXcQ")?;
//!     let languages = LanguagePreference::from_csv("pt,en");
//!     let acquisition = orchestrator
//!         .fetch(&video_id, &languages, &FetchOptions::default())
//!         .await?;
//!
//!     println!(
//!         "{} segments via {} tier",
//!         acquisition.transcript.segments.len(),
//!         acquisition.tier
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod error;
pub mod orchestrator;
pub mod sources;
pub mod transcript;

pub use error::{Result, TubescriptError};
