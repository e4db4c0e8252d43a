//! CLI module for tubescript.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::cookies::CookieSource;
use crate::orchestrator::{FetchOptions, TierMode};
use clap::{Args, Parser, Subcommand};

/// tubescript - YouTube transcripts with an authenticated subtitle fallback
///
/// Fetches transcripts through the official transcript protocol and falls back
/// to yt-dlp subtitle extraction (optionally with cookies) when that fails.
#[derive(Parser, Debug)]
#[command(name = "tubescript")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Tier and credential selection shared by commands that hit YouTube.
#[derive(Args, Debug, Clone, Default)]
pub struct TierArgs {
    /// Cookie file path or browser name (chrome, firefox, ...) for the fallback tier
    #[arg(long)]
    pub cookies: Option<String>,

    /// Only use the official transcript protocol
    #[arg(long, conflicts_with = "fallback_only")]
    pub primary_only: bool,

    /// Only use yt-dlp subtitle extraction
    #[arg(long)]
    pub fallback_only: bool,
}

impl TierArgs {
    pub fn mode(&self) -> TierMode {
        if self.primary_only {
            TierMode::PrimaryOnly
        } else if self.fallback_only {
            TierMode::FallbackOnly
        } else {
            TierMode::Auto
        }
    }

    /// Build fetch options from these flags.
    pub fn options(&self) -> crate::Result<FetchOptions> {
        let cookies = self
            .cookies
            .as_deref()
            .map(str::parse::<CookieSource>)
            .transpose()?;

        Ok(FetchOptions {
            cookies,
            mode: self.mode(),
            ..FetchOptions::default()
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a transcript and print or save it
    Fetch {
        /// YouTube URL or video ID
        video: String,

        /// Preferred language, most preferred first (repeat or comma-separate)
        #[arg(short, long = "lang", value_delimiter = ',')]
        languages: Vec<String>,

        /// Output format (plain, segments, srt, vtt, json)
        #[arg(short, long, default_value = "plain")]
        format: String,

        /// Keep markup and line breaks in segment text
        #[arg(long)]
        preserve_formatting: bool,

        /// Do not fall back to a machine translation
        #[arg(long)]
        no_translate: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        tier: TierArgs,
    },

    /// List the caption tracks a video offers
    Tracks {
        /// YouTube URL or video ID
        video: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        tier: TierArgs,
    },

    /// Start the HTTP transcript service
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve without an API key
        #[arg(long)]
        allow_anonymous: bool,
    },

    /// Check yt-dlp, configuration and cookie credentials
    Doctor {
        /// Restricted (e.g. members-only) video used to test the cookie credential
        #[arg(long, value_name = "VIDEO")]
        cookie_check: Option<String>,

        /// Cookie file path or browser name to test instead of the configured one
        #[arg(long)]
        cookies: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "tubescript",
            "fetch",
            "https://youtu.be/dQw4w9WgXcQ",
            "-l",
            "pt,en",
            "--lang",
            "es",
            "--format",
            "srt",
            "--cookies",
            "firefox",
            "--fallback-only",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch {
                languages,
                format,
                tier,
                ..
            } => {
                assert_eq!(languages, vec!["pt", "en", "es"]);
                assert_eq!(format, "srt");
                assert_eq!(tier.mode(), TierMode::FallbackOnly);

                let options = tier.options().unwrap();
                assert_eq!(
                    options.cookies,
                    Some(CookieSource::Browser("firefox".to_string()))
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_tier_flags_conflict() {
        let result = Cli::try_parse_from([
            "tubescript",
            "tracks",
            "dQw4w9WgXcQ",
            "--primary-only",
            "--fallback-only",
        ]);
        assert!(result.is_err());
    }
}
