//! Tracks command implementation.

use crate::cli::{Output, TierArgs};
use crate::config::{Environment, Settings};
use crate::orchestrator::{Orchestrator, TrackListing};
use crate::transcript::{Tier, TranscriptTrack, VideoId};
use anyhow::Result;
use console::style;
use serde::Serialize;

#[derive(Serialize)]
struct TrackListingJson<'a> {
    video_id: &'a str,
    tier: Tier,
    tracks: &'a [TranscriptTrack],
}

/// Run the tracks command.
pub async fn run_tracks(
    video: &str,
    json: bool,
    tier: &TierArgs,
    settings: Settings,
    env: &Environment,
) -> Result<()> {
    let video_id = VideoId::parse(video)?;
    let options = tier.options()?;
    let orchestrator = Orchestrator::new(settings, env)?;

    let listing = orchestrator.list_tracks(&video_id, &options).await?;

    if json {
        let view = TrackListingJson {
            video_id: &listing.video_id,
            tier: listing.tier,
            tracks: &listing.tracks,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_listing(&listing);
    Ok(())
}

fn print_listing(listing: &TrackListing) {
    if let Some(primary_error) = &listing.primary_error {
        Output::warning(&format!("Primary tier failed: {}", primary_error));
    }

    Output::header(&format!(
        "Caption tracks for {} ({} tier)",
        listing.video_id, listing.tier
    ));

    let (generated, manual): (Vec<_>, Vec<_>) =
        listing.tracks.iter().partition(|t| t.is_generated);

    println!("\n{}", style("Manually created").bold());
    print_group(&manual);

    println!("\n{}", style("Auto-generated").bold());
    print_group(&generated);

    let translatable = listing
        .tracks
        .iter()
        .find(|t| t.is_translatable && !t.translation_languages.is_empty());
    if let Some(track) = translatable {
        println!();
        Output::kv(
            "Translation targets",
            &format!("{} languages", track.translation_languages.len()),
        );
    }
}

fn print_group(tracks: &[&TranscriptTrack]) {
    if tracks.is_empty() {
        println!("  {}", style("(none)").dim());
        return;
    }

    for track in tracks {
        Output::list_item(&track_line(track));
    }
}

fn track_line(track: &TranscriptTrack) -> String {
    let mut line = format!("{} {}", style(&track.language_code).cyan(), track.language);
    if track.is_translatable {
        line.push_str(&format!(" {}", style("[translatable]").dim()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_listing_shape() {
        let tracks = vec![TranscriptTrack {
            language_code: "en".to_string(),
            language: "English".to_string(),
            is_generated: false,
            is_translatable: true,
            translation_languages: Vec::new(),
        }];
        let view = TrackListingJson {
            video_id: "dQw4w9WgXcQ",
            tier: Tier::Fallback,
            tracks: &tracks,
        };

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["tier"], "fallback");
        assert_eq!(value["tracks"][0]["language_code"], "en");
        assert!(value["tracks"][0].get("translation_languages").is_none());
    }
}
