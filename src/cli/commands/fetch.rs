//! Fetch command implementation.

use crate::cli::output::format_duration;
use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, TierArgs};
use crate::config::{Environment, Settings};
use crate::orchestrator::{Orchestrator, TierMode};
use crate::transcript::{self, EncodeOptions, LanguagePreference, OutputFormat, VideoId};
use anyhow::Result;
use std::io::Write;

/// Arguments for one fetch invocation.
#[derive(Debug)]
pub struct FetchArgs {
    pub video: String,
    pub languages: Vec<String>,
    pub format: String,
    pub preserve_formatting: bool,
    pub no_translate: bool,
    pub output: Option<String>,
    pub tier: TierArgs,
}

/// Run the fetch command.
pub async fn run_fetch(args: FetchArgs, settings: Settings, env: &Environment) -> Result<()> {
    let format: OutputFormat = args.format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let video_id = VideoId::parse(&args.video)?;
    let languages = LanguagePreference::new(&args.languages);

    let mut options = args.tier.options()?;
    options.preserve_formatting = args.preserve_formatting;
    if args.no_translate {
        options.allow_translation = Some(false);
    }

    if options.mode == TierMode::FallbackOnly {
        preflight::check(Operation::Fallback {
            yt_dlp_path: &settings.fallback.yt_dlp_path,
        })?;
    }

    let orchestrator = Orchestrator::new(settings, env)?;

    let spinner = Output::spinner(&format!("Fetching transcript for {}...", video_id));
    let result = orchestrator.fetch(&video_id, &languages, &options).await;
    spinner.finish_and_clear();
    let acquisition = result?;

    if let Some(primary_error) = &acquisition.primary_error {
        Output::warning(&format!("Primary tier failed: {}", primary_error));
    }

    let transcript = &acquisition.transcript;
    let mut summary = format!(
        "'{}' transcript via {} tier ({} segments, {})",
        transcript.language_code,
        acquisition.tier,
        transcript.segments.len(),
        format_duration(transcript.duration_seconds())
    );
    if let Some(source) = &transcript.translated_from {
        summary.push_str(&format!(", translated from '{}'", source));
    }
    if transcript.is_generated {
        summary.push_str(", auto-generated");
    }

    let encoded = transcript::encode(
        transcript,
        format,
        &EncodeOptions::preserving(args.preserve_formatting),
    )?;

    match args.output {
        Some(path) => {
            let path = Settings::expand_path(&path);
            std::fs::write(&path, ensure_trailing_newline(encoded))?;
            Output::status(&summary);
            Output::status(&format!("Saved {} to {}", format, path.display()));
        }
        None => {
            Output::status(&summary);
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(ensure_trailing_newline(encoded).as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn ensure_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_trailing_newline() {
        assert_eq!(ensure_trailing_newline("a b".to_string()), "a b\n");
        assert_eq!(ensure_trailing_newline("1\n\n".to_string()), "1\n\n");
    }
}
