//! Track catalog and language resolution.
//!
//! Both tiers enumerate the tracks a video offers and then pick one using the
//! same priority rules:
//!
//! 1. for each preferred language in order, a manual track in that language,
//!    else a generated one; language order outranks authorship;
//! 2. otherwise a translation: the first preferred language that any track can
//!    be translated into, sourced from the best track (manual first);
//! 3. otherwise `NoTranscriptFound` with the languages that do exist.

use crate::error::{Result, TubescriptError};
use crate::transcript::{
    LanguagePreference, NormalizedTranscript, Segment, TranscriptTrack, TranslationLanguage,
};

/// The tracks one video currently exposes.
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    video_id: String,
    tracks: Vec<TranscriptTrack>,
}

/// A resolved track, with the translation target when one is needed.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub track: &'a TranscriptTrack,
    pub translation: Option<&'a TranslationLanguage>,
}

impl Selection<'_> {
    /// Language code of the text that will be delivered.
    pub fn language_code(&self) -> &str {
        match self.translation {
            Some(target) => &target.language_code,
            None => &self.track.language_code,
        }
    }

    pub fn is_translated(&self) -> bool {
        self.translation.is_some()
    }
}

impl TrackCatalog {
    /// Build a catalog. A video with captions enabled but no tracks fails
    /// with `NoTranscriptFound`.
    pub fn new(video_id: impl Into<String>, tracks: Vec<TranscriptTrack>) -> Result<Self> {
        let video_id = video_id.into();
        if tracks.is_empty() {
            return Err(TubescriptError::NoTranscriptFound {
                video_id,
                requested: Vec::new(),
                available: Vec::new(),
            });
        }
        Ok(Self { video_id, tracks })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn tracks(&self) -> &[TranscriptTrack] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<TranscriptTrack> {
        self.tracks
    }

    /// Distinct language codes of the tracks, in listing order.
    pub fn available_languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for track in &self.tracks {
            if !codes.contains(&track.language_code) {
                codes.push(track.language_code.clone());
            }
        }
        codes
    }

    /// Pick the best track for `preference`, allowing translation.
    pub fn select(&self, preference: &LanguagePreference) -> Result<Selection<'_>> {
        self.select_with(preference, true)
    }

    /// Pick the best track for `preference`.
    pub fn select_with(
        &self,
        preference: &LanguagePreference,
        allow_translation: bool,
    ) -> Result<Selection<'_>> {
        for code in preference.iter() {
            if let Some(track) = self.find_exact(code) {
                return Ok(Selection {
                    track,
                    translation: None,
                });
            }
        }

        if allow_translation {
            if let Some(selection) = self.find_translation(preference) {
                return Ok(selection);
            }
        }

        Err(TubescriptError::NoTranscriptFound {
            video_id: self.video_id.clone(),
            requested: preference.to_vec(),
            available: self.available_languages(),
        })
    }

    /// Wrap the downloaded segments of `selection`. A track that downloads
    /// with no segments counts as no transcript at all.
    pub fn transcript(
        &self,
        selection: Selection<'_>,
        requested: &LanguagePreference,
        segments: Vec<Segment>,
    ) -> Result<NormalizedTranscript> {
        if segments.is_empty() {
            return Err(TubescriptError::NoTranscriptFound {
                video_id: self.video_id.clone(),
                requested: requested.to_vec(),
                available: self.available_languages(),
            });
        }

        let transcript = NormalizedTranscript::new(
            self.video_id.as_str(),
            selection.language_code(),
            selection.track.is_generated,
            segments,
        )?;

        Ok(match selection.translation {
            Some(_) => transcript.translated_from(&selection.track.language_code),
            None => transcript,
        })
    }

    /// Manual track in `code`, else a generated one.
    fn find_exact(&self, code: &str) -> Option<&TranscriptTrack> {
        [false, true].into_iter().find_map(|generated| {
            self.tracks
                .iter()
                .find(|t| t.is_generated == generated && t.language_code == code)
        })
    }

    fn find_translation(&self, preference: &LanguagePreference) -> Option<Selection<'_>> {
        for code in preference.iter() {
            for generated in [false, true] {
                let found = self
                    .tracks
                    .iter()
                    .filter(|t| t.is_generated == generated)
                    .find_map(|track| {
                        track.translation_to(code).map(|target| Selection {
                            track,
                            translation: Some(target),
                        })
                    });
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(code: &str, generated: bool, targets: &[&str]) -> TranscriptTrack {
        TranscriptTrack {
            language_code: code.to_string(),
            language: code.to_uppercase(),
            is_generated: generated,
            is_translatable: !targets.is_empty(),
            translation_languages: targets
                .iter()
                .map(|t| TranslationLanguage {
                    language_code: t.to_string(),
                    language: t.to_uppercase(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_language_match_beats_authorship() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", false, &[]), track("pt", true, &[])],
        )
        .unwrap();

        let selection = catalog.select(&LanguagePreference::new(["pt", "en"])).unwrap();
        assert_eq!(selection.language_code(), "pt");
        assert!(selection.track.is_generated);
        assert!(!selection.is_translated());
    }

    #[test]
    fn test_manual_preferred_within_language() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", true, &[]), track("en", false, &[])],
        )
        .unwrap();

        let selection = catalog.select(&LanguagePreference::new(["en"])).unwrap();
        assert!(!selection.track.is_generated);
    }

    #[test]
    fn test_earlier_generated_language_beats_later_manual() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", false, &[]), track("pt", true, &[]), track("pt", false, &[])],
        )
        .unwrap();

        let selection = catalog.select(&LanguagePreference::new(["pt", "en"])).unwrap();
        assert_eq!(selection.language_code(), "pt");
        assert!(!selection.track.is_generated);

        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", false, &["fr"]), track("fr", true, &[])],
        )
        .unwrap();

        // A generated exact match also beats a manual translation.
        let selection = catalog.select(&LanguagePreference::new(["fr", "en"])).unwrap();
        assert_eq!(selection.language_code(), "fr");
        assert!(selection.track.is_generated);
        assert!(!selection.is_translated());
    }

    #[test]
    fn test_manual_only_never_returns_generated() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("de", false, &[]), track("en", false, &["pt"])],
        )
        .unwrap();

        for pref in [vec!["en"], vec!["fr", "en"], vec!["de", "en"], vec!["pt", "de"]] {
            let selection = catalog.select(&LanguagePreference::new(pref)).unwrap();
            assert!(!selection.track.is_generated);
        }
    }

    #[test]
    fn test_translation_step() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", true, &["pt", "es"]), track("en", false, &["pt"])],
        )
        .unwrap();

        let selection = catalog.select(&LanguagePreference::new(["pt"])).unwrap();
        assert_eq!(selection.language_code(), "pt");
        assert!(selection.is_translated());
        assert!(!selection.track.is_generated);
        assert_eq!(selection.track.language_code, "en");

        let err = catalog
            .select_with(&LanguagePreference::new(["pt"]), false)
            .unwrap_err();
        assert!(matches!(err, TubescriptError::NoTranscriptFound { .. }));
    }

    #[test]
    fn test_translation_ignores_untranslatable_tracks() {
        let mut locked = track("en", false, &["pt"]);
        locked.is_translatable = false;
        let catalog = TrackCatalog::new("vid", vec![locked]).unwrap();

        assert!(catalog.select(&LanguagePreference::new(["pt"])).is_err());
    }

    #[test]
    fn test_empty_download_is_no_transcript() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", false, &[]), track("pt", true, &[])],
        )
        .unwrap();
        let preference = LanguagePreference::new(["pt"]);
        let selection = catalog.select(&preference).unwrap();

        let err = catalog.transcript(selection, &preference, Vec::new()).unwrap_err();
        match &err {
            TubescriptError::NoTranscriptFound {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, &vec!["pt".to_string()]);
                assert_eq!(available, &vec!["en".to_string(), "pt".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_transcript_records_translation_source() {
        let catalog = TrackCatalog::new("vid", vec![track("en", false, &["pt"])]).unwrap();
        let preference = LanguagePreference::new(["pt"]);
        let selection = catalog.select(&preference).unwrap();

        let transcript = catalog
            .transcript(selection, &preference, vec![Segment::new("olá", 0.0, 1.0)])
            .unwrap();
        assert_eq!(transcript.language_code, "pt");
        assert_eq!(transcript.translated_from.as_deref(), Some("en"));
        assert!(!transcript.is_generated);
    }

    #[test]
    fn test_no_match_reports_available() {
        let catalog = TrackCatalog::new(
            "vid",
            vec![track("en", false, &[]), track("en", true, &[]), track("fr", true, &[])],
        )
        .unwrap();

        let err = catalog.select(&LanguagePreference::new(["ja"])).unwrap_err();
        match err {
            TubescriptError::NoTranscriptFound {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, vec!["ja"]);
                assert_eq!(available, vec!["en", "fr"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_catalog_is_no_transcript() {
        let err = TrackCatalog::new("vid", vec![]).unwrap_err();
        assert!(matches!(err, TubescriptError::NoTranscriptFound { .. }));
    }
}
