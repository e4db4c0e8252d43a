//! Parser for YouTube's `json3` caption payload.
//!
//! Both acquisition tiers request this format, so one parser turns either
//! payload into segments.

use super::models::Segment;
use crate::error::{Result, TubescriptError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a json3 payload into segments in document order.
///
/// Events without text runs (window/style events) and whitespace-only events
/// are skipped. Line breaks inside an event are kept; normalization happens
/// at output time.
pub fn parse_json3(payload: &str) -> Result<Vec<Segment>> {
    let document: Json3Document = serde_json::from_str(payload)
        .map_err(|e| TubescriptError::Parse(format!("Invalid json3 caption payload: {}", e)))?;

    let segments = document
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let text: String = segs.into_iter().map(|s| s.utf8).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(Segment::new(
                text.trim(),
                event.t_start_ms as f64 / 1000.0,
                event.d_duration_ms as f64 / 1000.0,
            ))
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json3() {
        let payload = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 120000, "id": 1, "wpWinPosId": 1},
                {"tStartMs": 1200, "dDurationMs": 2300, "segs": [{"utf8": "Hello "}, {"utf8": "world", "tOffsetMs": 400}]},
                {"tStartMs": 3500, "dDurationMs": 10, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 3500, "dDurationMs": 2000, "segs": [{"utf8": "second\nline"}]}
            ]
        }"#;

        let segments = parse_json3(payload).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::new("Hello world", 1.2, 2.3),
                Segment::new("second\nline", 3.5, 2.0),
            ]
        );
    }

    #[test]
    fn test_parse_json3_without_events() {
        assert!(parse_json3("{}").unwrap().is_empty());
        assert!(matches!(
            parse_json3("<transcript/>"),
            Err(TubescriptError::Parse(_))
        ));
    }
}
