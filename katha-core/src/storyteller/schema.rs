//! Strict validation of generation responses at the service boundary.
//!
//! The upstream response is converted into a validated [`StoryUpdate`]
//! before any core logic touches it; anything that does not conform to the
//! segment schema is a `MalformedResponse`.

use serde::Deserialize;

use super::agent::StorytellerError;
use crate::story::{Segment, SegmentKind, StoryUpdate};

/// The response schema sent with every generation request, constraining the
/// model to JSON the validator accepts.
pub fn story_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "segments": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "type": {
                            "type": "STRING",
                            "enum": ["narration", "dialogue", "transition"]
                        },
                        "content": { "type": "STRING" },
                        "speaker": {
                            "type": "STRING",
                            "description": "Character name or 'Sutradhar'"
                        },
                        "emotion": { "type": "STRING" }
                    },
                    "required": ["id", "type", "content", "speaker", "emotion"]
                }
            }
        },
        "required": ["segments", "title"]
    })
}

#[derive(Debug, Deserialize)]
struct RawStory {
    title: Option<String>,
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    content: String,
    speaker: Option<String>,
    emotion: Option<String>,
}

/// Parse and validate a generation response body.
pub fn parse_story(text: &str) -> Result<StoryUpdate, StorytellerError> {
    let raw: RawStory = serde_json::from_str(text)
        .map_err(|e| StorytellerError::MalformedResponse(e.to_string()))?;

    let mut segments = Vec::with_capacity(raw.segments.len());
    for raw_segment in raw.segments {
        let kind = match raw_segment.kind.as_str() {
            "narration" => SegmentKind::Narration,
            "dialogue" => SegmentKind::Dialogue,
            "transition" => SegmentKind::Transition,
            other => {
                return Err(StorytellerError::MalformedResponse(format!(
                    "unknown segment type '{other}'"
                )))
            }
        };
        if raw_segment.id.is_empty() {
            return Err(StorytellerError::MalformedResponse(
                "segment with empty id".to_string(),
            ));
        }
        segments.push(Segment {
            id: raw_segment.id,
            kind,
            text: raw_segment.content,
            speaker: raw_segment.speaker,
            emotion: raw_segment.emotion,
        });
    }

    Ok(StoryUpdate {
        title: raw.title,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_story() {
        let text = r#"{
            "title": "The Old Fort",
            "segments": [
                {"id": "s1", "type": "narration", "content": "Night falls.",
                 "speaker": "Sutradhar", "emotion": "calm"},
                {"id": "s2", "type": "dialogue", "content": "(whisper) Hello?",
                 "speaker": "Meera", "emotion": "fearful"}
            ]
        }"#;

        let update = parse_story(text).unwrap();
        assert_eq!(update.title.as_deref(), Some("The Old Fort"));
        assert_eq!(update.segments.len(), 2);
        assert_eq!(update.segments[0].kind, SegmentKind::Narration);
        assert_eq!(update.segments[1].speaker.as_deref(), Some("Meera"));
    }

    #[test]
    fn test_missing_segments_is_malformed() {
        let result = parse_story(r#"{"title": "No segments"}"#);
        assert!(matches!(
            result,
            Err(StorytellerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let text = r#"{
            "title": null,
            "segments": [{"id": "s1", "type": "monologue", "content": "Hm",
                          "speaker": "Meera", "emotion": "calm"}]
        }"#;
        assert!(matches!(
            parse_story(text),
            Err(StorytellerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(
            parse_story("I refuse to answer in JSON."),
            Err(StorytellerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_segment_list_is_valid() {
        let update = parse_story(r#"{"title": "T", "segments": []}"#).unwrap();
        assert!(update.segments.is_empty());
    }
}
