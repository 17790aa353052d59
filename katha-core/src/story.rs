//! The narrative store: ordered story segments plus title.
//!
//! `StoryState` owns the segment sequence. The storyteller only ever appends
//! (via [`StoryState::apply_update`]); edits and deletions come from user
//! action. Every mutation changes the content fingerprint, which is what the
//! audio cache keys on.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Reserved speaker name for non-dialogue narration.
pub const NARRATOR: &str = "Sutradhar";

/// Alternate spellings the model uses for the narrator.
const NARRATOR_ALIASES: [&str; 2] = ["Sutradhar", "सूत्रधार"];

/// Whether a speaker name denotes the narrator.
pub fn is_narrator_name(name: &str) -> bool {
    NARRATOR_ALIASES.contains(&name)
}

lazy_static! {
    /// Performance cues: `( )` acting instructions and `[ ]` ambient effects.
    static ref CUE_RE: Regex = Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("valid cue regex");
}

/// The kind of a story segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Narration,
    Dialogue,
    Transition,
}

/// One atomic unit of narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique within a session.
    pub id: String,
    pub kind: SegmentKind,
    pub text: String,
    /// Character name, or a narrator alias (or absent) for narration.
    pub speaker: Option<String>,
    pub emotion: Option<String>,
}

impl Segment {
    /// Whether this segment is spoken in the narrator's voice.
    pub fn is_narration(&self) -> bool {
        if self.kind == SegmentKind::Narration {
            return true;
        }
        match self.speaker.as_deref() {
            None => true,
            Some(name) => is_narrator_name(name),
        }
    }

    /// The speaker name, falling back to the narrator.
    pub fn speaker_or_narrator(&self) -> &str {
        self.speaker.as_deref().unwrap_or(NARRATOR)
    }

    /// Segment text with performance cues stripped, for speech synthesis.
    pub fn spoken_text(&self) -> String {
        CUE_RE.replace_all(&self.text, "").trim().to_string()
    }
}

/// A parsed generation result: new segments plus an optional title.
#[derive(Debug, Clone, Default)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub segments: Vec<Segment>,
}

/// Derived identity of the narrative state, used to validate cache entries.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint([u8; 32]);

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The ordered segment sequence plus title.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryState {
    title: Option<String>,
    segments: Vec<Segment>,
}

impl StoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Append the segments of a generation result, adopting its title if no
    /// title is set yet. Incoming ids that collide with an existing segment
    /// are re-keyed with a fresh uuid. Returns the number of appended
    /// segments.
    pub fn apply_update(&mut self, update: StoryUpdate) -> usize {
        if self.title.is_none() {
            if let Some(title) = update.title {
                self.title = Some(title);
            }
        }

        let appended = update.segments.len();
        for mut segment in update.segments {
            if self.segments.iter().any(|s| s.id == segment.id) {
                segment.id = uuid::Uuid::new_v4().to_string();
            }
            self.segments.push(segment);
        }
        appended
    }

    /// Replace the text of the segment with the given id.
    pub fn update_segment(&mut self, id: &str, text: impl Into<String>) -> bool {
        match self.segments.iter_mut().find(|s| s.id == id) {
            Some(segment) => {
                segment.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Remove the segment with the given id.
    pub fn delete_segment(&mut self, id: &str) -> bool {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        self.segments.len() != before
    }

    /// Discard all segments and the title.
    pub fn clear(&mut self) {
        self.title = None;
        self.segments.clear();
    }

    /// Flatten the story into the synthesis script: one `speaker: text` line
    /// per segment with performance cues stripped, blank-line separated.
    pub fn render_script(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}: {}", s.speaker_or_narrator(), s.spoken_text()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Content fingerprint over the title and every segment field. Any
    /// mutation of the store produces a different fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();

        let hash_str = |hasher: &mut Sha256, value: &str| {
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        };
        let hash_opt = |hasher: &mut Sha256, value: &Option<String>| match value {
            Some(v) => {
                hasher.update([1u8]);
                hash_str(hasher, v);
            }
            None => hasher.update([0u8]),
        };

        hash_opt(&mut hasher, &self.title);
        for segment in &self.segments {
            hash_str(&mut hasher, &segment.id);
            hasher.update([segment.kind as u8]);
            hash_str(&mut hasher, &segment.text);
            hash_opt(&mut hasher, &segment.speaker);
            hash_opt(&mut hasher, &segment.emotion);
        }

        Fingerprint(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, speaker: Option<&str>, text: &str) -> Segment {
        Segment {
            id: id.to_string(),
            kind: if speaker.is_some() {
                SegmentKind::Dialogue
            } else {
                SegmentKind::Narration
            },
            text: text.to_string(),
            speaker: speaker.map(String::from),
            emotion: Some("calm".to_string()),
        }
    }

    #[test]
    fn test_apply_update_appends_and_adopts_title() {
        let mut story = StoryState::new();
        let appended = story.apply_update(StoryUpdate {
            title: Some("The Old Fort".to_string()),
            segments: vec![segment("s1", None, "Night falls over the fort.")],
        });

        assert_eq!(appended, 1);
        assert_eq!(story.title(), Some("The Old Fort"));
        assert_eq!(story.len(), 1);

        // A later title never replaces the first.
        story.apply_update(StoryUpdate {
            title: Some("Another Title".to_string()),
            segments: vec![segment("s2", Some("Meera"), "Who goes there?")],
        });
        assert_eq!(story.title(), Some("The Old Fort"));
        assert_eq!(story.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_are_rekeyed() {
        let mut story = StoryState::new();
        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![segment("s1", None, "First.")],
        });
        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![segment("s1", None, "Second.")],
        });

        assert_eq!(story.len(), 2);
        assert_ne!(story.segments()[0].id, story.segments()[1].id);
    }

    #[test]
    fn test_narration_detection() {
        let narrator = segment("s1", Some("Sutradhar"), "The wind howls.");
        assert!(narrator.is_narration());

        let hindi_narrator = segment("s2", Some("सूत्रधार"), "रात गहरी थी।");
        assert!(hindi_narrator.is_narration());

        let unnamed = segment("s3", None, "Silence.");
        assert!(unnamed.is_narration());

        let character = segment("s4", Some("Meera"), "Hello?");
        assert!(!character.is_narration());
    }

    #[test]
    fn test_spoken_text_strips_cues() {
        let s = segment(
            "s1",
            Some("Meera"),
            "(whispering) Who is there? [door creaks] Show yourself!",
        );
        assert_eq!(s.spoken_text(), "Who is there?  Show yourself!");
    }

    #[test]
    fn test_render_script() {
        let mut story = StoryState::new();
        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![
                segment("s1", None, "The fort lay in ruins."),
                segment("s2", Some("Meera"), "(softly) Is anyone here?"),
            ],
        });

        let script = story.render_script();
        assert_eq!(
            script,
            "Sutradhar: The fort lay in ruins.\n\nMeera: Is anyone here?"
        );
    }

    #[test]
    fn test_fingerprint_changes_on_every_mutation() {
        let mut story = StoryState::new();
        let initial = story.fingerprint();

        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![segment("s1", None, "First.")],
        });
        let after_append = story.fingerprint();
        assert_ne!(initial, after_append);

        assert!(story.update_segment("s1", "First, revised."));
        let after_edit = story.fingerprint();
        assert_ne!(after_append, after_edit);

        assert!(story.delete_segment("s1"));
        let after_delete = story.fingerprint();
        assert_ne!(after_edit, after_delete);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let mut a = StoryState::new();
        let mut b = StoryState::new();
        let update = StoryUpdate {
            title: Some("T".to_string()),
            segments: vec![segment("s1", Some("Meera"), "Hello.")],
        };
        a.apply_update(update.clone());
        b.apply_update(update);

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_edit_and_delete_unknown_id() {
        let mut story = StoryState::new();
        assert!(!story.update_segment("missing", "text"));
        assert!(!story.delete_segment("missing"));
    }
}
