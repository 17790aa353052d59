//! Single-slot cache for the synthesized audio artifact.
//!
//! The cache avoids resynthesizing audio for narrative state that has not
//! changed. It holds at most one artifact; a hit requires the stored
//! fingerprint to match the fingerprint of the request, so a stale entry can
//! never be served even if an explicit invalidation was missed.

use crate::story::Fingerprint;

/// A synthesized audio artifact, valid for one narrative fingerprint.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Raw PCM16 little-endian bytes.
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Fingerprint of the narrative state this audio was synthesized from.
    pub fingerprint: Fingerprint,
}

/// Holds at most one synthesized artifact.
#[derive(Debug, Default)]
pub struct AudioCache {
    slot: Option<AudioArtifact>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the artifact for the given fingerprint.
    pub fn get(&self, fingerprint: Fingerprint) -> Option<&AudioArtifact> {
        self.slot
            .as_ref()
            .filter(|artifact| artifact.fingerprint == fingerprint)
    }

    /// Store an artifact, replacing any previous one.
    pub fn put(&mut self, artifact: AudioArtifact) -> &AudioArtifact {
        self.slot.insert(artifact)
    }

    /// Drop the cached artifact. Idempotent; called synchronously on every
    /// narrative store mutation.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{StoryState, StoryUpdate};

    fn artifact(fingerprint: Fingerprint) -> AudioArtifact {
        AudioArtifact {
            pcm: vec![0, 0, 1, 0],
            sample_rate: 24_000,
            channels: 1,
            fingerprint,
        }
    }

    #[test]
    fn test_hit_requires_matching_fingerprint() {
        let mut story = StoryState::new();
        let fp_empty = story.fingerprint();

        let mut cache = AudioCache::new();
        assert!(cache.get(fp_empty).is_none());

        cache.put(artifact(fp_empty));
        assert!(cache.get(fp_empty).is_some());

        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![],
        });
        // No segments appended, same content: still a hit.
        assert!(cache.get(story.fingerprint()).is_some());
    }

    #[test]
    fn test_mutation_between_gets_yields_miss() {
        let mut story = StoryState::new();
        story.apply_update(StoryUpdate {
            title: None,
            segments: vec![crate::story::Segment {
                id: "s1".to_string(),
                kind: crate::story::SegmentKind::Narration,
                text: "Before.".to_string(),
                speaker: None,
                emotion: None,
            }],
        });

        let fp = story.fingerprint();
        let mut cache = AudioCache::new();
        cache.put(artifact(fp));
        assert!(cache.get(fp).is_some());

        story.update_segment("s1", "After.");
        assert!(cache.get(story.fingerprint()).is_none());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let fp = StoryState::new().fingerprint();
        let mut cache = AudioCache::new();
        cache.put(artifact(fp));

        cache.invalidate();
        assert!(cache.is_empty());
        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.get(fp).is_none());
    }

    #[test]
    fn test_put_replaces_previous() {
        let mut story = StoryState::new();
        let fp_a = story.fingerprint();
        story.apply_update(StoryUpdate {
            title: Some("T".to_string()),
            segments: vec![],
        });
        let fp_b = story.fingerprint();
        assert_ne!(fp_a, fp_b);

        let mut cache = AudioCache::new();
        cache.put(artifact(fp_a));
        cache.put(artifact(fp_b));

        assert!(cache.get(fp_a).is_none());
        assert!(cache.get(fp_b).is_some());
    }
}
