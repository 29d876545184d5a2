//! Core project entities: Utterance, Chapter, Character.

use serde::{Deserialize, Serialize};

/// Narration or dialogue. Kept as a real enum in the core model; only the
/// on-disk JSON boundary sees it as a lowercase string (via serde `rename`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceType {
    Narration,
    Dialogue,
}

/// One continuous span of text spoken by a single speaker.
///
/// Created by `ChapterCompiler`; mutated only by `ReviewCodec` import or the
/// optional NLP refiners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    #[serde(rename = "type")]
    pub utterance_type: UtteranceType,
    #[serde(default)]
    pub emotion: Option<String>,
    pub chapter_index: usize,
    pub line_index: usize,
}

impl Utterance {
    pub fn new(
        speaker: impl Into<String>,
        text: impl Into<String>,
        utterance_type: UtteranceType,
        emotion: Option<String>,
        chapter_index: usize,
        line_index: usize,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            utterance_type,
            emotion,
            chapter_index,
            line_index,
        }
    }
}

/// A chapter of source text plus its compiled utterances and render state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub raw_text: String,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default)]
    pub duration_seconds: f64,
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            raw_text: raw_text.into(),
            utterances: Vec::new(),
            source_file: None,
            audio_path: None,
            duration_seconds: 0.0,
        }
    }

    pub fn is_compiled(&self) -> bool {
        !self.utterances.is_empty()
    }

    pub fn is_rendered(&self) -> bool {
        match &self.audio_path {
            Some(path) => std::path::Path::new(path).exists(),
            None => false,
        }
    }

    pub fn word_count(&self) -> usize {
        self.raw_text.split_whitespace().count()
    }

    pub fn estimated_duration_minutes(&self, estimated_wpm: f64) -> f64 {
        if estimated_wpm <= 0.0 {
            return 0.0;
        }
        self.word_count() as f64 / estimated_wpm
    }
}

/// A cast character: display name, assigned voice, and optional defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub voice: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub line_count: usize,
}

impl Character {
    pub fn new(name: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice: voice.into(),
            emotion: None,
            description: None,
            line_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_is_compiled_tracks_utterances() {
        let mut chapter = Chapter::new(0, "Chapter 1", "Some text.");
        assert!(!chapter.is_compiled());
        chapter.utterances.push(Utterance::new(
            "narrator",
            "Some text.",
            UtteranceType::Narration,
            None,
            0,
            0,
        ));
        assert!(chapter.is_compiled());
    }

    #[test]
    fn chapter_is_rendered_requires_existing_file() {
        let mut chapter = Chapter::new(0, "Chapter 1", "text");
        assert!(!chapter.is_rendered());
        chapter.audio_path = Some("/nonexistent/path.wav".to_string());
        assert!(!chapter.is_rendered());
    }

    #[test]
    fn utterance_type_serializes_lowercase() {
        let json = serde_json::to_string(&UtteranceType::Dialogue).unwrap();
        assert_eq!(json, "\"dialogue\"");
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        let chapter = Chapter::new(0, "Chapter 1", "one two  three\nfour");
        assert_eq!(chapter.word_count(), 4);
    }
}
