//! CastingTable: the normalized speaker-to-voice map, and the dialogue
//! compilation pipeline built on top of it.

pub mod dialogue;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::LanguageProfile;
use crate::models::Character;

fn default_narrator() -> String {
    "narrator".to_string()
}

fn default_fallback_voice() -> String {
    "af_heart".to_string()
}

/// Unknown-speaker-at-render-time policy. Serialized as a plain string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCharacterBehavior {
    Narrator,
    Skip,
    Ask,
}

impl Default for UnknownCharacterBehavior {
    fn default() -> Self {
        UnknownCharacterBehavior::Narrator
    }
}

/// Mapping `normalize(name) -> Character`, plus fallback policy.
///
/// A `BTreeMap` keeps iteration in normalized-key order, which is what
/// `casting_hash` relies on for its order-invariance guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastingTable {
    pub characters: BTreeMap<String, Character>,
    #[serde(default = "default_narrator")]
    pub default_narrator: String,
    #[serde(default = "default_fallback_voice")]
    pub fallback_voice_id: String,
    #[serde(default)]
    pub unknown_character_behavior: UnknownCharacterBehavior,
}

impl Default for CastingTable {
    fn default() -> Self {
        Self {
            characters: BTreeMap::new(),
            default_narrator: default_narrator(),
            fallback_voice_id: default_fallback_voice(),
            unknown_character_behavior: UnknownCharacterBehavior::default(),
        }
    }
}

impl CastingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize_key(name: &str) -> String {
        LanguageProfile::normalize_name(name)
    }

    /// Insert or replace a character. Replacing preserves the
    /// most-recently-supplied display form of `name`.
    pub fn cast(
        &mut self,
        name: impl Into<String>,
        voice: impl Into<String>,
        emotion: Option<String>,
        description: Option<String>,
    ) {
        let name = name.into();
        let key = Self::normalize_key(&name);
        let mut character = Character::new(name, voice);
        character.emotion = emotion;
        character.description = description;
        // Preserve the line_count statistic across a re-cast of the same key.
        if let Some(existing) = self.characters.get(&key) {
            character.line_count = existing.line_count;
        }
        self.characters.insert(key, character);
    }

    /// Lookup rule: exact normalized key, else default_narrator entry, else
    /// the fallback voice with no emotion.
    pub fn get_voice(&self, speaker: &str) -> (String, Option<String>) {
        let key = Self::normalize_key(speaker);
        if let Some(character) = self.characters.get(&key) {
            return (character.voice.clone(), character.emotion.clone());
        }
        if let Some(narrator) = self.characters.get(&self.default_narrator) {
            return (narrator.voice.clone(), narrator.emotion.clone());
        }
        (self.fallback_voice_id.clone(), None)
    }

    pub fn voice_mapping(&self) -> BTreeMap<String, String> {
        self.characters
            .iter()
            .map(|(key, character)| (key.clone(), character.voice.clone()))
            .collect()
    }

    pub fn is_known_name(&self, name: &str) -> bool {
        self.characters.contains_key(&Self::normalize_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_replaces_entry_preserving_display_form() {
        let mut table = CastingTable::new();
        table.cast("Alice", "af_jessica", None, None);
        table.cast("ALICE", "af_sky", None, None);
        let character = table.characters.get("alice").unwrap();
        assert_eq!(character.name, "ALICE");
        assert_eq!(character.voice, "af_sky");
    }

    #[test]
    fn get_voice_falls_back_to_narrator_then_fallback() {
        let mut table = CastingTable::new();
        table.cast("narrator", "af_heart", None, None);
        assert_eq!(
            table.get_voice("Alice"),
            ("af_heart".to_string(), None)
        );

        let mut bare = CastingTable::new();
        bare.fallback_voice_id = "af_fallback".to_string();
        assert_eq!(
            bare.get_voice("Nobody"),
            ("af_fallback".to_string(), None)
        );
    }

    #[test]
    fn get_voice_exact_key_wins_over_narrator() {
        let mut table = CastingTable::new();
        table.cast("narrator", "af_heart", None, None);
        table.cast("Alice", "af_sky", Some("nervous".to_string()), None);
        assert_eq!(
            table.get_voice("alice"),
            ("af_sky".to_string(), Some("nervous".to_string()))
        );
    }

    #[test]
    fn voice_mapping_uses_normalized_keys() {
        let mut table = CastingTable::new();
        table.cast("Alice", "af_sky", None, None);
        let mapping = table.voice_mapping();
        assert_eq!(mapping.get("alice"), Some(&"af_sky".to_string()));
    }
}
