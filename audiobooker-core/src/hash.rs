//! HashKit: stable cache keys over text, casting, and audio-affecting
//! config. Hashes depend on *only* audio-affecting inputs — see spec §4.G.

use sha2::{Digest, Sha256};

use crate::casting::CastingTable;
use crate::models::Chapter;
use crate::project::ProjectConfig;

pub fn sha256_text(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Canonical-JSON SHA-256: sorted keys, no whitespace, UTF-8.
pub fn sha256_json(value: &serde_json::Value) -> String {
    sha256_text(&canonical_json(value))
}

/// Renders `value` with keys sorted and minimal separators. `serde_json`
/// preserves map insertion order, so canonicalization re-sorts any object's
/// keys (recursively) before serializing.
fn canonical_json(value: &serde_json::Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("canonical JSON value must serialize")
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

pub fn text_hash(chapter: &Chapter) -> String {
    sha256_text(&chapter.raw_text)
}

pub fn casting_hash(table: &CastingTable) -> String {
    let mut characters = serde_json::Map::new();
    for (key, character) in &table.characters {
        characters.insert(
            key.clone(),
            serde_json::json!({
                "voice": character.voice,
                "emotion": character.emotion,
            }),
        );
    }
    let value = serde_json::json!({
        "characters": characters,
        "fallback_voice_id": table.fallback_voice_id,
    });
    sha256_json(&value)
}

pub fn render_params_hash(config: &ProjectConfig) -> String {
    let value = serde_json::json!({
        "sample_rate": config.sample_rate,
        "narrator_pause_ms": config.narrator_pause_ms,
        "dialogue_pause_ms": config.dialogue_pause_ms,
    });
    sha256_json(&value)
}
