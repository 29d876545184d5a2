//! Immutable per-language rules driving dialogue detection, speaker
//! attribution, and chapter splitting.

mod en;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AudiobookError, Result};

/// A `(open, close)` literal pair bounding a dialogue span.
pub type QuotePair = (&'static str, &'static str);

/// Immutable rules for one language: quote conventions, speech verbs,
/// emotion hints, blacklisted non-names, and chapter/scene-break patterns.
///
/// Said-pattern and emotion-verb regexes are compiled once at construction
/// (`LanguageProfile::new`) rather than lazily, since profile values never
/// change after being built.
#[derive(Clone)]
pub struct LanguageProfile {
    pub code: String,
    pub name: String,
    pub dialogue_quotes: Vec<QuotePair>,
    pub smart_quotes: Vec<QuotePair>,
    pub single_quotes: Vec<QuotePair>,
    pub speaker_verbs: HashSet<String>,
    pub emotion_hints: HashMap<String, String>,
    pub speaker_blacklist: HashSet<String>,
    pub valid_name_pattern: String,
    pub chapter_patterns: Vec<String>,
    pub scene_break_patterns: Vec<String>,

    valid_name_regex: Regex,
    said_patterns: Vec<Regex>,
    emotion_verb_pattern: Option<Regex>,
    chapter_regexes: Vec<Regex>,
    scene_break_regexes: Vec<Regex>,
}

impl std::fmt::Debug for LanguageProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageProfile")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish()
    }
}

pub struct LanguageProfileSpec {
    pub code: &'static str,
    pub name: &'static str,
    pub dialogue_quotes: Vec<QuotePair>,
    pub smart_quotes: Vec<QuotePair>,
    pub single_quotes: Vec<QuotePair>,
    pub speaker_verbs: &'static [&'static str],
    pub emotion_hints: &'static [(&'static str, &'static str)],
    pub speaker_blacklist: &'static [&'static str],
    pub valid_name_pattern: &'static str,
    pub chapter_patterns: &'static [&'static str],
    pub scene_break_patterns: &'static [&'static str],
}

impl LanguageProfile {
    fn new(spec: LanguageProfileSpec) -> Self {
        let speaker_verbs: HashSet<String> =
            spec.speaker_verbs.iter().map(|s| s.to_string()).collect();
        let emotion_hints: HashMap<String, String> = spec
            .emotion_hints
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let speaker_blacklist: HashSet<String> = spec
            .speaker_blacklist
            .iter()
            .map(|s| s.to_string())
            .collect();
        let valid_name_regex =
            Regex::new(spec.valid_name_pattern).expect("valid_name_pattern must compile");
        let said_patterns = build_said_patterns(&speaker_verbs);
        let emotion_verb_pattern = build_emotion_verb_pattern(&speaker_verbs, &emotion_hints);
        let chapter_regexes = spec
            .chapter_patterns
            .iter()
            .map(|p| Regex::new(p).expect("chapter pattern must compile"))
            .collect();
        let scene_break_regexes = spec
            .scene_break_patterns
            .iter()
            .map(|p| Regex::new(p).expect("scene break pattern must compile"))
            .collect();

        Self {
            code: spec.code.to_string(),
            name: spec.name.to_string(),
            dialogue_quotes: spec.dialogue_quotes,
            smart_quotes: spec.smart_quotes,
            single_quotes: spec.single_quotes,
            speaker_verbs,
            emotion_hints,
            speaker_blacklist,
            valid_name_pattern: spec.valid_name_pattern.to_string(),
            chapter_patterns: spec.chapter_patterns.iter().map(|s| s.to_string()).collect(),
            scene_break_patterns: spec
                .scene_break_patterns
                .iter()
                .map(|s| s.to_string())
                .collect(),
            valid_name_regex,
            said_patterns,
            emotion_verb_pattern,
            chapter_regexes,
            scene_break_regexes,
        }
    }

    /// Casefold + strip; the canonical lookup key for a speaker name.
    pub fn normalize_name(s: &str) -> String {
        s.trim().to_lowercase()
    }

    pub fn is_valid_name(&self, s: &str) -> bool {
        self.valid_name_regex.is_match(s)
    }

    /// The two said-patterns: verb-before-name and name-before-verb.
    pub fn said_patterns(&self) -> &[Regex] {
        &self.said_patterns
    }

    pub fn emotion_verb_pattern(&self) -> Option<&Regex> {
        self.emotion_verb_pattern.as_ref()
    }

    pub fn chapter_regexes(&self) -> &[Regex] {
        &self.chapter_regexes
    }

    pub fn scene_break_regexes(&self) -> &[Regex] {
        &self.scene_break_regexes
    }

    pub fn is_scene_break(&self, line: &str) -> bool {
        self.scene_break_regexes.iter().any(|r| r.is_match(line.trim()))
    }
}

/// Builds the verb-before-name and name-before-verb said-patterns from a
/// sorted, regex-escaped verb alternation.
fn build_said_patterns(speaker_verbs: &HashSet<String>) -> Vec<Regex> {
    let mut verbs: Vec<&String> = speaker_verbs.iter().collect();
    verbs.sort();
    let verb_alt = verbs
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");

    let verb_before_name = format!(
        r"(?i)(?:{})\s+([A-Z][a-z]+)(?:\s|[,.\!\?]|$)",
        verb_alt
    );
    let name_before_verb = format!(r"(?i)([A-Z][a-z]+)\s+(?:{})", verb_alt);

    vec![
        Regex::new(&verb_before_name).expect("verb-before-name pattern must compile"),
        Regex::new(&name_before_verb).expect("name-before-verb pattern must compile"),
    ]
}

/// Only verbs that both appear in speaker_verbs *and* have an emotion-hint
/// entry are included.
fn build_emotion_verb_pattern(
    speaker_verbs: &HashSet<String>,
    emotion_hints: &HashMap<String, String>,
) -> Option<Regex> {
    let mut verbs: Vec<&String> = speaker_verbs
        .iter()
        .filter(|v| emotion_hints.contains_key(v.as_str()))
        .collect();
    if verbs.is_empty() {
        return None;
    }
    verbs.sort();
    let verb_alt = verbs
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    Some(Regex::new(&format!(r"(?i)\b({})\b", verb_alt)).expect("emotion verb pattern must compile"))
}

static PROFILES: Lazy<Mutex<HashMap<String, LanguageProfile>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn ensure_bootstrapped() {
    let mut profiles = PROFILES.lock().unwrap();
    if profiles.is_empty() {
        profiles.insert("en".to_string(), LanguageProfile::new(en::spec()));
    }
}

/// Register a profile under its own `code`, replacing any existing entry.
pub fn register_profile(profile: LanguageProfile) {
    let mut profiles = PROFILES.lock().unwrap();
    profiles.insert(profile.code.clone(), profile);
}

/// Look up a profile by code, lazily bootstrapping the English profile on
/// first access. Errors with `UnsupportedLanguage` if the code is unknown.
pub fn get_profile(code: &str) -> Result<LanguageProfile> {
    ensure_bootstrapped();
    let profiles = PROFILES.lock().unwrap();
    profiles
        .get(code)
        .cloned()
        .ok_or_else(|| AudiobookError::UnsupportedLanguage(code.to_string()))
}

pub fn available_profiles() -> Vec<String> {
    ensure_bootstrapped();
    let profiles = PROFILES.lock().unwrap();
    let mut codes: Vec<String> = profiles.keys().cloned().collect();
    codes.sort();
    codes
}
