//! EmotionInferencer: conservative rule+lexicon emotion inference, applied
//! only above a confidence threshold and never over a user-set emotion.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AudiobookError, Result};
use crate::language::{get_profile, LanguageProfile};
use crate::models::Utterance;

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionResult {
    pub label: String,
    pub confidence: f64,
    pub source: &'static str,
}

impl EmotionResult {
    fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            confidence: 0.0,
            source: "none",
        }
    }
}

struct LexiconEntry {
    emotion: &'static str,
    pattern: &'static str,
    confidence: f64,
}

const LEXICON: &[LexiconEntry] = &[
    LexiconEntry { emotion: "angry", pattern: r"(?i)\b(furious|enraged|livid|seething|infuriated)\b", confidence: 0.9 },
    LexiconEntry { emotion: "angry", pattern: r"(?i)\b(angry|mad|outraged|irate|incensed)\b", confidence: 0.85 },
    LexiconEntry { emotion: "angry", pattern: r"(?i)\b(annoyed|irritated|frustrated)\b", confidence: 0.7 },
    LexiconEntry { emotion: "sad", pattern: r"(?i)\b(sobbing|weeping|grieving|mourning|heartbroken)\b", confidence: 0.9 },
    LexiconEntry { emotion: "sad", pattern: r"(?i)\b(crying|tears|sorrowful|miserable|devastated)\b", confidence: 0.85 },
    LexiconEntry { emotion: "sad", pattern: r"(?i)\b(sad|unhappy|gloomy|melancholy)\b", confidence: 0.75 },
    LexiconEntry { emotion: "happy", pattern: r"(?i)\b(ecstatic|overjoyed|elated|jubilant|thrilled)\b", confidence: 0.9 },
    LexiconEntry { emotion: "happy", pattern: r"(?i)\b(delighted|joyful|excited|gleeful|beaming)\b", confidence: 0.85 },
    LexiconEntry { emotion: "happy", pattern: r"(?i)\b(happy|pleased|cheerful|glad|smiling)\b", confidence: 0.75 },
    LexiconEntry { emotion: "fearful", pattern: r"(?i)\b(terrified|petrified|horrified|panic)\b", confidence: 0.9 },
    LexiconEntry { emotion: "fearful", pattern: r"(?i)\b(frightened|scared|afraid|alarmed|trembling)\b", confidence: 0.85 },
    LexiconEntry { emotion: "fearful", pattern: r"(?i)\b(nervous|anxious|worried|uneasy)\b", confidence: 0.7 },
    LexiconEntry { emotion: "whisper", pattern: r"(?i)\b(whispered|hissed|murmured|breathed)\b", confidence: 0.9 },
    LexiconEntry { emotion: "whisper", pattern: r"(?i)\b(softly|quietly|hushed|under\s+(?:his|her|their)\s+breath)\b", confidence: 0.8 },
    LexiconEntry { emotion: "excited", pattern: r"(?i)\b(can't\s+wait|incredible|amazing|fantastic|wonderful)\b", confidence: 0.8 },
    LexiconEntry { emotion: "excited", pattern: r"(?i)\b(eager|enthusiastic|pumped|exhilarated)\b", confidence: 0.85 },
];

static COMPILED_LEXICON: Lazy<Vec<(&'static str, Regex, f64)>> = Lazy::new(|| {
    LEXICON
        .iter()
        .map(|entry| (entry.emotion, Regex::new(entry.pattern).unwrap(), entry.confidence))
        .collect()
});

static MULTI_EXCLAIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"!{2,}").unwrap());

fn punctuation_emotion(text: &str) -> Option<EmotionResult> {
    if MULTI_EXCLAIM.is_match(text) {
        return Some(EmotionResult {
            label: "excited".to_string(),
            confidence: 0.6,
            source: "punctuation",
        });
    }

    let caps_words = text
        .split_whitespace()
        .filter(|w| w.len() > 1 && w.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) && w.chars().any(|c| c.is_alphabetic()))
        .count();
    if caps_words >= 4 {
        return Some(EmotionResult {
            label: "angry".to_string(),
            confidence: 0.6,
            source: "punctuation",
        });
    }

    if text.contains("...") || text.contains('\u{2026}') {
        return Some(EmotionResult {
            label: "sad".to_string(),
            confidence: 0.4,
            source: "punctuation",
        });
    }

    None
}

/// Emotion inference mode: disabled, rule-based (the only implemented
/// engine), or auto (currently equivalent to "rule" — there is no
/// statistical classifier in this pipeline to fall back from).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionMode {
    Off,
    Rule,
    Auto,
}

impl EmotionMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "off" => Ok(Self::Off),
            "rule" => Ok(Self::Rule),
            "auto" => Ok(Self::Auto),
            other => Err(AudiobookError::BadInput(format!(
                "invalid emotion_mode {other:?}. Must be off|rule|auto."
            ))),
        }
    }
}

pub struct EmotionInferencer {
    mode: EmotionMode,
    threshold: f64,
    profile: LanguageProfile,
}

impl EmotionInferencer {
    pub fn new(mode: &str, threshold: f64, profile: Option<LanguageProfile>) -> Result<Self> {
        let profile = match profile {
            Some(p) => p,
            None => get_profile("en")?,
        };
        Ok(Self {
            mode: EmotionMode::parse(mode)?,
            threshold,
            profile,
        })
    }

    pub fn infer(&self, utterance_text: &str, context: &str, existing_emotion: Option<&str>) -> EmotionResult {
        if self.mode == EmotionMode::Off {
            return EmotionResult::neutral();
        }

        if let Some(emotion) = existing_emotion {
            return EmotionResult {
                label: emotion.to_string(),
                confidence: 1.0,
                source: "explicit",
            };
        }

        let combined = format!("{context} {utterance_text}").trim().to_string();

        let verb_result = self.check_verb_hints(&combined);
        if let Some(result) = &verb_result {
            if result.confidence >= self.threshold {
                return result.clone();
            }
        }

        let lex_result = check_lexicon(&combined);
        if let Some(result) = &lex_result {
            if result.confidence >= self.threshold {
                return result.clone();
            }
        }

        let punct_result = punctuation_emotion(utterance_text);
        if let Some(result) = &punct_result {
            if result.confidence >= self.threshold {
                return result.clone();
            }
        }

        let best = verb_result.or(lex_result).or(punct_result);
        match best {
            Some(result) if result.confidence > 0.0 => EmotionResult {
                label: "neutral".to_string(),
                confidence: result.confidence,
                source: result.source,
            },
            _ => EmotionResult::neutral(),
        }
    }

    fn check_verb_hints(&self, text: &str) -> Option<EmotionResult> {
        let pattern = self.profile.emotion_verb_pattern()?;
        let captures = pattern.captures(text)?;
        let verb = captures.get(1)?.as_str().to_lowercase();
        let emotion = self.profile.emotion_hints.get(&verb)?;
        Some(EmotionResult {
            label: emotion.clone(),
            confidence: 0.85,
            source: "verb",
        })
    }

    /// Apply inference to every utterance lacking an emotion already,
    /// updating them in place. Returns the number of emotions applied.
    pub fn apply_to_utterances(&self, utterances: &mut [Utterance], chapter_text: &str) -> usize {
        let mut applied = 0;
        for utterance in utterances.iter_mut() {
            if utterance.emotion.is_some() {
                continue;
            }
            let result = self.infer(&utterance.text, chapter_text, None);
            if result.label != "neutral" && result.confidence >= self.threshold {
                utterance.emotion = Some(result.label);
                applied += 1;
            }
        }
        applied
    }
}

fn check_lexicon(text: &str) -> Option<EmotionResult> {
    let mut best: Option<EmotionResult> = None;
    for (emotion, pattern, confidence) in COMPILED_LEXICON.iter() {
        if pattern.is_match(text) {
            let better = match &best {
                Some(current) => *confidence > current.confidence,
                None => true,
            };
            if better {
                best = Some(EmotionResult {
                    label: emotion.to_string(),
                    confidence: *confidence,
                    source: "lexicon",
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UtteranceType;

    fn inferencer(threshold: f64) -> EmotionInferencer {
        EmotionInferencer::new("rule", threshold, None).unwrap()
    }

    #[test]
    fn off_mode_always_returns_neutral() {
        let inferencer = EmotionInferencer::new("off", 0.75, None).unwrap();
        let result = inferencer.infer("I am absolutely furious!", "", None);
        assert_eq!(result.label, "neutral");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn explicit_emotion_is_preserved_with_full_confidence() {
        let inferencer = inferencer(0.75);
        let result = inferencer.infer("Hello.", "", Some("sad"));
        assert_eq!(result.label, "sad");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.source, "explicit");
    }

    #[test]
    fn lexicon_match_above_threshold_is_applied() {
        let inferencer = inferencer(0.75);
        let result = inferencer.infer("I am absolutely furious with you.", "", None);
        assert_eq!(result.label, "angry");
        assert_eq!(result.source, "lexicon");
    }

    #[test]
    fn below_threshold_match_reports_neutral_label_but_real_confidence() {
        let inferencer = inferencer(0.95);
        let result = inferencer.infer("I am annoyed.", "", None);
        assert_eq!(result.label, "neutral");
        assert!(result.confidence > 0.0);
        assert_eq!(result.source, "lexicon");
    }

    #[test]
    fn multiple_exclamation_marks_trigger_excited() {
        let inferencer = inferencer(0.5);
        let result = inferencer.infer("Wait!!", "", None);
        assert_eq!(result.label, "excited");
        assert_eq!(result.source, "punctuation");
    }

    #[test]
    fn all_caps_text_triggers_angry() {
        let inferencer = inferencer(0.5);
        let result = inferencer.infer("GET OUT OF MY HOUSE NOW", "", None);
        assert_eq!(result.label, "angry");
    }

    #[test]
    fn apply_to_utterances_skips_already_set_emotions() {
        let inferencer = inferencer(0.7);
        let mut utterances = vec![Utterance::new(
            "alice",
            "I am furious about this.",
            UtteranceType::Dialogue,
            Some("calm".to_string()),
            0,
            0,
        )];
        let applied = inferencer.apply_to_utterances(&mut utterances, "");
        assert_eq!(applied, 0);
        assert_eq!(utterances[0].emotion.as_deref(), Some("calm"));
    }

    #[test]
    fn apply_to_utterances_sets_inferred_emotion() {
        let inferencer = inferencer(0.7);
        let mut utterances = vec![Utterance::new(
            "alice",
            "I am furious about this.",
            UtteranceType::Dialogue,
            None,
            0,
            0,
        )];
        let applied = inferencer.apply_to_utterances(&mut utterances, "");
        assert_eq!(applied, 1);
        assert_eq!(utterances[0].emotion.as_deref(), Some("angry"));
    }
}
