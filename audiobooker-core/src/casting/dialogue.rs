//! DialogueSegmenter, SpeakerAttributor, and ChapterCompiler: the core
//! compilation pipeline turning chapter prose into speaker-attributed
//! utterances.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::casting::CastingTable;
use crate::error::{AudiobookError, Result};
use crate::language::LanguageProfile;
use crate::models::{Chapter, Utterance, UtteranceType};

static PARAGRAPH_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph boundary pattern must compile"));

static INLINE_OVERRIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]|]+)(?:\|([^\]]+))?\]\s*").expect("override pattern must compile"));

/// One dialogue/narration span: `(content, is_dialogue, start, end)`.
pub type Span = (String, bool, usize, usize);

fn escape_for_char_class(c: &str) -> String {
    let mut escaped = String::new();
    for ch in c.chars() {
        if matches!(ch, '\\' | ']' | '^' | '-') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn build_quote_regex(open: &str, close: &str) -> Regex {
    let pattern = format!(
        "{}([^{}]+){}",
        regex::escape(open),
        escape_for_char_class(close),
        regex::escape(close)
    );
    Regex::new(&pattern).expect("quote pattern must compile")
}

/// Splits `text` into alternating narration/dialogue spans covering the
/// whole input with no overlap. See spec §4.B.
pub fn segment_dialogue(text: &str, profile: &LanguageProfile, include_single_quotes: bool) -> Vec<Span> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    pairs.extend(profile.dialogue_quotes.iter().copied());
    pairs.extend(profile.smart_quotes.iter().copied());
    if include_single_quotes {
        pairs.extend(profile.single_quotes.iter().copied());
    }

    let mut accepted: Vec<(usize, usize, String)> = Vec::new();
    for (open, close) in pairs {
        let regex = build_quote_regex(open, close);
        for m in regex.captures_iter(text) {
            let whole = m.get(0).unwrap();
            let (start, end) = (whole.start(), whole.end());
            let overlaps = accepted.iter().any(|(s, e, _)| *s <= start && start < *e);
            if !overlaps {
                let content = m.get(1).unwrap().as_str().to_string();
                accepted.push((start, end, content));
            }
        }
    }
    accepted.sort_by_key(|(start, _, _)| *start);

    let mut spans = Vec::new();
    let mut pos = 0usize;
    for (start, end, content) in accepted {
        if start > pos {
            let narration = text[pos..start].trim();
            if !narration.is_empty() {
                spans.push((narration.to_string(), false, pos, start));
            }
        }
        spans.push((content, true, start, end));
        pos = end;
    }
    if pos < text.len() {
        let remaining = text[pos..].trim();
        if !remaining.is_empty() {
            spans.push((remaining.to_string(), false, pos, text.len()));
        }
    }
    spans
}

/// Strips a leading `[Name]` or `[Name|emotion]` override, if present, from
/// the very start of `text`. Returns `(name, emotion, remainder)`.
pub fn parse_inline_override(text: &str) -> (Option<String>, Option<String>, String) {
    if let Some(captures) = INLINE_OVERRIDE.captures(text) {
        let whole = captures.get(0).unwrap();
        let name = captures.get(1).unwrap().as_str().trim().to_string();
        let emotion = captures.get(2).map(|m| m.as_str().trim().to_string());
        let remainder = text[whole.end()..].to_string();
        (Some(name), emotion, remainder)
    } else {
        (None, None, text.to_string())
    }
}

fn prev_char_boundary(text: &str, pos: usize, n_chars: usize) -> usize {
    let prefix = &text[..pos];
    let mut boundary = pos;
    let mut seen = 0usize;
    for (i, _) in prefix.char_indices().rev() {
        if seen == n_chars {
            break;
        }
        boundary = i;
        seen += 1;
    }
    boundary
}

fn next_char_boundary(text: &str, pos: usize, n_chars: usize) -> usize {
    let suffix = &text[pos..];
    let mut boundary = pos;
    let mut seen = 0usize;
    for (i, c) in suffix.char_indices() {
        if seen == n_chars {
            break;
        }
        boundary = pos + i + c.len_utf8();
        seen += 1;
    }
    boundary
}

fn is_valid_speaker_name(name: &str, casting: &CastingTable, profile: &LanguageProfile) -> bool {
    if name.is_empty() {
        return false;
    }
    let normalized = LanguageProfile::normalize_name(name);
    if casting.characters.contains_key(&normalized) {
        return true;
    }
    if profile.speaker_blacklist.contains(&normalized) {
        return false;
    }
    profile.is_valid_name(name)
}

/// Infers a speaker and optional emotion for a dialogue span from the 100
/// characters of context preceding and following it. See spec §4.C.
pub fn extract_speaker_from_context(
    text: &str,
    dialogue_start: usize,
    dialogue_end: usize,
    casting: &CastingTable,
    profile: &LanguageProfile,
) -> (Option<String>, Option<String>) {
    let before_start = prev_char_boundary(text, dialogue_start, 100);
    let after_end = next_char_boundary(text, dialogue_end, 100);
    let window_before = &text[before_start..dialogue_start];
    let window_after = &text[dialogue_end..after_end];
    let context = format!("{} {}", window_before, window_after);

    for pattern in profile.said_patterns() {
        if let Some(captures) = pattern.captures(&context) {
            let speaker = captures.get(1).unwrap().as_str().to_string();
            if !is_valid_speaker_name(&speaker, casting, profile) {
                continue;
            }

            let emotion = profile.emotion_verb_pattern().and_then(|verb_pattern| {
                verb_pattern.captures(&context).and_then(|m| {
                    let verb = m.get(1).unwrap().as_str().to_lowercase();
                    profile.emotion_hints.get(&verb).cloned()
                })
            });
            return (Some(speaker), emotion);
        }
    }
    (None, None)
}

/// Combines `segment_dialogue` and `extract_speaker_from_context` into an
/// ordered utterance sequence for one chapter, replacing its utterance list.
/// See spec §4.D.
pub fn compile_chapter(
    chapter: &mut Chapter,
    casting: &mut CastingTable,
    profile: &LanguageProfile,
    include_single_quotes: bool,
) -> Result<()> {
    if profile.speaker_verbs.is_empty() && profile.said_patterns().is_empty() {
        return Err(AudiobookError::CompilationError(
            "language profile has no speech verbs and no said-patterns".to_string(),
        ));
    }

    let mut utterances = Vec::new();
    let mut line_index = 0usize;

    for paragraph in PARAGRAPH_BOUNDARY.split(&chapter.raw_text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let (override_name, override_emotion, remainder) = parse_inline_override(paragraph);
        let spans = segment_dialogue(&remainder, profile, include_single_quotes);

        if spans.is_empty() {
            utterances.push(Utterance::new(
                override_name.unwrap_or_else(|| "narrator".to_string()),
                remainder,
                UtteranceType::Narration,
                override_emotion,
                chapter.index,
                line_index,
            ));
            line_index += 1;
            continue;
        }

        for (content, is_dialogue, start, end) in spans {
            if content.trim().is_empty() {
                continue;
            }

            let utterance = if is_dialogue {
                let (speaker, emotion) = if let Some(name) = &override_name {
                    (name.clone(), override_emotion.clone())
                } else {
                    let (speaker, emotion) =
                        extract_speaker_from_context(&remainder, start, end, casting, profile);
                    (speaker.unwrap_or_else(|| "unknown".to_string()), emotion)
                };
                Utterance::new(
                    speaker,
                    content,
                    UtteranceType::Dialogue,
                    emotion,
                    chapter.index,
                    line_index,
                )
            } else {
                Utterance::new(
                    "narrator",
                    content,
                    UtteranceType::Narration,
                    None,
                    chapter.index,
                    line_index,
                )
            };
            utterances.push(utterance);
            line_index += 1;
        }
    }

    for utterance in &utterances {
        let key = LanguageProfile::normalize_name(&utterance.speaker);
        if let Some(character) = casting.characters.get_mut(&key) {
            character.line_count += 1;
        }
    }

    chapter.utterances = utterances;
    Ok(())
}

/// Render a chapter's utterances as a `[S1:speaker] (emotion) text` script,
/// assigning each distinct normalized speaker a stable `S<n>` id in order
/// of first appearance.
pub fn utterances_to_script(utterances: &[Utterance]) -> String {
    let mut speaker_ids: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut next_id = 1;
    let mut lines = Vec::with_capacity(utterances.len());

    for utterance in utterances {
        let speaker = LanguageProfile::normalize_name(&utterance.speaker);
        let sid = speaker_ids.entry(speaker.clone()).or_insert_with(|| {
            let id = format!("S{next_id}");
            next_id += 1;
            id
        });
        let emotion_part = match &utterance.emotion {
            Some(emotion) => format!("({emotion}) "),
            None => String::new(),
        };
        lines.push(format!("[{sid}:{speaker}] {emotion_part}{}", utterance.text));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::get_profile;

    fn profile() -> LanguageProfile {
        get_profile("en").unwrap()
    }

    #[test]
    fn segment_dialogue_empty_input_yields_empty_list() {
        assert!(segment_dialogue("", &profile(), false).is_empty());
    }

    #[test]
    fn segment_dialogue_pure_narration_yields_single_span() {
        let spans = segment_dialogue("She walked home.", &profile(), false);
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].1);
    }

    #[test]
    fn segment_dialogue_alternates_narration_and_dialogue() {
        let spans = segment_dialogue(
            r#"She opened the door. "Hello?" said Alice."#,
            &profile(),
            false,
        );
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].0, "She opened the door.");
        assert!(!spans[0].1);
        assert_eq!(spans[1].0, "Hello?");
        assert!(spans[1].1);
    }

    #[test]
    fn segment_dialogue_unmatched_opening_quote_yields_no_dialogue() {
        let spans = segment_dialogue(r#"She said, "hello without a closing quote."#, &profile(), false);
        assert!(spans.iter().all(|(_, is_dialogue, _, _)| !is_dialogue));
    }

    #[test]
    fn parse_inline_override_extracts_name_and_emotion() {
        let (name, emotion, remainder) = parse_inline_override("[Bob|angry] \"Get out!\"");
        assert_eq!(name.as_deref(), Some("Bob"));
        assert_eq!(emotion.as_deref(), Some("angry"));
        assert_eq!(remainder, "\"Get out!\"");
    }

    #[test]
    fn parse_inline_override_without_emotion() {
        let (name, emotion, remainder) = parse_inline_override("[Alice] Hello.");
        assert_eq!(name.as_deref(), Some("Alice"));
        assert_eq!(emotion, None);
        assert_eq!(remainder, "Hello.");
    }

    #[test]
    fn parse_inline_override_no_tag_returns_original() {
        let (name, emotion, remainder) = parse_inline_override("Plain text.");
        assert_eq!(name, None);
        assert_eq!(emotion, None);
        assert_eq!(remainder, "Plain text.");
    }

    #[test]
    fn extract_speaker_from_context_verb_before_name() {
        let text = r#"She opened the door. "Hello?" said Alice."#;
        let casting = {
            let mut c = CastingTable::new();
            c.cast("Alice", "af_sky", None, None);
            c
        };
        let dialogue_start = text.find("\"Hello?\"").unwrap();
        let dialogue_end = dialogue_start + "\"Hello?\"".len();
        let (speaker, emotion) =
            extract_speaker_from_context(text, dialogue_start, dialogue_end, &casting, &profile());
        assert_eq!(speaker.as_deref(), Some("Alice"));
        assert_eq!(emotion, None);
    }

    #[test]
    fn extract_speaker_from_context_verb_carries_emotion() {
        let text = r#""Run!" screamed Tom."#;
        let mut casting = CastingTable::new();
        casting.cast("Tom", "am_liam", None, None);
        let dialogue_start = 0;
        let dialogue_end = "\"Run!\"".len();
        let (speaker, emotion) =
            extract_speaker_from_context(text, dialogue_start, dialogue_end, &casting, &profile());
        assert_eq!(speaker.as_deref(), Some("Tom"));
        assert_eq!(emotion.as_deref(), Some("fearful"));
    }

    #[test]
    fn extract_speaker_from_context_blacklisted_word_rejected() {
        let text = r#""Stop it," she said."#;
        let casting = CastingTable::new();
        let dialogue_start = 0;
        let dialogue_end = "\"Stop it,\"".len();
        let (speaker, _) =
            extract_speaker_from_context(text, dialogue_start, dialogue_end, &casting, &profile());
        assert_eq!(speaker, None);
    }

    #[test]
    fn compile_chapter_attribution_with_verb_before_name() {
        let mut chapter = Chapter::new(0, "Chapter 1", r#"She opened the door. "Hello?" said Alice."#);
        let mut casting = CastingTable::new();
        casting.cast("Alice", "af_sky", None, None);
        compile_chapter(&mut chapter, &mut casting, &profile(), false).unwrap();

        assert_eq!(chapter.utterances.len(), 2);
        assert_eq!(chapter.utterances[0].speaker, "narrator");
        assert_eq!(chapter.utterances[0].text, "She opened the door.");
        assert_eq!(chapter.utterances[1].speaker, "Alice");
        assert_eq!(chapter.utterances[1].text, "Hello?");
        assert_eq!(chapter.utterances[1].emotion, None);
    }

    #[test]
    fn compile_chapter_inline_override_overrides_attribution_and_emotion() {
        let mut chapter = Chapter::new(0, "Chapter 1", r#"[Bob|angry] "Get out!" whispered someone."#);
        let mut casting = CastingTable::new();
        compile_chapter(&mut chapter, &mut casting, &profile(), false).unwrap();

        assert_eq!(chapter.utterances.len(), 1);
        assert_eq!(chapter.utterances[0].speaker, "Bob");
        assert_eq!(chapter.utterances[0].text, "Get out!");
        assert_eq!(chapter.utterances[0].emotion.as_deref(), Some("angry"));
    }

    #[test]
    fn compile_chapter_verb_carried_emotion() {
        let mut chapter = Chapter::new(0, "Chapter 1", r#""Run!" screamed Tom."#);
        let mut casting = CastingTable::new();
        casting.cast("Tom", "am_liam", None, None);
        compile_chapter(&mut chapter, &mut casting, &profile(), false).unwrap();

        assert_eq!(chapter.utterances.len(), 1);
        assert_eq!(chapter.utterances[0].speaker, "Tom");
        assert_eq!(chapter.utterances[0].emotion.as_deref(), Some("fearful"));
    }

    #[test]
    fn compile_chapter_updates_line_counts() {
        let mut chapter = Chapter::new(
            0,
            "Chapter 1",
            "\"Hi\" said Alice.\n\n\"Hi again\" said Alice.",
        );
        let mut casting = CastingTable::new();
        casting.cast("Alice", "af_sky", None, None);
        compile_chapter(&mut chapter, &mut casting, &profile(), false).unwrap();
        assert_eq!(casting.characters.get("alice").unwrap().line_count, 2);
    }

    #[test]
    fn compile_chapter_line_indexes_are_dense_from_zero() {
        let mut chapter = Chapter::new(
            0,
            "Chapter 1",
            "Para one.\n\nPara two.\n\nPara three.",
        );
        let mut casting = CastingTable::new();
        compile_chapter(&mut chapter, &mut casting, &profile(), false).unwrap();
        let indexes: Vec<usize> = chapter.utterances.iter().map(|u| u.line_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn utterances_to_script_assigns_stable_speaker_ids_in_order() {
        let utterances = vec![
            Utterance::new("Alice", "Hi.", UtteranceType::Dialogue, None, 0, 0),
            Utterance::new("narrator", "She waved.", UtteranceType::Narration, None, 0, 1),
            Utterance::new("Alice", "Bye.", UtteranceType::Dialogue, Some("sad".to_string()), 0, 2),
        ];
        let script = utterances_to_script(&utterances);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "[S1:alice] Hi.");
        assert_eq!(lines[1], "[S2:narrator] She waved.");
        assert_eq!(lines[2], "[S1:alice] (sad) Bye.");
    }

    proptest::proptest! {
        #[test]
        fn prop_segment_dialogue_never_panics(text in "\\PC{0,500}") {
            let _ = segment_dialogue(&text, &profile(), false);
        }

        #[test]
        fn prop_segment_dialogue_spans_are_ordered_and_non_overlapping(text in "\\PC{0,500}") {
            let spans = segment_dialogue(&text, &profile(), false);
            for window in spans.windows(2) {
                proptest::prop_assert!(window[0].3 <= window[1].2);
            }
        }
    }
}
