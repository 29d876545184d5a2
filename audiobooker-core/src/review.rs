//! ReviewCodec: human-editable review-before-render script format.
//!
//! Format:
//! ```text
//! === Chapter 1: The Beginning ===
//!
//! @narrator
//! The door creaked open.
//!
//! @Alice (nervous)
//! "Hello? Is anyone there?"
//! ```
//!
//! Lines starting with `@` are speaker tags (`@Name` or `@Name (emotion)`).
//! Lines starting with `===` are chapter markers. Lines starting with `#`
//! are comments, ignored on import. Deleting a speaker block removes it.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AudiobookError, Result};
use crate::models::{Utterance, UtteranceType};
use crate::project::ProjectDocument;

static SPEAKER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@(\w+)(?:\s*\(([^)]+)\))?$").unwrap());
static CHAPTER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^===\s*(.+?)\s*===$").unwrap());

#[derive(Debug, Clone, Default)]
pub struct ImportStats {
    pub chapters_updated: usize,
    pub utterances_imported: usize,
    pub speakers_found: Vec<String>,
}

/// Normalize CRLF and stray CR line endings to LF before splitting lines,
/// so review files edited on Windows import identically to Unix-edited ones.
fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

pub fn export_for_review(project: &ProjectDocument, output_path: Option<&Path>) -> Result<std::path::PathBuf> {
    let output_path = match output_path {
        Some(p) => p.to_path_buf(),
        None => std::path::PathBuf::from(format!("{}_review.txt", project.title)),
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push("# Audiobooker Review File".to_string());
    lines.push(format!("# Title: {}", project.title));
    lines.push(format!("# Author: {}", project.author));
    lines.push("#".to_string());
    lines.push("# Instructions:".to_string());
    lines.push("#   - Edit speaker names by changing @OldName to @NewName".to_string());
    lines.push("#   - Edit emotions by changing @Name (old) to @Name (new)".to_string());
    lines.push("#   - Delete entire speaker blocks to remove them".to_string());
    lines.push("#   - Add emotions: @narrator -> @narrator (somber)".to_string());
    lines.push("#   - Lines starting with # are comments (ignored)".to_string());
    lines.push("#".to_string());
    lines.push(format!(
        "# After editing, import with: audiobooker review-import {}",
        output_path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    ));
    lines.push(String::new());

    for chapter in &project.chapters {
        lines.push(format!("=== {} ===", chapter.title));
        lines.push(String::new());

        if chapter.utterances.is_empty() {
            lines.push("# (Chapter not compiled - no utterances)".to_string());
            lines.push(String::new());
            continue;
        }

        let mut current_speaker: Option<&str> = None;
        let mut current_emotion: Option<&str> = None;

        for utterance in &chapter.utterances {
            if Some(utterance.speaker.as_str()) != current_speaker
                || utterance.emotion.as_deref() != current_emotion
            {
                if current_speaker.is_some() {
                    lines.push(String::new());
                }
                match &utterance.emotion {
                    Some(emotion) => lines.push(format!("@{} ({})", utterance.speaker, emotion)),
                    None => lines.push(format!("@{}", utterance.speaker)),
                }
                current_speaker = Some(utterance.speaker.as_str());
                current_emotion = utterance.emotion.as_deref();
            }
            lines.push(utterance.text.clone());
        }
        lines.push(String::new());
    }

    std::fs::write(&output_path, lines.join("\n"))?;
    Ok(output_path)
}

struct ParsedChapter {
    title: String,
    utterances: Vec<(String, Option<String>, String)>,
}

fn parse_review_text(content: &str) -> Vec<ParsedChapter> {
    let normalized = normalize_line_endings(content);

    let mut chapters_data: Vec<ParsedChapter> = Vec::new();
    let mut current_chapter_title: Option<String> = None;
    let mut current_chapter_utterances: Vec<(String, Option<String>, String)> = Vec::new();
    let mut current_speaker: Option<String> = None;
    let mut current_emotion: Option<String> = None;
    let mut current_text_lines: Vec<String> = Vec::new();

    fn flush_utterance(
        current_speaker: &Option<String>,
        current_emotion: &Option<String>,
        current_text_lines: &mut Vec<String>,
        current_chapter_utterances: &mut Vec<(String, Option<String>, String)>,
    ) {
        if let Some(speaker) = current_speaker {
            if !current_text_lines.is_empty() {
                let text = current_text_lines.join(" ").trim().to_string();
                if !text.is_empty() {
                    current_chapter_utterances.push((speaker.clone(), current_emotion.clone(), text));
                }
            }
        }
        current_text_lines.clear();
    }

    for line in normalized.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with('#') {
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        if let Some(captures) = CHAPTER_PATTERN.captures(trimmed) {
            flush_utterance(
                &current_speaker,
                &current_emotion,
                &mut current_text_lines,
                &mut current_chapter_utterances,
            );
            if let Some(title) = current_chapter_title.take() {
                chapters_data.push(ParsedChapter {
                    title,
                    utterances: std::mem::take(&mut current_chapter_utterances),
                });
            }
            current_chapter_title = Some(captures[1].to_string());
            current_speaker = None;
            current_emotion = None;
            continue;
        }

        if let Some(captures) = SPEAKER_PATTERN.captures(trimmed) {
            flush_utterance(
                &current_speaker,
                &current_emotion,
                &mut current_text_lines,
                &mut current_chapter_utterances,
            );
            current_speaker = Some(captures[1].to_string());
            current_emotion = captures.get(2).map(|m| m.as_str().to_string());
            continue;
        }

        if current_speaker.is_some() {
            current_text_lines.push(trimmed.to_string());
        }
    }

    flush_utterance(
        &current_speaker,
        &current_emotion,
        &mut current_text_lines,
        &mut current_chapter_utterances,
    );
    if let Some(title) = current_chapter_title.take() {
        chapters_data.push(ParsedChapter {
            title,
            utterances: current_chapter_utterances,
        });
    }

    chapters_data
}

pub fn import_reviewed(project: &mut ProjectDocument, review_path: &Path) -> Result<ImportStats> {
    if !review_path.exists() {
        return Err(AudiobookError::BadInput(format!(
            "Review file not found: {}",
            review_path.display()
        )));
    }
    let content = std::fs::read_to_string(review_path)?;
    let chapters_data = parse_review_text(&content);

    let mut stats = ImportStats::default();
    let mut speakers_found: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();

    for chapter_data in chapters_data {
        let matching_index = project
            .chapters
            .iter()
            .position(|c| c.title == chapter_data.title);
        let Some(matching_index) = matching_index else {
            continue;
        };

        let chapter_index = project.chapters[matching_index].index;
        let mut new_utterances = Vec::with_capacity(chapter_data.utterances.len());
        for (i, (speaker, emotion, text)) in chapter_data.utterances.into_iter().enumerate() {
            let utterance_type = if text.starts_with('"') {
                UtteranceType::Dialogue
            } else {
                UtteranceType::Narration
            };
            speakers_found.insert(speaker.clone());
            new_utterances.push(Utterance::new(speaker, text, utterance_type, emotion, chapter_index, i));
        }

        stats.utterances_imported += new_utterances.len();
        project.chapters[matching_index].utterances = new_utterances;
        stats.chapters_updated += 1;
    }

    stats.speakers_found = speakers_found.into_iter().collect();
    Ok(stats)
}

pub fn preview_review_format(project: &ProjectDocument, chapter_index: usize) -> String {
    let Some(chapter) = project.chapters.get(chapter_index) else {
        return "# Chapter not found".to_string();
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("=== {} ===", chapter.title));
    lines.push(String::new());

    if chapter.utterances.is_empty() {
        lines.push("# (Not compiled)".to_string());
        return lines.join("\n");
    }

    let mut current_speaker: Option<&str> = None;
    let mut current_emotion: Option<&str> = None;

    for utterance in &chapter.utterances {
        if Some(utterance.speaker.as_str()) != current_speaker || utterance.emotion.as_deref() != current_emotion {
            if current_speaker.is_some() {
                lines.push(String::new());
            }
            match &utterance.emotion {
                Some(emotion) => lines.push(format!("@{} ({})", utterance.speaker, emotion)),
                None => lines.push(format!("@{}", utterance.speaker)),
            }
            current_speaker = Some(utterance.speaker.as_str());
            current_emotion = utterance.emotion.as_deref();
        }
        lines.push(utterance.text.clone());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_round_trips_speaker_and_text() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "\"Hello,\" said Alice. She smiled.".to_string())],
            "Book",
            "Author",
            "en",
        );
        project.compile().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        export_for_review(&project, Some(&path)).unwrap();

        let stats = import_reviewed(&mut project, &path).unwrap();
        assert_eq!(stats.chapters_updated, 1);
        assert!(stats.utterances_imported > 0);
    }

    #[test]
    fn import_renames_speaker_and_changes_emotion() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "Plain narration text.".to_string())],
            "Book",
            "Author",
            "en",
        );
        project.compile().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        let review_text = "=== Ch1 ===\n\n@Gandalf (wise)\nPlain narration text.\n";
        std::fs::write(&path, review_text).unwrap();

        let stats = import_reviewed(&mut project, &path).unwrap();
        assert_eq!(stats.chapters_updated, 1);
        let utterance = &project.chapters[0].utterances[0];
        assert_eq!(utterance.speaker, "Gandalf");
        assert_eq!(utterance.emotion.as_deref(), Some("wise"));
    }

    #[test]
    fn import_handles_crlf_line_endings() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "Text.".to_string())],
            "Book",
            "Author",
            "en",
        );
        project.compile().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        let review_text = "=== Ch1 ===\r\n\r\n@narrator\r\nText.\r\n";
        std::fs::write(&path, review_text).unwrap();

        let stats = import_reviewed(&mut project, &path).unwrap();
        assert_eq!(stats.utterances_imported, 1);
    }

    #[test]
    fn import_comments_and_blank_lines_are_ignored() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "Text.".to_string())],
            "Book",
            "Author",
            "en",
        );
        project.compile().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        let review_text = "# a comment\n\n=== Ch1 ===\n\n@narrator\n# inline comment, skipped\nText.\n";
        std::fs::write(&path, review_text).unwrap();

        let stats = import_reviewed(&mut project, &path).unwrap();
        assert_eq!(stats.utterances_imported, 1);
        assert_eq!(project.chapters[0].utterances[0].text, "Text.");
    }

    #[test]
    fn preview_review_format_reports_missing_chapter() {
        let project = ProjectDocument::from_chapters(vec![], "Book", "Author", "en");
        assert_eq!(preview_review_format(&project, 0), "# Chapter not found");
    }

    #[test]
    fn dialogue_starting_with_quote_imports_as_dialogue_type() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "placeholder".to_string())],
            "Book",
            "Author",
            "en",
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        let review_text = "=== Ch1 ===\n\n@Alice\n\"Hello there.\"\n";
        std::fs::write(&path, review_text).unwrap();

        import_reviewed(&mut project, &path).unwrap();
        assert_eq!(
            project.chapters[0].utterances[0].utterance_type,
            UtteranceType::Dialogue
        );
    }
}
