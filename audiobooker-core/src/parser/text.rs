//! TextReader: splits a plain text / Markdown file into chapters using the
//! active language profile's chapter-heading patterns.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::{AudiobookError, Result};
use crate::language::LanguageProfile;
use crate::models::Chapter;

#[derive(Debug, Clone, Default)]
pub struct TextMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Strip a leading `---`-delimited frontmatter block (flat `key: value`
/// lines only — no nested YAML) and return it alongside the remaining body.
pub fn extract_frontmatter(text: &str) -> (TextMetadata, String) {
    let mut metadata = TextMetadata::default();

    if let Some(rest) = text.strip_prefix("---") {
        if let Some(end) = rest.find("\n---\n").or_else(|| {
            // Tolerate a frontmatter block at the very end of the file with
            // no trailing newline after the closing fence.
            rest.find("\n---").filter(|&i| rest[i + 4..].trim().is_empty())
        }) {
            let frontmatter = &rest[..end];
            let remaining = if rest.len() > end + 5 {
                &rest[end + 5..]
            } else {
                ""
            };

            for line in frontmatter.split('\n') {
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim().to_lowercase();
                    let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
                    if key == "title" {
                        metadata.title = Some(value);
                    } else if key == "author" {
                        metadata.author = Some(value);
                    } else {
                        metadata.extra.insert(key, value);
                    }
                }
            }
            return (metadata, remaining.to_string());
        }
    }

    (metadata, text.to_string())
}

/// Scan the first 200 non-empty lines, counting how many match each of the
/// profile's chapter regexes, and return whichever pattern wins (ties go to
/// the first pattern in profile order). Returns `None` if no pattern gets
/// more than one match.
fn detect_chapter_pattern<'a>(text: &str, profile: &'a LanguageProfile) -> Option<&'a Regex> {
    let regexes = profile.chapter_regexes();
    let mut counts = vec![0usize; regexes.len()];

    let mut seen = 0usize;
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        seen += 1;
        for (i, regex) in regexes.iter().enumerate() {
            if regex.is_match(line) {
                counts[i] += 1;
            }
        }
        if seen >= 200 {
            break;
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (i, count) in counts.iter().enumerate() {
        if best.map(|(_, best_count)| *count > best_count).unwrap_or(true) {
            best = Some((i, *count));
        }
    }
    let (best_index, best_count) = best?;

    if best_count > 1 {
        Some(&regexes[best_index])
    } else {
        None
    }
}

/// Split `text` into `(title, content)` chapters using the profile's chapter
/// patterns. Falls back to a single "Chapter 1" chapter if no pattern wins.
pub fn split_into_chapters(text: &str, profile: &LanguageProfile) -> Vec<(String, String)> {
    let Some(pattern) = detect_chapter_pattern(text, profile) else {
        return vec![("Chapter 1".to_string(), text.to_string())];
    };

    let mut chapters = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_content: Vec<&str> = Vec::new();
    let mut started = false;

    let flush = |title: &Option<String>, content: &[&str], out: &mut Vec<(String, String)>| {
        if title.is_some() || !content.is_empty() {
            let title = title.clone().unwrap_or_else(|| "Untitled".to_string());
            let body = content.join("\n").trim().to_string();
            if !body.is_empty() {
                out.push((title, body));
            }
        }
    };

    for line in text.split('\n') {
        if let Some(captures) = pattern.captures(line.trim()) {
            flush(&current_title, &current_content, &mut chapters);
            started = true;

            let number = captures.get(1).map(|m| m.as_str());
            let rest = captures.get(2).map(|m| m.as_str()).filter(|s| !s.is_empty());

            current_title = Some(match (number, rest) {
                (Some(number), Some(rest)) => format!("Chapter {number}: {rest}"),
                (Some(number), None) => number.to_string(),
                (None, _) => line.trim().to_string(),
            });
            current_content = Vec::new();
        } else {
            current_content.push(line);
        }
    }

    if started || !current_content.is_empty() {
        flush(&current_title, &current_content, &mut chapters);
    }

    chapters
}

pub fn parse_text(path: &Path, profile: &LanguageProfile) -> Result<(TextMetadata, Vec<Chapter>)> {
    if !path.exists() {
        return Err(AudiobookError::BadInput(format!(
            "Text file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let (mut metadata, body) = extract_frontmatter(&text);
    if metadata.title.is_none() {
        metadata.title = path.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string());
    }

    let chapter_data = split_into_chapters(&body, profile);
    let source_file = path.to_string_lossy().into_owned();
    let chapters = chapter_data
        .into_iter()
        .enumerate()
        .map(|(i, (title, content))| {
            let mut chapter = Chapter::new(i, title, content);
            chapter.source_file = Some(source_file.clone());
            chapter
        })
        .collect();

    Ok((metadata, chapters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::get_profile;

    fn profile() -> LanguageProfile {
        get_profile("en").unwrap()
    }

    #[test]
    fn extract_frontmatter_parses_title_and_author() {
        let text = "---\ntitle: My Book\nauthor: Jane Doe\n---\nBody text.";
        let (metadata, body) = extract_frontmatter(text);
        assert_eq!(metadata.title.as_deref(), Some("My Book"));
        assert_eq!(metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(body, "Body text.");
    }

    #[test]
    fn extract_frontmatter_absent_returns_text_unchanged() {
        let text = "Just a plain book with no frontmatter.";
        let (metadata, body) = extract_frontmatter(text);
        assert!(metadata.title.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn split_into_chapters_detects_chapter_headings() {
        let text = "Chapter 1\nFirst chapter text.\n\nChapter 2\nSecond chapter text.";
        let chapters = split_into_chapters(text, &profile());
        assert_eq!(chapters.len(), 2);
        assert!(chapters[0].1.contains("First chapter"));
        assert!(chapters[1].1.contains("Second chapter"));
    }

    #[test]
    fn split_into_chapters_falls_back_to_single_chapter() {
        let text = "Just a short story with no chapter markers at all.";
        let chapters = split_into_chapters(text, &profile());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].0, "Chapter 1");
    }

    #[test]
    fn split_into_chapters_requires_more_than_one_match() {
        let text = "Chapter 1\nOnly one heading in this whole text.\nMore text follows.";
        let chapters = split_into_chapters(text, &profile());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].0, "Chapter 1");
    }
}
