//! EpubReader: walks an EPUB's document items in reading order, converting
//! each to plain text and filtering out short, untitled chapters.

use std::path::Path;

use regex::Regex;

use crate::error::{AudiobookError, Result};
use crate::models::Chapter;

use super::text::TextMetadata;

/// Convert an HTML fragment to plain text, collapsing whitespace and
/// keeping a blank line between block-level paragraphs.
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 1000);
    clean_text(&text)
}

fn clean_text(text: &str) -> String {
    let mut result = String::new();
    let mut prev_was_blank = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank && !result.is_empty() {
                result.push_str("\n\n");
                prev_was_blank = true;
            }
            continue;
        }
        prev_was_blank = false;
        if !result.is_empty() && !result.ends_with('\n') {
            result.push(' ');
        }
        result.push_str(trimmed);
    }

    result
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
        .replace("&hellip;", "...")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&rdquo;", "\"")
        .replace("&ldquo;", "\"")
}

fn heading_regex() -> &'static Regex {
    use once_cell::sync::Lazy;
    static HEADING: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<h[1-3][^>]*>(.*?)</h[1-3]>").unwrap());
    &HEADING
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Extract the first `<h1>`/`<h2>`/`<h3>` within the first 2000 characters
/// of the HTML, if any, rejecting implausibly long matches.
fn extract_title_from_html(html: &str) -> Option<String> {
    let window = &html[..html.len().min(2000)];
    let captures = heading_regex().captures(window)?;
    let title = strip_tags(&captures[1]).split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() || title.len() >= 200 {
        None
    } else {
        Some(title)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

struct RawItem {
    html: String,
}

/// Walk every document-type item in the manifest (`doc.resources`), not the
/// spine. Resource ids are sorted first so the result is deterministic even
/// though `resources` is a `HashMap`; this mirrors the Python original's
/// `get_items_of_type(ebooklib.ITEM_DOCUMENT)` pass, which is a genuinely
/// different item source from spine order (it can include document items the
/// spine omits, or disagree on ordering).
fn collect_document_items(doc: &mut epub::doc::EpubDoc<std::io::BufReader<std::fs::File>>) -> Vec<RawItem> {
    let mut ids: Vec<String> = doc
        .resources
        .iter()
        .filter(|(_, (_, mime))| mime.contains("html") || mime.contains("xml"))
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort();

    let mut items = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some((bytes, _mime)) = doc.get_resource(id) {
            items.push(RawItem {
                html: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
    }
    items
}

/// Walk the spine in reading order, resolving each idref to its resource.
fn collect_spine_items(doc: &mut epub::doc::EpubDoc<std::io::BufReader<std::fs::File>>) -> Vec<RawItem> {
    let spine = doc.spine.clone();
    let mut items = Vec::with_capacity(spine.len());
    for spine_item in &spine {
        if let Some((bytes, _mime)) = doc.get_resource(&spine_item.idref) {
            items.push(RawItem {
                html: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
    }
    items
}

fn build_chapters(
    items: Vec<RawItem>,
    min_chapter_words: usize,
    keep_titled_short_chapters: bool,
    source_file: &str,
) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut index = 0usize;

    for item in items {
        let title = extract_title_from_html(&item.html);
        let text = html_to_text(&item.html);
        if text.trim().is_empty() {
            continue;
        }

        let words = word_count(&text);
        let keep = words >= min_chapter_words || (title.is_some() && keep_titled_short_chapters);
        if !keep {
            continue;
        }

        let mut chapter = Chapter::new(index, title.unwrap_or_else(|| format!("Chapter {}", index + 1)), text);
        chapter.source_file = Some(source_file.to_string());
        chapters.push(chapter);
        index += 1;
    }

    chapters
}

/// Parse an EPUB: walk its document items in reading order, filtering out
/// short untitled chapters, falling back to spine order if the walk yields
/// nothing at all.
pub fn parse_epub(
    path: &Path,
    min_chapter_words: usize,
    keep_titled_short_chapters: bool,
) -> Result<(TextMetadata, Vec<Chapter>)> {
    let mut doc = epub::doc::EpubDoc::new(path)
        .map_err(|e| AudiobookError::BadInput(format!("failed to open EPUB: {e}")))?;

    let mut metadata = TextMetadata::default();
    metadata.title = doc.mdata("title").map(|m| m.value.clone());
    metadata.author = doc.mdata("creator").map(|m| m.value.clone());
    if let Some(language) = doc.mdata("language").map(|m| m.value.clone()) {
        metadata.extra.insert("language".to_string(), language);
    }

    let source_file = path.to_string_lossy().into_owned();
    let items = collect_document_items(&mut doc);
    let chapters = build_chapters(items, min_chapter_words, keep_titled_short_chapters, &source_file);

    if !chapters.is_empty() {
        return Ok((metadata, chapters));
    }

    // Manifest document-order walk yielded nothing; fall back to spine order
    // with the same filtering rules.
    let spine_items = collect_spine_items(&mut doc);
    let spine_chapters = build_chapters(spine_items, min_chapter_words, keep_titled_short_chapters, &source_file);
    Ok((metadata, spine_chapters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_title_from_html_finds_h1() {
        let html = "<html><body><h1>Chapter One</h1><p>Content here</p></body></html>";
        assert_eq!(extract_title_from_html(html), Some("Chapter One".to_string()));
    }

    #[test]
    fn extract_title_from_html_returns_none_without_heading() {
        let html = "<html><body><p>Just a paragraph.</p></body></html>";
        assert_eq!(extract_title_from_html(html), None);
    }

    #[test]
    fn clean_text_decodes_entities() {
        let text = "Hello &amp; goodbye &mdash; see you!";
        let cleaned = clean_text(text);
        assert!(cleaned.contains('&'));
        assert!(cleaned.contains('\u{2014}'));
    }

    #[test]
    fn build_chapters_drops_short_untitled_and_keeps_titled_short() {
        let items = vec![
            RawItem { html: "<p>too short</p>".to_string() },
            RawItem { html: "<h1>Intro</h1><p>also short</p>".to_string() },
        ];
        let chapters = build_chapters(items, 50, true, "book.epub");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[0].index, 0);
    }

    #[test]
    fn build_chapters_assigns_dense_zero_based_indexes() {
        let long_text = "word ".repeat(60);
        let items = vec![
            RawItem { html: format!("<p>{}</p>", long_text) },
            RawItem { html: "<p>short, no title, dropped</p>".to_string() },
            RawItem { html: format!("<h2>Two</h2><p>{}</p>", long_text) },
        ];
        let chapters = build_chapters(items, 50, true, "book.epub");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].index, 0);
        assert_eq!(chapters[1].index, 1);
    }
}
