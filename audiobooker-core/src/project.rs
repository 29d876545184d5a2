//! ProjectConfig and ProjectDocument: the audio-affecting settings and the
//! aggregate root that ties source text, casting, and render state together.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::casting::CastingTable;
use crate::error::{AudiobookError, Result};
use crate::models::{Chapter, Utterance};

pub const SCHEMA_VERSION: u32 = 1;

fn default_chapter_pause_ms() -> u64 {
    2000
}
fn default_narrator_pause_ms() -> u64 {
    600
}
fn default_dialogue_pause_ms() -> u64 {
    400
}
fn default_sample_rate() -> u32 {
    24000
}
fn default_output_format() -> String {
    "m4b".to_string()
}
fn default_fallback_voice_id() -> String {
    "af_heart".to_string()
}
fn default_validate_voices_on_render() -> bool {
    true
}
fn default_estimated_wpm() -> u32 {
    150
}
fn default_min_chapter_words() -> usize {
    50
}
fn default_keep_titled_short_chapters() -> bool {
    true
}
fn default_language_code() -> String {
    "en".to_string()
}
fn default_booknlp_mode() -> String {
    "auto".to_string()
}
fn default_emotion_mode() -> String {
    "rule".to_string()
}
fn default_emotion_confidence_threshold() -> f64 {
    0.75
}

/// Settings that affect how a project is parsed, compiled, and rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_chapter_pause_ms")]
    pub chapter_pause_ms: u64,
    #[serde(default = "default_narrator_pause_ms")]
    pub narrator_pause_ms: u64,
    #[serde(default = "default_dialogue_pause_ms")]
    pub dialogue_pause_ms: u64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_fallback_voice_id")]
    pub fallback_voice_id: String,
    #[serde(default = "default_validate_voices_on_render")]
    pub validate_voices_on_render: bool,
    #[serde(default = "default_estimated_wpm")]
    pub estimated_wpm: u32,
    #[serde(default = "default_min_chapter_words")]
    pub min_chapter_words: usize,
    #[serde(default = "default_keep_titled_short_chapters")]
    pub keep_titled_short_chapters: bool,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_booknlp_mode")]
    pub booknlp_mode: String,
    #[serde(default = "default_emotion_mode")]
    pub emotion_mode: String,
    #[serde(default = "default_emotion_confidence_threshold")]
    pub emotion_confidence_threshold: f64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            chapter_pause_ms: default_chapter_pause_ms(),
            narrator_pause_ms: default_narrator_pause_ms(),
            dialogue_pause_ms: default_dialogue_pause_ms(),
            sample_rate: default_sample_rate(),
            output_format: default_output_format(),
            fallback_voice_id: default_fallback_voice_id(),
            validate_voices_on_render: default_validate_voices_on_render(),
            estimated_wpm: default_estimated_wpm(),
            min_chapter_words: default_min_chapter_words(),
            keep_titled_short_chapters: default_keep_titled_short_chapters(),
            language_code: default_language_code(),
            booknlp_mode: default_booknlp_mode(),
            emotion_mode: default_emotion_mode(),
            emotion_confidence_threshold: default_emotion_confidence_threshold(),
        }
    }
}

/// Render-progress status, surfaced to CLI progress bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Idle,
    Compiling,
    Rendering,
    Assembling,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderProgress {
    pub current_chapter: usize,
    pub total_chapters: usize,
    pub current_utterance: usize,
    pub total_utterances: usize,
    pub status: ProjectStatus,
    pub error_message: Option<String>,
}

impl Default for RenderProgress {
    fn default() -> Self {
        Self {
            current_chapter: 0,
            total_chapters: 0,
            current_utterance: 0,
            total_utterances: 0,
            status: ProjectStatus::Idle,
            error_message: None,
        }
    }
}

/// The full state of a single audiobook-in-progress: source chapters,
/// casting table, config, and render progress. Persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    pub created_at: String,
    pub modified_at: String,

    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub casting: CastingTable,
    #[serde(default)]
    pub config: ProjectConfig,

    #[serde(default)]
    pub progress: RenderProgress,
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    #[serde(skip)]
    output_dir: Option<PathBuf>,
}

fn now_iso() -> String {
    Local::now().to_rfc3339()
}

impl ProjectDocument {
    fn new_with_chapters(title: String, author: String, source_path: Option<PathBuf>, chapters: Vec<Chapter>, config: ProjectConfig) -> Self {
        let output_dir = source_path.as_ref().map(|p| {
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
            p.with_file_name(format!("{}_audio", stem))
        });
        let mut casting = CastingTable::new();
        casting.fallback_voice_id = config.fallback_voice_id.clone();
        let timestamp = now_iso();
        let mut project = Self {
            title,
            author,
            source_path,
            project_path: None,
            created_at: timestamp.clone(),
            modified_at: timestamp,
            chapters,
            casting,
            config,
            progress: RenderProgress::default(),
            output_path: None,
            output_dir,
        };
        project.cast(
            "narrator",
            "af_heart",
            Some("calm".to_string()),
            Some("Default narrator".to_string()),
        );
        project
    }

    /// Build a project from a parsed EPUB. `config.min_chapter_words` and
    /// `config.keep_titled_short_chapters` drive the chapter filtering.
    pub fn from_epub(path: impl AsRef<Path>, config: ProjectConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudiobookError::BadInput(format!(
                "EPUB not found: {}",
                path.display()
            )));
        }
        let (metadata, chapters) = crate::parser::epub::parse_epub(
            path,
            config.min_chapter_words,
            config.keep_titled_short_chapters,
        )?;
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| stem_of(path));
        let author = metadata.author.clone().unwrap_or_default();
        Ok(Self::new_with_chapters(
            title,
            author,
            Some(path.to_path_buf()),
            chapters,
            config,
        ))
    }

    /// Build a project from a plain text / Markdown file.
    pub fn from_text(path: impl AsRef<Path>, config: ProjectConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudiobookError::BadInput(format!(
                "Text file not found: {}",
                path.display()
            )));
        }
        let profile = crate::language::get_profile(&config.language_code)?;
        let (metadata, chapters) = crate::parser::text::parse_text(path, &profile)?;
        let title = metadata.title.clone().unwrap_or_else(|| stem_of(path));
        let author = metadata.author.clone().unwrap_or_default();
        Ok(Self::new_with_chapters(
            title,
            author,
            Some(path.to_path_buf()),
            chapters,
            config,
        ))
    }

    /// Build a project from a raw string, with no backing source file.
    pub fn from_string(
        text: &str,
        title: impl Into<String>,
        author: impl Into<String>,
        lang: impl Into<String>,
    ) -> Result<Self> {
        let lang = lang.into();
        let mut config = ProjectConfig {
            language_code: lang.clone(),
            ..ProjectConfig::default()
        };
        let profile = crate::language::get_profile(&lang)?;
        let (metadata, body) = crate::parser::text::extract_frontmatter(text);
        let chapter_data = crate::parser::text::split_into_chapters(&body, &profile);
        config.language_code = lang;

        let chapters = chapter_data
            .into_iter()
            .enumerate()
            .map(|(i, (ch_title, content))| Chapter::new(i, ch_title, content))
            .collect();

        let final_title = metadata.title.unwrap_or_else(|| title.into());
        let final_author = metadata.author.unwrap_or_else(|| author.into());
        Ok(Self::new_with_chapters(
            final_title,
            final_author,
            None,
            chapters,
            config,
        ))
    }

    /// Build a project from pre-split (title, text) chapter pairs.
    pub fn from_chapters(
        chapters: Vec<(String, String)>,
        title: impl Into<String>,
        author: impl Into<String>,
        lang: impl Into<String>,
    ) -> Self {
        let config = ProjectConfig {
            language_code: lang.into(),
            ..ProjectConfig::default()
        };
        let chapters = chapters
            .into_iter()
            .enumerate()
            .map(|(i, (ch_title, content))| Chapter::new(i, ch_title, content))
            .collect();
        Self::new_with_chapters(title.into(), author.into(), None, chapters, config)
    }

    /// Load a project from its JSON file. Rejects files from a strictly
    /// newer schema; older/missing `schema_version` is accepted as-is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudiobookError::BadInput(format!(
                "Project file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let raw: serde_json::Value = serde_json::from_str(&contents)?;
        let found_version = raw
            .get("schema_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32;
        if found_version > SCHEMA_VERSION {
            return Err(AudiobookError::SchemaTooNew {
                found: found_version,
                supported: SCHEMA_VERSION,
            });
        }
        let mut project: ProjectDocument = serde_json::from_value(raw)?;
        project.project_path = Some(path.to_path_buf());
        Ok(project)
    }

    /// Save the project to its JSON file, defaulting to `project_path` or a
    /// path derived from the source file / title.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match &self.project_path {
                Some(p) => p.clone(),
                None => match &self.source_path {
                    Some(src) => src.with_extension("audiobooker"),
                    None => PathBuf::from(format!("{}.audiobooker", self.title)),
                },
            },
        };
        self.project_path = Some(path.clone());
        self.modified_at = now_iso();

        let value = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "title": self.title,
            "author": self.author,
            "source_path": self.source_path,
            "created_at": self.created_at,
            "modified_at": self.modified_at,
            "output_path": self.output_path,
            "chapters": self.chapters,
            "casting": self.casting,
            "config": self.config,
        });
        let serialized = serde_json::to_string_pretty(&value)?;
        std::fs::write(&path, serialized)?;
        Ok(path)
    }

    // -- Casting ----------------------------------------------------------

    pub fn cast(
        &mut self,
        name: impl Into<String>,
        voice: impl Into<String>,
        emotion: Option<String>,
        description: Option<String>,
    ) {
        self.casting.cast(name, voice, emotion, description);
    }

    pub fn list_characters(&self) -> Vec<String> {
        self.casting.characters.values().map(|c| c.name.clone()).collect()
    }

    pub fn detected_speakers(&self) -> std::collections::BTreeSet<String> {
        let mut speakers = std::collections::BTreeSet::new();
        for chapter in &self.chapters {
            for utterance in &chapter.utterances {
                speakers.insert(utterance.speaker.clone());
            }
        }
        speakers
    }

    pub fn uncast_speakers(&self) -> std::collections::BTreeSet<String> {
        let detected: std::collections::BTreeSet<String> = self
            .detected_speakers()
            .iter()
            .map(|s| CastingTable::normalize_key(s))
            .collect();
        detected
            .difference(&self.casting.characters.keys().cloned().collect())
            .cloned()
            .collect()
    }

    // -- Compilation --------------------------------------------------------

    pub fn compile(&mut self) -> Result<()> {
        let profile = crate::language::get_profile(&self.config.language_code)?;
        self.progress.status = ProjectStatus::Compiling;
        self.progress.total_chapters = self.chapters.len();
        for (i, chapter) in self.chapters.iter_mut().enumerate() {
            self.progress.current_chapter = i + 1;
            crate::casting::dialogue::compile_chapter(chapter, &mut self.casting, &profile, true)?;
        }
        self.progress.status = ProjectStatus::Idle;
        self.modified_at = now_iso();
        Ok(())
    }

    pub fn compile_chapter(&mut self, chapter_index: usize) -> Result<Vec<Utterance>> {
        let profile = crate::language::get_profile(&self.config.language_code)?;
        let chapter = self
            .chapters
            .get_mut(chapter_index)
            .ok_or_else(|| AudiobookError::BadInput(format!("chapter index {chapter_index} out of range")))?;
        crate::casting::dialogue::compile_chapter(chapter, &mut self.casting, &profile, true)?;
        Ok(chapter.utterances.clone())
    }

    // -- Rendering --------------------------------------------------------

    /// Render every chapter and assemble the final audiobook. `project_dir`
    /// anchors the on-disk render cache (`<project_dir>/.audiobooker/cache`).
    pub fn render(
        &mut self,
        output_path: Option<&Path>,
        project_dir: &Path,
        options: crate::render::RenderOptions,
    ) -> Result<crate::render::RenderSummary> {
        let output_path = match output_path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(format!("{}.{}", self.title, self.config.output_format)),
        };
        self.output_path = Some(output_path.clone());
        self.progress.status = ProjectStatus::Rendering;

        let summary = crate::render::render_project(self, &output_path, project_dir, options)?;

        self.progress.status = ProjectStatus::Complete;
        self.modified_at = now_iso();
        Ok(summary)
    }

    /// Render a single chapter's audio in isolation, bypassing the cache
    /// manifest and assembly step entirely.
    pub fn render_chapter(
        &mut self,
        chapter_index: usize,
        output_path: &Path,
        synthesizer: &dyn crate::render::protocols::Synthesizer,
    ) -> Result<PathBuf> {
        if self.chapters.get(chapter_index).map(|c| !c.is_compiled()).unwrap_or(true) {
            self.compile_chapter(chapter_index)?;
        }
        let chapter = self
            .chapters
            .get(chapter_index)
            .ok_or_else(|| AudiobookError::BadInput(format!("chapter index {chapter_index} out of range")))?;

        let script = crate::casting::dialogue::utterances_to_script(&chapter.utterances);
        let voices = self.casting.voice_mapping();
        let result = synthesizer.synthesize(&script, &voices, output_path)?;

        let chapter = &mut self.chapters[chapter_index];
        chapter.audio_path = Some(result.audio_path.to_string_lossy().into_owned());
        chapter.duration_seconds = result.duration_seconds;
        Ok(result.audio_path)
    }

    // -- Review -----------------------------------------------------------

    pub fn export_for_review(&mut self, output_path: Option<&Path>) -> Result<PathBuf> {
        if !self.is_compiled() {
            self.compile()?;
        }
        crate::review::export_for_review(self, output_path)
    }

    pub fn import_reviewed(&mut self, review_path: &Path) -> Result<crate::review::ImportStats> {
        let stats = crate::review::import_reviewed(self, review_path)?;
        self.modified_at = now_iso();
        Ok(stats)
    }

    pub fn preview_review_format(&self, chapter_index: usize) -> String {
        crate::review::preview_review_format(self, chapter_index)
    }

    // -- Info -----------------------------------------------------------

    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| c.word_count()).sum()
    }

    pub fn estimated_duration_minutes(&self) -> f64 {
        self.total_words() as f64 / self.config.estimated_wpm as f64
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.chapters.iter().map(|c| c.duration_seconds).sum()
    }

    pub fn is_compiled(&self) -> bool {
        self.chapters.iter().all(|c| c.is_compiled())
    }

    pub fn is_rendered(&self) -> bool {
        self.chapters.iter().all(|c| c.is_rendered())
    }

    pub fn output_dir(&mut self) -> &Path {
        if self.output_dir.is_none() {
            self.output_dir = Some(PathBuf::from(format!("{}_audio", self.title)));
        }
        self.output_dir.as_ref().unwrap()
    }

    pub fn info(&self) -> ProjectInfo {
        ProjectInfo {
            title: self.title.clone(),
            author: self.author.clone(),
            source: self.source_path.clone(),
            chapters: self.chapters.len(),
            total_words: self.total_words(),
            estimated_duration_minutes: (self.estimated_duration_minutes() * 10.0).round() / 10.0,
            characters_cast: self.casting.characters.len(),
            uncast_speakers: self.uncast_speakers().into_iter().collect(),
            compiled: self.is_compiled(),
            rendered: self.is_rendered(),
            output: self.output_path.clone(),
        }
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub title: String,
    pub author: String,
    pub source: Option<PathBuf>,
    pub chapters: usize,
    pub total_words: usize,
    pub estimated_duration_minutes: f64,
    pub characters_cast: usize,
    pub uncast_speakers: Vec<String>,
    pub compiled: bool,
    pub rendered: bool,
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.chapter_pause_ms, 2000);
        assert_eq!(config.narrator_pause_ms, 600);
        assert_eq!(config.dialogue_pause_ms, 400);
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.output_format, "m4b");
        assert_eq!(config.fallback_voice_id, "af_heart");
        assert!(config.validate_voices_on_render);
        assert_eq!(config.estimated_wpm, 150);
        assert_eq!(config.min_chapter_words, 50);
        assert!(config.keep_titled_short_chapters);
        assert_eq!(config.language_code, "en");
        assert_eq!(config.booknlp_mode, "auto");
        assert_eq!(config.emotion_mode, "rule");
        assert_eq!(config.emotion_confidence_threshold, 0.75);
    }

    #[test]
    fn config_deserializes_with_missing_fields_using_defaults() {
        let config: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.language_code, "en");
    }

    #[test]
    fn from_chapters_auto_casts_narrator() {
        let project = ProjectDocument::from_chapters(
            vec![("Chapter One".to_string(), "Hello there.".to_string())],
            "My Book",
            "Author",
            "en",
        );
        assert!(project.casting.is_known_name("narrator"));
        assert_eq!(project.chapters.len(), 1);
        assert_eq!(project.chapters[0].index, 0);
    }

    #[test]
    fn load_rejects_newer_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.audiobooker");
        std::fs::write(&path, r#"{"schema_version": 999, "title": "x", "created_at": "now", "modified_at": "now"}"#).unwrap();
        let result = ProjectDocument::load(&path);
        assert!(matches!(result, Err(AudiobookError::SchemaTooNew { found: 999, .. })));
    }

    #[test]
    fn save_and_load_round_trip_preserves_title_and_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "Once upon a time.".to_string())],
            "Round Trip",
            "Author",
            "en",
        );
        let path = dir.path().join("project.audiobooker");
        project.save(Some(&path)).unwrap();

        let loaded = ProjectDocument::load(&path).unwrap();
        assert_eq!(loaded.title, "Round Trip");
        assert_eq!(loaded.chapters.len(), 1);
        assert!(loaded.casting.is_known_name("narrator"));
    }

    #[test]
    fn uncast_speakers_excludes_cast_characters() {
        let mut project = ProjectDocument::from_chapters(
            vec![("Ch1".to_string(), "\"Hello,\" said Alice.".to_string())],
            "Book",
            "Author",
            "en",
        );
        project.compile().unwrap();
        assert!(project.uncast_speakers().contains("alice"));
        project.cast("Alice", "af_sky", None, None);
        assert!(!project.uncast_speakers().contains("alice"));
    }
}
