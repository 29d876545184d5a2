//! Structured error kinds for the audiobooker pipeline.

use thiserror::Error;

use crate::render::RenderSummary;

/// All failure modes the library surfaces across its components.
#[derive(Error, Debug)]
pub enum AudiobookError {
    #[error("{0}")]
    BadInput(String),

    #[error(
        "project schema version {found} is newer than the supported version {supported}"
    )]
    SchemaTooNew { found: u32, supported: u32 },

    #[error(
        "{} voice id(s) not found: {}\n  {available_count} voices available",
        .missing.len(),
        .missing.join(", ")
    )]
    VoiceNotFound {
        missing: Vec<String>,
        available_count: usize,
    },

    #[error("compilation error: {0}")]
    CompilationError(String),

    #[error(
        "synthesis failed for chapter {chapter_index} utterance {utterance_index} \
         (speaker={speaker:?}, voice={voice:?}): {message}\n  text: {text_preview:?}"
    )]
    SynthesizerFailure {
        chapter_index: usize,
        utterance_index: i64,
        speaker: String,
        voice: String,
        text_preview: String,
        message: String,
    },

    #[error("assembly failed: {stderr_tail}")]
    AssemblyFailure { stderr_tail: String },

    #[error("render cache manifest is corrupt and was rebuilt: {0}")]
    CacheCorrupt(String),

    #[error(
        "render failed: {} rendered, {} cached, {} failed of {} chapters",
        .summary.rendered, .summary.skipped_cached, .summary.failed.len(), .summary.total
    )]
    RenderError { summary: RenderSummary },

    #[error("unsupported language code {0:?}")]
    UnsupportedLanguage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, AudiobookError>;
