//! Optional NLP refiners layered on top of the heuristic pipeline: a
//! speaker resolver that can defer to an external co-reference backend,
//! and a conservative rule+lexicon emotion inferencer.

pub mod emotion;
pub mod speaker_resolver;

/// A named entity detected in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
}

/// A quote attributed to a speaker by an NLP backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteAttribution {
    pub quote_text: String,
    pub speaker: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

/// Minimal output contract an NLP backend returns from analysis.
#[derive(Debug, Clone, Default)]
pub struct NlpAnalysis {
    pub entities: Vec<Entity>,
    pub quotes: Vec<QuoteAttribution>,
    pub speakers: Vec<String>,
    pub success: bool,
    pub error: String,
}

/// Interface for pluggable co-reference/speaker-attribution backends.
///
/// Nothing in this crate ships a real implementation — there is no BookNLP
/// equivalent in the Rust ecosystem this pipeline depends on, so the only
/// implementation here is [`UnavailableBackend`], which always reports
/// unavailable and lets [`speaker_resolver::SpeakerResolver`] fall back to
/// the heuristic attribution already produced by the casting stage.
pub trait NlpBackend {
    fn analyze(&self, text: &str) -> NlpAnalysis;
    fn is_available(&self) -> bool;
}

/// Stand-in for an absent external NLP backend. Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl NlpBackend for UnavailableBackend {
    fn analyze(&self, _text: &str) -> NlpAnalysis {
        NlpAnalysis {
            success: false,
            error: "no NLP backend configured".to_string(),
            ..Default::default()
        }
    }

    fn is_available(&self) -> bool {
        false
    }
}
