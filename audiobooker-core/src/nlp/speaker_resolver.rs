//! SpeakerResolver: optionally improves `"unknown"` speaker attributions
//! using an injected [`NlpBackend`], falling back silently to the existing
//! heuristic attribution when no backend is available.

use std::collections::HashMap;

use crate::error::{AudiobookError, Result};
use crate::models::{Chapter, Character};

use super::{NlpAnalysis, NlpBackend, UnavailableBackend};

/// Statistics from a single speaker resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionStats {
    pub chapters_processed: usize,
    pub utterances_examined: usize,
    pub speakers_resolved: usize,
    pub speakers_unchanged: usize,
    pub nlp_used: bool,
    pub nlp_error: String,
}

/// Resolution mode: always attempt NLP, never attempt it, or use it only
/// when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    On,
    Off,
    Auto,
}

impl ResolverMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            other => Err(AudiobookError::BadInput(format!(
                "invalid booknlp_mode {other:?}. Must be on|off|auto."
            ))),
        }
    }
}

pub struct SpeakerResolver<B: NlpBackend = UnavailableBackend> {
    mode: ResolverMode,
    backend: B,
}

impl SpeakerResolver<UnavailableBackend> {
    pub fn new(mode: &str) -> Result<Self> {
        Ok(Self {
            mode: ResolverMode::parse(mode)?,
            backend: UnavailableBackend,
        })
    }
}

impl<B: NlpBackend> SpeakerResolver<B> {
    pub fn with_backend(mode: &str, backend: B) -> Result<Self> {
        Ok(Self {
            mode: ResolverMode::parse(mode)?,
            backend,
        })
    }

    /// Run speaker resolution over already-compiled chapters, updating
    /// `"unknown"` utterances in place where the backend offers a better
    /// attribution. `_casting` is accepted for parity with the upstream
    /// pipeline stage, which validates resolved names against it; this
    /// crate performs that validation at cast time instead.
    pub fn resolve(&self, chapters: &mut [Chapter], _casting: &[Character]) -> Result<ResolutionStats> {
        let mut stats = ResolutionStats::default();

        match self.mode {
            ResolverMode::Off => {
                log::info!("BookNLP resolution disabled (mode=off)");
                return Ok(stats);
            }
            ResolverMode::Auto if !self.backend.is_available() => {
                log::info!("BookNLP not available — using heuristic attribution");
                return Ok(stats);
            }
            ResolverMode::On if !self.backend.is_available() => {
                return Err(AudiobookError::BadInput(
                    "booknlp_mode is 'on' but no NLP backend is available".to_string(),
                ));
            }
            _ => {}
        }

        stats.nlp_used = true;

        for chapter in chapters.iter_mut() {
            if chapter.utterances.is_empty() {
                continue;
            }
            stats.chapters_processed += 1;

            let result = self.backend.analyze(&chapter.raw_text);
            if !result.success {
                stats.nlp_error = result.error.clone();
                log::warn!(
                    "NLP backend failed on chapter {}: {}. Keeping heuristic attributions.",
                    chapter.index,
                    result.error
                );
                continue;
            }

            let attributions = build_attribution_map(&result);

            for utterance in chapter.utterances.iter_mut() {
                stats.utterances_examined += 1;

                if utterance.speaker != "unknown" {
                    stats.speakers_unchanged += 1;
                    continue;
                }

                match match_utterance(&utterance.text, &attributions) {
                    Some(speaker) => {
                        log::debug!(
                            "Resolved unknown -> {speaker:?} in ch{} line {}",
                            chapter.index,
                            utterance.line_index
                        );
                        utterance.speaker = speaker;
                        stats.speakers_resolved += 1;
                    }
                    None => stats.speakers_unchanged += 1,
                }
            }
        }

        log::info!(
            "SpeakerResolver: resolved={} unchanged={} chapters={}",
            stats.speakers_resolved,
            stats.speakers_unchanged,
            stats.chapters_processed
        );
        Ok(stats)
    }
}

fn attribution_key(text: &str) -> String {
    let folded = text.trim().to_lowercase();
    folded.chars().take(80).collect()
}

fn build_attribution_map(result: &NlpAnalysis) -> HashMap<String, String> {
    let mut mapping = HashMap::new();
    for quote in &result.quotes {
        if quote.confidence > 0.3 && !quote.speaker.is_empty() {
            mapping.insert(attribution_key(&quote.quote_text), quote.speaker.clone());
        }
    }
    mapping
}

fn match_utterance(text: &str, attributions: &HashMap<String, String>) -> Option<String> {
    attributions.get(&attribution_key(text)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Utterance, UtteranceType};
    use crate::nlp::QuoteAttribution;

    struct StubBackend {
        analysis: NlpAnalysis,
    }

    impl NlpBackend for StubBackend {
        fn analyze(&self, _text: &str) -> NlpAnalysis {
            self.analysis.clone()
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn chapter_with_unknown(text: &str) -> Chapter {
        let mut chapter = Chapter::new(0, "Chapter 1", "irrelevant raw text");
        chapter.utterances.push(Utterance::new(
            "unknown",
            text,
            UtteranceType::Dialogue,
            None,
            0,
            0,
        ));
        chapter
    }

    #[test]
    fn off_mode_never_touches_utterances() {
        let resolver = SpeakerResolver::new("off").unwrap();
        let mut chapters = vec![chapter_with_unknown("Hello there.")];
        let stats = resolver.resolve(&mut chapters, &[]).unwrap();
        assert!(!stats.nlp_used);
        assert_eq!(chapters[0].utterances[0].speaker, "unknown");
    }

    #[test]
    fn auto_mode_falls_back_silently_when_unavailable() {
        let resolver = SpeakerResolver::new("auto").unwrap();
        let mut chapters = vec![chapter_with_unknown("Hello there.")];
        let stats = resolver.resolve(&mut chapters, &[]).unwrap();
        assert!(!stats.nlp_used);
    }

    #[test]
    fn on_mode_errors_when_backend_unavailable() {
        let resolver = SpeakerResolver::new("on").unwrap();
        let mut chapters = vec![chapter_with_unknown("Hello there.")];
        assert!(resolver.resolve(&mut chapters, &[]).is_err());
    }

    #[test]
    fn resolves_unknown_speaker_from_matching_quote() {
        let analysis = NlpAnalysis {
            quotes: vec![QuoteAttribution {
                quote_text: "Hello there.".to_string(),
                speaker: "Alice".to_string(),
                start: 0,
                end: 12,
                confidence: 0.9,
            }],
            success: true,
            ..Default::default()
        };
        let resolver = SpeakerResolver::with_backend("auto", StubBackend { analysis }).unwrap();
        let mut chapters = vec![chapter_with_unknown("Hello there.")];
        let stats = resolver.resolve(&mut chapters, &[]).unwrap();
        assert!(stats.nlp_used);
        assert_eq!(stats.speakers_resolved, 1);
        assert_eq!(chapters[0].utterances[0].speaker, "Alice");
    }

    #[test]
    fn leaves_unknown_when_no_quote_matches() {
        let analysis = NlpAnalysis {
            quotes: vec![],
            success: true,
            ..Default::default()
        };
        let resolver = SpeakerResolver::with_backend("auto", StubBackend { analysis }).unwrap();
        let mut chapters = vec![chapter_with_unknown("Hello there.")];
        let stats = resolver.resolve(&mut chapters, &[]).unwrap();
        assert_eq!(stats.speakers_unchanged, 1);
        assert_eq!(chapters[0].utterances[0].speaker, "unknown");
    }
}
