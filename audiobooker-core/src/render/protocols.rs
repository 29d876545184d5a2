//! Lightweight interfaces for speech synthesis, assembly, and voice lookup.
//!
//! These exist so the render pipeline can be exercised without a real TTS
//! engine, FFmpeg, or voice catalog installed. The synthesizer and assembler
//! capabilities are treated as blocking: the orchestrator's scheduling model
//! is single-threaded and cooperative, so plain `Result`-returning methods
//! are used rather than `async_trait`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Result of synthesizing a chapter's script to a single audio file.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub audio_path: PathBuf,
    pub duration_seconds: f64,
    pub warnings: Vec<String>,
}

/// Text-to-speech synthesis capability.
pub trait Synthesizer {
    /// Synthesize `script` (the `[Sn:speaker] text` format produced by
    /// `utterances_to_script`) to `output_path`, using `voices` to map
    /// normalized speaker keys to voice ids.
    fn synthesize(
        &self,
        script: &str,
        voices: &BTreeMap<String, String>,
        output_path: &Path,
    ) -> Result<SynthesisResult>;
}

/// Result of assembling per-chapter audio into the final audiobook file.
#[derive(Debug, Clone)]
pub struct AssemblyResult {
    pub output_path: PathBuf,
    pub chapters_embedded: bool,
    pub chapter_error: String,
}

/// One chapter's contribution to final assembly: its rendered audio path,
/// title (for chapter markers), and duration in seconds.
pub type ChapterAudio = (PathBuf, String, f64);

/// Final audio assembly capability (concatenation, chapter markers, muxing).
pub trait Assembler {
    fn assemble(
        &self,
        chapters: &[ChapterAudio],
        output_path: &Path,
        title: &str,
        author: &str,
        chapter_pause_ms: u64,
    ) -> Result<AssemblyResult>;
}

/// Lookup of voice ids known to the rendering backend.
pub trait VoiceRegistry {
    fn available_voices(&self) -> Result<Vec<String>>;
}

/// Check `voice_ids` against `available`, returning the sorted set of ids
/// that are missing.
pub fn validate_voices(voice_ids: &std::collections::BTreeSet<String>, available: &[String]) -> Vec<String> {
    let available: std::collections::BTreeSet<&String> = available.iter().collect();
    voice_ids
        .iter()
        .filter(|id| !available.contains(id))
        .cloned()
        .collect()
}

#[cfg(test)]
pub mod mock {
    //! Test doubles for the render protocols, following the same
    //! configurable-fixture pattern used for the mock completion provider.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct MockSynthesizer {
        call_count: AtomicUsize,
        fail_after: Option<usize>,
        duration_seconds: f64,
    }

    impl MockSynthesizer {
        pub fn always_succeeds(duration_seconds: f64) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_after: None,
                duration_seconds,
            }
        }

        pub fn fails_after(n: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_after: Some(n),
                duration_seconds: 1.0,
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Synthesizer for MockSynthesizer {
        fn synthesize(
            &self,
            _script: &str,
            _voices: &BTreeMap<String, String>,
            output_path: &Path,
        ) -> Result<SynthesisResult> {
            let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if call_num >= limit {
                    return Err(crate::error::AudiobookError::SynthesizerFailure {
                        chapter_index: 0,
                        utterance_index: -1,
                        speaker: String::new(),
                        voice: String::new(),
                        text_preview: String::new(),
                        message: "mock synthesizer failure".to_string(),
                    });
                }
            }
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output_path, b"RIFF....WAVEmock")?;
            Ok(SynthesisResult {
                audio_path: output_path.to_path_buf(),
                duration_seconds: self.duration_seconds,
                warnings: Vec::new(),
            })
        }
    }

    pub struct MockAssembler {
        pub fail: Mutex<bool>,
    }

    impl MockAssembler {
        pub fn new() -> Self {
            Self { fail: Mutex::new(false) }
        }
    }

    impl Assembler for MockAssembler {
        fn assemble(
            &self,
            chapters: &[ChapterAudio],
            output_path: &Path,
            _title: &str,
            _author: &str,
            _chapter_pause_ms: u64,
        ) -> Result<AssemblyResult> {
            if *self.fail.lock().unwrap() {
                return Err(crate::error::AudiobookError::AssemblyFailure {
                    stderr_tail: "mock assembly failure".to_string(),
                });
            }
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut combined = Vec::new();
            for (path, _, _) in chapters {
                combined.extend(std::fs::read(path)?);
            }
            std::fs::write(output_path, combined)?;
            Ok(AssemblyResult {
                output_path: output_path.to_path_buf(),
                chapters_embedded: true,
                chapter_error: String::new(),
            })
        }
    }

    pub struct MockVoiceRegistry {
        pub voices: Vec<String>,
    }

    impl VoiceRegistry for MockVoiceRegistry {
        fn available_voices(&self) -> Result<Vec<String>> {
            Ok(self.voices.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn validate_voices_returns_sorted_missing_set() {
        let mut wanted = BTreeSet::new();
        wanted.insert("af_heart".to_string());
        wanted.insert("am_liam".to_string());
        wanted.insert("zz_ghost".to_string());

        let available = vec!["af_heart".to_string(), "am_liam".to_string()];
        let missing = validate_voices(&wanted, &available);
        assert_eq!(missing, vec!["zz_ghost".to_string()]);
    }

    #[test]
    fn validate_voices_empty_when_all_present() {
        let mut wanted = BTreeSet::new();
        wanted.insert("af_heart".to_string());
        let available = vec!["af_heart".to_string()];
        assert!(validate_voices(&wanted, &available).is_empty());
    }
}
