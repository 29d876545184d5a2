//! ExternalCommandSynthesizer: wraps a user-supplied TTS command line tool
//! to satisfy the [`Synthesizer`] capability.
//!
//! This crate authors no TTS model of its own — synthesis is an external,
//! swappable capability (mirroring `_VoiceSoundboardEngine`'s lazy wrap of
//! the `voice-soundboard` package). The Rust equivalent of "wrap an
//! external engine" is to shell out to it: the configured command receives
//! the script on stdin, a `--voices` JSON argument, and an output path, and
//! is expected to write a WAV file there and print its duration in seconds
//! on stdout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{AudiobookError, Result};

use super::protocols::{SynthesisResult, Synthesizer};

pub struct ExternalCommandSynthesizer {
    pub command: String,
    pub args: Vec<String>,
}

impl ExternalCommandSynthesizer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl Synthesizer for ExternalCommandSynthesizer {
    fn synthesize(
        &self,
        script: &str,
        voices: &std::collections::BTreeMap<String, String>,
        output_path: &Path,
    ) -> Result<SynthesisResult> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let voices_json = serde_json::to_string(voices)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg("--voices")
            .arg(&voices_json)
            .arg("--output")
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| synth_error(&format!("failed to spawn {}: {e}", self.command)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|e| synth_error(&format!("failed to write script to stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| synth_error(&format!("failed to wait on {}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(synth_error(&format!(
                "{} exited with {}: {}",
                self.command, output.status, stderr
            )));
        }

        if !output_path.exists() {
            return Err(synth_error(&format!(
                "{} reported success but did not write {}",
                self.command,
                output_path.display()
            )));
        }

        let duration_seconds = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next_back()
            .and_then(|line| line.trim().parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(SynthesisResult {
            audio_path: output_path.to_path_buf(),
            duration_seconds,
            warnings: Vec::new(),
        })
    }
}

fn synth_error(message: &str) -> AudiobookError {
    AudiobookError::SynthesizerFailure {
        chapter_index: 0,
        utterance_index: -1,
        speaker: String::new(),
        voice: String::new(),
        text_preview: String::new(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_executable_surfaces_as_synthesizer_failure() {
        let synthesizer = ExternalCommandSynthesizer::new("a-command-that-does-not-exist-xyz", vec![]);
        let voices = BTreeMap::new();
        let output_path = PathBuf::from("/tmp/should-not-be-created.wav");
        let result = synthesizer.synthesize("script", &voices, &output_path);
        assert!(result.is_err());
    }
}
