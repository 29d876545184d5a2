//! FFmpeg-backed [`Assembler`]: concatenates chapter WAVs with inter-chapter
//! silence, encodes to AAC, and muxes in FFMETADATA1 chapter markers.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::error::{AudiobookError, Result};

use super::protocols::{AssemblyResult, Assembler, ChapterAudio};

fn ffmpeg_command() -> Command {
    Command::new("ffmpeg")
}

fn ffprobe_command() -> Command {
    Command::new("ffprobe")
}

pub fn check_ffmpeg() -> bool {
    ffmpeg_command()
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Duration of an audio file in seconds, via `ffprobe`. Returns `0.0` if
/// the probe fails rather than erroring — callers already have a
/// `duration_s` recorded from synthesis to fall back on.
pub fn get_audio_duration(audio_path: &Path) -> f64 {
    let output = ffprobe_command()
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(audio_path)
        .output();

    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build FFMETADATA1 content with one `[CHAPTER]` block per chapter,
/// accounting for the silence gap inserted between chapters.
fn generate_chapter_metadata(
    chapters: &[ChapterAudio],
    title: &str,
    author: &str,
    chapter_pause_ms: u64,
) -> String {
    let mut out = String::new();
    writeln!(out, ";FFMETADATA1").unwrap();
    writeln!(out, "title={}", escape_metadata_value(title)).unwrap();
    if !author.is_empty() {
        writeln!(out, "artist={}", escape_metadata_value(author)).unwrap();
    }
    writeln!(out, "album={}", escape_metadata_value(title)).unwrap();
    writeln!(out, "genre=Audiobook").unwrap();
    writeln!(out).unwrap();

    let mut current_ms: u64 = 0;
    for (audio_path, chapter_title, duration) in chapters {
        let duration = if *duration > 0.0 {
            *duration
        } else {
            get_audio_duration(audio_path)
        };
        let duration_ms = (duration * 1000.0) as u64;

        writeln!(out, "[CHAPTER]").unwrap();
        writeln!(out, "TIMEBASE=1/1000").unwrap();
        writeln!(out, "START={current_ms}").unwrap();
        writeln!(out, "END={}", current_ms + duration_ms).unwrap();
        writeln!(out, "title={}", escape_metadata_value(chapter_title)).unwrap();
        writeln!(out).unwrap();

        current_ms += duration_ms + chapter_pause_ms;
    }

    out
}

fn generate_silence(temp_dir: &Path, pause_ms: u64, sample_rate: u32) -> Result<PathBuf> {
    let silence_path = temp_dir.join(format!("silence_{pause_ms}.wav"));
    let duration_s = pause_ms as f64 / 1000.0;
    let output = ffmpeg_command()
        .args(["-y", "-f", "lavfi", "-i"])
        .arg(format!("anullsrc=r={sample_rate}:cl=mono:d={duration_s}"))
        .arg(&silence_path)
        .output()
        .map_err(|e| AudiobookError::AssemblyFailure {
            stderr_tail: format!("failed to spawn ffmpeg for silence generation: {e}"),
        })?;

    if !output.status.success() {
        return Err(AudiobookError::AssemblyFailure {
            stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(silence_path)
}

/// Concatenate `audio_files` into `output_path`, inserting `pause_ms` of
/// silence between each pair of files (none after the last).
pub fn concatenate_audio_files(
    audio_files: &[PathBuf],
    output_path: &Path,
    pause_ms: u64,
    sample_rate: u32,
) -> Result<()> {
    if audio_files.is_empty() {
        return Err(AudiobookError::AssemblyFailure {
            stderr_tail: "no audio files to concatenate".to_string(),
        });
    }

    if audio_files.len() == 1 {
        std::fs::copy(&audio_files[0], output_path)?;
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let list_path = temp_dir.path().join("concat_list.txt");
    let mut list_file = File::create(&list_path)?;

    for (i, path) in audio_files.iter().enumerate() {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        writeln!(list_file, "file '{escaped}'")?;

        if i + 1 < audio_files.len() && pause_ms > 0 {
            let silence_path = generate_silence(temp_dir.path(), pause_ms, sample_rate)?;
            let escaped_silence = silence_path.to_string_lossy().replace('\'', "'\\''");
            writeln!(list_file, "file '{escaped_silence}'")?;
        }
    }
    drop(list_file);

    let output = ffmpeg_command()
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_path)
        .args(["-c", "copy"])
        .arg(output_path)
        .output()
        .map_err(|e| AudiobookError::AssemblyFailure {
            stderr_tail: format!("failed to spawn ffmpeg concat: {e}"),
        })?;

    if !output.status.success() {
        return Err(AudiobookError::AssemblyFailure {
            stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Convert each chapter to a standalone MP3, for the `output_format =
/// "mp3"` layout: one file per chapter instead of a single M4B.
pub fn assemble_mp3_chapters(
    chapters: &[ChapterAudio],
    output_dir: &Path,
    title: &str,
) -> Result<Vec<PathBuf>> {
    if !check_ffmpeg() {
        return Err(AudiobookError::AssemblyFailure {
            stderr_tail: "ffmpeg is required for MP3 conversion".to_string(),
        });
    }
    std::fs::create_dir_all(output_dir)?;

    let mut mp3_paths = Vec::with_capacity(chapters.len());
    for (i, (audio_path, chapter_title, _)) in chapters.iter().enumerate() {
        let safe_title: String = chapter_title
            .chars()
            .map(|c| if c.is_alphanumeric() || " -_".contains(c) { c } else { '_' })
            .collect();
        let mp3_path = output_dir.join(format!("{:02}_{safe_title}.mp3", i + 1));

        let output = ffmpeg_command()
            .args(["-y", "-i"])
            .arg(audio_path)
            .args(["-c:a", "libmp3lame", "-b:a", "128k", "-metadata"])
            .arg(format!("title={chapter_title}"))
            .args(["-metadata"])
            .arg(format!("album={title}"))
            .args(["-metadata"])
            .arg(format!("track={}", i + 1))
            .arg(&mp3_path)
            .output()
            .map_err(|e| AudiobookError::AssemblyFailure {
                stderr_tail: format!("failed to spawn ffmpeg for MP3 conversion: {e}"),
            })?;

        if !output.status.success() {
            return Err(AudiobookError::AssemblyFailure {
                stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        mp3_paths.push(mp3_path);
    }

    Ok(mp3_paths)
}

pub struct FfmpegAssembler {
    pub sample_rate: u32,
}

impl FfmpegAssembler {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Assembler for FfmpegAssembler {
    fn assemble(
        &self,
        chapters: &[ChapterAudio],
        output_path: &Path,
        title: &str,
        author: &str,
        chapter_pause_ms: u64,
    ) -> Result<AssemblyResult> {
        if !check_ffmpeg() {
            return Err(AudiobookError::AssemblyFailure {
                stderr_tail: "ffmpeg is required for audiobook assembly".to_string(),
            });
        }
        if chapters.is_empty() {
            return Err(AudiobookError::AssemblyFailure {
                stderr_tail: "no chapter audio to assemble".to_string(),
            });
        }

        let temp_dir = TempDir::new()?;

        let audio_paths: Vec<PathBuf> = chapters.iter().map(|(p, _, _)| p.clone()).collect();
        let concat_path = temp_dir.path().join("concat.wav");
        concatenate_audio_files(&audio_paths, &concat_path, chapter_pause_ms, self.sample_rate)?;

        let metadata_content = generate_chapter_metadata(chapters, title, author, chapter_pause_ms);
        let metadata_path = temp_dir.path().join("metadata.txt");
        std::fs::write(&metadata_path, metadata_content)?;

        let aac_path = temp_dir.path().join("audio.m4a");
        let output = ffmpeg_command()
            .args(["-y", "-i"])
            .arg(&concat_path)
            .args(["-c:a", "aac", "-b:a", "128k", "-ar"])
            .arg(self.sample_rate.to_string())
            .arg(&aac_path)
            .output()
            .map_err(|e| AudiobookError::AssemblyFailure {
                stderr_tail: format!("failed to spawn ffmpeg AAC conversion: {e}"),
            })?;

        if !output.status.success() {
            return Err(AudiobookError::AssemblyFailure {
                stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let chapter_output = ffmpeg_command()
            .args(["-y", "-i"])
            .arg(&aac_path)
            .args(["-i"])
            .arg(&metadata_path)
            .args(["-map", "0:a", "-map_metadata", "1", "-c", "copy"])
            .arg(output_path)
            .output()
            .map_err(|e| AudiobookError::AssemblyFailure {
                stderr_tail: format!("failed to spawn ffmpeg chapter mux: {e}"),
            })?;

        if !chapter_output.status.success() {
            let stderr = String::from_utf8_lossy(&chapter_output.stderr);
            let stderr_tail: String = stderr.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n");
            log::warn!(
                "Chapter embedding failed, producing audio without chapters.\nFFmpeg stderr (last 20 lines):\n{stderr_tail}"
            );
            std::fs::copy(&aac_path, output_path)?;
            return Ok(AssemblyResult {
                output_path: output_path.to_path_buf(),
                chapters_embedded: false,
                chapter_error: stderr_tail,
            });
        }

        Ok(AssemblyResult {
            output_path: output_path.to_path_buf(),
            chapters_embedded: true,
            chapter_error: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_metadata_value_escapes_special_characters() {
        assert_eq!(escape_metadata_value("Simple"), "Simple");
        assert_eq!(escape_metadata_value("Test=Value"), "Test\\=Value");
        assert_eq!(escape_metadata_value("Line1\nLine2"), "Line1\\nLine2");
    }

    #[test]
    fn generate_chapter_metadata_advances_by_duration_plus_pause() {
        let chapters = vec![
            (PathBuf::from("a.wav"), "Chapter 1".to_string(), 60.0),
            (PathBuf::from("b.wav"), "Chapter 2".to_string(), 30.0),
        ];
        let metadata = generate_chapter_metadata(&chapters, "My Book", "Author", 2000);
        assert!(metadata.contains("START=0"));
        assert!(metadata.contains("END=60000"));
        assert!(metadata.contains("START=62000"));
        assert!(metadata.contains("END=92000"));
    }

    #[test]
    fn concatenate_single_file_just_copies() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.wav");
        std::fs::write(&src, b"RIFF fake wav data").unwrap();
        let dest = dir.path().join("out.wav");
        concatenate_audio_files(&[src], &dest, 2000, 24000).unwrap();
        assert!(dest.exists());
    }
}
