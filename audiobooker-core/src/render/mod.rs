//! RenderOrchestrator: drives compile → synthesize → assemble with resume
//! and partial-failure handling, backed by a crash-safe cache manifest.

pub mod external_synthesizer;
pub mod ffmpeg;
pub mod protocols;

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::cache::manifest::{self, CacheStatus, ChapterCacheEntry};
use crate::casting::dialogue::utterances_to_script;
use crate::error::{AudiobookError, Result};
use crate::hash::{casting_hash, render_params_hash, text_hash};
use crate::project::ProjectDocument;
use protocols::{Assembler, ChapterAudio, Synthesizer, VoiceRegistry};

/// One chapter that failed synthesis, recorded for `RenderError`/reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FailedChapter {
    pub chapter_index: usize,
    pub chapter_title: String,
    pub error_message: String,
}

/// Outcome of a full project render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped_cached: usize,
    pub failed: Vec<FailedChapter>,
    pub total: usize,
    pub cache_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl RenderSummary {
    pub fn failed_chapters(&self) -> &[FailedChapter] {
        &self.failed
    }
}

/// Structured per-chapter render log line, mirroring the synthesis engine's
/// `RENDER_OK`/`RENDER_FAIL` log markers.
fn log_chapter_result(chapter_index: usize, title: &str, status: &str, message: Option<&str>) {
    match message {
        Some(message) => warn!("RENDER_FAIL: chapter_index={chapter_index} title={title:?} status={status} error={message:?}"),
        None => info!("RENDER_OK: chapter_index={chapter_index} title={title:?} status={status}"),
    }
}

pub struct RenderOptions<'a> {
    pub resume: bool,
    pub from_chapter: Option<usize>,
    pub allow_partial: bool,
    pub synthesizer: &'a dyn Synthesizer,
    pub assembler: &'a dyn Assembler,
    pub voice_registry: Option<&'a dyn VoiceRegistry>,
}

/// Orchestrates a full-project render: validates voices, ensures chapters
/// are compiled, synthesizes or restores each chapter from cache, then
/// assembles the final audiobook.
pub fn render_project(
    project: &mut ProjectDocument,
    output_path: &Path,
    project_dir: &Path,
    options: RenderOptions,
) -> Result<RenderSummary> {
    let RenderOptions {
        resume,
        from_chapter,
        allow_partial,
        synthesizer,
        assembler,
        voice_registry,
    } = options;

    if project.config.validate_voices_on_render {
        if let Some(registry) = voice_registry {
            validate_project_voices(project, registry)?;
        }
    }

    let uncompiled = project.chapters.iter().any(|c| !c.is_compiled());
    if uncompiled {
        project.compile()?;
    }

    let cache_root = manifest::get_cache_root(project_dir);
    let manifest_path = manifest::get_manifest_path(&cache_root);
    let mut cache_manifest = manifest::load_manifest(&manifest_path).unwrap_or_default();
    cache_manifest.book_title = project.title.clone();

    let params_hash = render_params_hash(&project.config);
    let total = project.chapters.len();
    let mut rendered = 0usize;
    let mut skipped_cached = 0usize;
    let mut failed: Vec<FailedChapter> = Vec::new();

    for i in 0..total {
        if let Some(from) = from_chapter {
            if i < from {
                log_chapter_result(i, &project.chapters[i].title, "skipped", None);
                continue;
            }
        }

        let t_hash = text_hash(&project.chapters[i]);
        let c_hash = casting_hash(&project.casting);

        let cached_entry = cache_manifest.get_entry(i).cloned();
        let can_resume = resume
            && cached_entry
                .as_ref()
                .map(|entry| entry.is_valid(&t_hash, &c_hash, &params_hash))
                .unwrap_or(false);

        if can_resume {
            let entry = cached_entry.unwrap();
            project.chapters[i].audio_path = Some(entry.wav_path.to_string_lossy().into_owned());
            project.chapters[i].duration_seconds = entry.duration_s;
            skipped_cached += 1;
            log_chapter_result(i, &project.chapters[i].title, "cached", None);
            continue;
        }

        let wav_path = manifest::get_chapter_wav_path(&cache_root, i);
        let tmp_path = wav_path.with_extension("wav.tmp");
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)?;
        }

        let script = utterances_to_script(&project.chapters[i].utterances);
        let voices = project.casting.voice_mapping();

        match synthesizer.synthesize(&script, &voices, &tmp_path) {
            Ok(result) => {
                if let Some(parent) = wav_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&tmp_path, &wav_path)?;

                project.chapters[i].audio_path = Some(wav_path.to_string_lossy().into_owned());
                project.chapters[i].duration_seconds = result.duration_seconds;

                cache_manifest.set_entry(ChapterCacheEntry {
                    chapter_index: i,
                    text_hash: t_hash,
                    casting_hash: c_hash,
                    render_params_hash: params_hash.clone(),
                    wav_path: wav_path.clone(),
                    duration_s: result.duration_seconds,
                    status: CacheStatus::Ok,
                    error_summary: String::new(),
                    created_at: Utc::now().to_rfc3339(),
                });
                manifest::save_manifest(&mut cache_manifest, &manifest_path)?;
                rendered += 1;
                log_chapter_result(i, &project.chapters[i].title, "ok", None);
            }
            Err(e) => {
                if tmp_path.exists() {
                    std::fs::remove_file(&tmp_path)?;
                }
                let message = e.to_string();
                cache_manifest.set_entry(ChapterCacheEntry {
                    chapter_index: i,
                    text_hash: t_hash,
                    casting_hash: c_hash,
                    render_params_hash: params_hash.clone(),
                    wav_path: wav_path.clone(),
                    duration_s: 0.0,
                    status: CacheStatus::Failed,
                    error_summary: message.clone(),
                    created_at: Utc::now().to_rfc3339(),
                });
                manifest::save_manifest(&mut cache_manifest, &manifest_path)?;
                log_chapter_result(i, &project.chapters[i].title, "failed", Some(&message));

                failed.push(FailedChapter {
                    chapter_index: i,
                    chapter_title: project.chapters[i].title.clone(),
                    error_message: message,
                });

                if !allow_partial {
                    return Err(AudiobookError::RenderError {
                        summary: RenderSummary {
                            rendered,
                            skipped_cached,
                            failed,
                            total,
                            cache_dir: cache_root,
                            manifest_path,
                        },
                    });
                }
            }
        }
    }

    let chapter_audio: Vec<ChapterAudio> = project
        .chapters
        .iter()
        .filter(|c| c.audio_path.as_ref().map(|p| Path::new(p).exists()).unwrap_or(false))
        .map(|c| {
            (
                PathBuf::from(c.audio_path.clone().unwrap()),
                c.title.clone(),
                c.duration_seconds,
            )
        })
        .collect();

    if chapter_audio.is_empty() {
        return Err(AudiobookError::RenderError {
            summary: RenderSummary {
                rendered,
                skipped_cached,
                failed,
                total,
                cache_dir: cache_root,
                manifest_path,
            },
        });
    }

    if !allow_partial {
        let start = from_chapter.unwrap_or(0);
        let missing_in_range = project.chapters[start..]
            .iter()
            .any(|c| c.audio_path.as_ref().map(|p| !Path::new(p).exists()).unwrap_or(true));
        if missing_in_range {
            return Err(AudiobookError::RenderError {
                summary: RenderSummary {
                    rendered,
                    skipped_cached,
                    failed,
                    total,
                    cache_dir: cache_root,
                    manifest_path,
                },
            });
        }
    }

    let assembly = assembler.assemble(
        &chapter_audio,
        output_path,
        &project.title,
        &project.author,
        project.config.chapter_pause_ms,
    )?;

    project.output_path = Some(assembly.output_path.clone());

    if !assembly.chapters_embedded {
        warn!(
            "RENDER_COMPLETE_NO_CHAPTERS: output={} reason={:?}",
            assembly.output_path.display(),
            assembly.chapter_error
        );
    } else {
        info!("RENDER_COMPLETE: output={}", assembly.output_path.display());
    }

    Ok(RenderSummary {
        rendered,
        skipped_cached,
        failed,
        total,
        cache_dir: cache_root,
        manifest_path,
    })
}

fn validate_project_voices(project: &ProjectDocument, registry: &dyn VoiceRegistry) -> Result<()> {
    let mut voice_ids: std::collections::BTreeSet<String> = project
        .casting
        .characters
        .values()
        .map(|c| c.voice.clone())
        .collect();
    voice_ids.insert(project.config.fallback_voice_id.clone());

    let available = registry.available_voices()?;
    let missing = protocols::validate_voices(&voice_ids, &available);
    if !missing.is_empty() {
        return Err(AudiobookError::VoiceNotFound {
            missing,
            available_count: available.len(),
        });
    }
    Ok(())
}
