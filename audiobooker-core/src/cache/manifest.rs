//! Render cache manifest — tracks per-chapter WAV status for resume.
//!
//! The manifest is the source of truth for what has been rendered. It is
//! written atomically after each chapter completes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{AudiobookError, Result};

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILENAME: &str = "render_v1.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Pending,
    Ok,
    Failed,
}

impl Default for CacheStatus {
    fn default() -> Self {
        CacheStatus::Pending
    }
}

/// One chapter's cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterCacheEntry {
    pub chapter_index: usize,
    pub text_hash: String,
    pub casting_hash: String,
    pub render_params_hash: String,
    pub wav_path: PathBuf,
    #[serde(default)]
    pub duration_s: f64,
    #[serde(default)]
    pub status: CacheStatus,
    #[serde(default)]
    pub error_summary: String,
    #[serde(default)]
    pub created_at: String,
}

impl ChapterCacheEntry {
    /// An entry is valid only if its status is ok, every hash still matches
    /// the chapter's current inputs, and the WAV file still exists on disk.
    pub fn is_valid(&self, text_hash: &str, casting_hash: &str, render_params_hash: &str) -> bool {
        self.status == CacheStatus::Ok
            && self.text_hash == text_hash
            && self.casting_hash == casting_hash
            && self.render_params_hash == render_params_hash
            && self.wav_path.exists()
    }
}

/// Top-level manifest for a render session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub chapters: Vec<ChapterCacheEntry>,
    #[serde(default)]
    pub last_updated: String,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            book_title: String::new(),
            config_hash: String::new(),
            chapters: Vec::new(),
            last_updated: String::new(),
        }
    }
}

impl CacheManifest {
    pub fn get_entry(&self, chapter_index: usize) -> Option<&ChapterCacheEntry> {
        self.chapters.iter().find(|e| e.chapter_index == chapter_index)
    }

    /// Insert or replace the entry for a chapter index.
    pub fn set_entry(&mut self, entry: ChapterCacheEntry) {
        if let Some(existing) = self
            .chapters
            .iter_mut()
            .find(|e| e.chapter_index == entry.chapter_index)
        {
            *existing = entry;
        } else {
            self.chapters.push(entry);
        }
    }

    pub fn ok_chapters(&self) -> Vec<&ChapterCacheEntry> {
        self.chapters.iter().filter(|e| e.status == CacheStatus::Ok).collect()
    }

    pub fn failed_chapters(&self) -> Vec<&ChapterCacheEntry> {
        self.chapters.iter().filter(|e| e.status == CacheStatus::Failed).collect()
    }
}

/// Load the manifest from disk. Returns `None` if missing, corrupt, or from
/// a newer manifest schema than this implementation supports.
pub fn load_manifest(manifest_path: &Path) -> Option<CacheManifest> {
    if !manifest_path.exists() {
        return None;
    }
    let contents = std::fs::read_to_string(manifest_path).ok()?;
    let manifest: CacheManifest = match serde_json::from_str(&contents) {
        Ok(m) => m,
        Err(e) => {
            let err = AudiobookError::CacheCorrupt(format!("{}: {e}", manifest_path.display()));
            warn!("{err}");
            return None;
        }
    };
    if manifest.version > MANIFEST_VERSION {
        warn!(
            "manifest version {} > supported {MANIFEST_VERSION}; ignoring cache",
            manifest.version
        );
        return None;
    }
    Some(manifest)
}

/// Atomically write the manifest (write tmp, then rename over any existing
/// file). A crash mid-rename leaves either the previous good manifest or an
/// orphaned `.json.tmp` that `load_manifest` simply ignores.
pub fn save_manifest(manifest: &mut CacheManifest, manifest_path: &Path) -> Result<()> {
    manifest.last_updated = Utc::now().to_rfc3339();
    if let Some(parent) = manifest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = manifest_path.with_extension("json.tmp");
    let serialized = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&tmp_path, serialized)?;

    if manifest_path.exists() {
        std::fs::remove_file(manifest_path)?;
    }
    std::fs::rename(&tmp_path, manifest_path)?;
    Ok(())
}

/// `<project_dir>/.audiobooker/cache/`
pub fn get_cache_root(project_dir: &Path) -> PathBuf {
    project_dir.join(".audiobooker").join("cache")
}

pub fn get_chapters_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("chapters")
}

pub fn get_manifests_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("manifests")
}

pub fn get_chapter_wav_path(cache_root: &Path, chapter_index: usize) -> PathBuf {
    get_chapters_dir(cache_root).join(format!("chapter_{chapter_index:04}.wav"))
}

pub fn get_manifest_path(cache_root: &Path) -> PathBuf {
    get_manifests_dir(cache_root).join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_valid_requires_matching_hashes_and_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("chapter_0000.wav");
        std::fs::write(&wav_path, b"fake wav").unwrap();

        let entry = ChapterCacheEntry {
            chapter_index: 0,
            text_hash: "t".to_string(),
            casting_hash: "c".to_string(),
            render_params_hash: "p".to_string(),
            wav_path: wav_path.clone(),
            duration_s: 1.0,
            status: CacheStatus::Ok,
            error_summary: String::new(),
            created_at: String::new(),
        };
        assert!(entry.is_valid("t", "c", "p"));
        assert!(!entry.is_valid("other", "c", "p"));

        std::fs::remove_file(&wav_path).unwrap();
        assert!(!entry.is_valid("t", "c", "p"));
    }

    #[test]
    fn failed_status_entry_is_never_valid() {
        let entry = ChapterCacheEntry {
            chapter_index: 0,
            text_hash: "t".to_string(),
            casting_hash: "c".to_string(),
            render_params_hash: "p".to_string(),
            wav_path: PathBuf::from("/nonexistent.wav"),
            duration_s: 0.0,
            status: CacheStatus::Failed,
            error_summary: "boom".to_string(),
            created_at: String::new(),
        };
        assert!(!entry.is_valid("t", "c", "p"));
    }

    #[test]
    fn set_entry_replaces_existing_chapter_index() {
        let mut manifest = CacheManifest::default();
        manifest.set_entry(ChapterCacheEntry {
            chapter_index: 0,
            text_hash: "a".to_string(),
            casting_hash: "a".to_string(),
            render_params_hash: "a".to_string(),
            wav_path: PathBuf::from("a.wav"),
            duration_s: 0.0,
            status: CacheStatus::Ok,
            error_summary: String::new(),
            created_at: String::new(),
        });
        manifest.set_entry(ChapterCacheEntry {
            chapter_index: 0,
            text_hash: "b".to_string(),
            casting_hash: "b".to_string(),
            render_params_hash: "b".to_string(),
            wav_path: PathBuf::from("b.wav"),
            duration_s: 0.0,
            status: CacheStatus::Ok,
            error_summary: String::new(),
            created_at: String::new(),
        });
        assert_eq!(manifest.chapters.len(), 1);
        assert_eq!(manifest.chapters[0].text_hash, "b");
    }

    #[test]
    fn save_then_load_round_trips_and_updates_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = get_manifest_path(&get_cache_root(dir.path()));

        let mut manifest = CacheManifest::default();
        manifest.book_title = "My Book".to_string();
        save_manifest(&mut manifest, &manifest_path).unwrap();
        assert!(!manifest.last_updated.is_empty());

        let loaded = load_manifest(&manifest_path).unwrap();
        assert_eq!(loaded.book_title, "My Book");
    }

    #[test]
    fn load_manifest_returns_none_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("does_not_exist.json");
        assert!(load_manifest(&manifest_path).is_none());
    }

    #[test]
    fn load_manifest_returns_none_for_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("corrupt.json");
        std::fs::write(&manifest_path, "{not valid json").unwrap();
        assert!(load_manifest(&manifest_path).is_none());
    }

    #[test]
    fn chapter_wav_path_uses_four_digit_padding() {
        let cache_root = PathBuf::from("/cache");
        let path = get_chapter_wav_path(&cache_root, 7);
        assert_eq!(path.file_name().unwrap(), "chapter_0007.wav");
    }
}
