//! audiobooker - turn a book (EPUB or plain text) into a cast, rendered,
//! chaptered audiobook.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use audiobooker_core::project::ProjectDocument;
use audiobooker_core::render::external_synthesizer::ExternalCommandSynthesizer;
use audiobooker_core::render::ffmpeg::FfmpegAssembler;
use audiobooker_core::render::RenderOptions;
use audiobooker_core::ProjectConfig;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

/// Default project settings, persisted outside any single project, the way
/// the teacher persists `GenaConfig` at `~/.config/cli-programs/gena.toml`.
fn defaults_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    Ok(dir.join("audiobooker").join("config.toml"))
}

fn load_default_config() -> Result<ProjectConfig> {
    let path = defaults_config_path()?;
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&content)?)
}

fn save_default_config(config: &ProjectConfig) -> Result<()> {
    let path = defaults_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "audiobooker")]
#[command(about = "Turn a book into a cast, rendered, chaptered audiobook", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the project file (.audiobooker). Required by every
    /// subcommand except `new`, `from-stdin`, and `config`.
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new project from an EPUB or text file
    New {
        source: PathBuf,
        /// Where to save the project file (default: <source>.audiobooker)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create a new project from stdin text
    FromStdin {
        #[arg(long, default_value = "Untitled")]
        title: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a summary of the loaded project
    Load,
    /// Assign a voice (and optional emotion/description) to a character
    Cast {
        character: String,
        voice: String,
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Segment dialogue and build the casting table for every chapter
    Compile,
    /// Synthesize and assemble the audiobook
    Render {
        /// Only render this chapter index
        #[arg(short, long)]
        chapter: Option<usize>,
        #[arg(long)]
        no_resume: bool,
        #[arg(long)]
        from_chapter: Option<usize>,
        #[arg(long)]
        allow_partial: bool,
        #[arg(long)]
        clean_cache: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// External command that performs TTS synthesis. Defaults to the
        /// AUDIOBOOKER_TTS_COMMAND environment variable.
        #[arg(long)]
        tts_command: Option<String>,
        /// Extra argument passed to the TTS command (repeatable)
        #[arg(long = "tts-arg")]
        tts_args: Vec<String>,
    },
    /// Print project info (title, word count, cast status, etc.)
    Info,
    /// List the voice ids currently assigned to cast characters
    Voices,
    /// List chapter titles and word counts
    Chapters,
    /// List detected speakers and whether each is cast
    Speakers,
    /// Export the compiled script to a human-editable review file
    ReviewExport {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import edits made to a review file back into the project
    ReviewImport { review_file: PathBuf },
    /// Manage default project settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the project's current configuration
    Show,
    /// Set the fallback voice id used for uncast characters
    SetFallbackVoice { voice_id: String },
    /// Set the pause between chapters, in milliseconds
    SetChapterPauseMs { value: u64 },
    /// Set the output sample rate
    SetSampleRate { value: u32 },
    /// Set the output container format (e.g. m4b, mp3)
    SetOutputFormat { value: String },
    /// Set the emotion inference mode (off, rule, auto)
    SetEmotionMode { value: String },
    /// Set the speaker-resolution mode (off, auto, on)
    SetBooknlpMode { value: String },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Commands::Config { action } = &args.command {
        return handle_config_command(action);
    }
    if let Commands::New { source, output } = &args.command {
        return handle_new(source, output.as_deref());
    }
    if let Commands::FromStdin { title, author, language, output } = &args.command {
        return handle_from_stdin(title, author, language, output);
    }

    let project_path = args
        .project
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--project <FILE> is required for this command"))?;
    let mut project = ProjectDocument::load(&project_path).context("failed to load project")?;

    match &args.command {
        Commands::Load | Commands::Info => handle_info(&project),
        Commands::Cast { character, voice, emotion, description } => {
            project.cast(character.clone(), voice.clone(), emotion.clone(), description.clone());
            project.save(Some(&project_path))?;
            println!("Cast {character} as {voice}");
        }
        Commands::Compile => {
            project.compile()?;
            project.save(Some(&project_path))?;
            println!("Compiled {} chapter(s)", project.chapters.len());
        }
        Commands::Render {
            chapter,
            no_resume,
            from_chapter,
            allow_partial,
            clean_cache,
            output,
            tts_command,
            tts_args,
        } => {
            handle_render(
                &mut project,
                &project_path,
                *chapter,
                *no_resume,
                *from_chapter,
                *allow_partial,
                *clean_cache,
                output.as_deref(),
                tts_command.clone(),
                tts_args.clone(),
            )?;
        }
        Commands::Voices => handle_voices(&project),
        Commands::Chapters => handle_chapters(&project),
        Commands::Speakers => handle_speakers(&project),
        Commands::ReviewExport { output } => {
            let path = project.export_for_review(output.as_deref())?;
            project.save(Some(&project_path))?;
            println!("Wrote review file: {}", path.display());
        }
        Commands::ReviewImport { review_file } => {
            let stats = project.import_reviewed(review_file)?;
            project.save(Some(&project_path))?;
            println!(
                "Updated {} chapter(s), imported {} utterance(s), speakers: {}",
                stats.chapters_updated,
                stats.utterances_imported,
                stats.speakers_found.join(", ")
            );
        }
        Commands::New { .. } | Commands::FromStdin { .. } | Commands::Config { .. } => unreachable!(),
    }

    Ok(())
}

fn handle_new(source: &PathBuf, output: Option<&std::path::Path>) -> Result<()> {
    if !source.exists() {
        bail!("source file not found: {}", source.display());
    }
    let config = load_default_config().context("failed to load default config")?;
    let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mut project = if extension.eq_ignore_ascii_case("epub") {
        ProjectDocument::from_epub(source, config)?
    } else {
        ProjectDocument::from_text(source, config)?
    };
    let saved_path = project.save(output)?;
    println!("Created project: {}", saved_path.display());
    println!("  Title: {}", project.title);
    println!("  Chapters: {}", project.chapters.len());
    Ok(())
}

fn handle_from_stdin(title: &str, author: &str, language: &str, output: &PathBuf) -> Result<()> {
    use std::io::Read;
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    let mut project = ProjectDocument::from_string(&text, title, author, language)?;
    let saved_path = project.save(Some(output))?;
    println!("Created project: {}", saved_path.display());
    Ok(())
}

fn handle_info(project: &ProjectDocument) {
    let info = project.info();
    println!("Title:    {}", info.title);
    println!("Author:   {}", info.author);
    if let Some(source) = &info.source {
        println!("Source:   {}", source.display());
    }
    println!("Chapters: {}", info.chapters);
    println!("Words:    {}", info.total_words);
    println!("Est. duration: {:.1} min", info.estimated_duration_minutes);
    println!("Cast characters: {}", info.characters_cast);
    if !info.uncast_speakers.is_empty() {
        println!("Uncast speakers: {}", info.uncast_speakers.join(", "));
    }
    println!("Compiled: {}", info.compiled);
    println!("Rendered: {}", info.rendered);
    if let Some(output) = &info.output {
        println!("Output:   {}", output.display());
    }
}

fn handle_voices(project: &ProjectDocument) {
    let mut voices: std::collections::BTreeSet<String> = project
        .casting
        .characters
        .values()
        .map(|c| c.voice.clone())
        .collect();
    voices.insert(project.casting.fallback_voice_id.clone());
    println!("Voice ids currently in use by this project (cast + fallback):");
    for voice in voices {
        println!("  {voice}");
    }
    println!(
        "\nThis project has no external voice catalog wired up; voices are whatever the \
         configured TTS command accepts. Use 'audiobooker cast <character> <voice>' to assign one."
    );
}

fn handle_chapters(project: &ProjectDocument) {
    for chapter in &project.chapters {
        println!(
            "[{:>3}] {:<40} {:>6} words  {}",
            chapter.index,
            chapter.title,
            chapter.word_count(),
            if chapter.is_compiled() { "compiled" } else { "not compiled" }
        );
    }
}

fn handle_speakers(project: &ProjectDocument) {
    let uncast = project.uncast_speakers();
    for speaker in project.detected_speakers() {
        let key = audiobooker_core::casting::CastingTable::normalize_key(&speaker);
        let status = if uncast.contains(&key) { "uncast" } else { "cast" };
        println!("{speaker:<24} {status}");
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_render(
    project: &mut ProjectDocument,
    project_path: &std::path::Path,
    chapter: Option<usize>,
    no_resume: bool,
    from_chapter: Option<usize>,
    allow_partial: bool,
    clean_cache: bool,
    output: Option<&std::path::Path>,
    tts_command: Option<String>,
    tts_args: Vec<String>,
) -> Result<()> {
    let project_dir = project_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if clean_cache {
        let cache_root = audiobooker_core::cache::manifest::get_cache_root(&project_dir);
        if cache_root.exists() {
            std::fs::remove_dir_all(&cache_root).context("failed to clean render cache")?;
        }
        println!("Cleaned render cache at {}", cache_root.display());
    }

    let tts_command = tts_command
        .or_else(|| std::env::var("AUDIOBOOKER_TTS_COMMAND").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no TTS command configured; pass --tts-command or set AUDIOBOOKER_TTS_COMMAND"
            )
        })?;
    let synthesizer = ExternalCommandSynthesizer::new(tts_command, tts_args);
    let assembler = FfmpegAssembler::new(project.config.sample_rate);

    if let Some(chapter_index) = chapter {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("Rendering chapter {chapter_index}..."));
        let wav_path = project_dir
            .join(format!("chapter_{chapter_index:04}.wav"));
        let path = project.render_chapter(chapter_index, &wav_path, &synthesizer)?;
        pb.finish_with_message(format!("Rendered {}", path.display()));
        project.save(Some(project_path))?;
        return Ok(());
    }

    let pb = ProgressBar::new(project.chapters.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chapters {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let summary = project.render(
        output,
        &project_dir,
        RenderOptions {
            resume: !no_resume,
            from_chapter,
            allow_partial,
            synthesizer: &synthesizer,
            assembler: &assembler,
            voice_registry: None,
        },
    );

    pb.finish_and_clear();
    project.save(Some(project_path))?;

    match summary {
        Ok(summary) => {
            println!(
                "Rendered {} chapter(s), {} from cache, {} failed, of {} total",
                summary.rendered, summary.skipped_cached, summary.failed.len(), summary.total
            );
            for failed in summary.failed_chapters() {
                println!("  FAILED [{}] {}: {}", failed.chapter_index, failed.chapter_title, failed.error_message);
            }
            if let Some(path) = &project.output_path {
                println!("Output: {}", path.display());
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit the default `ProjectConfig` applied to new projects created with
/// `new`/`from-stdin`. Mirrors the teacher's `gena config` subcommand, which
/// edits a dotfile of TTS defaults rather than any single project's state.
fn handle_config_command(action: &ConfigAction) -> Result<()> {
    if let ConfigAction::Show = action {
        let config = load_default_config()?;
        println!("Config file: {}", defaults_config_path()?.display());
        println!();
        println!("chapter_pause_ms = {}", config.chapter_pause_ms);
        println!("narrator_pause_ms = {}", config.narrator_pause_ms);
        println!("dialogue_pause_ms = {}", config.dialogue_pause_ms);
        println!("sample_rate = {}", config.sample_rate);
        println!("output_format = {:?}", config.output_format);
        println!("fallback_voice_id = {:?}", config.fallback_voice_id);
        println!("validate_voices_on_render = {}", config.validate_voices_on_render);
        println!("language_code = {:?}", config.language_code);
        println!("booknlp_mode = {:?}", config.booknlp_mode);
        println!("emotion_mode = {:?}", config.emotion_mode);
        println!("emotion_confidence_threshold = {}", config.emotion_confidence_threshold);
        return Ok(());
    }

    let mut config = load_default_config()?;
    match action {
        ConfigAction::Show => unreachable!(),
        ConfigAction::SetFallbackVoice { voice_id } => {
            config.fallback_voice_id = voice_id.clone();
            println!("fallback_voice_id = {voice_id:?}");
        }
        ConfigAction::SetChapterPauseMs { value } => {
            config.chapter_pause_ms = *value;
            println!("chapter_pause_ms = {value}");
        }
        ConfigAction::SetSampleRate { value } => {
            config.sample_rate = *value;
            println!("sample_rate = {value}");
        }
        ConfigAction::SetOutputFormat { value } => {
            config.output_format = value.clone();
            println!("output_format = {value:?}");
        }
        ConfigAction::SetEmotionMode { value } => {
            audiobooker_core::nlp::emotion::EmotionMode::parse(value)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            config.emotion_mode = value.clone();
            println!("emotion_mode = {value:?}");
        }
        ConfigAction::SetBooknlpMode { value } => {
            audiobooker_core::nlp::speaker_resolver::ResolverMode::parse(value)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            config.booknlp_mode = value.clone();
            println!("booknlp_mode = {value:?}");
        }
    }
    save_default_config(&config)?;
    Ok(())
}
