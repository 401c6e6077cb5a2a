mod export;
mod settings;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use vidsearch_core::audio::infrastructure::whisper_recognizer::{WhisperOptions, WhisperRecognizer};
use vidsearch_core::index::domain::span::{Span, SpanTable};
use vidsearch_core::index::infrastructure::sqlite_span_store::SqliteSpanStore;
use vidsearch_core::pipeline::index_transcript_use_case::IndexingConfig;
use vidsearch_core::pipeline::index_video_use_case::IndexVideoUseCase;
use vidsearch_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use vidsearch_core::pipeline::search_spans_use_case::{SearchError, SearchSpansUseCase};
use vidsearch_core::shared::constants::{DEFAULT_AUDIO_PATH, DEFAULT_DB_PATH, DEFAULT_NGRAM_SIZES};
use vidsearch_core::shared::hardware::{
    self, ComputeType, Device, DeviceChoice, HardwareRequest, HardwareSnapshot,
};
use vidsearch_core::shared::model_resolver::{self, ModelSpec};
use vidsearch_core::shared::timestamp::format_timestamp;
use vidsearch_core::video::infrastructure::ffmpeg_audio_reader::FfmpegAudioReader;

use settings::Settings;

/// Index the speech in a video and find when words or phrases were said.
#[derive(Parser)]
#[command(name = "vidsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a video and store every word and phrase with its timestamps.
    Index(IndexArgs),
    /// Look up a word or phrase in an existing index.
    Search(SearchArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Video file to index.
    #[arg(long)]
    video: PathBuf,

    /// Index database file.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Where the 16 kHz mono WAV is staged.
    #[arg(long, default_value = DEFAULT_AUDIO_PATH)]
    audio: PathBuf,

    /// Whisper model size: tiny, base, small, medium, large, large-v2, large-v3.
    #[arg(long)]
    model: Option<String>,

    /// Use this ggml model file instead of resolving one by size.
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Spoken language (ISO 639-1), or "auto".
    #[arg(long)]
    language: Option<String>,

    /// Inference device: cpu, cuda or auto.
    #[arg(long)]
    device: Option<DeviceChoice>,

    /// Model precision: int8 or float16.
    #[arg(long)]
    compute_type: Option<ComputeType>,

    /// Words below this confidence are not indexed (0.0-1.0).
    #[arg(long)]
    min_conf: Option<f64>,

    /// Inference threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Spans buffered per table before each commit.
    #[arg(long)]
    flush_threshold: Option<usize>,

    /// Keep the staged WAV file after indexing.
    #[arg(long)]
    keep_audio: bool,

    /// Pick device, precision and workers from the detected hardware.
    #[arg(long)]
    auto: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Word or phrase to look up.
    #[arg(long)]
    term: String,

    /// Index database file.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Minimum confidence of returned matches (0.0-1.0).
    #[arg(long)]
    min_conf: Option<f64>,

    /// Only return the earliest match.
    #[arg(long)]
    first_only: bool,

    /// Export matches to a `|`-delimited CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print ffmpeg commands that cut a clip around each match of this video.
    #[arg(long, value_name = "VIDEO")]
    generate_clips: Option<PathBuf>,

    /// Seconds of context on each side of a clip.
    #[arg(long)]
    clip_margin: Option<u32>,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// `Ok(false)` means the command ran but found nothing.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Command::Index(args) => {
            validate_index(&args)?;
            run_index(args, &settings)?;
            Ok(true)
        }
        Command::Search(args) => {
            validate_search(&args)?;
            run_search(args, &settings)
        }
    }
}

fn run_index(args: IndexArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = HardwareSnapshot::probe();
    let hw = hardware::resolve(
        &HardwareRequest {
            device: args.device,
            compute_type: args.compute_type,
            workers: args.workers,
            auto: args.auto,
        },
        &snapshot,
    );
    if hw.auto_selected {
        println!(
            "Detected {} CPU cores, GPU: {}",
            snapshot.cpu_cores,
            snapshot.gpu_name.as_deref().unwrap_or("none")
        );
    }
    println!(
        "Device: {} | Precision: {} | Workers: {}",
        hw.device, hw.compute_type, hw.workers
    );

    let model_path = match args.model_path {
        Some(path) => path,
        None => {
            let size = args.model.as_deref().unwrap_or(&settings.model);
            let spec = ModelSpec::new(size, hw.compute_type)?;
            log::info!("Resolving model: {}", spec.file_name());
            let path = model_resolver::resolve(
                &spec,
                settings.models_dir.as_deref(),
                Some(Box::new(download_progress)),
            )?;
            eprintln!();
            path
        }
    };

    let recognizer = WhisperRecognizer::new(
        &model_path,
        WhisperOptions {
            language: args.language.unwrap_or_else(|| settings.language.clone()),
            threads: hw.workers,
            use_gpu: hw.device == Device::Cuda,
        },
    )?;

    let config = IndexingConfig {
        flush_threshold: args.flush_threshold.unwrap_or(settings.flush_threshold),
        min_confidence: args.min_conf.unwrap_or(settings.index_min_confidence),
        ngram_sizes: DEFAULT_NGRAM_SIZES.to_vec(),
    };
    println!(
        "Indexing {} into {} (flush every {} spans)",
        args.video.display(),
        args.db.display(),
        config.flush_threshold
    );

    let db = args.db;
    let mut use_case = IndexVideoUseCase::new(
        Box::new(FfmpegAudioReader),
        Box::new(recognizer),
        config,
        Box::new(StdoutPipelineLogger::default()),
    );
    let (stats, store) = use_case.run(&args.video, &args.audio, args.keep_audio, || {
        let store = SqliteSpanStore::open(&db)?;
        store.tune_for_bulk_load()?;
        Ok(store)
    })?;
    use_case.logger().summary();

    println!();
    println!("Segments: {} ({} empty)", stats.segments, stats.skipped_segments);
    for &table in SpanTable::ALL {
        println!("{table:8} {:>10} rows in {}", store.count(table)?, table.table_name());
    }
    drop(store);
    if let Ok(meta) = std::fs::metadata(&db) {
        println!("Index size: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }
    if args.keep_audio {
        println!("Audio kept at {}", args.audio.display());
    }
    Ok(())
}

fn run_search(args: SearchArgs, settings: &Settings) -> Result<bool, Box<dyn std::error::Error>> {
    let min_conf = args.min_conf.unwrap_or(settings.search_min_confidence);
    let use_case = match SearchSpansUseCase::open(&args.db, min_conf, args.first_only) {
        Ok(uc) => uc,
        Err(SearchError::StoreMissing(path)) => {
            return Err(format!(
                "index not found: {} (run `vidsearch index` first)",
                path.display()
            )
            .into())
        }
        Err(e) => return Err(e.into()),
    };

    println!("Searching: '{}' (min confidence {min_conf})", args.term);
    let hits = use_case.run(&args.term)?;
    if hits.is_empty() {
        print_no_matches(&args.term);
        return Ok(false);
    }

    print_hits(&hits);
    if let Some(csv) = &args.csv {
        export::write_csv(csv, &hits)?;
        println!("\nExported to {}", csv.display());
    }
    if let Some(video) = &args.generate_clips {
        print_clip_commands(
            &hits,
            video,
            args.clip_margin.unwrap_or(settings.clip_margin),
        );
    }
    Ok(true)
}

fn print_hits(hits: &[Span]) {
    println!("Found {} match(es):\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:3}. {} | {:5.1}% | '{}'",
            i + 1,
            format_timestamp(hit.start_time),
            hit.confidence * 100.0,
            hit.text
        );
        println!("     {:.3}s - {:.3}s", hit.start_time, hit.end_time);
    }
}

fn print_no_matches(term: &str) {
    println!("No matches for '{term}'. Try:");
    println!("  - lowering the minimum confidence (--min-conf)");
    println!("  - checking the spelling");
    println!("  - searching for a variation of the word");
}

fn print_clip_commands(hits: &[Span], video: &Path, margin: u32) {
    println!("\nffmpeg commands (margin ±{margin}s):\n");
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "# Clip {} - {} ({:.2})",
            i + 1,
            format_timestamp(hit.start_time),
            hit.confidence
        );
        println!("{}\n", export::clip_command(i + 1, hit, video, margin));
    }
}

fn validate_index(args: &IndexArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.video.exists() {
        return Err(format!("Video file not found: {}", args.video.display()).into());
    }
    if let Some(path) = &args.model_path {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    validate_confidence(args.min_conf)?;
    if args.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    if args.flush_threshold == Some(0) {
        return Err("Flush threshold must be at least 1".into());
    }
    if args.audio == args.video {
        return Err("--audio must not be the input video".into());
    }
    Ok(())
}

fn validate_search(args: &SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.term.trim().is_empty() {
        return Err("Search term must not be empty".into());
    }
    validate_confidence(args.min_conf)
}

fn validate_confidence(value: Option<f64>) -> Result<(), Box<dyn std::error::Error>> {
    match value {
        Some(c) if !(0.0..=1.0).contains(&c) => {
            Err(format!("Confidence must be between 0.0 and 1.0, got {c}").into())
        }
        _ => Ok(()),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading speech model... {pct}%");
    } else {
        eprint!("\rDownloading speech model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_index_defaults() {
        let Command::Index(args) = parse(&["vidsearch", "index", "--video", "talk.mp4"]).command
        else {
            panic!("expected index");
        };
        assert_eq!(args.db, PathBuf::from("index.db"));
        assert_eq!(args.audio, PathBuf::from("audio_16k.wav"));
        assert!(args.model.is_none());
        assert!(args.device.is_none());
        assert!(!args.keep_audio);
        assert!(!args.auto);
    }

    #[test]
    fn test_index_hardware_flags() {
        let Command::Index(args) = parse(&[
            "vidsearch",
            "index",
            "--video",
            "talk.mp4",
            "--device",
            "cuda",
            "--compute-type",
            "float16",
            "--workers",
            "3",
        ])
        .command
        else {
            panic!("expected index");
        };
        assert_eq!(args.device, Some(DeviceChoice::Cuda));
        assert_eq!(args.compute_type, Some(ComputeType::Float16));
        assert_eq!(args.workers, Some(3));
    }

    #[test]
    fn test_bad_device_is_rejected() {
        assert!(Cli::try_parse_from(["vidsearch", "index", "--video", "a.mp4", "--device", "tpu"])
            .is_err());
    }

    #[test]
    fn test_search_flags() {
        let Command::Search(args) = parse(&[
            "vidsearch",
            "search",
            "--term",
            "buenos dias",
            "--first-only",
            "--generate-clips",
            "talk.mp4",
            "--clip-margin",
            "4",
        ])
        .command
        else {
            panic!("expected search");
        };
        assert_eq!(args.term, "buenos dias");
        assert!(args.first_only);
        assert_eq!(args.generate_clips, Some(PathBuf::from("talk.mp4")));
        assert_eq!(args.clip_margin, Some(4));
        assert!(args.min_conf.is_none());
    }

    #[test]
    fn test_search_requires_term() {
        assert!(Cli::try_parse_from(["vidsearch", "search"]).is_err());
    }

    #[test]
    fn test_validate_search_rejects_blank_term_and_bad_confidence() {
        let Command::Search(mut args) = parse(&["vidsearch", "search", "--term", "  "]).command
        else {
            panic!("expected search");
        };
        assert!(validate_search(&args).is_err());
        args.term = "hola".into();
        args.min_conf = Some(1.5);
        assert!(validate_search(&args).is_err());
        args.min_conf = Some(0.5);
        assert!(validate_search(&args).is_ok());
    }

    #[test]
    fn test_validate_index_missing_video() {
        let Command::Index(args) =
            parse(&["vidsearch", "index", "--video", "/no/such/video.mp4"]).command
        else {
            panic!("expected index");
        };
        assert!(validate_index(&args).is_err());
    }

    #[test]
    fn test_validate_index_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        std::fs::write(&video, b"x").unwrap();
        let video = video.to_str().unwrap();
        let Command::Index(args) =
            parse(&["vidsearch", "index", "--video", video, "--workers", "0"]).command
        else {
            panic!("expected index");
        };
        assert!(validate_index(&args).is_err());
    }
}
