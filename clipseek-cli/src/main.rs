use clap::{Parser, Subcommand};
use clipseek::audio::{loader, splitter};
use clipseek::search::timecode;
use clipseek::{locate_clip, AudioData, Matcher, SearchParams};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "clipseek", about = "Locate a highlight clip inside a long recording")]
struct Cli {
    /// Show analysis progress (-v: info, -vv: per-window detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find where a clip starts inside a long recording
    Find {
        /// The highlight clip (WAV, FLAC, MP3, M4A or OGG)
        clip: PathBuf,

        /// The full-length source recording
        source: PathBuf,

        /// Use only the clip from this time on (HH:MM:SS, MM:SS or seconds)
        #[arg(long)]
        clip_start: Option<String>,

        /// Use only the clip up to this time
        #[arg(long)]
        clip_end: Option<String>,

        /// Directory for the temporary source segments (default: system temp)
        #[arg(long)]
        segments_dir: Option<PathBuf>,

        /// Keep the segment files instead of deleting them afterwards
        #[arg(long)]
        keep_segments: bool,

        /// Agreeing hashes a window needs to count as a match
        #[arg(long)]
        min_count: Option<usize>,

        /// Segment duration handed to ffmpeg, seconds
        #[arg(long)]
        split_duration: Option<u64>,

        /// Emit the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Compare two audio files for fingerprint overlap
    Compare {
        /// The file whose fingerprint is built
        reference: PathBuf,

        /// The file scored against it
        sample: PathBuf,

        /// Agreeing hashes needed for a match verdict
        #[arg(long)]
        min_count: Option<usize>,

        /// Emit the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Split an audio file into fixed-duration segments
    Split {
        input: PathBuf,

        /// Output prefix; segments land at <prefix>_000.m4a, <prefix>_001.m4a, ...
        output_prefix: PathBuf,

        /// Segment duration in seconds
        #[arg(long, default_value_t = 3600)]
        duration: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::Find {
            clip,
            source,
            clip_start,
            clip_end,
            segments_dir,
            keep_segments,
            min_count,
            split_duration,
            json,
        } => {
            let mut params = SearchParams::default();
            if let Some(min_count) = min_count {
                params.matcher.min_count = min_count;
            }
            if let Some(split_duration) = split_duration {
                params.split_duration = split_duration;
            }

            let options = FindOptions {
                clip_start,
                clip_end,
                segments_dir,
                keep_segments,
                json,
            };
            run_find(&clip, &source, &options, &params).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(1);
            });
        }

        Commands::Compare {
            reference,
            sample,
            min_count,
            json,
        } => {
            let mut params = SearchParams::default();
            if let Some(min_count) = min_count {
                params.matcher.min_count = min_count;
            }

            let result = run_compare(&reference, &sample, &params).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(1);
            });
            if json {
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                println!(
                    "Match: {} ({} agreeing hashes)",
                    result.is_match, result.best_count
                );
            }
            if !result.is_match {
                std::process::exit(1);
            }
        }

        Commands::Split {
            input,
            output_prefix,
            duration,
        } => {
            let segments = splitter::split_file(&input, duration, &output_prefix)
                .unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                });
            for path in &segments {
                println!("{}", path.display());
            }
            eprintln!("Wrote {} segments", segments.len());
        }
    }
}

struct FindOptions {
    clip_start: Option<String>,
    clip_end: Option<String>,
    segments_dir: Option<PathBuf>,
    keep_segments: bool,
    json: bool,
}

fn run_find(
    clip_path: &Path,
    source_path: &Path,
    options: &FindOptions,
    params: &SearchParams,
) -> clipseek::Result<()> {
    let started = Instant::now();
    let sample_rate = params.matcher.sample_rate;

    eprintln!("Loading clip {}...", clip_path.display());
    let clip = loader::load_file(clip_path, sample_rate)?;
    let clip = trim_clip(
        clip,
        options.clip_start.as_deref(),
        options.clip_end.as_deref(),
    )?;
    eprintln!("Clip: {:.1} s at {} Hz", clip.duration_secs, sample_rate);

    let segments_root = options
        .segments_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("clipseek-segments"));
    let prefix = segments_root.join("segments");

    eprintln!("Segmenting source {}...", source_path.display());
    let segment_files = splitter::split_file(source_path, params.split_duration, &prefix)?;
    eprintln!("Searching {} segment(s)...", segment_files.len());

    let chunks = splitter::load_segments(&segment_files, sample_rate);
    let outcome = locate_clip(&clip, chunks, params);

    if !options.keep_segments {
        for path in &segment_files {
            let _ = std::fs::remove_file(path);
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    match outcome? {
        Some(location) => {
            if options.json {
                let payload = serde_json::json!({
                    "match": true,
                    "timecode": location.timecode(),
                    "location": location,
                });
                println!("{payload}");
            } else {
                println!(
                    "Found at {} (offset {:.2} s, {} agreeing hashes)",
                    location.timecode(),
                    location.offset_secs,
                    location.best_count
                );
            }
            eprintln!("Search completed in {elapsed:.2} s");
            Ok(())
        }
        None => {
            if options.json {
                println!("{}", serde_json::json!({ "match": false }));
            } else {
                println!("No match found.");
            }
            eprintln!("Search completed in {elapsed:.2} s");
            std::process::exit(1);
        }
    }
}

fn run_compare(
    reference_path: &Path,
    sample_path: &Path,
    params: &SearchParams,
) -> clipseek::Result<clipseek::MatchResult> {
    let sample_rate = params.matcher.sample_rate;
    let matcher = Matcher::new(params.matcher.clone())?;

    eprintln!("Loading {}...", reference_path.display());
    let reference = loader::load_file(reference_path, sample_rate)?;
    eprintln!("Loading {}...", sample_path.display());
    let sample = loader::load_file(sample_path, sample_rate)?;

    Ok(matcher.identify(&reference.samples, &sample.samples))
}

fn parse_time(text: &str) -> clipseek::Result<u64> {
    timecode::parse(text)
        .ok_or_else(|| clipseek::Error::InvalidInput(format!("cannot parse time '{text}'")))
}

/// Cut the clip down to an optional `[start, end]` time range.
fn trim_clip(
    clip: AudioData,
    start: Option<&str>,
    end: Option<&str>,
) -> clipseek::Result<AudioData> {
    if start.is_none() && end.is_none() {
        return Ok(clip);
    }

    let start_secs = start.map(parse_time).transpose()?.unwrap_or(0);
    let end_secs = end.map(parse_time).transpose()?;

    let sample_rate = clip.sample_rate;
    let start_idx = (start_secs as usize * sample_rate as usize).min(clip.samples.len());
    let end_idx = end_secs
        .map(|secs| (secs as usize * sample_rate as usize).min(clip.samples.len()))
        .unwrap_or(clip.samples.len());
    if start_idx >= end_idx {
        return Err(clipseek::Error::InvalidInput(
            "clip start time must be before the end time".into(),
        ));
    }

    let samples = clip.samples[start_idx..end_idx].to_vec();
    let duration_secs = samples.len() as f64 / sample_rate as f64;
    Ok(AudioData {
        samples,
        sample_rate,
        channels: clip.channels,
        duration_secs,
    })
}
