use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use earworm::engine::{self, Identification};

#[derive(Parser)]
#[command(name = "earworm", version, about = "Identify audio snippets against a fingerprint catalog")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint audio files and add them to the catalog
    Ingest {
        /// Files or directories to ingest (defaults to config file music_dirs)
        paths: Vec<String>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Identify a recorded snippet against the catalog
    Identify {
        /// Path to the audio snippet
        snippet: PathBuf,
    },

    /// Show catalog statistics
    Stats,

    /// Remove a track and its fingerprints from the catalog
    Remove {
        /// Track id to remove
        track_id: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = earworm::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(earworm::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = earworm::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Ingest { paths, jobs } => {
            // Resolve ingest paths: CLI args > config music_dirs
            let paths = if !paths.is_empty() {
                paths
            } else {
                config
                    .music_dirs
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            };
            if paths.is_empty() {
                anyhow::bail!("No paths given and no music_dirs configured");
            }

            let files = earworm::ingest::collect_audio_files(&paths);
            println!("Found {} audio files", files.len());

            // Ctrl-C requests a stop at the next track boundary.
            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = cancel.clone();
                ctrlc::set_handler(move || {
                    cancel.store(true, Ordering::Relaxed);
                })
                .context("Failed to install Ctrl-C handler")?;
            }

            let jobs = config.resolve_workers(jobs);
            let report =
                earworm::ingest::ingest_files(&db, &files, &config.engine, jobs, &cancel)?;

            println!(
                "Ingested {} tracks ({} failed{})",
                report.completed(),
                report.failed(),
                if report.cancelled {
                    format!(", {} not processed", report.remaining.len())
                } else {
                    String::new()
                }
            );
            for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
                println!(
                    "  failed: {} (track {}): {}",
                    outcome.title,
                    outcome.track_id,
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        Commands::Identify { snippet } => {
            let audio = earworm::decode::decode_file(&snippet)
                .with_context(|| format!("Failed to decode {}", snippet.display()))?;
            let query = engine::fingerprint_samples(&audio.samples, &config.engine);

            match engine::identify(&query, &db, &config.engine) {
                Ok(Identification::Identified { track_id, confidence }) => {
                    let title = db
                        .get_track(track_id)?
                        .map(|t| t.title)
                        .unwrap_or_else(|| format!("track {track_id}"));
                    println!("Match: {title} (track {track_id}, confidence {confidence:.2})");
                }
                Ok(Identification::Ambiguous { candidates, confidence }) => {
                    println!("Ambiguous match (confidence {confidence:.2}):");
                    for track_id in candidates {
                        let title = db
                            .get_track(track_id)?
                            .map(|t| t.title)
                            .unwrap_or_else(|| format!("track {track_id}"));
                        println!("  {title} (track {track_id})");
                    }
                }
                Ok(Identification::Unmatched) => {
                    println!("No match found");
                    std::process::exit(1);
                }
                Err(engine::MatchError::EmptyQuery) => {
                    println!("Snippet produced no usable fingerprints (too short or silent?)");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Stats => {
            let stats = db.stats()?;
            println!("Tracks:       {}", stats.total_tracks);
            println!("  completed:  {}", stats.completed_tracks);
            println!("  failed:     {}", stats.failed_tracks);
            println!("Fingerprints: {}", stats.fingerprint_count);
        }

        Commands::Remove { track_id } => {
            match db.get_track(track_id)? {
                Some(track) => {
                    db.delete_track(track_id)?;
                    println!("Removed {} (track {track_id})", track.title);
                }
                None => anyhow::bail!("No track with id {track_id}"),
            }
        }
    }

    Ok(())
}
