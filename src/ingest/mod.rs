use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::db::models::{NewTrack, TrackStatus};
use crate::db::Database;
use crate::decode;
use crate::engine::{self, EngineConfig, Fingerprint};
use crate::SUPPORTED_EXTENSIONS;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Completed,
    Failed,
}

/// What happened to one track during a batch run.
#[derive(Debug)]
pub struct IngestOutcome {
    pub track_id: i64,
    pub title: String,
    pub fingerprint_count: usize,
    pub status: IngestStatus,
    pub error: Option<String>,
}

/// Result of a batch run. Cancellation leaves `remaining` populated with
/// tracks that were registered but never processed (still `pending` in the
/// catalog), so callers always see which tracks finished and which did not.
#[derive(Debug)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
    pub remaining: Vec<i64>,
    pub cancelled: bool,
}

impl IngestReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == IngestStatus::Completed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == IngestStatus::Failed).count()
    }
}

/// Find all supported audio files under the given paths. Files are
/// returned sorted so batch runs are reproducible.
pub fn collect_audio_files(paths: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Build catalog entries for a batch of audio files.
///
/// Every file is registered up front (title from tags, filename fallback)
/// with `pending` status. Decoding and fingerprinting then run in a rayon
/// pool, chunk by chunk; the database writes happen on the caller's thread
/// between chunks, so each chunk's results are durable before the next
/// starts and a crash loses at most one chunk of work.
///
/// `cancel` is checked at track boundaries only — never mid-computation —
/// and a cancelled run still reports everything that finished.
pub fn ingest_files(
    db: &Database,
    files: &[PathBuf],
    config: &EngineConfig,
    jobs: usize,
    cancel: &AtomicBool,
) -> Result<IngestReport, IngestError> {
    let mut report = IngestReport {
        outcomes: Vec::with_capacity(files.len()),
        remaining: Vec::new(),
        cancelled: false,
    };

    if files.is_empty() {
        log::info!("No audio files to ingest");
        return Ok(report);
    }

    // Register everything first so even unprocessed tracks are visible
    // in the catalog as pending.
    let mut queue: Vec<(i64, PathBuf, String)> = Vec::with_capacity(files.len());
    for path in files {
        let title = track_title(path);
        let track_id = db.insert_track(&NewTrack {
            title: title.clone(),
            source_path: Some(path.to_string_lossy().to_string()),
            duration_secs: None,
        })?;
        queue.push((track_id, path.clone(), title));
    }

    log::info!("Ingesting {} tracks with {} workers", queue.len(), jobs);

    let pb = ProgressBar::new(queue.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .expect("rayon pool");

    // Chunk size = jobs * 2 keeps the pool busy while bounding how much
    // fingerprint data sits in memory before it reaches the database.
    let chunk_size = (jobs * 2).max(1);
    let mut position = 0;

    for chunk in queue.chunks(chunk_size) {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }

        // Workers re-check the flag per track, so a cancel arriving
        // mid-chunk stops at the next track boundary instead of draining
        // the whole chunk.
        let results: Vec<_> = pool.install(|| {
            use rayon::prelude::*;
            chunk
                .par_iter()
                .map(|(_, path, _)| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    let result = fingerprint_file(path, config);
                    pb.inc(1);
                    Some(result)
                })
                .collect()
        });

        for ((track_id, path, title), result) in chunk.iter().zip(results) {
            let Some(result) = result else {
                report.cancelled = true;
                report.remaining.push(*track_id);
                continue;
            };
            let outcome = match result {
                Ok((fingerprints, duration_secs)) => {
                    store_track(db, *track_id, &fingerprints, duration_secs)
                        .map(|()| IngestOutcome {
                            track_id: *track_id,
                            title: title.clone(),
                            fingerprint_count: fingerprints.len(),
                            status: IngestStatus::Completed,
                            error: None,
                        })
                        .unwrap_or_else(|e| {
                            failed_outcome(db, *track_id, title, e.to_string())
                        })
                }
                Err(e) => {
                    log::warn!("Failed to fingerprint {}: {e}", path.display());
                    failed_outcome(db, *track_id, title, e.to_string())
                }
            };
            report.outcomes.push(outcome);
        }

        position += chunk.len();
        pb.set_message(format!("{} stored, {} failed", report.completed(), report.failed()));
    }

    report.remaining.extend(queue[position..].iter().map(|(id, _, _)| *id));

    if report.cancelled {
        pb.abandon_with_message(format!(
            "Cancelled: {} stored, {} failed, {} not processed",
            report.completed(),
            report.failed(),
            report.remaining.len()
        ));
        log::info!("Ingestion cancelled with {} tracks unprocessed", report.remaining.len());
    } else {
        pb.finish_with_message(format!(
            "Done: {} stored, {} failed",
            report.completed(),
            report.failed()
        ));
    }

    Ok(report)
}

/// Decode and fingerprint one file. Pure per-track work, safe to run in
/// parallel with other tracks.
fn fingerprint_file(
    path: &Path,
    config: &EngineConfig,
) -> Result<(Vec<Fingerprint>, f64), decode::DecodeError> {
    let audio = decode::decode_file(path)?;
    let duration = audio.duration_secs();
    let fingerprints = engine::fingerprint_samples(&audio.samples, config);
    if fingerprints.is_empty() {
        // Silence or near-silence: a valid zero-fingerprint track.
        log::debug!("{} produced no fingerprints", path.display());
    }
    Ok((fingerprints, duration))
}

fn store_track(
    db: &Database,
    track_id: i64,
    fingerprints: &[Fingerprint],
    duration_secs: f64,
) -> Result<(), crate::db::DbError> {
    db.store_fingerprints(track_id, fingerprints)?;
    db.set_track_duration(track_id, duration_secs)?;
    db.set_track_status(track_id, TrackStatus::Completed)?;
    Ok(())
}

fn failed_outcome(db: &Database, track_id: i64, title: &str, error: String) -> IngestOutcome {
    if let Err(e) = db.set_track_status(track_id, TrackStatus::Failed) {
        log::error!("Could not mark track {track_id} failed: {e}");
    }
    IngestOutcome {
        track_id,
        title: title.to_string(),
        fingerprint_count: 0,
        status: IngestStatus::Failed,
        error: Some(error),
    }
}

/// Title from tags, filename stem as fallback.
fn track_title(path: &Path) -> String {
    if let Ok(tagged) = lofty::read_from_path(path) {
        let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
        if let Some(title) = tag.and_then(|t| t.title()) {
            let title = title.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}
