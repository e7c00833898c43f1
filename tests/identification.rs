//! End-to-end identification: synthesize audio, ingest it into an
//! in-memory catalog, and run the full query pipeline against it.

use earworm::db::models::{NewTrack, TrackStatus};
use earworm::db::Database;
use earworm::engine::{self, EngineConfig, FingerprintStore, Identification, MatchError};

const SAMPLE_RATE: u32 = 44_100;

/// Linear sine sweep from `f0` to `f1` Hz over `secs` seconds.
fn sweep(f0: f32, f1: f32, secs: f32) -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * secs) as usize;
    let rate = SAMPLE_RATE as f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / rate;
            let phase = 2.0 * std::f32::consts::PI * (f0 * t + (f1 - f0) * t * t / (2.0 * secs));
            phase.sin()
        })
        .collect()
}

/// Deterministic white noise in [-amplitude, amplitude] (xorshift, fixed seed).
fn white_noise(n: usize, amplitude: f32, mut seed: u64) -> Vec<f32> {
    (0..n)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let unit = (seed >> 11) as f32 / (1u64 << 53) as f32;
            (unit * 2.0 - 1.0) * amplitude
        })
        .collect()
}

fn ingest(db: &Database, title: &str, samples: &[f32], config: &EngineConfig) -> i64 {
    let track_id = db
        .insert_track(&NewTrack {
            title: title.to_string(),
            source_path: None,
            duration_secs: Some(samples.len() as f64 / SAMPLE_RATE as f64),
        })
        .unwrap();
    let fingerprints = engine::fingerprint_samples(samples, config);
    assert!(!fingerprints.is_empty(), "catalog track must fingerprint");
    db.insert_fingerprints(track_id, &fingerprints).unwrap();
    db.mark_fingerprinted(track_id).unwrap();
    track_id
}

/// A hop-aligned sub-slice, `secs` long, starting at `start_frame` hops in.
fn hop_aligned_slice(samples: &[f32], config: &EngineConfig, start_frame: usize, secs: f32) -> Vec<f32> {
    let start = start_frame * config.hop_size;
    let len = (SAMPLE_RATE as f32 * secs) as usize;
    samples[start..start + len].to_vec()
}

fn identify_samples(
    db: &Database,
    samples: &[f32],
    config: &EngineConfig,
) -> Result<Identification, MatchError> {
    let query = engine::fingerprint_samples(samples, config);
    engine::identify(&query, db, config)
}

#[test]
fn sweep_self_identification() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();

    let track = sweep(100.0, 4_000.0, 30.0);
    let track_id = ingest(&db, "sweep", &track, &config);
    assert_eq!(db.get_track(track_id).unwrap().unwrap().status, TrackStatus::Completed);

    // Query with a 5-second slice from the middle of the track.
    let snippet = hop_aligned_slice(&track, &config, 270, 5.0);
    match identify_samples(&db, &snippet, &config).unwrap() {
        Identification::Identified { track_id: found, confidence } => {
            assert_eq!(found, track_id);
            assert!(confidence >= 0.5, "confidence {confidence} below 0.5");
        }
        other => panic!("expected Identified, got {other:?}"),
    }
}

#[test]
fn white_noise_query_is_unmatched() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();
    ingest(&db, "sweep", &sweep(100.0, 4_000.0, 30.0), &config);

    let noise = white_noise(5 * SAMPLE_RATE as usize, 0.5, 0x5eed);
    let result = identify_samples(&db, &noise, &config);

    // Noise may produce signatures (Unmatched) or none at all (EmptyQuery);
    // either way it must not identify the sweep.
    match result {
        Ok(Identification::Unmatched) | Err(MatchError::EmptyQuery) => {}
        other => panic!("expected no match for noise, got {other:?}"),
    }
}

#[test]
fn noisy_snippet_still_identifies() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();

    let track = sweep(100.0, 4_000.0, 30.0);
    let track_id = ingest(&db, "sweep", &track, &config);

    let mut snippet = hop_aligned_slice(&track, &config, 270, 5.0);
    let noise = white_noise(snippet.len(), 0.002, 0xbeef);
    for (sample, n) in snippet.iter_mut().zip(&noise) {
        *sample += n;
    }

    match identify_samples(&db, &snippet, &config).unwrap() {
        Identification::Identified { track_id: found, .. } => assert_eq!(found, track_id),
        other => panic!("expected Identified despite noise, got {other:?}"),
    }
}

#[test]
fn picks_the_right_track_from_a_catalog() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();

    let rising = sweep(100.0, 4_000.0, 30.0);
    let falling = sweep(4_000.0, 300.0, 30.0);
    let rising_id = ingest(&db, "rising", &rising, &config);
    let falling_id = ingest(&db, "falling", &falling, &config);

    let snippet = hop_aligned_slice(&falling, &config, 200, 5.0);
    match identify_samples(&db, &snippet, &config).unwrap() {
        Identification::Identified { track_id, .. } => {
            assert_eq!(track_id, falling_id);
            assert_ne!(track_id, rising_id);
        }
        other => panic!("expected Identified, got {other:?}"),
    }
}

#[test]
fn duplicate_tracks_are_reported_ambiguous() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();

    let track = sweep(100.0, 4_000.0, 30.0);
    let first = ingest(&db, "original", &track, &config);
    let second = ingest(&db, "duplicate", &track, &config);

    let snippet = hop_aligned_slice(&track, &config, 270, 5.0);
    match identify_samples(&db, &snippet, &config).unwrap() {
        Identification::Ambiguous { candidates, .. } => {
            assert_eq!(candidates, vec![first, second]);
        }
        other => panic!("expected Ambiguous for duplicate tracks, got {other:?}"),
    }
}

#[test]
fn silent_query_fails_fast_without_crashing() {
    let config = EngineConfig::default();
    let db = Database::open_in_memory().unwrap();
    ingest(&db, "sweep", &sweep(100.0, 4_000.0, 30.0), &config);

    let silence = vec![0.0_f32; 5 * SAMPLE_RATE as usize];
    assert!(matches!(
        identify_samples(&db, &silence, &config),
        Err(MatchError::EmptyQuery)
    ));
}

#[test]
fn ingestion_is_deterministic_across_runs() {
    let config = EngineConfig::default();
    let samples = sweep(200.0, 2_000.0, 10.0);
    let a = engine::fingerprint_samples(&samples, &config);
    let b = engine::fingerprint_samples(&samples, &config);
    assert_eq!(a, b);
}
