pub mod landmarks;
pub mod matcher;
pub mod signature;
pub mod spectrogram;

pub use matcher::{identify, FingerprintStore, Identification, MatchError, SignatureHit, StoreError};
pub use signature::{Fingerprint, Signature};
pub use spectrogram::Spectrogram;

use serde::Deserialize;

/// Tunable parameters for the fingerprinting engine.
///
/// The defaults are what the catalog is built with; queries must run with
/// the same values or their signatures will not line up with stored ones.
/// All fields can be overridden from the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per analysis window.
    pub window_size: usize,
    /// Samples between successive windows (window_size / 2 = 50% overlap).
    pub hop_size: usize,
    /// Neighborhood half-width in time frames for the peak scan.
    pub neighborhood_frames: usize,
    /// Neighborhood half-width in frequency bins for the peak scan.
    pub neighborhood_bins: usize,
    /// Absolute log-magnitude floor below which a cell can never be a landmark.
    pub min_magnitude: f32,
    /// Landmark density cap per time frame (top-K by magnitude).
    pub max_peaks_per_frame: usize,
    /// Maximum anchor/target pairs generated per anchor landmark.
    pub fan_out: usize,
    /// Target zone depth: maximum frames between anchor and target.
    pub max_time_delta: u32,
    /// Target zone height: maximum bins between anchor and target.
    pub max_freq_delta: u32,
    /// Minimum votes in the best offset bucket to declare a match.
    pub min_votes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 4096,
            hop_size: 2048,
            neighborhood_frames: 3,
            neighborhood_bins: 15,
            min_magnitude: 0.5,
            max_peaks_per_frame: 5,
            fan_out: 6,
            max_time_delta: 20,
            max_freq_delta: 256,
            min_votes: 5,
        }
    }
}

/// A locally salient spectrogram peak. Transient — never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub frame: u32,
    pub bin: u32,
    pub magnitude: f32,
}

/// Run the full pipeline: samples -> spectrogram -> landmarks -> fingerprints.
///
/// Pure function of the samples and config. Empty or silent input yields an
/// empty fingerprint list rather than an error.
pub fn fingerprint_samples(samples: &[f32], config: &EngineConfig) -> Vec<Fingerprint> {
    let grid = Spectrogram::compute(samples, config.window_size, config.hop_size);
    let peaks = landmarks::extract(&grid, config);
    signature::pair_landmarks(&peaks, config)
}
