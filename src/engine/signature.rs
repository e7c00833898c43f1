use std::collections::HashSet;

use super::{EngineConfig, Landmark};

/// Compact invariant encoding of a landmark pair: the anchor's frequency
/// bin, the target's frequency bin, and the frame delta between them,
/// packed into one `u64` (bits 40.., 20.., and 0.. respectively — each
/// field far wider than its value range).
///
/// The packing contains no absolute time, so the same pair of spectral
/// events hashes identically wherever it occurs in a recording. Lookup is
/// exact `u64` equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(u64);

impl Signature {
    pub fn pack(anchor_bin: u32, target_bin: u32, time_delta: u32) -> Self {
        debug_assert!(anchor_bin < 1 << 20);
        debug_assert!(target_bin < 1 << 20);
        debug_assert!(time_delta < 1 << 20);
        Self(((anchor_bin as u64) << 40) | ((target_bin as u64) << 20) | time_delta as u64)
    }

    pub fn anchor_bin(self) -> u32 {
        (self.0 >> 40) as u32 & 0xF_FFFF
    }

    pub fn target_bin(self) -> u32 {
        (self.0 >> 20) as u32 & 0xF_FFFF
    }

    pub fn time_delta(self) -> u32 {
        self.0 as u32 & 0xF_FFFF
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

/// A signature anchored at an absolute frame index within its source audio.
/// The `center` is what offset voting aligns on during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub signature: Signature,
    pub center: u32,
}

/// Pair each landmark (the anchor) with landmarks in its forward target
/// zone: strictly later frames within `max_time_delta`, bins within
/// `max_freq_delta`. At most `fan_out` pairs per anchor, taken
/// nearest-first in the time-sorted landmark order. Duplicate
/// (signature, center) pairs keep their first occurrence.
pub fn pair_landmarks(landmarks: &[Landmark], config: &EngineConfig) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();
    let mut seen: HashSet<(u64, u32)> = HashSet::new();

    for (i, anchor) in landmarks.iter().enumerate() {
        let mut pairs = 0;

        for target in &landmarks[i + 1..] {
            if pairs >= config.fan_out {
                break;
            }
            let delta = target.frame - anchor.frame;
            if delta > config.max_time_delta {
                break;
            }
            if delta == 0 || anchor.bin.abs_diff(target.bin) > config.max_freq_delta {
                continue;
            }

            let signature = Signature::pack(anchor.bin, target.bin, delta);
            pairs += 1;

            if seen.insert((signature.as_u64(), anchor.frame)) {
                fingerprints.push(Fingerprint {
                    signature,
                    center: anchor.frame,
                });
            }
        }
    }

    fingerprints
}
