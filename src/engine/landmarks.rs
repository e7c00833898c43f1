use super::{EngineConfig, Landmark, Spectrogram};

/// Extract locally salient peaks from a spectrogram.
///
/// A cell is a landmark iff it is the maximum of its surrounding
/// neighborhood (a sliding rectangle of ±`neighborhood_frames` ×
/// ±`neighborhood_bins`, so neighborhoods overlap and peaks on region
/// boundaries are never missed) and its magnitude clears the absolute
/// floor. Equal-magnitude contests go to the lower frequency bin, then
/// the earlier frame, so extraction order is fully reproducible.
///
/// Density is capped at `max_peaks_per_frame` per time frame, keeping the
/// strongest peaks. Output is sorted by frame, then bin.
pub fn extract(grid: &Spectrogram, config: &EngineConfig) -> Vec<Landmark> {
    let frames = grid.frames();
    let bins = grid.bins();

    let mut landmarks = Vec::new();
    // Reused per-frame candidate buffer; the grid itself is the only other
    // allocation in play.
    let mut frame_peaks: Vec<Landmark> = Vec::with_capacity(bins.min(64));

    for frame in 0..frames {
        frame_peaks.clear();

        for bin in 0..bins {
            let magnitude = grid.magnitude(frame, bin);
            if magnitude < config.min_magnitude {
                continue;
            }
            if is_neighborhood_max(grid, frame, bin, magnitude, config) {
                frame_peaks.push(Landmark {
                    frame: frame as u32,
                    bin: bin as u32,
                    magnitude,
                });
            }
        }

        if frame_peaks.len() > config.max_peaks_per_frame {
            // Keep the strongest; ties keep the lower bin.
            frame_peaks.sort_by(|a, b| {
                b.magnitude
                    .partial_cmp(&a.magnitude)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.bin.cmp(&b.bin))
            });
            frame_peaks.truncate(config.max_peaks_per_frame);
            frame_peaks.sort_by_key(|p| p.bin);
        }

        landmarks.extend_from_slice(&frame_peaks);
    }

    landmarks
}

/// True iff the cell beats every other cell in its neighborhood, with
/// equal-magnitude ties resolved toward the lower (bin, frame) pair.
fn is_neighborhood_max(
    grid: &Spectrogram,
    frame: usize,
    bin: usize,
    magnitude: f32,
    config: &EngineConfig,
) -> bool {
    let frame_lo = frame.saturating_sub(config.neighborhood_frames);
    let frame_hi = (frame + config.neighborhood_frames).min(grid.frames() - 1);
    let bin_lo = bin.saturating_sub(config.neighborhood_bins);
    let bin_hi = (bin + config.neighborhood_bins).min(grid.bins() - 1);

    for nf in frame_lo..=frame_hi {
        for nb in bin_lo..=bin_hi {
            if nf == frame && nb == bin {
                continue;
            }
            let other = grid.magnitude(nf, nb);
            if other > magnitude {
                return false;
            }
            if other == magnitude && (nb, nf) < (bin, frame) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(frames: usize, bins: usize, cells: &[(usize, usize, f32)]) -> Spectrogram {
        let mut data = vec![0.0_f32; frames * bins];
        for &(frame, bin, mag) in cells {
            data[frame * bins + bin] = mag;
        }
        Spectrogram::from_raw(frames, bins, data)
    }

    fn config() -> EngineConfig {
        EngineConfig {
            neighborhood_frames: 2,
            neighborhood_bins: 2,
            min_magnitude: 1.0,
            max_peaks_per_frame: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn lone_peak_is_found() {
        let grid = grid_with(10, 20, &[(4, 7, 5.0)]);
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].frame, peaks[0].bin), (4, 7));
    }

    #[test]
    fn below_floor_is_rejected() {
        let grid = grid_with(10, 20, &[(4, 7, 0.5)]);
        assert!(extract(&grid, &config()).is_empty());
    }

    #[test]
    fn weaker_neighbor_is_suppressed() {
        let grid = grid_with(10, 20, &[(4, 7, 5.0), (5, 8, 4.0)]);
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].frame, peaks[0].bin), (4, 7));
    }

    #[test]
    fn equal_tie_prefers_lower_bin_then_earlier_frame() {
        let grid = grid_with(10, 20, &[(4, 7, 5.0), (4, 8, 5.0)]);
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].frame, peaks[0].bin), (4, 7));

        let grid = grid_with(10, 20, &[(5, 7, 5.0), (4, 7, 5.0)]);
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].frame, peaks[0].bin), (4, 7));
    }

    #[test]
    fn peaks_outside_each_others_neighborhood_both_survive() {
        // Bins 7 and 12 are 5 apart, beyond the ±2 neighborhood.
        let grid = grid_with(10, 20, &[(4, 7, 5.0), (4, 12, 4.0)]);
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn per_frame_cap_keeps_strongest() {
        // Five isolated peaks in one frame, cap of three.
        let grid = grid_with(
            4,
            40,
            &[(1, 2, 2.0), (1, 8, 6.0), (1, 14, 3.0), (1, 20, 5.0), (1, 26, 4.0)],
        );
        let peaks = extract(&grid, &config());
        assert_eq!(peaks.len(), 3);
        let bins: Vec<u32> = peaks.iter().map(|p| p.bin).collect();
        assert_eq!(bins, vec![8, 20, 26]);
    }

    #[test]
    fn output_sorted_by_frame_then_bin() {
        let grid = grid_with(10, 40, &[(6, 3, 5.0), (2, 30, 5.0), (2, 10, 5.0)]);
        let peaks = extract(&grid, &config());
        let positions: Vec<(u32, u32)> = peaks.iter().map(|p| (p.frame, p.bin)).collect();
        assert_eq!(positions, vec![(2, 10), (2, 30), (6, 3)]);
    }
}
