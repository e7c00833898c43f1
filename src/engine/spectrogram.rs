use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

/// A time/frequency log-magnitude grid.
///
/// Rows are time frames in chronological order, columns are frequency bins
/// from DC up to Nyquist (`window_size / 2` bins). Stored as one flat
/// frame-major buffer, preallocated up front.
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Compute the spectrogram of a mono sample buffer.
    ///
    /// Samples are peak-normalized first so the magnitude scale does not
    /// depend on recording volume. Each window is Hann-tapered before the
    /// forward FFT and magnitudes are stored as `ln(1 + |X|)`.
    ///
    /// Input shorter than one window (including empty input) is zero-padded
    /// to a single frame rather than rejected.
    pub fn compute(samples: &[f32], window_size: usize, hop_size: usize) -> Self {
        assert!(window_size > 0 && hop_size > 0, "window and hop must be nonzero");

        let bins = window_size / 2;
        let frames = if samples.len() <= window_size {
            1
        } else {
            1 + (samples.len() - window_size).div_ceil(hop_size)
        };

        let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        let scale = if peak > 0.0 { 1.0 / peak } else { 0.0 };

        let fft = rustfft::FftPlanner::new().plan_fft_forward(window_size);
        let mut buffer = vec![Complex::<f32>::zero(); window_size];
        let mut scratch = vec![Complex::<f32>::zero(); fft.get_inplace_scratch_len()];
        let window = hann_window(window_size);

        let mut data = vec![0.0_f32; frames * bins];

        for frame in 0..frames {
            let start = frame * hop_size;
            let end = (start + window_size).min(samples.len());

            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = if start + i < end { samples[start + i] * scale } else { 0.0 };
                slot.re = sample * window[i];
                slot.im = 0.0;
            }

            fft.process_with_scratch(&mut buffer, &mut scratch);

            let row = &mut data[frame * bins..(frame + 1) * bins];
            for (slot, value) in row.iter_mut().zip(buffer.iter()) {
                *slot = value.norm().ln_1p();
            }
        }

        Self { bins, frames, data }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    pub fn magnitude(&self, frame: usize, bin: usize) -> f32 {
        self.data[frame * self.bins + bin]
    }

    /// Build a grid directly from raw magnitudes (test fixtures only).
    #[cfg(test)]
    pub(crate) fn from_raw(frames: usize, bins: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), frames * bins);
        Self { bins, frames, data }
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1.0)).cos()))
        .collect()
}
