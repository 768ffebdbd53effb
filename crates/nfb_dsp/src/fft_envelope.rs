use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::Filter;

/// FFT-based band-envelope detector.
///
/// Maintains a ring buffer of the last `n_samples` scalar samples, mirrors
/// it (`[buffer, reversed(buffer)]`) to avoid edge discontinuities, applies
/// an asymmetric Gaussian taper, takes the magnitude spectrum, zeroes bins
/// outside `[low_hz, high_hz]`, and returns the mean magnitude of what's
/// left as the envelope estimate. The mirrored-buffer-plus-taper
/// construction and the exact Gaussian-edge formula below are carried
/// verbatim from the NFB signal-processing lineage this engine continues.
pub struct FftBandEnvelopeDetector {
    n_samples: usize,
    sample_rate: f64,
    low_hz: f64,
    high_hz: f64,
    window: Vec<f64>,
    buffer: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl FftBandEnvelopeDetector {
    pub fn new(n_samples: usize, sample_rate: f64, low_hz: f64, high_hz: f64) -> Self {
        let window = asymmetric_gaussian_window(2 * n_samples);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(2 * n_samples);
        Self {
            n_samples,
            sample_rate,
            low_hz,
            high_hz,
            window,
            buffer: vec![0.0; n_samples],
            fft,
        }
    }

    fn push_chunk(&mut self, chunk: &[f64]) {
        let chunk_size = chunk.len();
        if chunk_size == 0 {
            return;
        }
        if chunk_size <= self.n_samples {
            self.buffer.rotate_left(chunk_size);
            let tail = self.n_samples - chunk_size;
            self.buffer[tail..].copy_from_slice(chunk);
        } else {
            let start = chunk_size - self.n_samples;
            self.buffer.copy_from_slice(&chunk[start..]);
        }
    }

    fn bandpass_amplitude(&self) -> f64 {
        let n = 2 * self.n_samples;
        let mut mirrored = Vec::with_capacity(n);
        mirrored.extend_from_slice(&self.buffer);
        mirrored.extend(self.buffer.iter().rev());

        let mut spectrum: Vec<Complex<f64>> = mirrored
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        self.fft.process(&mut spectrum);

        // Mirrors `cut_f_signal[(w < low) | (w > high)] = 0; abs(cut_f_signal).mean()`:
        // bins outside the band are zeroed but still counted in the mean.
        let bin_hz = self.sample_rate / n as f64;
        let mut total = 0.0;
        for (k, bin) in spectrum.iter().enumerate() {
            let freq = if k <= n / 2 {
                k as f64 * bin_hz
            } else {
                (k as f64 - n as f64) * bin_hz
            };
            let freq_abs = freq.abs();
            if freq_abs >= self.low_hz && freq_abs <= self.high_hz {
                total += bin.norm();
            }
        }
        total / n as f64
    }
}

impl Filter for FftBandEnvelopeDetector {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        self.push_chunk(input);
        vec![self.bandpass_amplitude()]
    }

    fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|x| *x = 0.0);
    }
}

/// Asymmetric Gaussian taper: rises from `eps` to 1 over the first
/// quarter of `n` (measured as `p = round(n / 2)` relative to a
/// double-length buffer), then decays back to `eps` over the remainder,
/// matching the edge-suppression window used upstream of the mirrored-
/// buffer FFT so that the artificial seam introduced by mirroring does
/// not leak into the band estimate.
fn asymmetric_gaussian_window(n: usize) -> Vec<f64> {
    let p = (n as f64 / 2.0).round();
    let eps = 0.0001_f64;
    let power = 2.0;
    let left_c = -eps.ln() / p.powf(power);
    let right_c = -eps.ln() / (n as f64 - 1.0 - p).powf(power);
    (0..n)
        .map(|i| {
            let x = i as f64;
            if x < p {
                (-left_c * (x - p).abs().powf(power)).exp()
            } else {
                (-right_c * (x - p).abs().powf(power)).exp()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_peaks_at_center_and_decays_to_edges() {
        let w = asymmetric_gaussian_window(200);
        let peak_idx = w
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!((peak_idx as i64 - 100).abs() <= 1);
        assert!(w[0] < 0.01);
        assert!(w[w.len() - 1] < 0.01);
    }

    #[test]
    fn detects_energy_in_band() {
        let fs = 250.0;
        let n = 256;
        let mut det = FftBandEnvelopeDetector::new(n, fs, 8.0, 12.0);
        // alpha-band sinusoid at 10 Hz
        let signal: Vec<f64> = (0..n * 4)
            .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let mut last = 0.0;
        for chunk in signal.chunks(8) {
            last = det.apply(chunk)[0];
        }
        assert!(last > 0.0);

        let mut det_out_of_band = FftBandEnvelopeDetector::new(n, fs, 40.0, 45.0);
        let mut last_oob = 1.0;
        for chunk in signal.chunks(8) {
            last_oob = det_out_of_band.apply(chunk)[0];
        }
        assert!(last_oob < last);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// A steady in-band sinusoid never yields a negative or
            /// NaN/inf amplitude across a range of bandpass widths and
            /// amplitudes, since the detector's mean-magnitude estimate
            /// is structurally non-negative.
            #[test]
            fn amplitude_is_always_finite_and_non_negative(
                amplitude in 0.1..5.0_f64,
                chunk_len in 1usize..16,
            ) {
                let fs = 250.0;
                let n = 128;
                let mut det = FftBandEnvelopeDetector::new(n, fs, 8.0, 12.0);
                let signal: Vec<f64> = (0..n * 4)
                    .map(|i| amplitude * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
                    .collect();
                let mut last = -1.0;
                for chunk in signal.chunks(chunk_len) {
                    last = det.apply(chunk)[0];
                }
                prop_assert!(last.is_finite());
                prop_assert!(last >= 0.0);
            }
        }
    }
}
