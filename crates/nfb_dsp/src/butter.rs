use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::Filter;

/// Coefficients of a Direct-Form-II-Transposed biquad section, the same
/// shape used throughout the voltage-filter plugin this lineage ships:
/// `b0, b1, b2` feedforward, `a1, a2` feedback (`a0` normalized to 1).
#[derive(Debug, Clone, Copy)]
struct BiquadCoefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoefficients {
    /// Butterworth (Q-based) bandpass section centered at `center_hz` with
    /// bandwidth implied by `q`.
    fn bandpass(center_hz: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * std::f64::consts::PI * center_hz / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();
        let a0 = 1.0 + alpha;
        Self {
            b0: (alpha) / a0,
            b1: 0.0,
            b2: (-alpha) / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

fn biquad_step(coeffs: &BiquadCoefficients, state: &mut BiquadState, x: f64) -> f64 {
    let y = coeffs.b0 * x + state.z1;
    state.z1 = coeffs.b1 * x - coeffs.a1 * y + state.z2;
    state.z2 = coeffs.b2 * x - coeffs.a2 * y;
    y
}

/// Butterworth bandpass filter followed by an FFT-based Hilbert-transform
/// envelope: the bandpass removes out-of-band energy sample by sample
/// (stateful biquad, same structure as the DF2T filters in the voltage
/// filter plugin), then a sliding buffer is periodically transformed into
/// its analytic signal (zero negative frequencies, double the positive
/// ones) so the instantaneous amplitude can be read off as
/// `|analytic_signal|` at the most recent sample.
pub struct ButterBandEnvelopeDetector {
    coeffs: BiquadCoefficients,
    state: BiquadState,
    buffer: Vec<f64>,
    n_samples: usize,
    fft_fwd: Arc<dyn Fft<f64>>,
    fft_inv: Arc<dyn Fft<f64>>,
}

impl ButterBandEnvelopeDetector {
    pub fn new(n_samples: usize, sample_rate: f64, low_hz: f64, high_hz: f64) -> Self {
        let center = (low_hz + high_hz) / 2.0;
        let bandwidth = (high_hz - low_hz).max(0.5);
        let q = center / bandwidth;
        let mut planner = FftPlanner::new();
        Self {
            coeffs: BiquadCoefficients::bandpass(center, q, sample_rate),
            state: BiquadState::default(),
            buffer: vec![0.0; n_samples],
            n_samples,
            fft_fwd: planner.plan_fft_forward(n_samples),
            fft_inv: planner.plan_fft_inverse(n_samples),
        }
    }

    fn filter_chunk(&mut self, chunk: &[f64]) {
        let filtered: Vec<f64> = chunk
            .iter()
            .map(|&x| biquad_step(&self.coeffs, &mut self.state, x))
            .collect();
        let len = filtered.len();
        if len >= self.n_samples {
            self.buffer
                .copy_from_slice(&filtered[len - self.n_samples..]);
        } else {
            self.buffer.rotate_left(len);
            let tail = self.n_samples - len;
            self.buffer[tail..].copy_from_slice(&filtered);
        }
    }

    fn hilbert_envelope(&self) -> f64 {
        let n = self.n_samples;
        let mut spectrum: Vec<Complex<f64>> =
            self.buffer.iter().map(|&x| Complex::new(x, 0.0)).collect();
        self.fft_fwd.process(&mut spectrum);
        for k in 1..n {
            let is_upper_half = k < (n + 1) / 2;
            if is_upper_half {
                spectrum[k] *= 2.0;
            } else {
                spectrum[k] = Complex::new(0.0, 0.0);
            }
        }
        self.fft_inv.process(&mut spectrum);
        let last = spectrum[n - 1] / n as f64;
        last.norm()
    }
}

impl Filter for ButterBandEnvelopeDetector {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        if input.is_empty() {
            return vec![self.hilbert_envelope()];
        }
        self.filter_chunk(input);
        vec![self.hilbert_envelope()]
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
        self.buffer.iter_mut().for_each(|x| *x = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_in_band_tone_and_attenuates_out_of_band() {
        let fs = 250.0;
        let n = 128;
        let mut in_band = ButterBandEnvelopeDetector::new(n, fs, 8.0, 12.0);
        let mut out_band = ButterBandEnvelopeDetector::new(n, fs, 8.0, 12.0);

        let alpha: Vec<f64> = (0..n * 6)
            .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let gamma: Vec<f64> = (0..n * 6)
            .map(|i| (2.0 * std::f64::consts::PI * 40.0 * i as f64 / fs).sin())
            .collect();

        let mut last_in = 0.0;
        let mut last_out = 0.0;
        for chunk in alpha.chunks(8) {
            last_in = in_band.apply(chunk)[0];
        }
        for chunk in gamma.chunks(8) {
            last_out = out_band.apply(chunk)[0];
        }
        assert!(last_in > last_out);
    }
}
