use std::collections::VecDeque;

use crate::Filter;

/// CFIR: a finite-impulse-response approximation of the complex
/// demodulator. Where `ComplexDemodulationDetector` mixes down and
/// low-pass filters with an IIR (exponential) smoother sample by sample,
/// this detector instead convolves the incoming signal directly with a
/// precomputed complex FIR kernel — a windowed complex exponential at the
/// band center — trading the IIR's infinite memory and phase nonlinearity
/// for a fixed-length, linear-phase filter. Cheaper to reason about
/// numerically; slightly more compute per sample.
pub struct CfirBandEnvelopeDetector {
    kernel_re: Vec<f64>,
    kernel_im: Vec<f64>,
    history: VecDeque<f64>,
}

impl CfirBandEnvelopeDetector {
    pub fn new(order: usize, sample_rate: f64, low_hz: f64, high_hz: f64) -> Self {
        let center_hz = (low_hz + high_hz) / 2.0;
        let half = order as f64 / 2.0;
        let mut kernel_re = Vec::with_capacity(order);
        let mut kernel_im = Vec::with_capacity(order);
        for n in 0..order {
            let t = n as f64 - half;
            // Hann-windowed complex exponential at the band center.
            let window = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / (order - 1).max(1) as f64).cos();
            let phase = 2.0 * std::f64::consts::PI * center_hz * t / sample_rate;
            kernel_re.push(window * phase.cos());
            kernel_im.push(window * -phase.sin());
        }
        let norm: f64 = kernel_re.iter().map(|x| x.abs()).sum::<f64>().max(1e-9);
        for v in kernel_re.iter_mut().chain(kernel_im.iter_mut()) {
            *v /= norm;
        }
        Self {
            kernel_re,
            kernel_im,
            history: VecDeque::from(vec![0.0; order]),
        }
    }

    fn push(&mut self, sample: f64) -> f64 {
        self.history.push_back(sample);
        self.history.pop_front();
        let mut re = 0.0;
        let mut im = 0.0;
        for (i, &x) in self.history.iter().enumerate() {
            re += x * self.kernel_re[i];
            im += x * self.kernel_im[i];
        }
        (re * re + im * im).sqrt()
    }
}

impl Filter for CfirBandEnvelopeDetector {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        let mut last = 0.0;
        for &x in input {
            last = self.push(x);
        }
        vec![last]
    }

    fn reset(&mut self) {
        for v in self.history.iter_mut() {
            *v = 0.0;
        }
    }
}
