use crate::Filter;

/// Complex demodulation envelope detector: mixes the signal down to
/// baseband at the band's center frequency (`x[n] * e^{-j*2*pi*f0*n/fs}`)
/// then low-pass filters the resulting complex baseband with a one-pole
/// exponential smoother before taking the magnitude. This is the
/// continuous-update counterpart to the FFT detector's windowed-buffer
/// estimate: cheaper per-sample, no buffering, slightly laggier response
/// set by `smoothing_factor`.
pub struct ComplexDemodulationDetector {
    sample_rate: f64,
    center_hz: f64,
    smoothing_factor: f64,
    phase: f64,
    re_acc: f64,
    im_acc: f64,
    n_acc: u64,
}

impl ComplexDemodulationDetector {
    pub fn new(sample_rate: f64, low_hz: f64, high_hz: f64, smoothing_factor: f64) -> Self {
        Self {
            sample_rate,
            center_hz: (low_hz + high_hz) / 2.0,
            smoothing_factor,
            phase: 0.0,
            re_acc: 0.0,
            im_acc: 0.0,
            n_acc: 0,
        }
    }

    fn push(&mut self, sample: f64) -> f64 {
        let (s, c) = self.phase.sin_cos();
        let re = sample * c;
        let im = -sample * s;
        if self.n_acc == 0 {
            self.re_acc = re;
            self.im_acc = im;
        } else {
            self.re_acc = self.smoothing_factor * re + (1.0 - self.smoothing_factor) * self.re_acc;
            self.im_acc = self.smoothing_factor * im + (1.0 - self.smoothing_factor) * self.im_acc;
        }
        self.n_acc += 1;
        self.phase += 2.0 * std::f64::consts::PI * self.center_hz / self.sample_rate;
        if self.phase > std::f64::consts::TAU {
            self.phase -= std::f64::consts::TAU;
        }
        (self.re_acc * self.re_acc + self.im_acc * self.im_acc).sqrt()
    }
}

impl Filter for ComplexDemodulationDetector {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        let mut last = 0.0;
        for &x in input {
            last = self.push(x);
        }
        vec![last]
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.re_acc = 0.0;
        self.im_acc = 0.0;
        self.n_acc = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_amplitude_of_matching_tone() {
        let fs = 250.0;
        let mut det = ComplexDemodulationDetector::new(fs, 9.0, 11.0, 0.05);
        let signal: Vec<f64> = (0..2000)
            .map(|i| 3.0 * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let last = det.apply(&signal)[0];
        assert!((last - 3.0).abs() < 0.5);
    }
}
