use std::collections::VecDeque;

use nfb_types::Chunk;

/// Flags channels whose short-term variance has spiked relative to their
/// own running baseline (loose electrode, movement artifact, ...).
///
/// Every `check_interval_s` of accumulated samples, the standard
/// deviation of each channel's last `window_s` of samples is computed.
/// The very first check only establishes the baseline (nothing is
/// flagged yet, since there's nothing to compare against). Every
/// subsequent check flags a channel if its new standard deviation
/// exceeds 7x its current baseline, then folds the new value into the
/// baseline with an unconditional 0.5 exponential moving average — the
/// baseline drifts toward the latest reading whether or not that check
/// flagged trouble, the same way this lineage's channel monitor never
/// freezes its baseline once a channel looks bad.
pub struct ChannelTroubleDetector {
    n_channels: usize,
    check_interval_samples: u64,
    window_samples: usize,
    samples_since_check: u64,
    history: Vec<VecDeque<f64>>,
    baseline: Option<Vec<f64>>,
}

const CHECK_INTERVAL_S: f64 = 2.0;
const WINDOW_S: f64 = 1.0;
const SPIKE_FACTOR: f64 = 7.0;
const BASELINE_EMA: f64 = 0.5;

impl ChannelTroubleDetector {
    pub fn new(n_channels: usize, sample_rate: f64) -> Self {
        let window_samples = (WINDOW_S * sample_rate).round().max(1.0) as usize;
        Self {
            n_channels,
            check_interval_samples: (CHECK_INTERVAL_S * sample_rate).round().max(1.0) as u64,
            window_samples,
            samples_since_check: 0,
            history: (0..n_channels)
                .map(|_| VecDeque::with_capacity(window_samples))
                .collect(),
            baseline: None,
        }
    }

    /// Feeds one chunk in; returns `Some(flags)` (one bool per channel)
    /// on ticks where a check fired, `None` otherwise.
    pub fn push(&mut self, chunk: &Chunk) -> Option<Vec<bool>> {
        for row in chunk.as_rows() {
            for (c, &value) in row.iter().enumerate() {
                let hist = &mut self.history[c];
                if hist.len() == self.window_samples {
                    hist.pop_front();
                }
                hist.push_back(value);
            }
        }
        self.samples_since_check += chunk.n_samples() as u64;
        if self.samples_since_check < self.check_interval_samples {
            return None;
        }
        self.samples_since_check = 0;

        let stds: Vec<f64> = (0..self.n_channels).map(|c| std_of(&self.history[c])).collect();

        let flags = match &self.baseline {
            None => vec![false; self.n_channels],
            Some(baseline) => stds
                .iter()
                .zip(baseline.iter())
                .map(|(&std, &base)| base > 0.0 && std > SPIKE_FACTOR * base)
                .collect(),
        };

        self.baseline = Some(match &self.baseline {
            None => stds,
            Some(baseline) => baseline
                .iter()
                .zip(stds.iter())
                .map(|(&base, &std)| BASELINE_EMA * std + (1.0 - BASELINE_EMA) * base)
                .collect(),
        });

        Some(flags)
    }
}

fn std_of(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    (samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_check_only_sets_baseline_without_flagging() {
        let fs = 100.0;
        let mut det = ChannelTroubleDetector::new(1, fs);
        let chunk = Chunk::new(vec![1.0; 200], 200, 1, 0).unwrap();
        let flags = det.push(&chunk).unwrap();
        assert_eq!(flags, vec![false]);
    }

    #[test]
    fn flags_a_spike_relative_to_baseline() {
        let fs = 100.0;
        let mut det = ChannelTroubleDetector::new(1, fs);
        let quiet = Chunk::new(vec![0.01; 200], 200, 1, 0).unwrap();
        det.push(&quiet).unwrap();

        let noisy_samples: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }).collect();
        let noisy = Chunk::new(noisy_samples, 200, 1, 0).unwrap();
        let flags = det.push(&noisy).unwrap();
        assert_eq!(flags, vec![true]);
    }
}
