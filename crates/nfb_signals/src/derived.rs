use std::collections::VecDeque;

use nfb_dsp::Filter;
use nfb_types::Chunk;

use crate::error::SignalError;
use crate::rejections::RejectionStack;

/// A single spatially-filtered, band-envelope-estimated NFB signal.
///
/// Mirrors the per-signal pipeline in this lineage: project the raw chunk
/// through a spatial filter (itself composed with any rejection
/// matrices), run the projected scalar series through a band-envelope
/// estimator (plus optional delay), optionally standardize against a
/// calibrated mean/std, and optionally smooth the output with a trailing
/// moving average.
pub struct DerivedSignal {
    pub name: String,
    n_channels: usize,
    spatial_filter: Vec<f64>,
    rejections: RejectionStack,
    spatial_matrix: Vec<f64>,
    estimator: Box<dyn Filter>,
    scaling_enabled: bool,
    mean: f64,
    std: f64,
    mean_acc: f64,
    var_acc: f64,
    n_acc: u64,
    current_sample: f64,
    smoothing_window: Option<VecDeque<f64>>,
    smoothing_window_len: usize,
}

impl DerivedSignal {
    pub fn new(
        name: impl Into<String>,
        n_channels: usize,
        spatial_filter: Vec<f64>,
        estimator: Box<dyn Filter>,
        smoothing_window_len: usize,
    ) -> Result<Self, SignalError> {
        if spatial_filter.len() != n_channels {
            return Err(SignalError::Types(nfb_types::NfbError::ShapeMismatch {
                expected: n_channels,
                actual: spatial_filter.len(),
            }));
        }
        Ok(Self {
            name: name.into(),
            n_channels,
            spatial_matrix: spatial_filter.clone(),
            spatial_filter,
            rejections: RejectionStack::new(n_channels),
            estimator,
            scaling_enabled: false,
            mean: f64::NAN,
            std: f64::NAN,
            mean_acc: 0.0,
            var_acc: 0.0,
            n_acc: 0,
            current_sample: 0.0,
            smoothing_window: if smoothing_window_len > 0 {
                Some(VecDeque::with_capacity(smoothing_window_len))
            } else {
                None
            },
            smoothing_window_len,
        })
    }

    pub fn rejections_mut(&mut self) -> &mut RejectionStack {
        &mut self.rejections
    }

    /// Recomputes the effective spatial projection as the rejection
    /// stack's product applied to the base spatial filter, matching
    /// `update_spatial_filter`'s `dot(matrix, spatial_matrix)` fold.
    pub fn refresh_spatial_matrix(&mut self) {
        self.spatial_matrix = self.rejections.apply(&self.spatial_filter);
    }

    pub fn current_sample(&self) -> f64 {
        self.current_sample
    }

    pub fn update(&mut self, chunk: &Chunk) -> Result<f64, SignalError> {
        let projected = chunk.dot(&self.spatial_matrix, 1)?;
        let chunk_len = projected.len() as f64;

        let estimate = *self
            .estimator
            .apply(&projected)
            .last()
            .unwrap_or(&0.0);

        self.current_sample = estimate;

        if chunk_len > 0.0 {
            self.mean_acc = (self.n_acc as f64 * self.mean_acc + chunk_len * self.current_sample)
                / (self.n_acc as f64 + chunk_len);
            self.var_acc = (self.n_acc as f64 * self.var_acc
                + chunk_len * (self.current_sample - self.mean_acc).powi(2))
                / (self.n_acc as f64 + chunk_len);
            self.n_acc += chunk_len as u64;
        }

        if self.scaling_enabled && self.std > 0.0 {
            self.current_sample = (self.current_sample - self.mean) / self.std;
        }

        if let Some(window) = self.smoothing_window.as_mut() {
            window.push_back(self.current_sample);
            if window.len() > self.smoothing_window_len {
                window.pop_front();
            }
            self.current_sample = window.iter().sum::<f64>() / window.len() as f64;
        }

        Ok(self.current_sample)
    }

    /// Recalibrates `mean`/`std` from a block of already-computed samples,
    /// optionally clipping samples more than `drop_outliers` standard
    /// deviations from the block mean before the final mean/std are
    /// taken (0 disables dropping). `stats_type` selects between the
    /// common "standardize against this block's mean/std" policy and the
    /// "express as a fraction of this block's peak" policy, matching
    /// `update_statistics_in_the_end`'s `sStatisticsType` knob.
    pub fn recalibrate(&mut self, samples: &[f64], drop_outliers: f64, stats_type: nfb_types::StatsType) {
        let filtered: Vec<f64> = if drop_outliers > 0.0 {
            let mean = mean_of(samples);
            let std = std_of(samples, mean);
            if std > 0.0 {
                samples
                    .iter()
                    .copied()
                    .filter(|s| (s - mean).abs() < drop_outliers * std)
                    .collect()
            } else {
                samples.to_vec()
            }
        } else {
            samples.to_vec()
        };
        match stats_type {
            nfb_types::StatsType::MeanStd => {
                self.mean = mean_of(&filtered);
                self.std = std_of(&filtered, self.mean);
            }
            nfb_types::StatsType::Max => {
                self.mean = 0.0;
                self.std = filtered.iter().cloned().fold(f64::MIN, f64::max);
            }
        }
    }

    pub fn enable_scaling(&mut self) {
        self.scaling_enabled = true;
    }

    pub fn reset_statistics_accumulator(&mut self) {
        self.mean_acc = 0.0;
        self.var_acc = 0.0;
        self.n_acc = 0;
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }
}

fn mean_of(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn std_of(samples: &[f64], mean: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfb_dsp::DelayFilter;

    #[test]
    fn update_projects_and_runs_through_estimator() {
        let estimator: Box<dyn Filter> = Box::new(DelayFilter::new(0));
        let mut signal = DerivedSignal::new("Alpha", 2, vec![1.0, 0.0], estimator, 0).unwrap();
        let chunk = Chunk::new(vec![1.0, 9.0, 2.0, 9.0], 2, 2, 0).unwrap();
        let out = signal.update(&chunk).unwrap();
        assert_eq!(out, 2.0); // last projected sample, channel 0 only
    }

    #[test]
    fn scaling_uses_calibrated_mean_and_std() {
        let estimator: Box<dyn Filter> = Box::new(DelayFilter::new(0));
        let mut signal = DerivedSignal::new("Alpha", 1, vec![1.0], estimator, 0).unwrap();
        signal.recalibrate(&[1.0, 2.0, 3.0], 0.0, nfb_types::StatsType::MeanStd);
        signal.enable_scaling();
        let chunk = Chunk::new(vec![2.0], 1, 1, 0).unwrap();
        let out = signal.update(&chunk).unwrap();
        assert!((out - 0.0).abs() < 1e-9); // (2 - mean(2)) / std
    }

    #[test]
    fn max_stats_type_scales_by_peak_with_zero_mean() {
        let estimator: Box<dyn Filter> = Box::new(DelayFilter::new(0));
        let mut signal = DerivedSignal::new("Alpha", 1, vec![1.0], estimator, 0).unwrap();
        signal.recalibrate(&[1.0, 4.0, 2.0], 0.0, nfb_types::StatsType::Max);
        signal.enable_scaling();
        let chunk = Chunk::new(vec![2.0], 1, 1, 0).unwrap();
        let out = signal.update(&chunk).unwrap();
        assert!((out - 0.5).abs() < 1e-9); // (2 - 0) / max(1,4,2)
    }

    #[test]
    fn smoothing_window_averages_recent_outputs() {
        let estimator: Box<dyn Filter> = Box::new(DelayFilter::new(0));
        let mut signal = DerivedSignal::new("Alpha", 1, vec![1.0], estimator, 2).unwrap();
        signal.update(&Chunk::new(vec![2.0], 1, 1, 0).unwrap()).unwrap();
        let out = signal.update(&Chunk::new(vec![4.0], 1, 1, 0).unwrap()).unwrap();
        assert!((out - 3.0).abs() < 1e-9);
    }
}
