use serde::{Deserialize, Serialize};

/// How a block's recorded samples are folded into a signal's calibrated
/// mean/std at end-of-block recalibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsType {
    /// `mean = mean(recording)`, `std = std(recording)` — the common
    /// case, used to standardize a signal against its own Baseline.
    MeanStd,
    /// `mean = 0`, `std = max(recording)` — used when a signal should be
    /// expressed as a fraction of its largest observed swing rather than
    /// normalized around a center.
    Max,
}

impl Default for StatsType {
    fn default() -> Self {
        StatsType::MeanStd
    }
}
