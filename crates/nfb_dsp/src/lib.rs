pub mod butter;
pub mod cfir;
pub mod complex_demod;
pub mod delay;
pub mod fft_envelope;
pub mod sequence;
pub mod smoother;

pub use butter::ButterBandEnvelopeDetector;
pub use cfir::CfirBandEnvelopeDetector;
pub use complex_demod::ComplexDemodulationDetector;
pub use delay::DelayFilter;
pub use fft_envelope::FftBandEnvelopeDetector;
pub use sequence::FilterSequence;
pub use smoother::{ExponentialSmoother, SgSmoother};

/// Common contract for everything that turns a chunk of raw scalar
/// samples into a filtered scalar stream: band-envelope detectors consume
/// many samples and emit one amplitude estimate, while post-filters
/// (smoothers, delay) consume one value at a time. Both are modeled as
/// "apply a chunk, get a chunk back" so they compose uniformly in a
/// `FilterSequence`.
pub trait Filter: Send {
    /// Processes `input` and returns the filtered output, same length
    /// unless the filter collapses a chunk into a single scalar (as a
    /// band-envelope detector does), in which case it returns a
    /// single-element slice-equivalent `Vec`.
    fn apply(&mut self, input: &[f64]) -> Vec<f64>;

    fn reset(&mut self);
}
