use nfb_types::Chunk;

use crate::error::InletError;

/// Non-blocking source of raw EEG chunks. The tick loop calls
/// `pull_chunk` once per period and must never block on it — an inlet
/// with nothing new to offer returns `Ok(None)` rather than waiting, so
/// the cooperative loop can always move on to the next tick on schedule.
pub trait Inlet: Send {
    fn pull_chunk(&mut self) -> Result<Option<Chunk>, InletError>;
    fn n_channels(&self) -> usize;
    fn sample_rate(&self) -> f64;
}
