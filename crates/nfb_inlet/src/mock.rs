use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use nfb_types::Chunk;

use crate::error::InletError;
use crate::inlet::Inlet;

/// Synthetic EEG generator: a background thread produces Gaussian noise
/// rows (mean 0, configurable standard deviation) at the configured
/// sample rate, paced with `thread::sleep` the same way the background
/// acquisition thread in this lineage's mock hardware driver free-runs
/// independent of whoever is pulling from it. `pull_chunk` never blocks —
/// it drains whatever rows have accumulated in the bounded channel since
/// the last call and returns `None` if the generator hasn't produced a
/// full sample yet.
pub struct MockInlet {
    n_channels: usize,
    sample_rate: f64,
    receiver: Receiver<Vec<f64>>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    start_sample: u64,
}

struct MockConfig {
    n_channels: usize,
    sample_rate: f64,
    noise_std: f64,
    seed: Option<u64>,
}

impl MockInlet {
    pub fn new(n_channels: usize, sample_rate: f64, noise_std: f64, seed: Option<u64>) -> Result<Self, InletError> {
        if n_channels == 0 {
            return Err(InletError::InvalidConfig("n_channels must be > 0".to_string()));
        }
        if sample_rate <= 0.0 {
            return Err(InletError::InvalidConfig("sample_rate must be > 0".to_string()));
        }

        let config = MockConfig {
            n_channels,
            sample_rate,
            noise_std,
            seed,
        };
        let (tx, rx): (Sender<Vec<f64>>, Receiver<Vec<f64>>) = crossbeam_channel::bounded(4096);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let handle = spawn_generator(config, tx, stop_flag.clone());

        Ok(Self {
            n_channels,
            sample_rate,
            receiver: rx,
            stop_flag,
            handle: Some(handle),
            start_sample: 0,
        })
    }
}

fn spawn_generator(
    config: MockConfig,
    tx: Sender<Vec<f64>>,
    stop_flag: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut rng = match config.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };
        let normal = Normal::new(0.0, config.noise_std).expect("noise_std must be finite and non-negative");
        let sample_interval = Duration::from_secs_f64(1.0 / config.sample_rate);
        while !stop_flag.load(Ordering::Relaxed) {
            let row: Vec<f64> = (0..config.n_channels).map(|_| normal.sample(&mut rng)).collect();
            if tx.send(row).is_err() {
                break;
            }
            thread::sleep(sample_interval);
        }
    })
}

impl Inlet for MockInlet {
    fn pull_chunk(&mut self) -> Result<Option<Chunk>, InletError> {
        let mut rows = Vec::new();
        while let Ok(row) = self.receiver.try_recv() {
            rows.push(row);
        }
        if rows.is_empty() {
            return Ok(None);
        }
        let n_samples = rows.len();
        let mut data = Vec::with_capacity(n_samples * self.n_channels);
        for row in rows {
            data.extend(row);
        }
        let chunk = Chunk::new(data, n_samples, self.n_channels, self.start_sample)
            .map_err(|e| InletError::InvalidConfig(e.to_string()))?;
        self.start_sample += n_samples as u64;
        Ok(Some(chunk))
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Drop for MockInlet {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("mock inlet generator thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn produces_rows_at_the_configured_channel_count() {
        let mut inlet = MockInlet::new(3, 250.0, 1.0, Some(7)).unwrap();
        sleep(Duration::from_millis(50));
        let chunk = inlet.pull_chunk().unwrap().expect("expected some rows by now");
        assert_eq!(chunk.n_channels(), 3);
        assert!(chunk.n_samples() > 0);
    }

    #[test]
    fn rejects_zero_channels() {
        assert!(MockInlet::new(0, 250.0, 1.0, None).is_err());
    }
}
