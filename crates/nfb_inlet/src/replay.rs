use byteorder::{ByteOrder, LittleEndian};

use nfb_types::Chunk;

use crate::error::InletError;
use crate::inlet::Inlet;

/// Replays a previously persisted raw-data dataset (little-endian `f64`,
/// one row per sample, row-major across channels) at a fixed chunk size.
/// Used both for file-backed mock blocks and for regression-testing the
/// engine against a captured session. On underrun — fewer samples remain
/// than the caller's configured chunk length — playback wraps back to
/// the start of the buffer modulo its length rather than padding or
/// erroring; this is a documented policy, not a gap to be fixed.
pub struct FileReplayInlet {
    n_channels: usize,
    sample_rate: f64,
    samples: Vec<f64>,
    chunk_len: usize,
    cursor: usize,
    start_sample: u64,
}

impl FileReplayInlet {
    pub fn from_bytes(
        bytes: &[u8],
        n_channels: usize,
        sample_rate: f64,
        chunk_len: usize,
    ) -> Result<Self, InletError> {
        if n_channels == 0 {
            return Err(InletError::InvalidConfig("n_channels must be > 0".to_string()));
        }
        if bytes.len() % 8 != 0 {
            return Err(InletError::InvalidConfig(
                "replay buffer length is not a whole number of f64 values".to_string(),
            ));
        }
        let mut samples = vec![0.0; bytes.len() / 8];
        LittleEndian::read_f64_into(bytes, &mut samples);
        if samples.is_empty() || samples.len() % n_channels != 0 {
            return Err(InletError::InvalidConfig(
                "replay buffer length is not a whole number of samples for n_channels".to_string(),
            ));
        }
        Ok(Self {
            n_channels,
            sample_rate,
            samples,
            chunk_len: chunk_len.max(1),
            cursor: 0,
            start_sample: 0,
        })
    }

    fn total_rows(&self) -> usize {
        self.samples.len() / self.n_channels
    }
}

impl Inlet for FileReplayInlet {
    fn pull_chunk(&mut self) -> Result<Option<Chunk>, InletError> {
        let total_rows = self.total_rows();
        let mut data = Vec::with_capacity(self.chunk_len * self.n_channels);
        for _ in 0..self.chunk_len {
            let row = self.cursor % total_rows;
            let start = row * self.n_channels;
            data.extend_from_slice(&self.samples[start..start + self.n_channels]);
            self.cursor += 1;
        }
        let chunk = Chunk::new(data, self.chunk_len, self.n_channels, self.start_sample)
            .map_err(|e| InletError::InvalidConfig(e.to_string()))?;
        self.start_sample += self.chunk_len as u64;
        Ok(Some(chunk))
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn encode(values: &[f64]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in values {
            bytes.write_f64::<LittleEndian>(*v).unwrap();
        }
        bytes
    }

    #[test]
    fn wraps_around_on_underrun() {
        let bytes = encode(&[1.0, 2.0, 3.0, 4.0]); // 2 rows x 2 channels
        let mut inlet = FileReplayInlet::from_bytes(&bytes, 2, 250.0, 3).unwrap();
        let chunk = inlet.pull_chunk().unwrap().unwrap();
        // rows requested: row0, row1, row0 (wrap)
        assert_eq!(chunk.raw(), &[1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn rejects_misaligned_buffer() {
        let bytes = encode(&[1.0, 2.0, 3.0]);
        assert!(FileReplayInlet::from_bytes(&bytes, 2, 250.0, 1).is_err());
    }
}
