use crate::error::StoreError;

/// A single named dataset's in-memory recording buffer: preallocated to
/// 110% of the block's maximum expected sample count (the original's
/// recorders are sized the same way so a mid-block duration overrun from
/// a slow inlet doesn't force a reallocation), then truncated to the
/// actual sample count when the block ends. A block whose maximum extent
/// can't be bounded up front (held for participant input, or one that
/// still overruns its margin) grows the buffer instead of losing data.
pub struct RecordingBuffers {
    #[allow(dead_code)]
    name: String,
    data: Vec<f64>,
    cursor: usize,
    capacity: usize,
}

impl RecordingBuffers {
    pub fn preallocated(name: impl Into<String>, expected_samples: usize) -> Self {
        let capacity = ((expected_samples as f64) * 1.1).ceil() as usize;
        Self {
            name: name.into(),
            data: vec![f64::NAN; capacity.max(1)],
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, values: &[f64]) -> Result<(), StoreError> {
        let needed = self.cursor + values.len();
        if needed > self.capacity {
            let growth = needed.saturating_sub(self.capacity).max(self.capacity);
            self.data.resize(self.capacity + growth, f64::NAN);
            self.capacity += growth;
        }
        self.data[self.cursor..self.cursor + values.len()].copy_from_slice(values);
        self.cursor += values.len();
        Ok(())
    }

    pub fn push_scalar(&mut self, value: f64) -> Result<(), StoreError> {
        self.push(&[value])
    }

    /// Truncates the preallocated buffer down to the samples actually
    /// written, matching the flush-time truncation every recorder in
    /// this lineage performs before a block's data is persisted.
    pub fn finalize(self) -> Vec<f64> {
        let mut data = self.data;
        data.truncate(self.cursor);
        data
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_actual_sample_count() {
        let mut buf = RecordingBuffers::preallocated("raw_data", 100);
        buf.push(&[1.0; 40]).unwrap();
        let data = buf.finalize();
        assert_eq!(data.len(), 40);
        assert!(data.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn grows_past_preallocated_capacity_instead_of_failing() {
        let mut buf = RecordingBuffers::preallocated("raw_data", 10);
        buf.push(&[0.0; 50]).unwrap();
        assert_eq!(buf.finalize().len(), 50);
    }

    #[test]
    fn allows_overrun_within_the_ten_percent_margin() {
        let mut buf = RecordingBuffers::preallocated("raw_data", 100);
        buf.push(&[1.0; 105]).unwrap();
        assert_eq!(buf.finalize().len(), 105);
    }
}
