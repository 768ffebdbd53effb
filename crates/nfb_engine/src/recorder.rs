use nfb_persistence::{BlockRecord, GroupedStore, RecordingBuffers, StoreError};
use nfb_protocol::BlockMarks;
use nfb_types::Chunk;

/// One block's worth of in-progress recorder channels, preallocated at
/// `on_enter` to 110% of the block's maximum possible sample extent
/// (`ProtocolBlock::max_expected_samples`) the way every recorder
/// upstream is sized, and flushed to the session's `GroupedStore` on
/// block exit. A block with no fixed extent at all (held for
/// participant input) starts from a capacity of zero and grows as ticks
/// arrive.
///
/// `raw_data` and `signals_data` are stored sample-major/channel-minor
/// flat vectors (`raw_data[s * n_channels + c]`), matching
/// `Chunk::raw()`'s own layout, so a flushed dataset can be reshaped to
/// `(S, C)` without a transpose.
struct BlockBuffers {
    raw: RecordingBuffers,
    signals: RecordingBuffers,
    timestamp: RecordingBuffers,
    reward: RecordingBuffers,
    mark: RecordingBuffers,
    probe: RecordingBuffers,
    cue: RecordingBuffers,
    posner_stim: RecordingBuffers,
    posner_stim_time: RecordingBuffers,
    response: RecordingBuffers,
    answer: RecordingBuffers,
    chunk_len: RecordingBuffers,
    n_channels: usize,
    n_signals: usize,
}

impl BlockBuffers {
    fn preallocated(expected_samples: usize, n_channels: usize, n_signals: usize) -> Self {
        Self {
            raw: RecordingBuffers::preallocated("raw_data", expected_samples * n_channels.max(1)),
            signals: RecordingBuffers::preallocated(
                "signals_data",
                expected_samples * n_signals.max(1),
            ),
            timestamp: RecordingBuffers::preallocated("timestamp_data", expected_samples),
            reward: RecordingBuffers::preallocated("reward_data", expected_samples),
            mark: RecordingBuffers::preallocated("mark_data", expected_samples),
            probe: RecordingBuffers::preallocated("probe_data", expected_samples),
            cue: RecordingBuffers::preallocated("cue_data", expected_samples),
            posner_stim: RecordingBuffers::preallocated("posner_stim_data", expected_samples),
            posner_stim_time: RecordingBuffers::preallocated(
                "posner_stim_time",
                expected_samples,
            ),
            response: RecordingBuffers::preallocated("response_data", expected_samples),
            answer: RecordingBuffers::preallocated("answer_data", expected_samples),
            chunk_len: RecordingBuffers::preallocated("chunk_data", expected_samples),
            n_channels,
            n_signals,
        }
    }
}

/// Drives per-tick recording and per-block persistence. Owned by the
/// engine only when recording is enabled for the session; a headless
/// replay or a unit test can run the same tick loop without one.
pub struct Recorder {
    store: GroupedStore,
    block_index: usize,
    current: BlockBuffers,
    sample_rate: f64,
    samples_counter: u64,
    /// Set by the engine when a participant response/answer arrives;
    /// recorded into `response_data`/`answer_data` on the next tick, then
    /// cleared back to 0 so a single keypress isn't smeared across every
    /// subsequent sample.
    pending_response: f64,
    pending_answer: f64,
}

impl Recorder {
    pub fn new(
        store: GroupedStore,
        n_channels: usize,
        n_signals: usize,
        sample_rate: f64,
        first_block_expected_samples: usize,
    ) -> Self {
        Self {
            store,
            block_index: 0,
            current: BlockBuffers::preallocated(first_block_expected_samples, n_channels, n_signals),
            sample_rate,
            samples_counter: 0,
            pending_response: 0.0,
            pending_answer: 0.0,
        }
    }

    /// Latches a participant response/answer to be recorded on the next
    /// tick and then cleared.
    pub fn submit_response(&mut self, response: f64, answer: f64) {
        self.pending_response = response;
        self.pending_answer = answer;
    }

    /// Appends one tick's worth of rows: `chunk.n_samples()` raw/signal
    /// rows, repeating the tick's scalar signal value and marks across
    /// every sample in the chunk, matching the per-tick recording
    /// invariant that every recorder gains exactly `k` rows per tick
    /// regardless of how coarse-grained the underlying estimate is.
    pub fn record_tick(
        &mut self,
        chunk: &Chunk,
        signal_values: &[f64],
        reward_score: f64,
        marks: BlockMarks,
    ) -> Result<(), StoreError> {
        self.current.raw.push(chunk.raw())?;
        for _ in 0..chunk.n_samples() {
            self.current.signals.push(signal_values)?;
            self.current
                .timestamp
                .push_scalar(self.samples_counter as f64 / self.sample_rate)?;
            self.current.reward.push_scalar(reward_score)?;
            self.current.probe.push_scalar(marks.probe)?;
            self.current.cue.push_scalar(marks.cue)?;
            self.current.posner_stim.push_scalar(marks.posner_stim)?;
            self.current
                .posner_stim_time
                .push_scalar(marks.posner_reaction_time_s)?;
            self.current.mark.push_scalar(0.0)?;
            self.current.response.push_scalar(self.pending_response)?;
            self.current.answer.push_scalar(self.pending_answer)?;
            self.samples_counter += 1;
        }
        self.pending_response = 0.0;
        self.pending_answer = 0.0;
        self.current.chunk_len.push_scalar(chunk.n_samples() as f64)?;
        Ok(())
    }

    /// Builds the just-finished block's `BlockRecord` and prepares a
    /// fresh set of buffers for the next block. Does not touch the store —
    /// the engine writes (and, on failure, retries) the returned record
    /// itself via `store()`, since a write that fails after the buffer
    /// swap has nothing left in `self.current` to retry from.
    pub fn finish_block(
        &mut self,
        name: impl Into<String>,
        mock_previous: Option<usize>,
        attrs: std::collections::HashMap<String, String>,
        next_expected_samples: usize,
    ) -> BlockRecord {
        self.block_index += 1;
        let finished = std::mem::replace(
            &mut self.current,
            BlockBuffers::preallocated(
                next_expected_samples,
                self.current.n_channels,
                self.current.n_signals,
            ),
        );
        let mut datasets = std::collections::HashMap::new();
        datasets.insert("raw_data".to_string(), finished.raw.finalize());
        datasets.insert("raw_other_data".to_string(), Vec::new());
        datasets.insert("signals_data".to_string(), finished.signals.finalize());
        datasets.insert("timestamp_data".to_string(), finished.timestamp.finalize());
        datasets.insert("reward_data".to_string(), finished.reward.finalize());
        datasets.insert("mark_data".to_string(), finished.mark.finalize());
        datasets.insert("probe_data".to_string(), finished.probe.finalize());
        datasets.insert("cue_data".to_string(), finished.cue.finalize());
        datasets.insert(
            "posner_stim_data".to_string(),
            finished.posner_stim.finalize(),
        );
        datasets.insert(
            "posner_stim_time".to_string(),
            finished.posner_stim_time.finalize(),
        );
        datasets.insert("response_data".to_string(), finished.response.finalize());
        datasets.insert("answer_data".to_string(), finished.answer.finalize());
        datasets.insert("choice_data".to_string(), Vec::new());
        datasets.insert("chunk_data".to_string(), finished.chunk_len.finalize());

        BlockRecord {
            name: name.into(),
            mock_previous,
            attrs,
            datasets,
        }
    }

    /// Writes `record` to the store at the index assigned by the most
    /// recent `finish_block` call, retrying once on failure before
    /// escalating to the caller.
    pub fn write_block(&self, record: &BlockRecord) -> Result<(), StoreError> {
        match self.store.write_block(self.block_index, record) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(block = self.block_index, error = %err, "block flush failed, retrying once");
                self.store.write_block(self.block_index, record)
            }
        }
    }

    pub fn store(&self) -> &GroupedStore {
        &self.store
    }

    pub fn block_index(&self) -> usize {
        self.block_index
    }
}
