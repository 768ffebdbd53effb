use rand::Rng;
use serde::{Deserialize, Serialize};

/// One block's variant-specific behavior. Every variant shares the common
/// fields on `ProtocolBlock` (duration, recording flags, reward factor);
/// this enum only carries what differs between block *kinds*, the same
/// split the settings tree upstream uses between shared per-block
/// attributes and a kind-specific parameter bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolKind {
    Baseline,
    Feedback {
        signal_index: usize,
        #[serde(default)]
        posner: Option<PosnerConfig>,
    },
    FixationCross {
        show_percent_score_after: bool,
        eye_signal_index: Option<usize>,
    },
    Cue {
        direction: CueDirection,
    },
    Probe {
        side: ProbeSide,
        #[serde(default = "default_probe_visibility")]
        visibility_probability: f64,
    },
    EyeCalibration,
    Image {
        path: String,
    },
    Video {
        path: String,
    },
    ParticipantInput {
        prompt: String,
    },
    ParticipantChoice {
        options: Vec<String>,
    },
    ExperimentStart,
}

fn default_probe_visibility() -> f64 {
    0.8
}

/// A Feedback block's Posner-style reaction-time probe: the lateral
/// stimulus fires somewhere in `[duration - reaction_buffer, duration -
/// reaction_buffer + 2]`s so there is always a window left to react
/// before the block's nominal duration elapses, and holds the block open
/// (reward still accruing) until either a response arrives or
/// `max_hold_s` past the nominal duration passes, at which point the
/// sequencer force-ends it and the trial is recorded as a non-response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PosnerConfig {
    pub reaction_buffer_s: f64,
    pub max_hold_s: f64,
}

/// File-backed override for a block's input: instead of the live inlet,
/// the block replays a dataset previously written by this engine's own
/// persistence layer (`sMockSignalFilePath`/`sMockSignalFileDataset`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSource {
    pub path: String,
    pub dataset: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueDirection {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeSide {
    Left,
    Right,
    Rand,
}

/// Code written into the `probe_data` recorder for a tick: 0 means no
/// probe is currently shown, 1 is RIGHT, 2 is LEFT — the same two-sided
/// encoding the original probe channel uses so alignment scripts reading
/// an existing session don't need a third value.
pub const PROBE_CODE_NONE: f64 = 0.0;
pub const PROBE_CODE_RIGHT: f64 = 1.0;
pub const PROBE_CODE_LEFT: f64 = 2.0;

/// Advisory outcome of a single tick, matching the three-way signal this
/// lineage's block loop acts on: keep running, end the block now, or hold
/// the current state without advancing (used by blocks waiting on
/// participant input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    EndNow,
    Hold,
}

/// Settings-level description of one block: shared fields plus the
/// variant-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolBlock {
    pub name: String,
    pub kind: ProtocolKind,
    pub duration_s: f64,
    /// Extra uniform(0, random_over_time_s) jitter folded into this
    /// block's effective duration at each `on_enter`, so repeated
    /// presentations of the same block don't land on an identical
    /// sample count (a participant could otherwise anticipate the exact
    /// instant a block ends).
    #[serde(default)]
    pub random_over_time_s: f64,
    #[serde(default)]
    pub update_statistics_in_the_end: bool,
    #[serde(default)]
    pub stats_type: nfb_types::StatsType,
    /// Index of a prior, already-finished block in this session's own
    /// sequence whose raw EEG should replay through the live pipeline in
    /// place of the inlet for this block's duration (`iMockPrevious`).
    /// Indexes the sequence the same way `random_bound_signal_index`
    /// indexes the signal list: 0-based, in declaration/resolved-group
    /// order.
    #[serde(default)]
    pub mock_previous: Option<usize>,
    #[serde(default)]
    pub mock_source: Option<MockSource>,
    #[serde(default = "default_reward_factor")]
    pub reward_factor: f64,
    #[serde(default)]
    pub random_bound_signal_index: Option<usize>,
    /// Static threshold this block sets on the reward integrator
    /// (`bRewardThreshold`). Overridden at `on_enter` by baseline-derived
    /// bias for a Feedback block that follows a Baseline; used as-is
    /// otherwise.
    #[serde(default)]
    pub reward_threshold: f64,
}

fn default_reward_factor() -> f64 {
    1.0
}

impl ProtocolBlock {
    /// Upper bound on this block's sample extent, for sizing recording
    /// buffers to "110% of the maximum expected block length" rather than
    /// nominal duration. `None` for the hold-for-input kinds, which have
    /// no fixed extent at all; their buffers must grow instead.
    pub fn max_expected_samples(&self, sample_rate: f64) -> Option<u64> {
        match &self.kind {
            ProtocolKind::ParticipantInput { .. }
            | ProtocolKind::ParticipantChoice { .. }
            | ProtocolKind::ExperimentStart => None,
            ProtocolKind::Feedback {
                posner: Some(cfg), ..
            } => {
                let base = (self.duration_s * sample_rate).round().max(0.0) as u64;
                let jitter = (self.random_over_time_s * sample_rate).round().max(0.0) as u64;
                let hold = (cfg.max_hold_s * sample_rate).round().max(0.0) as u64;
                Some(base + jitter + hold)
            }
            _ => {
                let base = (self.duration_s * sample_rate).round().max(0.0) as u64;
                let jitter = (self.random_over_time_s * sample_rate).round().max(0.0) as u64;
                Some(base + jitter)
            }
        }
    }
}

/// The subset of per-tick recorder channels driven purely by block
/// timing/randomization rather than the live signal pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMarks {
    pub probe: f64,
    pub cue: f64,
    pub posner_stim: f64,
    pub posner_reaction_time_s: f64,
}

impl Default for BlockMarks {
    fn default() -> Self {
        Self {
            probe: PROBE_CODE_NONE,
            cue: 0.0,
            posner_stim: 0.0,
            posner_reaction_time_s: 0.0,
        }
    }
}

/// Runtime instance of a block: the immutable settings plus mutable
/// elapsed-sample state, ticked once per chunk. Per-block randomized
/// decisions (probe onset, probe visibility/side, cue flash window) are
/// all resolved once in `on_enter` and held fixed for the block's
/// lifetime, so the same instance reproduces identically if replayed
/// from its recorded parameters.
pub struct ProtocolInstance {
    pub block: ProtocolBlock,
    sample_rate: f64,
    base_duration_samples: u64,
    duration_samples: u64,
    elapsed_samples: u64,
    onset_sample: u64,
    probe_visible: bool,
    resolved_probe_side: ProbeSide,
    eye_calibration_position: u8,
    posner_stim_sample: u64,
    posner_max_hold_sample: u64,
    posner_side: Option<CueDirection>,
    responded: bool,
}

const CUE_FLASH_S: f64 = 0.1;
const ONSET_JITTER_MIN_S: f64 = 1.0;
const ONSET_JITTER_MAX_S: f64 = 2.0;

impl ProtocolInstance {
    pub fn new(block: ProtocolBlock, sample_rate: f64) -> Self {
        let base_duration_samples = (block.duration_s * sample_rate).round().max(0.0) as u64;
        Self {
            block,
            sample_rate,
            base_duration_samples,
            duration_samples: base_duration_samples,
            elapsed_samples: 0,
            onset_sample: 0,
            probe_visible: true,
            resolved_probe_side: ProbeSide::Left,
            eye_calibration_position: 0,
            posner_stim_sample: 0,
            posner_max_hold_sample: 0,
            posner_side: None,
            responded: false,
        }
    }

    /// Resolves every randomized per-block decision and resets the
    /// elapsed-sample counter. Must be called with the session's shared
    /// RNG so the choices are reproducible from a captured seed.
    /// `predicted_direction` is the cue direction a preceding Cue block
    /// resolved to, if any; a Feedback block's Posner probe uses it to
    /// weight its own lateral side 70% valid (matching the cue) and 30%
    /// invalid, the standard Posner-cueing validity split.
    pub fn on_enter<R: Rng>(&mut self, rng: &mut R, predicted_direction: Option<CueDirection>) {
        self.elapsed_samples = 0;
        self.responded = false;
        let jitter_s = if self.block.random_over_time_s > 0.0 {
            rng.gen_range(0.0..self.block.random_over_time_s)
        } else {
            0.0
        };
        self.duration_samples =
            self.base_duration_samples + (jitter_s * self.sample_rate).round() as u64;

        let onset_jitter_s = rng.gen_range(ONSET_JITTER_MIN_S..ONSET_JITTER_MAX_S);
        self.onset_sample = (onset_jitter_s * self.sample_rate).round() as u64;

        if let ProtocolKind::Probe {
            side,
            visibility_probability,
        } = &self.block.kind
        {
            self.probe_visible = rng.gen_bool((*visibility_probability).clamp(0.0, 1.0));
            self.resolved_probe_side = match side {
                ProbeSide::Rand => {
                    if rng.gen_bool(0.5) {
                        ProbeSide::Left
                    } else {
                        ProbeSide::Right
                    }
                }
                other => *other,
            };
        }

        if let ProtocolKind::Feedback {
            posner: Some(cfg), ..
        } = &self.block.kind
        {
            let reaction_buffer_samples =
                (cfg.reaction_buffer_s * self.sample_rate).round() as i64;
            let earliest = (self.duration_samples as i64 - reaction_buffer_samples).max(0) as u64;
            let jitter_samples = (ONSET_JITTER_MAX_S * self.sample_rate).round() as u64;
            self.posner_stim_sample = earliest + rng.gen_range(0..=jitter_samples.max(1));
            self.posner_max_hold_sample =
                self.duration_samples + (cfg.max_hold_s * self.sample_rate).round() as u64;
            self.posner_side = Some(if rng.gen_bool(0.7) {
                predicted_direction.unwrap_or(CueDirection::Center)
            } else {
                match predicted_direction {
                    Some(CueDirection::Left) => CueDirection::Right,
                    Some(CueDirection::Right) => CueDirection::Left,
                    _ => CueDirection::Center,
                }
            });
        } else {
            self.posner_side = None;
        }
        self.eye_calibration_position = 0;
    }

    /// Advances the block by `n_samples` (one tick's worth of chunk
    /// length) and reports whether the block should end.
    ///
    /// `ParticipantInput`/`ParticipantChoice`/`ExperimentStart` blocks
    /// never time out on their own — they hold until the engine observes
    /// a response and calls `force_end` or `register_response`, matching
    /// the original's wait-for-input blocks which have no fixed duration.
    /// A Feedback block with a Posner probe holds past its nominal
    /// duration waiting for a response, but force-ends at
    /// `posner_max_hold_sample` regardless.
    pub fn on_tick(&mut self, n_samples: u64) -> TickOutcome {
        self.elapsed_samples += n_samples;
        match &self.block.kind {
            ProtocolKind::ParticipantInput { .. }
            | ProtocolKind::ParticipantChoice { .. }
            | ProtocolKind::ExperimentStart => TickOutcome::Hold,
            ProtocolKind::Feedback {
                posner: Some(_), ..
            } => {
                if self.responded || self.elapsed_samples >= self.posner_max_hold_sample {
                    TickOutcome::EndNow
                } else if self.elapsed_samples >= self.duration_samples {
                    TickOutcome::Hold
                } else {
                    TickOutcome::Continue
                }
            }
            _ => {
                if self.elapsed_samples >= self.duration_samples {
                    TickOutcome::EndNow
                } else {
                    TickOutcome::Continue
                }
            }
        }
    }

    /// Marks a participant response as received for this tick; combined
    /// with the next `on_tick` call, this ends a held block immediately
    /// (`ParticipantInput`/`ParticipantChoice`/`ExperimentStart` still
    /// rely on `force_end` since they have no timing state of their own
    /// to distinguish a response from a timeout).
    pub fn register_response(&mut self) {
        self.responded = true;
    }

    /// The timing/randomization-driven recorder channels for the tick
    /// that just elapsed (i.e. the state as of `elapsed_samples` after
    /// `on_tick`).
    pub fn marks(&mut self) -> BlockMarks {
        let mut marks = BlockMarks::default();
        match &self.block.kind {
            ProtocolKind::Probe { .. } => {
                if self.probe_visible && self.elapsed_samples >= self.onset_sample {
                    marks.probe = match self.resolved_probe_side {
                        ProbeSide::Left => PROBE_CODE_LEFT,
                        ProbeSide::Right | ProbeSide::Rand => PROBE_CODE_RIGHT,
                    };
                }
            }
            ProtocolKind::Cue { direction } => {
                let flash_samples = (CUE_FLASH_S * self.sample_rate).round() as u64;
                if self.elapsed_samples >= self.onset_sample
                    && self.elapsed_samples < self.onset_sample + flash_samples
                {
                    marks.cue = match direction {
                        CueDirection::Left => 1.0,
                        CueDirection::Right => 2.0,
                        CueDirection::Center => 3.0,
                    };
                }
            }
            ProtocolKind::EyeCalibration => {
                let step = (self.duration_samples / 10).max(1);
                let position = (self.elapsed_samples / step).min(9) as u8;
                self.eye_calibration_position = position;
                marks.probe = 10.0 + position as f64;
            }
            ProtocolKind::Feedback {
                posner: Some(_), ..
            } => {
                if self.elapsed_samples >= self.posner_stim_sample && !self.responded {
                    marks.posner_stim = match self.posner_side {
                        Some(CueDirection::Left) => 1.0,
                        Some(CueDirection::Right) => 2.0,
                        _ => 3.0,
                    };
                }
            }
            _ => {}
        }
        marks.posner_reaction_time_s = self.posner_reaction_time_s().unwrap_or(0.0);
        marks
    }

    /// The lateral side resolved for this block's Posner probe, if any.
    pub fn posner_side(&self) -> Option<CueDirection> {
        self.posner_side
    }

    /// Seconds elapsed since the Posner stimulus appeared, or `None`
    /// before onset/if this block has no probe; recorded into
    /// `posner_stim_time` so reaction latency can be reconstructed from
    /// the log without replaying the whole tick history.
    pub fn posner_reaction_time_s(&self) -> Option<f64> {
        if matches!(self.block.kind, ProtocolKind::Feedback { posner: Some(_), .. })
            && self.elapsed_samples >= self.posner_stim_sample
        {
            Some((self.elapsed_samples - self.posner_stim_sample) as f64 / self.sample_rate)
        } else {
            None
        }
    }

    pub fn responded(&self) -> bool {
        self.responded
    }

    pub fn force_end(&mut self) {
        self.elapsed_samples = self.duration_samples;
    }

    pub fn on_exit(&mut self) {}

    pub fn elapsed_samples(&self) -> u64 {
        self.elapsed_samples
    }

    pub fn duration_samples(&self) -> u64 {
        self.duration_samples
    }
}
