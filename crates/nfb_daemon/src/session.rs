use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nfb_dsp::{
    ButterBandEnvelopeDetector, CfirBandEnvelopeDetector, ComplexDemodulationDetector, DelayFilter,
    ExponentialSmoother, Filter, FftBandEnvelopeDetector, FilterSequence, SgSmoother,
};
use nfb_engine::{Engine, Recorder, SignalUnion};
use nfb_inlet::{FileReplayInlet, Inlet, MockInlet};
use nfb_persistence::GroupedStore;
use nfb_protocol::{ProtocolInstance, ProtocolSequence, Settings};
use nfb_signals::{CompositeSignal, DerivedSignal, Reward};

/// Builds the runtime `Engine` (inlet, signal pipeline, protocol sequence,
/// reward accumulator, optional recorder) out of a loaded `Settings` tree,
/// the same assembly step the reference daemon's `PipelineGraph::build`
/// performs over its own `SystemConfig`.
pub fn build_engine(settings: &Settings, record_to: Option<&str>, rng_seed: Option<u64>) -> Result<Engine> {
    let sample_rate = settings.acquisition.sample_rate;

    let inlet: Box<dyn Inlet> = build_inlet(settings)?;

    let mut known_signals = HashMap::new();
    let mut signals = Vec::with_capacity(settings.signals.len());
    for (index, spec) in settings.signals.iter().enumerate() {
        match spec {
            nfb_protocol::settings::SignalSpec::Derived {
                name,
                spatial_filter,
                bandpass_low,
                bandpass_high,
                estimator,
                smoothing_factor,
                smoothing_window_len,
                smoother_type,
                scale,
                delay_ms,
            } => {
                let n_channels = settings.acquisition.n_channels;
                let base: Box<dyn Filter> =
                    build_estimator(estimator, sample_rate, *bandpass_low, *bandpass_high);
                let mut stages = vec![base];
                if *smoothing_factor > 0.0 && !matches!(estimator, nfb_protocol::settings::EstimatorSpec::ComplexDemodulation) {
                    stages.push(build_smoother(*smoother_type, *smoothing_factor, *smoothing_window_len));
                }
                let delay_samples = (*delay_ms / 1000.0 * sample_rate).round().max(0.0) as usize;
                if delay_samples > 0 {
                    stages.push(Box::new(DelayFilter::new(delay_samples)));
                }
                let chained: Box<dyn Filter> = Box::new(FilterSequence::new(stages));

                let mut derived = DerivedSignal::new(
                    name.clone(),
                    n_channels,
                    spatial_filter.clone(),
                    chained,
                    *smoothing_window_len,
                )
                .with_context(|| format!("building derived signal '{name}'"))?;
                if *scale {
                    derived.enable_scaling();
                }
                known_signals.insert(name.clone(), index);
                signals.push(SignalUnion::Derived(derived));
            }
            nfb_protocol::settings::SignalSpec::Composite { name, expression } => {
                let composite = CompositeSignal::build(name.clone(), expression, &known_signals)
                    .with_context(|| format!("building composite signal '{name}'"))?;
                known_signals.insert(name.clone(), index);
                signals.push(SignalUnion::Composite(composite));
            }
        }
    }

    let block_order = resolve_block_order(settings, rng_seed)?;
    let sequence: Vec<ProtocolInstance> = block_order
        .iter()
        .map(|&i| {
            settings
                .protocols
                .get(i)
                .cloned()
                .map(|block| ProtocolInstance::new(block, sample_rate))
                .ok_or_else(|| anyhow::anyhow!("group referenced out-of-range protocol index {i}"))
        })
        .collect::<Result<_>>()?;
    if sequence.is_empty() {
        bail!("resolved protocol sequence is empty");
    }

    let initial_threshold = settings.protocols.first().map_or(0.0, |b| b.reward_threshold);
    let reward = Reward::new(initial_threshold, settings.flags.reward_period_s, sample_rate);

    let mut engine = Engine::new(inlet, signals, sequence, reward, rng_seed)
        .with_drop_outliers(settings.flags.drop_outliers);

    if let Some(root) = record_to {
        let store = GroupedStore::create(
            root,
            &settings.channels,
            sample_rate,
            "<stream_info/>",
            &serde_json::to_string(settings).unwrap_or_default(),
        )?;
        let first_expected = settings
            .protocols
            .first()
            .and_then(|b| b.max_expected_samples(sample_rate))
            .unwrap_or(0) as usize;
        let recorder = Recorder::new(
            store,
            settings.acquisition.n_channels,
            known_signals.len(),
            sample_rate,
            first_expected,
        );
        engine = engine.with_recorder(recorder);
    }

    Ok(engine)
}

fn build_inlet(settings: &Settings) -> Result<Box<dyn Inlet>> {
    match &settings.acquisition.inlet {
        nfb_protocol::settings::InletKind::Mock { seed } => {
            let inlet = MockInlet::new(settings.acquisition.n_channels, settings.acquisition.sample_rate, 1.0, *seed)?;
            Ok(Box::new(inlet))
        }
        nfb_protocol::settings::InletKind::FileReplay { path } => {
            let bytes = std::fs::read(path).with_context(|| format!("reading replay file '{path}'"))?;
            let inlet = FileReplayInlet::from_bytes(
                &bytes,
                settings.acquisition.n_channels,
                settings.acquisition.sample_rate,
                32,
            )?;
            Ok(Box::new(inlet))
        }
    }
}

fn build_estimator(
    spec: &nfb_protocol::settings::EstimatorSpec,
    sample_rate: f64,
    low_hz: f64,
    high_hz: f64,
) -> Box<dyn Filter> {
    use nfb_protocol::settings::EstimatorSpec;
    match spec {
        EstimatorSpec::Fft { n_samples } => {
            Box::new(FftBandEnvelopeDetector::new(*n_samples, sample_rate, low_hz, high_hz))
        }
        EstimatorSpec::ComplexDemodulation => Box::new(ComplexDemodulationDetector::new(
            sample_rate,
            low_hz,
            high_hz,
            0.1,
        )),
        EstimatorSpec::Butter { n_samples } => {
            Box::new(ButterBandEnvelopeDetector::new(*n_samples, sample_rate, low_hz, high_hz))
        }
        EstimatorSpec::Cfir { order } => {
            Box::new(CfirBandEnvelopeDetector::new(*order, sample_rate, low_hz, high_hz))
        }
    }
}

/// Builds the selected temporal smoother (`sTemporalSmootherType`). The
/// Savitzky-Golay window must be odd and wider than its fit order, so an
/// even `smoothing_window_len` is bumped up by one and the order is
/// capped just under it for very short windows.
fn build_smoother(
    smoother_type: nfb_protocol::settings::SmootherType,
    smoothing_factor: f64,
    smoothing_window_len: usize,
) -> Box<dyn Filter> {
    use nfb_protocol::settings::SmootherType;
    match smoother_type {
        SmootherType::Exp => Box::new(ExponentialSmoother::new(smoothing_factor)),
        SmootherType::SavGol => {
            let window = (smoothing_window_len.max(3) | 1).max(3);
            let order = 2.min(window - 1);
            Box::new(SgSmoother::new(window, order))
        }
    }
}

/// Flattens declared groups into the block-index sequence to run; falls
/// back to the protocols in declared order when no groups are configured,
/// so a minimal settings file doesn't have to declare a trivial
/// single-list group just to run its blocks in order.
fn resolve_block_order(settings: &Settings, rng_seed: Option<u64>) -> Result<Vec<usize>> {
    if settings.groups.is_empty() {
        return Ok((0..settings.protocols.len()).collect());
    }
    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok(ProtocolSequence::build(&settings.groups, &mut rng)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfb_protocol::settings::{Acquisition, GlobalFlags, InletKind, SignalSpec};

    fn minimal_settings() -> Settings {
        Settings {
            experiment_name: "demo".into(),
            acquisition: Acquisition {
                sample_rate: 250.0,
                n_channels: 1,
                inlet: InletKind::Mock { seed: Some(1) },
            },
            channels: vec!["Cz".into()],
            signals: vec![SignalSpec::Derived {
                name: "Alpha".into(),
                spatial_filter: vec![1.0],
                bandpass_low: 8.0,
                bandpass_high: 12.0,
                estimator: nfb_protocol::settings::EstimatorSpec::Fft { n_samples: 32 },
                smoothing_factor: 0.5,
                smoothing_window_len: 4,
                smoother_type: nfb_protocol::settings::SmootherType::Exp,
                scale: false,
                delay_ms: 0.0,
            }],
            protocols: vec![nfb_protocol::ProtocolBlock {
                name: "Baseline".into(),
                kind: nfb_protocol::ProtocolKind::Baseline,
                duration_s: 1.0,
                random_over_time_s: 0.0,
                update_statistics_in_the_end: false,
                stats_type: nfb_types::StatsType::default(),
                mock_previous: None,
                mock_source: None,
                reward_factor: 1.0,
                random_bound_signal_index: None,
                reward_threshold: 0.0,
            }],
            groups: vec![],
            flags: GlobalFlags::default(),
        }
    }

    #[test]
    fn build_engine_without_recording_succeeds() {
        let settings = minimal_settings();
        let engine = build_engine(&settings, None, Some(1)).unwrap();
        assert_eq!(engine.current_block_index(), 0);
    }

    #[test]
    fn savgol_smoother_selection_builds_without_error() {
        let mut settings = minimal_settings();
        if let SignalSpec::Derived { smoother_type, .. } = &mut settings.signals[0] {
            *smoother_type = nfb_protocol::settings::SmootherType::SavGol;
        }
        let engine = build_engine(&settings, None, Some(1)).unwrap();
        assert_eq!(engine.current_block_index(), 0);
    }

    #[test]
    fn configured_reward_threshold_and_period_reach_the_reward_instance() {
        let mut settings = minimal_settings();
        settings.protocols[0].reward_threshold = 0.5;
        settings.flags.reward_period_s = 2.0;
        let engine = build_engine(&settings, None, Some(1)).unwrap();
        assert_eq!(engine.reward().threshold(), 0.5);
        assert_eq!(engine.reward().rate_of_increase(), 2.0);
    }

    #[test]
    fn build_engine_with_recording_writes_session_files() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("demo_session");
        let settings = minimal_settings();
        let _engine = build_engine(&settings, Some(session_dir.to_str().unwrap()), Some(1)).unwrap();

        assert!(session_dir.join("stream_info.xml").is_file());
        assert!(session_dir.join("settings.xml").is_file());
    }
}
