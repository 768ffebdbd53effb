use serde::{Deserialize, Serialize};

use crate::block::ProtocolBlock;
use crate::sequence::ProtocolGroup;

/// Typed settings tree for a session. This stands in for the
/// XML-configuration-plus-parameter-schema surface of the original
/// implementation: only the parameter schema is modeled here (loaded
/// from YAML/JSON via `serde`), since parsing a literal `settings.xml`
/// document is explicitly out of scope. The engine still emits a
/// `settings.xml`-named attribute into the persistence store (see
/// `nfb_persistence`), generated by serializing this tree rather than by
/// round-tripping a hand-parsed XML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// `sExperimentName`: folded into the persisted session directory
    /// name as `{experiment_name}_{timestamp}`, matching this lineage's
    /// own `results/{sExperimentName}_{timestamp}/` convention.
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    pub acquisition: Acquisition,
    pub channels: Vec<String>,
    pub signals: Vec<SignalSpec>,
    pub protocols: Vec<ProtocolBlock>,
    pub groups: Vec<ProtocolGroup>,
    #[serde(default)]
    pub flags: GlobalFlags,
}

fn default_experiment_name() -> String {
    "experiment".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acquisition {
    pub sample_rate: f64,
    pub n_channels: usize,
    pub inlet: InletKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InletKind {
    Mock { seed: Option<u64> },
    FileReplay { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SignalSpec {
    Derived {
        name: String,
        spatial_filter: Vec<f64>,
        bandpass_low: f64,
        bandpass_high: f64,
        estimator: EstimatorSpec,
        smoothing_factor: f64,
        smoothing_window_len: usize,
        /// `sTemporalSmootherType`: which post-filter turns the raw
        /// envelope estimate into the value a participant actually sees.
        #[serde(default)]
        smoother_type: SmootherType,
        #[serde(default)]
        scale: bool,
        #[serde(default)]
        delay_ms: f64,
    },
    Composite {
        name: String,
        expression: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmootherType {
    Exp,
    SavGol,
}

impl Default for SmootherType {
    fn default() -> Self {
        SmootherType::Exp
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EstimatorSpec {
    Fft { n_samples: usize },
    ComplexDemodulation,
    Butter { n_samples: usize },
    Cfir { order: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalFlags {
    #[serde(default)]
    pub drop_outliers: f64,
    #[serde(default)]
    pub channel_trouble_check_interval_s: Option<f64>,
    /// `fRewardPeriodS`: seconds of continuously-eligible signal needed
    /// to add one full point to the reward total (`Reward`'s
    /// `rate_of_increase`).
    #[serde(default = "default_reward_period_s")]
    pub reward_period_s: f64,
}

fn default_reward_period_s() -> f64 {
    1.0
}

impl Default for GlobalFlags {
    fn default() -> Self {
        Self {
            drop_outliers: 0.0,
            channel_trouble_check_interval_s: None,
            reward_period_s: default_reward_period_s(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_json() {
        let settings = Settings {
            experiment_name: "demo".into(),
            acquisition: Acquisition {
                sample_rate: 250.0,
                n_channels: 2,
                inlet: InletKind::Mock { seed: Some(7) },
            },
            channels: vec!["Cz".into(), "Pz".into()],
            signals: vec![SignalSpec::Composite {
                name: "Diff".into(),
                expression: "Alpha - Beta".into(),
            }],
            protocols: vec![],
            groups: vec![],
            flags: GlobalFlags::default(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.channels, settings.channels);
    }
}
