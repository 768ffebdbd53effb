/// Threshold integrator that turns a bound scalar signal into an
/// accumulating reward. Each tick where the signal crosses `threshold`
/// in the direction set by the block's `reward_factor` (+1 rewards values
/// above threshold, -1 rewards values below `-threshold`) accrues
/// `n_samples / (sample_rate * rate_of_increase)` onto the running total —
/// the chunk-length-scaled counterpart of "1 / rate_of_increase per
/// second", since a tick's chunk may carry more than one sample.
///
/// `threshold` and `reward_factor` are mutable: a Feedback block resolves
/// both at `on_enter` (cue bias, baseline-corrected or AAI-mode overrides)
/// and pushes them in via the setters before the block's first tick.
#[derive(Debug, Clone)]
pub struct Reward {
    threshold: f64,
    reward_factor: f64,
    rate_of_increase: f64,
    sample_rate: f64,
    accumulated: f64,
}

impl Reward {
    pub fn new(threshold: f64, rate_of_increase: f64, sample_rate: f64) -> Self {
        Self {
            threshold,
            reward_factor: 1.0,
            rate_of_increase,
            sample_rate,
            accumulated: 0.0,
        }
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn rate_of_increase(&self) -> f64 {
        self.rate_of_increase
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_reward_factor(&mut self, reward_factor: f64) {
        self.reward_factor = reward_factor;
    }

    /// `signal_value` is the bound composite/derived signal's current
    /// value for this tick; `n_samples` is the chunk length that produced
    /// it. Returns the delta applied this tick (0.0 if the tick wasn't
    /// eligible). `reward_factor` only flips which direction counts as
    /// eligible (+1 rewards at-or-above `threshold`, -1 rewards at-or-below
    /// `-threshold`) — the accrued amount itself is always positive, so
    /// `accumulated` is monotonically non-decreasing within a block
    /// regardless of the block's reward factor.
    pub fn update(&mut self, signal_value: f64, n_samples: u64) -> f64 {
        let eligible = if self.reward_factor > 0.0 {
            signal_value >= self.threshold
        } else {
            signal_value <= -self.threshold
        };
        if !eligible || self.rate_of_increase <= 0.0 || self.sample_rate <= 0.0 {
            return 0.0;
        }
        let delta = n_samples as f64 / (self.sample_rate * self.rate_of_increase);
        self.accumulated += delta;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrues_only_when_signal_crosses_threshold_in_rewarded_direction() {
        let mut reward = Reward::new(1.0, 1.0, 250.0);
        assert_eq!(reward.update(0.5, 1), 0.0);
        let delta = reward.update(2.0, 1);
        assert!(delta > 0.0);
        assert_eq!(reward.accumulated(), delta);
    }

    #[test]
    fn negative_reward_factor_flips_the_eligible_direction_but_still_accrues_positive() {
        let mut reward = Reward::new(1.0, 1.0, 250.0);
        reward.set_reward_factor(-1.0);
        assert_eq!(reward.update(2.0, 1), 0.0);
        let delta = reward.update(-2.0, 1);
        assert!(delta > 0.0);
        assert_eq!(reward.accumulated(), delta);
    }

    #[test]
    fn signal_exactly_at_threshold_is_eligible() {
        let mut reward = Reward::new(1.0, 1.0, 250.0);
        assert!(reward.update(1.0, 1) > 0.0);

        let mut inverted = Reward::new(1.0, 1.0, 250.0);
        inverted.set_reward_factor(-1.0);
        assert!(inverted.update(-1.0, 1) > 0.0);
    }

    #[test]
    fn accrual_scales_with_chunk_length() {
        let mut reward = Reward::new(0.0, 1.0, 250.0);
        let delta = reward.update(1.0, 25);
        assert!((delta - 25.0 / 250.0).abs() < 1e-12);
    }

    #[test]
    fn ten_second_block_accumulates_to_ten_at_one_second_rate() {
        let fs = 250.0;
        let mut reward = Reward::new(0.5, 1.0, fs);
        let ticks = 10.0 * fs / 5.0; // 5-sample chunks
        for _ in 0..ticks as u64 {
            reward.update(1.0, 5);
        }
        assert!((reward.accumulated() - 10.0).abs() < 1e-9);
    }
}
