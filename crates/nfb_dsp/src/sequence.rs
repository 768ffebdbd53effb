use crate::Filter;

/// Chains filters end to end, feeding each stage's output chunk as the
/// next stage's input — the Rust counterpart of wrapping an estimator in
/// `FilterSequence([estimator, DelayFilter(...)])` whenever a derived
/// signal configures a nonzero output delay.
pub struct FilterSequence {
    stages: Vec<Box<dyn Filter>>,
}

impl FilterSequence {
    pub fn new(stages: Vec<Box<dyn Filter>>) -> Self {
        Self { stages }
    }
}

impl Filter for FilterSequence {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for stage in self.stages.iter_mut() {
            current = stage.apply(&current);
        }
        current
    }

    fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DelayFilter;

    struct DoubleIt;
    impl Filter for DoubleIt {
        fn apply(&mut self, input: &[f64]) -> Vec<f64> {
            input.iter().map(|x| x * 2.0).collect()
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn composes_stages_in_order() {
        let mut seq = FilterSequence::new(vec![Box::new(DoubleIt), Box::new(DelayFilter::new(1))]);
        let out1 = seq.apply(&[1.0]);
        assert_eq!(out1, vec![0.0]);
        let out2 = seq.apply(&[2.0]);
        assert_eq!(out2, vec![2.0]);
    }
}
