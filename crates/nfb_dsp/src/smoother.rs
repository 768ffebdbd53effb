use crate::Filter;

/// Exponential moving average with an explicit warm-up gate: the first
/// ten accumulated samples pass through unsmoothed, matching the
/// `n_acc > 10` guard in the signal this is ported from (smoothing a
/// noisy envelope estimate before it has enough history distorts early
/// samples more than it helps).
#[derive(Debug, Clone)]
pub struct ExponentialSmoother {
    factor: f64,
    previous: f64,
    n_acc: u64,
}

impl ExponentialSmoother {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            previous: 0.0,
            n_acc: 0,
        }
    }

    pub fn push(&mut self, sample: f64) -> f64 {
        let out = if self.n_acc > 10 {
            self.factor * sample + (1.0 - self.factor) * self.previous
        } else {
            sample
        };
        self.previous = out;
        self.n_acc += 1;
        out
    }
}

impl Filter for ExponentialSmoother {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.push(x)).collect()
    }

    fn reset(&mut self) {
        self.previous = 0.0;
        self.n_acc = 0;
    }
}

/// Savitzky-Golay smoother: a centered polynomial-fit moving filter over
/// a fixed window, applied causally here (the window looks only at
/// history available so far, padding with the first sample while the
/// buffer fills) since the engine is a real-time, one-chunk-at-a-time
/// pipeline and cannot look into the future.
#[derive(Debug, Clone)]
pub struct SgSmoother {
    coefficients: Vec<f64>,
    buffer: Vec<f64>,
}

impl SgSmoother {
    /// `window` must be odd; `order` is the fitted polynomial degree
    /// (order < window). Coefficients are the standard convolution
    /// weights for the centered point of a least-squares polynomial fit.
    pub fn new(window: usize, order: usize) -> Self {
        assert!(window % 2 == 1, "Savitzky-Golay window must be odd");
        assert!(order < window, "polynomial order must be smaller than the window");
        let coefficients = savitzky_golay_coefficients(window, order);
        Self {
            coefficients,
            buffer: Vec::with_capacity(window),
        }
    }

    pub fn push(&mut self, sample: f64) -> f64 {
        let window = self.coefficients.len();
        if self.buffer.is_empty() {
            self.buffer.resize(window, sample);
        }
        self.buffer.remove(0);
        self.buffer.push(sample);
        self.buffer
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, c)| x * c)
            .sum()
    }
}

impl Filter for SgSmoother {
    fn apply(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.push(x)).collect()
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Least-squares Savitzky-Golay convolution coefficients for the centered
/// sample of a `window`-wide, `order`-degree polynomial fit, via the
/// normal-equations solution of the Vandermonde design matrix.
fn savitzky_golay_coefficients(window: usize, order: usize) -> Vec<f64> {
    let half = (window / 2) as i64;
    // Design matrix A: rows are sample offsets -half..=half, columns are powers 0..=order
    let rows = window;
    let cols = order + 1;
    let mut a = vec![0.0; rows * cols];
    for (r, offset) in (-half..=half).enumerate() {
        let mut p = 1.0;
        for c in 0..cols {
            a[r * cols + c] = p;
            p *= offset as f64;
        }
    }
    // Normal equations: (A^T A) x = A^T e_center, solved via Gauss-Jordan.
    let mut ata = vec![0.0; cols * cols];
    for i in 0..cols {
        for j in 0..cols {
            let mut s = 0.0;
            for r in 0..rows {
                s += a[r * cols + i] * a[r * cols + j];
            }
            ata[i * cols + j] = s;
        }
    }
    let ata_inv = invert_matrix(&ata, cols);
    // coefficients for reproducing the value at the centered sample is
    // row 0 of (A^T A)^-1 A^T, i.e. dot the first row of the inverse with
    // each row of A.
    (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| ata_inv[c] * a[r * cols + c])
                .sum::<f64>()
        })
        .collect()
}

fn invert_matrix(m: &[f64], n: usize) -> Vec<f64> {
    let mut aug = vec![0.0; n * 2 * n];
    for i in 0..n {
        for j in 0..n {
            aug[i * 2 * n + j] = m[i * n + j];
        }
        aug[i * 2 * n + n + i] = 1.0;
    }
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| {
                aug[a * 2 * n + col]
                    .abs()
                    .partial_cmp(&aug[b * 2 * n + col].abs())
                    .unwrap()
            })
            .unwrap();
        aug.swap(col * 2 * n, pivot_row * 2 * n);
        for k in 0..2 * n {
            aug.swap(col * 2 * n + k, pivot_row * 2 * n + k);
        }
        let pivot = aug[col * 2 * n + col];
        for k in 0..2 * n {
            aug[col * 2 * n + k] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row * 2 * n + col];
            for k in 0..2 * n {
                aug[row * 2 * n + k] -= factor * aug[col * 2 * n + k];
            }
        }
    }
    (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| aug[i * 2 * n + n + j])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_smoother_passes_through_during_warmup() {
        let mut s = ExponentialSmoother::new(0.1);
        for _ in 0..10 {
            let out = s.push(5.0);
            assert_eq!(out, 5.0);
        }
    }

    #[test]
    fn exponential_smoother_blends_after_warmup() {
        let mut s = ExponentialSmoother::new(0.5);
        for _ in 0..11 {
            s.push(1.0);
        }
        let out = s.push(3.0);
        assert!((out - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sg_smoother_reproduces_constant_signal() {
        let mut s = SgSmoother::new(5, 2);
        let mut last = 0.0;
        for _ in 0..10 {
            last = s.push(7.0);
        }
        assert!((last - 7.0).abs() < 1e-6);
    }
}
