use crate::error::SignalError;

/// Ordered stack of `n_channels` x `n_channels` rejection matrices
/// (ICA/artifact rejection transforms) applied before a derived signal's
/// spatial filter. `get_prod` composes them the same way
/// `update_spatial_filter` does upstream: walk the stack back to front,
/// left-multiplying each matrix into the running product, so the most
/// recently appended rejection is applied first to the raw data.
#[derive(Debug, Clone, Default)]
pub struct RejectionStack {
    n_channels: usize,
    matrices: Vec<Vec<f64>>,
}

impl RejectionStack {
    pub fn new(n_channels: usize) -> Self {
        Self {
            n_channels,
            matrices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn append(&mut self, matrix: Vec<f64>) -> Result<(), SignalError> {
        self.validate(&matrix)?;
        self.matrices.push(matrix);
        Ok(())
    }

    pub fn drop(&mut self, index: usize) -> Result<(), SignalError> {
        if index >= self.matrices.len() {
            return Err(SignalError::RejectionIndexOutOfBounds(index, self.matrices.len()));
        }
        self.matrices.remove(index);
        Ok(())
    }

    pub fn update_list(&mut self, matrices: Vec<Vec<f64>>, append: bool) -> Result<(), SignalError> {
        for m in &matrices {
            self.validate(m)?;
        }
        if append {
            self.matrices.extend(matrices);
        } else {
            self.matrices = matrices;
        }
        Ok(())
    }

    fn validate(&self, matrix: &[f64]) -> Result<(), SignalError> {
        if matrix.len() != self.n_channels * self.n_channels {
            return Err(SignalError::Types(nfb_types::NfbError::ShapeMismatch {
                expected: self.n_channels * self.n_channels,
                actual: matrix.len(),
            }));
        }
        Ok(())
    }

    /// `R_k * R_{k-1} * ... * R_0 * v`, applied right-to-left the same way
    /// `update_spatial_filter` folds `reversed(self.rejections)` into the
    /// running spatial matrix.
    pub fn apply(&self, vector: &[f64]) -> Vec<f64> {
        let mut current = vector.to_vec();
        for matrix in self.matrices.iter().rev() {
            current = matvec(matrix, &current, self.n_channels);
        }
        current
    }
}

fn matvec(matrix: &[f64], vector: &[f64], n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (0..n).map(|j| matrix[i * n + j] * vector[j]).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matrix_is_a_no_op() {
        let n = 3;
        let mut stack = RejectionStack::new(n);
        let mut identity = vec![0.0; n * n];
        for i in 0..n {
            identity[i * n + i] = 1.0;
        }
        stack.append(identity).unwrap();
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(stack.apply(&v), v);
    }

    #[test]
    fn drop_removes_the_right_entry() {
        let n = 2;
        let mut stack = RejectionStack::new(n);
        stack.append(vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        stack.append(vec![0.0, 0.0, 0.0, 0.0]).unwrap();
        stack.drop(1).unwrap();
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn rejects_wrong_shaped_matrix() {
        let mut stack = RejectionStack::new(2);
        assert!(stack.append(vec![1.0, 2.0, 3.0]).is_err());
    }
}
