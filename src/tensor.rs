//! Tensor Operations
//!
//! A minimal dense tensor for the transformer's forward pass. Tensors store a
//! flat `Vec<f32>` in row-major order together with shape and stride
//! information.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[batch, seq, dim]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## Example
//!
//! ```rust
//! use seq2seq::Tensor;
//!
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let c = a.matmul(&b);
//! assert_eq!(c.shape, vec![2, 2]);
//! assert_eq!(c.data, vec![4.0, 5.0, 10.0, 11.0]);
//! ```
//!
//! ## Parallelism
//!
//! Matrix multiplication, element-wise operations and softmax run on Rayon's
//! thread pool. Every output element is written by exactly one task and no
//! reduction crosses task boundaries, so results do not depend on the number
//! of threads.
//!
//! Zero-sized dimensions are legal everywhere: an empty sequence produces an
//! empty tensor with a consistent shape.

use rayon::prelude::*;

/// A multi-dimensional array of `f32` values in row-major layout
///
/// For shape `[2, 3]`, data is stored as
/// `[r0c0, r0c1, r0c2, r1c0, r1c1, r1c2]` and strides are `[3, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use seq2seq::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.strides, vec![2, 1]);
    /// ```
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Compute strides from shape (row-major layout)
    ///
    /// For shape `[d0, d1, d2]`, strides are `[d1*d2, d2, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Read one element by multi-dimensional index
    ///
    /// # Panics
    ///
    /// Panics if the index rank or any coordinate is out of bounds
    pub fn get(&self, index: &[usize]) -> f32 {
        assert_eq!(
            index.len(),
            self.shape.len(),
            "Index rank {} doesn't match tensor rank {}",
            index.len(),
            self.shape.len()
        );
        let mut flat = 0;
        for ((&i, &dim), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            assert!(i < dim, "Index {:?} out of bounds for shape {:?}", index, self.shape);
            flat += i * stride;
        }
        self.data[flat]
    }

    /// Size of the last dimension (1 for a scalar)
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// SIMD-friendly inner loop: `result[j] += a_val * b[j]`
    #[inline(always)]
    fn matmul_inner_simd(a_val: f32, b: &[f32], result: &mut [f32]) {
        for (r, &b_val) in result.iter_mut().zip(b.iter()) {
            *r += a_val * b_val;
        }
    }

    /// 2D matrix multiplication
    ///
    /// For `A @ B` where `A` is `[m, k]` and `B` is `[k, n]`, the result is
    /// `[m, n]` with `C[i,j] = sum(A[i,l] * B[l,j])`.
    ///
    /// Small products run sequentially; larger ones use the parallel
    /// cache-blocked kernel.
    ///
    /// # Panics
    ///
    /// Panics if either operand is not 2D or the inner dimensions differ
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert!(
            self.shape.len() == 2 && other.shape.len() == 2,
            "Unsupported matmul shapes: {:?} @ {:?}",
            self.shape,
            other.shape
        );
        assert_eq!(
            self.shape[1], other.shape[0],
            "Matrix dimensions incompatible: [{}, {}] @ [{}, {}]",
            self.shape[0], self.shape[1], other.shape[0], other.shape[1]
        );

        let m = self.shape[0];
        let n = other.shape[1];
        let k = self.shape[1];

        if m * n * k >= 1_000 {
            return self.matmul_parallel_blocked(other, m, n, k);
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += self.data[i * k + l] * other.data[l * n + j];
                }
                result[i * n + j] = sum;
            }
        }

        Tensor::new(result, vec![m, n])
    }

    /// Parallel cache-blocked matrix multiplication
    ///
    /// Output rows are split into blocks of 8 and distributed across Rayon
    /// workers; within a block the column and inner dimensions are tiled so
    /// the innermost loop walks contiguous memory.
    fn matmul_parallel_blocked(&self, other: &Tensor, m: usize, n: usize, k: usize) -> Tensor {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for j_start in (0..n).step_by(BLOCK_SIZE) {
                    let j_end = (j_start + BLOCK_SIZE).min(n);

                    for k_start in (0..k).step_by(BLOCK_SIZE) {
                        let k_end = (k_start + BLOCK_SIZE).min(k);

                        for i in i_start..i_end {
                            let row_offset = (i - i_start) * n;
                            for k_idx in k_start..k_end {
                                let a_val = self.data[i * k + k_idx];
                                Self::matmul_inner_simd(
                                    a_val,
                                    &other.data[k_idx * n + j_start..k_idx * n + j_end],
                                    &mut result_block[row_offset + j_start..row_offset + j_end],
                                );
                            }
                        }
                    }
                }
            });

        Tensor::new(result, vec![m, n])
    }

    /// Softmax along the last axis
    ///
    /// Uses the numerically stable form
    ///
    /// ```text
    /// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    /// ```
    ///
    /// Rows are processed in parallel. A row whose entries are all equal
    /// (including a row filled entirely with a large negative sentinel) comes
    /// out uniform.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use seq2seq::Tensor;
    /// let t = Tensor::new(vec![1.0, 1.0, -1e20, -1e20], vec![2, 2]);
    /// let s = t.softmax_last();
    /// assert_eq!(s.data, vec![0.5, 0.5, 0.5, 0.5]);
    /// ```
    pub fn softmax_last(&self) -> Tensor {
        let cols = self.last_dim();
        if cols == 0 || self.data.is_empty() {
            return self.clone();
        }

        let result: Vec<f32> = self
            .data
            .par_chunks(cols)
            .flat_map_iter(|row| {
                let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                let exp_values: Vec<f32> = row.iter().map(|&x| (x - max).exp()).collect();
                let sum: f32 = exp_values.iter().sum();
                exp_values.into_iter().map(move |val| val / sum)
            })
            .collect();

        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise addition with broadcasting support
    ///
    /// Supported patterns:
    ///
    /// 1. **Exact match**: Same shape
    /// 2. **Broadcast last dim**: `[*, n] + [n]` (e.g., adding bias)
    ///
    /// # Panics
    ///
    /// Panics for any other combination of shapes
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if other.shape.len() == 1 && self.last_dim() == other.shape[0] {
            let last_dim = other.shape[0];
            let result: Vec<f32> = self
                .data
                .par_iter()
                .enumerate()
                .map(|(i, &x)| x + other.data[i % last_dim])
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        panic!(
            "Unsupported broadcast for add: {:?} + {:?}",
            self.shape, other.shape
        );
    }

    /// Multiply all elements by scalar
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x * scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Divide all elements by scalar
    pub fn div_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x / scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Apply a function to every element
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        let result = self.data.par_iter().map(|&x| f(x)).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Reshape tensor to new shape
    ///
    /// Total number of elements must remain the same. The data is not
    /// reordered, so this is a pure reinterpretation of the row-major buffer.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use seq2seq::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    /// let reshaped = tensor.reshape(&[3, 2]);
    /// assert_eq!(reshaped.shape, vec![3, 2]);
    /// ```
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        let new_size: usize = new_shape.iter().product();
        assert_eq!(
            self.data.len(),
            new_size,
            "Cannot reshape {:?} into {:?}: element count mismatch",
            self.shape,
            new_shape
        );
        Tensor::new(self.data.clone(), new_shape.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_row_major() {
        let t = Tensor::zeros(vec![2, 3, 4]);
        assert_eq!(t.strides, vec![12, 4, 1]);
    }

    #[test]
    fn test_get_uses_strides() {
        let t = Tensor::new((0..24).map(|x| x as f32).collect(), vec![2, 3, 4]);
        assert_eq!(t.get(&[1, 2, 3]), 23.0);
        assert_eq!(t.get(&[0, 1, 0]), 4.0);
    }

    #[test]
    fn test_matmul_parallel_matches_sequential() {
        // 16x16 @ 16x16 crosses the parallel threshold
        let n = 16;
        let a = Tensor::new((0..n * n).map(|x| (x % 7) as f32 - 3.0).collect(), vec![n, n]);
        let b = Tensor::new((0..n * n).map(|x| (x % 5) as f32 * 0.5).collect(), vec![n, n]);
        let c = a.matmul(&b);

        for i in 0..n {
            for j in 0..n {
                let expected: f32 = (0..n).map(|l| a.data[i * n + l] * b.data[l * n + j]).sum();
                assert!((c.data[i * n + j] - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_matmul_empty_rows() {
        let a = Tensor::zeros(vec![0, 4]);
        let b = Tensor::zeros(vec![4, 3]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![0, 3]);
        assert!(c.data.is_empty());
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, -1.0, 0.0, 5.0], vec![1, 2, 3]);
        let s = t.softmax_last();
        for row in s.data.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
        // Monotone in the input
        assert!(s.data[0] < s.data[1] && s.data[1] < s.data[2]);
    }

    #[test]
    fn test_softmax_empty_last_dim() {
        let t = Tensor::zeros(vec![2, 3, 0]);
        let s = t.softmax_last();
        assert_eq!(s.shape, vec![2, 3, 0]);
    }

    #[test]
    fn test_add_bias_broadcast() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let b = Tensor::new(vec![10.0, 20.0], vec![2]);
        assert_eq!(x.add(&b).data, vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    #[should_panic(expected = "Unsupported broadcast")]
    fn test_add_rejects_unknown_broadcast() {
        let x = Tensor::zeros(vec![2, 3]);
        let y = Tensor::zeros(vec![3, 2]);
        let _ = x.add(&y);
    }
}
