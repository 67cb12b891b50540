//! Activation Functions
//!
//! ## ReLU
//!
//! ```text
//! ReLU(x) = max(0, x)
//! ```
//!
//! Used between the two linear layers of the position-wise feed-forward
//! sub-layer.

use crate::tensor::Tensor;

/// ReLU activation, applied element-wise in parallel
pub fn relu(x: &Tensor) -> Tensor {
    x.map(|v| v.max(0.0))
}
