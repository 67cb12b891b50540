//! Attention Masks
//!
//! A mask selects which (query, key) pairs may interact. `true` (or any
//! nonzero value when built from a tensor) means the pair is allowed; `false`
//! means forbidden, and the attention score for that pair is replaced with a
//! large negative sentinel before the softmax.
//!
//! ## Broadcasting
//!
//! A mask of rank 1 to 4 is right-aligned against the attention scores of
//! shape `[batch, heads, query_len, key_len]`. Each mask dimension must either
//! equal the target dimension or be 1, in which case it is repeated:
//!
//! ```text
//! [K]             same key mask for every batch, head and query
//! [Q, K]          same pattern for every batch and head (e.g. causal)
//! [N, 1, 1, K]    per-example key padding
//! [N, 1, Q, K]    per-example full pattern
//! ```
//!
//! ## Mask Policy
//!
//! The model never builds masks on its own. [`Mask::causal`] and
//! [`Mask::padding`] are conveniences for callers; which one (if any) the
//! decoder receives is entirely the caller's decision.

use crate::error::{Error, Result};
use crate::layers::embedding::batch_dims;
use crate::tensor::Tensor;

/// Boolean attention mask with a broadcastable shape
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    /// Row-major mask values (`true` = allowed)
    pub data: Vec<bool>,
    /// Mask dimensions, rank 1 to 4
    pub shape: Vec<usize>,
}

impl Mask {
    /// Create a mask from raw values
    ///
    /// Fails if the rank is not between 1 and 4 or the data length does not
    /// match the shape.
    pub fn new(data: Vec<bool>, shape: Vec<usize>) -> Result<Self> {
        let size: usize = shape.iter().product();
        if shape.is_empty() || shape.len() > 4 || size != data.len() {
            return Err(Error::ShapeMismatch {
                expected: shape,
                got: vec![data.len()],
            });
        }
        Ok(Self { data, shape })
    }

    /// Interpret a 0/1 tensor as a mask (nonzero = allowed)
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let data = tensor.data.iter().map(|&v| v != 0.0).collect();
        Self::new(data, tensor.shape.clone())
    }

    /// Lower-triangular `[len, len]` mask: query `i` may see keys `0..=i`
    ///
    /// ```text
    /// [1 0 0 0]
    /// [1 1 0 0]
    /// [1 1 1 0]
    /// [1 1 1 1]
    /// ```
    pub fn causal(len: usize) -> Self {
        let mut data = vec![false; len * len];
        for i in 0..len {
            for j in 0..=i {
                data[i * len + j] = true;
            }
        }
        Self {
            data,
            shape: vec![len, len],
        }
    }

    /// Key padding mask of shape `[N, 1, 1, K]`
    ///
    /// Positions holding `pad_id` are forbidden as keys.
    pub fn padding(ids: &[Vec<usize>], pad_id: usize) -> Result<Self> {
        let (batch, len) = batch_dims(ids)?;
        let data = ids
            .iter()
            .flat_map(|row| row.iter().map(|&id| id != pad_id))
            .collect();
        Self::new(data, vec![batch, 1, 1, len])
    }

    /// Resolve broadcasting against `[batch, heads, query_len, key_len]`
    pub(crate) fn broadcast_to(&self, target: [usize; 4]) -> Result<MaskView<'_>> {
        let rank = self.shape.len();
        let offset = 4 - rank;
        let mut strides = [0usize; 4];

        let mut stride = 1;
        for i in (0..rank).rev() {
            let dim = self.shape[i];
            let t = target[offset + i];
            if dim != t && dim != 1 {
                return Err(Error::MaskShape {
                    mask: self.shape.clone(),
                    target: target.to_vec(),
                });
            }
            strides[offset + i] = if dim == 1 { 0 } else { stride };
            stride *= dim;
        }

        Ok(MaskView {
            data: &self.data,
            strides,
        })
    }
}

/// A mask resolved against a concrete score shape
pub(crate) struct MaskView<'a> {
    data: &'a [bool],
    strides: [usize; 4],
}

impl MaskView<'_> {
    #[inline]
    pub(crate) fn allows(&self, b: usize, h: usize, q: usize, k: usize) -> bool {
        let idx = b * self.strides[0] + h * self.strides[1] + q * self.strides[2] + k * self.strides[3];
        self.data[idx]
    }
}
