//! Encoder
//!
//! Turns source token ids into contextualized representations.
//!
//! ```text
//! src ids [N, S]
//!     ↓
//! word_embedding[src] + position_embedding[0..S]  → dropout
//!     ↓
//! Block 1 (self-attention: value = key = query = state)
//!     ↓
//!    ...
//!     ↓
//! Block L
//!     ↓
//! enc_out [N, S, E]
//! ```
//!
//! Every layer receives the same optional source mask. The mask is checked
//! against `[N, heads, S, S]` before the first layer.

use crate::config::TransformerConfig;
use crate::error::Result;
use crate::layers::{Dropout, TokenAndPosition, TransformerBlock};
use crate::mask::Mask;
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Stack of self-attention blocks over embedded source tokens
pub struct Encoder {
    pub embedding: TokenAndPosition,
    pub layers: Vec<TransformerBlock>,
    pub dropout: Dropout,
    heads: usize,
}

impl Encoder {
    pub fn new(config: &TransformerConfig, init: &mut ParamInit) -> Result<Self> {
        let embedding = TokenAndPosition::new(
            config.src_vocab_size,
            config.max_length,
            config.embed_size,
            init,
        );
        let layers = (0..config.num_layers)
            .map(|_| {
                TransformerBlock::new(
                    config.embed_size,
                    config.heads,
                    config.dropout_rate,
                    config.forward_expansion,
                    init,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let dropout = Dropout::new(config.dropout_rate, init.fork());

        Ok(Self {
            embedding,
            layers,
            dropout,
            heads: config.heads,
        })
    }

    /// Encode a batch of source sequences
    ///
    /// # Errors
    ///
    /// `RaggedBatch`, `SequenceTooLong`, `TokenOutOfRange`, or `MaskShape`
    /// when the mask does not broadcast to `[N, heads, S, S]`.
    pub fn forward(&self, src: &[Vec<usize>], mask: Option<&Mask>) -> Result<Tensor> {
        let mut out = self.embed(src, mask)?;
        for layer in &self.layers {
            out = layer.forward(&out, &out, &out, mask)?;
        }
        Ok(out)
    }

    /// Encode and collect each layer's attention weights `[N, heads, S, S]`
    pub fn forward_with_attention(
        &self,
        src: &[Vec<usize>],
        mask: Option<&Mask>,
    ) -> Result<(Tensor, Vec<Tensor>)> {
        let mut out = self.embed(src, mask)?;
        let mut maps = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (next, weights) = layer.forward_with_attention(&out, &out, &out, mask)?;
            out = next;
            maps.push(weights);
        }
        Ok((out, maps))
    }

    fn embed(&self, src: &[Vec<usize>], mask: Option<&Mask>) -> Result<Tensor> {
        let x = self.embedding.forward(src)?;
        if let Some(mask) = mask {
            let (n, s) = (x.shape[0], x.shape[1]);
            mask.broadcast_to([n, self.heads, s, s])?;
        }
        log::trace!("encoder input embedded: {:?}", x.shape);
        Ok(self.dropout.forward(&x))
    }

    pub fn set_training(&mut self, training: bool) {
        self.dropout.training = training;
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.embedding.num_parameters()
            + self
                .layers
                .iter()
                .map(TransformerBlock::num_parameters)
                .sum::<usize>()
    }
}
