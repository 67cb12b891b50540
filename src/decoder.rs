//! Decoder
//!
//! Embeds target tokens, attends over the encoder output, and projects to
//! vocabulary logits.
//!
//! ```text
//! trg ids [N, T]                       enc_out [N, S, E]
//!     ↓                                      │
//! word_embedding[trg] + position[0..T]       │
//!     ↓ dropout                              │
//! Block 1 (value = key = enc_out, query = state) ←┤
//!     ↓                                      │
//!    ...                                     │
//! Block L ←──────────────────────────────────┘
//!     ↓
//! fc_out → logits [N, T, trg_vocab_size]   (no softmax)
//! ```
//!
//! The same `trg_mask` is handed to every layer unchanged. The decoder does
//! not distinguish causal from padding masks; whatever pattern the caller
//! supplies is what every layer applies. Since keys come from the encoder,
//! the mask must broadcast to `[N, heads, T, S]`. That is checked before the
//! first layer runs.

use crate::config::TransformerConfig;
use crate::error::{Error, Result};
use crate::layers::{Dropout, Linear, TokenAndPosition, TransformerBlock};
use crate::mask::Mask;
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Stack of cross-attention blocks with a vocabulary projection
pub struct Decoder {
    pub embedding: TokenAndPosition,
    pub layers: Vec<TransformerBlock>,
    /// Projection to vocabulary logits: [embed_size, trg_vocab_size]
    pub fc_out: Linear,
    pub dropout: Dropout,
    heads: usize,
}

impl Decoder {
    pub fn new(config: &TransformerConfig, init: &mut ParamInit) -> Result<Self> {
        let embedding = TokenAndPosition::new(
            config.trg_vocab_size,
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
        let fc_out = Linear::new(config.embed_size, config.trg_vocab_size, true, init);
        let dropout = Dropout::new(config.dropout_rate, init.fork());

        Ok(Self {
            embedding,
            layers,
            fc_out,
            dropout,
            heads: config.heads,
        })
    }

    /// Decode target ids against the encoder output
    ///
    /// # Arguments
    ///
    /// * `trg` - Target token ids [N][T]
    /// * `enc_out` - Encoder output [N, S, E], used as both keys and values
    /// * `trg_mask` - Optional mask broadcastable to [N, heads, T, S]
    ///
    /// # Returns
    ///
    /// Unnormalized logits [N, T, trg_vocab_size]
    pub fn forward(
        &self,
        trg: &[Vec<usize>],
        enc_out: &Tensor,
        trg_mask: Option<&Mask>,
    ) -> Result<Tensor> {
        if enc_out.shape.len() != 3 {
            return Err(Error::ShapeMismatch {
                expected: vec![trg.len(), 0, self.fc_out.in_features()],
                got: enc_out.shape.clone(),
            });
        }
        if enc_out.shape[0] != trg.len() {
            return Err(Error::BatchMismatch {
                expected: enc_out.shape[0],
                got: trg.len(),
            });
        }

        let x = self.embedding.forward(trg)?;
        if let Some(mask) = trg_mask {
            mask.broadcast_to([x.shape[0], self.heads, x.shape[1], enc_out.shape[1]])?;
        }
        let mut x = self.dropout.forward(&x);
        for layer in &self.layers {
            x = layer.forward(enc_out, enc_out, &x, trg_mask)?;
        }

        let logits = self.fc_out.forward(&x)?;
        log::trace!("decoder logits: {:?}", logits.shape);
        Ok(logits)
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
            + self.fc_out.num_parameters()
    }
}
