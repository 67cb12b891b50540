//! Encoder-Decoder Transformer
//!
//! Composes the [`Encoder`] and [`Decoder`] into a sequence-to-sequence model.
//!
//! ## Architecture Overview
//!
//! ```text
//! src [N, S]                       trg [N, T]
//!     ↓                                ↓
//! Encoder (L self-attention blocks)    │
//!     ↓                                ↓
//! enc_out [N, S, E] ──(keys, values)→ Decoder (L cross-attention blocks)
//!                                      ↓
//!                                logits [N, T, trg_vocab_size]
//! ```
//!
//! The source is encoded once and the same encoder output is used as both
//! keys and values by every decoder layer. There is no state between calls
//! apart from the learned parameters.
//!
//! ## Example
//!
//! ```rust
//! use seq2seq::{Transformer, TransformerConfig};
//!
//! let config = TransformerConfig::tiny(10, 10).with_seed(42);
//! let mut model = Transformer::new(&config).unwrap();
//! model.set_training(false);
//!
//! let logits = model.forward(&[vec![1, 2, 3]], &[vec![1, 2, 3]], None, None).unwrap();
//! assert_eq!(logits.shape, vec![1, 3, 10]);
//! ```

use crate::config::TransformerConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Complete sequence-to-sequence transformer
///
/// Parameters are plain public fields of the components. Forward passes take
/// `&self`; an external optimizer mutates parameters between passes, never
/// during one.
pub struct Transformer {
    /// Model configuration
    pub config: TransformerConfig,
    pub encoder: Encoder,
    pub decoder: Decoder,
}

impl Transformer {
    /// Create a new model with seeded random initialization
    ///
    /// The configuration is validated before any parameter is allocated.
    /// Models built from equal configurations have identical parameters.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration violates a constraint, e.g.
    /// `embed_size` not divisible by `heads`.
    pub fn new(config: &TransformerConfig) -> Result<Self> {
        config.validate()?;

        let mut init = ParamInit::new(config.seed, config.init_std)?;
        let encoder = Encoder::new(config, &mut init)?;
        let decoder = Decoder::new(config, &mut init)?;

        let model = Self {
            config: config.clone(),
            encoder,
            decoder,
        };

        log::debug!(
            "built transformer: embed={} heads={} layers={} src_vocab={} trg_vocab={} params={}",
            config.embed_size,
            config.heads,
            config.num_layers,
            config.src_vocab_size,
            config.trg_vocab_size,
            model.count_parameters()
        );

        Ok(model)
    }

    /// Forward pass: (src, trg) → logits
    ///
    /// # Arguments
    ///
    /// * `src` - Source token ids [N][S]
    /// * `trg` - Target token ids [N][T]
    /// * `src_mask` - Optional encoder mask, broadcastable to [N, heads, S, S]
    /// * `trg_mask` - Optional decoder mask, broadcastable to [N, heads, T, S]
    ///
    /// # Returns
    ///
    /// Logits over the target vocabulary: [N, T, trg_vocab_size]
    ///
    /// # Errors
    ///
    /// Any shape or range error from the encoder or decoder, or
    /// `BatchMismatch` if `src` and `trg` have different batch sizes.
    pub fn forward(
        &self,
        src: &[Vec<usize>],
        trg: &[Vec<usize>],
        src_mask: Option<&Mask>,
        trg_mask: Option<&Mask>,
    ) -> Result<Tensor> {
        if src.len() != trg.len() {
            return Err(Error::BatchMismatch {
                expected: src.len(),
                got: trg.len(),
            });
        }

        let enc_out = self.encoder.forward(src, src_mask)?;
        self.decoder.forward(trg, &enc_out, trg_mask)
    }

    /// Run only the encoder: [N, S, embed_size]
    pub fn encode(&self, src: &[Vec<usize>], src_mask: Option<&Mask>) -> Result<Tensor> {
        self.encoder.forward(src, src_mask)
    }

    /// Attention maps of every encoder layer, each [N, heads, S, S]
    ///
    /// Intended for diagnostics such as heat-map plots; the values are never
    /// fed back into the model.
    pub fn encoder_attention(
        &self,
        src: &[Vec<usize>],
        src_mask: Option<&Mask>,
    ) -> Result<Vec<Tensor>> {
        self.encoder
            .forward_with_attention(src, src_mask)
            .map(|(_, maps)| maps)
    }

    /// Switch every dropout layer between training and eval mode
    pub fn set_training(&mut self, training: bool) {
        self.encoder.set_training(training);
        self.decoder.set_training(training);
    }

    pub fn is_training(&self) -> bool {
        self.encoder.dropout.training
    }

    /// Count total number of learnable parameters
    pub fn count_parameters(&self) -> usize {
        self.encoder.num_parameters() + self.decoder.num_parameters()
    }
}
