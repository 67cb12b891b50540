//! seq2seq: Encoder-Decoder Transformer
//!
//! A sequence-to-sequence transformer implemented from scratch in Rust:
//! multi-head scaled dot-product attention, post-norm transformer blocks, a
//! self-attention encoder and a cross-attention decoder that produces
//! vocabulary logits.
//!
//! # Modules
//!
//! - [`tensor`] - Dense row-major tensor with Rayon-parallel kernels
//! - [`layers`] - Linear, LayerNorm, Dropout, Embedding, FeedForward, Attention, Block
//! - [`mask`] - Broadcastable attention masks
//! - [`encoder`] / [`decoder`] / [`model`] - The encoder-decoder stack
//! - [`config`] - Construction parameters, validation and JSON loading
//! - [`error`] - Error taxonomy
//!
//! Loss computation, optimization, tokenization and decoding strategies are
//! left to the caller: the model consumes token ids and masks and returns
//! logits and attention maps.
//!
//! # Example
//!
//! ```rust
//! use seq2seq::{Mask, Transformer, TransformerConfig};
//!
//! let config = TransformerConfig::tiny(10, 10);
//! let mut model = Transformer::new(&config)?;
//! model.set_training(false);
//!
//! let src = vec![vec![1, 2, 3, 0]];
//! let trg = vec![vec![1, 2, 3]];
//! let src_mask = Mask::padding(&src, 0)?;
//!
//! let logits = model.forward(&src, &trg, Some(&src_mask), None)?;
//! assert_eq!(logits.shape, vec![1, 3, 10]);
//! # Ok::<(), seq2seq::Error>(())
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod layers;
pub mod mask;
pub mod model;
pub mod rng;
pub mod tensor;

// Re-export main types for convenience
pub use config::TransformerConfig;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use layers::{MultiHeadAttention, TransformerBlock};
pub use mask::Mask;
pub use model::Transformer;
pub use tensor::Tensor;
