//! Model configuration
//!
//! Construction parameters are fixed for the lifetime of a model. They are
//! checked by [`TransformerConfig::validate`] before any parameter is
//! allocated, so an inconsistent configuration fails before a forward pass can
//! be attempted.
//!
//! ## Example
//!
//! ```rust
//! use seq2seq::TransformerConfig;
//!
//! let config = TransformerConfig::tiny(10, 10);
//! assert!(config.validate().is_ok());
//!
//! let json = config.to_json_string().unwrap();
//! let loaded = TransformerConfig::from_json_str(&json).unwrap();
//! assert_eq!(loaded.embed_size, 8);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoder-decoder hyperparameters
///
/// # Fields
///
/// - `src_vocab_size`: Number of source token ids
/// - `trg_vocab_size`: Number of target token ids (also the logits width)
/// - `embed_size`: Width of every hidden representation
/// - `num_layers`: Blocks in the encoder and, separately, in the decoder
/// - `heads`: Attention heads; must divide `embed_size`
/// - `forward_expansion`: Feed-forward hidden width is `forward_expansion * embed_size`
/// - `dropout_rate`: Dropout probability used in training mode
/// - `max_length`: Size of the position embedding tables
/// - `init_std`: Standard deviation of the normal weight initializer
/// - `seed`: Seed for parameter initialization and dropout streams
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    pub src_vocab_size: usize,
    pub trg_vocab_size: usize,
    pub embed_size: usize,
    pub num_layers: usize,
    pub heads: usize,
    pub forward_expansion: usize,
    pub dropout_rate: f32,
    pub max_length: usize,
    #[serde(default = "default_init_std")]
    pub init_std: f32,
    #[serde(default)]
    pub seed: u64,
}

fn default_init_std() -> f32 {
    0.02
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            src_vocab_size: 10,
            trg_vocab_size: 10,
            embed_size: 256,
            num_layers: 6,
            heads: 8,
            forward_expansion: 4,
            dropout_rate: 0.1,
            max_length: 100,
            init_std: default_init_std(),
            seed: 0,
        }
    }
}

impl TransformerConfig {
    /// A very small model for tests and demonstrations
    ///
    /// `embed_size = 8`, `heads = 2`, one layer per side, 2x feed-forward
    /// expansion and positions up to 10.
    pub fn tiny(src_vocab_size: usize, trg_vocab_size: usize) -> Self {
        Self {
            src_vocab_size,
            trg_vocab_size,
            embed_size: 8,
            num_layers: 1,
            heads: 2,
            forward_expansion: 2,
            dropout_rate: 0.1,
            max_length: 10,
            init_std: default_init_std(),
            seed: 0,
        }
    }

    /// Same configuration with a different seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check every construction-time constraint
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("src_vocab_size", self.src_vocab_size),
            ("trg_vocab_size", self.trg_vocab_size),
            ("embed_size", self.embed_size),
            ("heads", self.heads),
            ("forward_expansion", self.forward_expansion),
            ("max_length", self.max_length),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(Error::invalid_config(format!("{name} must be non-zero")));
            }
        }

        if self.embed_size % self.heads != 0 {
            return Err(Error::invalid_config(format!(
                "embed_size {} must be divisible by heads {}",
                self.embed_size, self.heads
            )));
        }

        if !(0.0..=1.0).contains(&self.dropout_rate) {
            return Err(Error::invalid_config(format!(
                "dropout_rate {} must be between 0.0 and 1.0",
                self.dropout_rate
            )));
        }

        if !self.init_std.is_finite() || self.init_std <= 0.0 {
            return Err(Error::invalid_config(format!(
                "init_std {} must be positive",
                self.init_std
            )));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
