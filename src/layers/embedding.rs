//! Embedding Layer
//!
//! A learnable lookup table mapping a discrete id to a dense vector. The same
//! layer serves token ids (table size = vocabulary) and position indices
//! (table size = `max_length`).
//!
//! ```text
//! Input:  [batch, seq_len]           (ids)
//! Output: [batch, seq_len, embed]    (rows of the table)
//! ```

use crate::error::{Error, Result};
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Validate a token batch and return `(batch, seq_len)`
///
/// Every row must have the same length. An empty batch has length 0.
pub fn batch_dims(ids: &[Vec<usize>]) -> Result<(usize, usize)> {
    let seq_len = ids.first().map_or(0, Vec::len);
    for (row, seq) in ids.iter().enumerate() {
        if seq.len() != seq_len {
            return Err(Error::RaggedBatch {
                row,
                expected: seq_len,
                got: seq.len(),
            });
        }
    }
    Ok((ids.len(), seq_len))
}

/// Embedding lookup table
pub struct Embedding {
    /// Embedding weight matrix: [num_embeddings, embed_size]
    pub weight: Tensor,
}

impl Embedding {
    pub fn new(num_embeddings: usize, embed_size: usize, init: &mut ParamInit) -> Self {
        Self {
            weight: Tensor::new(
                init.normal(num_embeddings * embed_size),
                vec![num_embeddings, embed_size],
            ),
        }
    }

    pub fn num_embeddings(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn embed_size(&self) -> usize {
        self.weight.shape[1]
    }

    /// Look up one row per id
    ///
    /// # Errors
    ///
    /// `RaggedBatch` for rows of different length and `TokenOutOfRange` for an
    /// id outside the table. Nothing is clamped or wrapped.
    pub fn forward(&self, ids: &[Vec<usize>]) -> Result<Tensor> {
        let (batch_size, seq_len) = batch_dims(ids)?;
        let vocab_size = self.num_embeddings();
        let embed_size = self.embed_size();

        let mut output = Vec::with_capacity(batch_size * seq_len * embed_size);
        for &id in ids.iter().flatten() {
            if id >= vocab_size {
                return Err(Error::TokenOutOfRange {
                    token: id,
                    vocab_size,
                });
            }
            let start = id * embed_size;
            output.extend_from_slice(&self.weight.data[start..start + embed_size]);
        }

        Ok(Tensor::new(output, vec![batch_size, seq_len, embed_size]))
    }

    /// Rows `0..len` of the table, shape `[len, embed_size]`
    ///
    /// # Errors
    ///
    /// `SequenceTooLong` if `len` exceeds the table size.
    pub fn positions(&self, len: usize) -> Result<Tensor> {
        let max_length = self.num_embeddings();
        if len > max_length {
            return Err(Error::SequenceTooLong { len, max_length });
        }
        let embed_size = self.embed_size();
        Ok(Tensor::new(
            self.weight.data[..len * embed_size].to_vec(),
            vec![len, embed_size],
        ))
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.numel()
    }
}

/// Content embedding plus learned position embedding
///
/// Both the encoder and the decoder embed their input this way, each with its
/// own pair of tables.
pub struct TokenAndPosition {
    pub word_embedding: Embedding,
    pub position_embedding: Embedding,
}

impl TokenAndPosition {
    pub fn new(vocab_size: usize, max_length: usize, embed_size: usize, init: &mut ParamInit) -> Self {
        Self {
            word_embedding: Embedding::new(vocab_size, embed_size, init),
            position_embedding: Embedding::new(max_length, embed_size, init),
        }
    }

    /// `word[ids] + position[0..seq_len]`, positions shared across the batch
    pub fn forward(&self, ids: &[Vec<usize>]) -> Result<Tensor> {
        let (batch_size, seq_len) = batch_dims(ids)?;
        let pos_emb = self.position_embedding.positions(seq_len)?;
        let mut x = self.word_embedding.forward(ids)?;

        let row = seq_len * self.word_embedding.embed_size();
        if row > 0 {
            for b in 0..batch_size {
                for (v, p) in x.data[b * row..(b + 1) * row].iter_mut().zip(&pos_emb.data) {
                    *v += p;
                }
            }
        }

        Ok(x)
    }

    pub fn num_parameters(&self) -> usize {
        self.word_embedding.num_parameters() + self.position_embedding.num_parameters()
    }
}
