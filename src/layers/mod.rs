//! Neural Network Layers
//!
//! The building blocks of the encoder and decoder.
//!
//! ## Layers
//!
//! - **activation**: ReLU
//! - **linear**: Fully connected layer (optional bias)
//! - **layer_norm**: Layer normalization
//! - **dropout**: Dropout regularization with a train/eval switch
//! - **embedding**: Token and position lookup tables
//! - **feed_forward**: Position-wise two-layer network
//! - **attention**: Multi-head scaled dot-product attention
//! - **block**: Complete transformer block
//!
//! ## Design Pattern
//!
//! Every layer follows the same shape:
//!
//! ```rust,ignore
//! pub struct Layer {
//!     // Parameters, public so an external optimizer can update them
//! }
//!
//! impl Layer {
//!     pub fn new(..., init: &mut ParamInit) -> Self { }
//!     pub fn forward(&self, x: &Tensor) -> Result<Tensor> { }
//!     pub fn num_parameters(&self) -> usize { }
//! }
//! ```
//!
//! Forward passes borrow the layer immutably; parameters only change between
//! calls.

pub mod activation;
pub mod attention;
pub mod block;
pub mod dropout;
pub mod embedding;
pub mod feed_forward;
pub mod layer_norm;
pub mod linear;

pub use activation::relu;
pub use attention::{MultiHeadAttention, MASK_SENTINEL};
pub use block::TransformerBlock;
pub use dropout::Dropout;
pub use embedding::{batch_dims, Embedding, TokenAndPosition};
pub use feed_forward::FeedForward;
pub use layer_norm::LayerNorm;
pub use linear::Linear;
