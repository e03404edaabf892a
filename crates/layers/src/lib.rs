//! Building blocks shared by the transformer model crates.
//!
//! The crate hosts dense projections, layer normalisation, activations, the
//! position-wise feed-forward network, and the dropout helper used by every
//! sublayer. All components operate on `candle_core` tensors shaped
//! `(batch, seq, hidden)` (projections also accept `(rows, hidden)`), compute
//! in `f32`, and store their parameters as [`candle_core::Var`] so an external
//! optimizer can update them between forward calls.

pub mod activations;
pub mod checks;
pub mod dropout;
pub mod feed_forward;
pub mod init;
pub mod linear;
pub mod norm;

pub use activations::ActivationKind;
pub use dropout::Dropout;
pub use feed_forward::{FeedForward, FeedForwardConfig};
pub use init::ParamInit;
pub use linear::{Linear, LinearConfig};
pub use norm::LayerNorm;
