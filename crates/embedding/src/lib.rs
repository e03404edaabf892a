//! Embedding layers shared by the model assemblies.
//!
//! `token` hosts the vocabulary embedding table (with an optional padding
//! index), `positional` the learned absolute positional encoding, and
//! `patch` the image patch extraction and patch embedding used by the ViT
//! classifier.

pub mod patch;
pub mod positional;
pub mod token;

pub use patch::{patchify, PatchEmbedding, PatchEmbeddingConfig};
pub use positional::{PositionalEncoding, PositionalEncodingConfig};
pub use token::{TokenEmbedding, TokenEmbeddingConfig};
