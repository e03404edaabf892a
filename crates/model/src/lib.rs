//! Model assemblies built from the shared attention and layer crates.
//!
//! `captioner` hosts the transformer decoder for image captioning and its
//! greedy sampling loop; `classifier` hosts the ViT image classifier. Both
//! compose the sublayer blocks in `block` (post-norm residual wiring around
//! multi-head attention and feed-forward transforms).

pub mod block;
pub mod captioner;
pub mod classifier;
pub mod config;
pub mod vocab;

pub use block::{
    CrossAttentionBlock, DecoderLayer, EncoderLayer, FeedForwardBlock, SelfAttentionBlock,
};
pub use captioner::TransformerDecoder;
pub use classifier::Vit;
pub use config::{DecoderConfig, VitConfig};
pub use vocab::{Vocabulary, NULL_TOKEN, START_TOKEN};
