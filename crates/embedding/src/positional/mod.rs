//! Positional encodings.

pub mod learned;

pub use learned::{PositionalEncoding, PositionalEncodingConfig};
