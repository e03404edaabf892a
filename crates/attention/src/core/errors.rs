//! Error types emitted by attention components.

use thiserror::Error;

/// Attention-specific error category.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// The supplied tensor shapes do not align with the documented contract.
    #[error("invalid tensor shape: {context}")]
    ShapeMismatch { context: String },

    /// The embedding dimension cannot be split evenly across heads.
    #[error("embedding dim {embed_dim} is not divisible by {num_heads} heads")]
    HeadSplit { embed_dim: usize, num_heads: usize },

    /// A mask row forbids attending to every key position.
    #[error("attention mask forbids every key for at least one query row")]
    FullyMaskedRow,

    /// Dropout probability outside `[0, 1)`.
    #[error("dropout probability must be in [0, 1), got {p}")]
    InvalidDropout { p: f32 },

    /// A tensor-backend failure propagated to the caller.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AttentionError>;
