//! Mask builders and the multiplicative-to-additive conversion.
//!
//! Masks produced here are multiplicative `f32` tensors: `1.0` where
//! attention is permitted and `0.0` where it is forbidden. The attention
//! kernel converts them to additive `0 / -inf` form immediately before the
//! softmax via [`to_additive`].

pub mod causal;

use candle_core::{DType, Tensor, D};

use crate::core::errors::{AttentionError, Result};

pub use causal::{build_causal_mask, build_full_mask};

/// Dtype shared by all multiplicative masks.
pub const MASK_DTYPE: DType = DType::F32;

/// Converts a multiplicative mask into its additive pre-softmax form.
///
/// Entries equal to zero become `-inf`, everything else becomes `0.0`, so
/// adding the result to the score tensor forces exactly zero probability on
/// forbidden positions. A row that forbids every key is rejected: the softmax
/// over a row of `-inf` would silently produce NaNs.
pub fn to_additive(mask: &Tensor) -> Result<Tensor> {
    if mask.dtype() != MASK_DTYPE {
        return Err(AttentionError::ShapeMismatch {
            context: format!("mask expects dtype {MASK_DTYPE:?}, got {:?}", mask.dtype()),
        });
    }
    if mask.dims().len() < 2 {
        return Err(AttentionError::ShapeMismatch {
            context: format!("mask must have rank >= 2, got {:?}", mask.dims()),
        });
    }

    let row_min = mask
        .sum(D::Minus1)?
        .flatten_all()?
        .min(0)?
        .to_scalar::<f32>()?;
    if row_min == 0.0 {
        return Err(AttentionError::FullyMaskedRow);
    }

    let forbidden = mask.eq(0f32)?;
    let neg_inf = Tensor::full(f32::NEG_INFINITY, mask.shape(), mask.device())?;
    let zeros = mask.zeros_like()?;
    Ok(forbidden.where_cond(&neg_inf, &zeros)?)
}

#[cfg(test)]
mod tests;
