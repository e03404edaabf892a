//! Scaled dot-product attention kernel.
//!
//! The kernel operates on already-projected tensors: `q` shaped
//! `(..., S, E)`, `k` and `v` shaped `(..., T, E)` with identical leading
//! batch dimensions. Scaling always uses the trailing dimension of `q`, so
//! the multi-head caller gets the per-head `1/sqrt(d)` factor simply by
//! passing head-split tensors.

pub mod errors;

use candle_core::Tensor;
use candle_nn::ops::softmax_last_dim;

pub use errors::{AttentionError, Result};

use crate::masks::to_additive;

/// Computes `softmax(q kᵀ / sqrt(E) + mask) v`.
///
/// `mask`, when present, is multiplicative (`1.0` attend / `0.0` forbid) and
/// must be broadcastable against the score tensor `(..., S, T)`. Dropout is
/// applied to the attention weights only when `train` is set.
pub fn scaled_dot_product(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    mask: Option<&Tensor>,
    dropout_p: f32,
    train: bool,
) -> Result<Tensor> {
    if k.dims() != v.dims() {
        return Err(AttentionError::ShapeMismatch {
            context: format!(
                "key and value must share their shape, got {:?} vs {:?}",
                k.dims(),
                v.dims()
            ),
        });
    }
    let rank = q.dims().len();
    if rank < 2 || k.dims().len() != rank {
        return Err(AttentionError::ShapeMismatch {
            context: format!(
                "query and key must share rank >= 2, got {:?} vs {:?}",
                q.dims(),
                k.dims()
            ),
        });
    }
    let embed = q.dims()[rank - 1];
    if k.dims()[rank - 1] != embed {
        return Err(AttentionError::ShapeMismatch {
            context: format!(
                "query and key trailing dims differ: {} vs {}",
                embed,
                k.dims()[rank - 1]
            ),
        });
    }
    if !(0.0..1.0).contains(&dropout_p) {
        return Err(AttentionError::InvalidDropout { p: dropout_p });
    }

    let scale = 1.0 / (embed as f64).sqrt();
    let scores = (q.contiguous()?.matmul(&k.contiguous()?.t()?)? * scale)?;

    let scores = match mask {
        Some(mask) => {
            let additive = to_additive(mask)?;
            scores.broadcast_add(&additive)?
        }
        None => scores,
    };

    let mut weights = softmax_last_dim(&scores.contiguous()?)?;
    if train && dropout_p > 0.0 {
        weights = candle_nn::ops::dropout(&weights, dropout_p)?;
    }
    Ok(weights.contiguous()?.matmul(&v.contiguous()?)?)
}
