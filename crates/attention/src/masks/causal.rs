//! Builders for causal and fully-permissive attention masks.
//!
//! Both builders return square multiplicative masks shaped `(len, len)` that
//! broadcast across the batch and head axes of the score tensor.

use candle_core::{Device, Result, Tensor};

/// Lower-triangular-inclusive causal mask: `mask[i][j] = 1` iff `j <= i`.
///
/// Position `i` may attend to every position up to and including itself,
/// which is the invariant that keeps autoregressive training from leaking
/// future timesteps.
pub fn build_causal_mask(device: &Device, len: usize) -> Result<Tensor> {
    let mut data = vec![0f32; len * len];
    for i in 0..len {
        for j in 0..=i {
            data[i * len + j] = 1.0;
        }
    }
    Tensor::from_vec(data, (len, len), device)
}

/// All-ones mask permitting attention between every pair of positions.
pub fn build_full_mask(device: &Device, len: usize) -> Result<Tensor> {
    Tensor::ones((len, len), super::MASK_DTYPE, device)
}
