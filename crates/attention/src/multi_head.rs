//! Multi-head attention.
//!
//! The embedding dimension is split into `H` heads of width `d = D / H`
//! after projection; each head attends in its own subspace with scaling
//! `1/sqrt(d)`, and a final bias-free projection mixes information across
//! heads.

use candle_core::{DType, Device, Tensor, Var};
use layers::{Linear, LinearConfig, ParamInit};

use crate::core::{
    errors::{AttentionError, Result},
    scaled_dot_product,
};

/// Multi-head scaled dot-product attention with owned projections.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    embed_dim: usize,
    num_heads: usize,
    head_dim: usize,
    query_proj: Linear,
    key_proj: Linear,
    value_proj: Linear,
    out_proj: Linear,
    dropout_p: f32,
}

impl MultiHeadAttention {
    /// Builds the layer; `embed_dim` must be divisible by `num_heads`.
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        if num_heads == 0 || embed_dim % num_heads != 0 {
            return Err(AttentionError::HeadSplit {
                embed_dim,
                num_heads,
            });
        }
        if !(0.0..1.0).contains(&dropout_p) {
            return Err(AttentionError::InvalidDropout { p: dropout_p });
        }
        let proj = || {
            Linear::with_init(
                LinearConfig::without_bias(embed_dim, embed_dim),
                ParamInit::projection(),
                dtype,
                device,
            )
        };
        log::debug!(
            "multi-head attention init embed_dim={embed_dim} heads={num_heads} head_dim={}",
            embed_dim / num_heads
        );
        Ok(Self {
            embed_dim,
            num_heads,
            head_dim: embed_dim / num_heads,
            query_proj: proj()?,
            key_proj: proj()?,
            value_proj: proj()?,
            out_proj: proj()?,
            dropout_p,
        })
    }

    /// Constructs the layer from pre-existing projections.
    pub fn from_parts(
        embed_dim: usize,
        num_heads: usize,
        query_proj: Linear,
        key_proj: Linear,
        value_proj: Linear,
        out_proj: Linear,
        dropout_p: f32,
    ) -> Result<Self> {
        if num_heads == 0 || embed_dim % num_heads != 0 {
            return Err(AttentionError::HeadSplit {
                embed_dim,
                num_heads,
            });
        }
        for (name, proj) in [
            ("query", &query_proj),
            ("key", &key_proj),
            ("value", &value_proj),
            ("out", &out_proj),
        ] {
            let config = proj.config();
            if config.input_dim != embed_dim || config.output_dim != embed_dim {
                return Err(AttentionError::ShapeMismatch {
                    context: format!(
                        "{name} projection must map {embed_dim} -> {embed_dim}, got {} -> {}",
                        config.input_dim, config.output_dim
                    ),
                });
            }
        }
        if !(0.0..1.0).contains(&dropout_p) {
            return Err(AttentionError::InvalidDropout { p: dropout_p });
        }
        Ok(Self {
            embed_dim,
            num_heads,
            head_dim: embed_dim / num_heads,
            query_proj,
            key_proj,
            value_proj,
            out_proj,
            dropout_p,
        })
    }

    /// Returns the embedding dimension.
    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Returns the head count.
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.query_proj.named_parameters(&format!("{scope}.query"));
        params.extend(self.key_proj.named_parameters(&format!("{scope}.key")));
        params.extend(self.value_proj.named_parameters(&format!("{scope}.value")));
        params.extend(self.out_proj.named_parameters(&format!("{scope}.out")));
        params
    }

    fn split_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = tensor.dims3().map_err(AttentionError::Tensor)?;
        let split = tensor.reshape((batch, seq, self.num_heads, self.head_dim))?;
        Ok(split.permute((0, 2, 1, 3))?.contiguous()?)
    }

    fn merge_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, _, seq, _) = tensor.dims4().map_err(AttentionError::Tensor)?;
        let merged = tensor.permute((0, 2, 1, 3))?.contiguous()?;
        Ok(merged.reshape((batch, seq, self.embed_dim))?)
    }

    fn validate(&self, query: &Tensor, key: &Tensor, value: &Tensor) -> Result<()> {
        for (name, tensor) in [("query", query), ("key", key), ("value", value)] {
            match tensor.dims() {
                [_, _, embed] if *embed == self.embed_dim => {}
                dims => {
                    return Err(AttentionError::ShapeMismatch {
                        context: format!(
                            "{name} expected (batch, seq, {}), got {dims:?}",
                            self.embed_dim
                        ),
                    })
                }
            }
        }
        if key.dims() != value.dims() {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "key and value must share their shape, got {:?} vs {:?}",
                    key.dims(),
                    value.dims()
                ),
            });
        }
        if query.dims()[0] != key.dims()[0] {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "query and key batch dims differ: {} vs {}",
                    query.dims()[0],
                    key.dims()[0]
                ),
            });
        }
        Ok(())
    }

    /// Runs multi-head attention.
    ///
    /// `query` is `(N, S, D)`, `key`/`value` are `(N, T, D)`. Masks may be
    /// `(S, T)` or `(N, S, T)`; either form broadcasts unchanged across the
    /// head axis. Output is `(N, S, D)`.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        self.validate(query, key, value)?;

        let q = self.split_heads(&self.query_proj.forward(query)?)?;
        let k = self.split_heads(&self.key_proj.forward(key)?)?;
        let v = self.split_heads(&self.value_proj.forward(value)?)?;

        // Per-head scores are (N, H, S, T); a (N, S, T) mask needs an
        // explicit head axis to broadcast, a (S, T) mask aligns as-is.
        let mask = match mask {
            Some(mask) if mask.dims().len() == 3 => Some(mask.unsqueeze(1)?),
            Some(mask) => Some(mask.clone()),
            None => None,
        };

        let per_head = scaled_dot_product(&q, &k, &v, mask.as_ref(), self.dropout_p, train)?;
        let merged = self.merge_heads(&per_head)?;
        Ok(self.out_proj.forward(&merged)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::build_causal_mask;
    use crate::single::AttentionLayer;
    use candle_core::{DType, Device, Result as CandleResult, Tensor};

    fn identity_linear(dim: usize, device: &Device) -> CandleResult<Linear> {
        let mut data = vec![0f32; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        let weight = Tensor::from_vec(data, (dim, dim), device)?;
        Linear::from_parameters(LinearConfig::without_bias(dim, dim), weight, None)
    }

    fn random_linear(dim: usize, device: &Device) -> CandleResult<Linear> {
        let weight = Tensor::randn(0f32, 0.05, (dim, dim), device)?;
        Linear::from_parameters(LinearConfig::without_bias(dim, dim), weight, None)
    }

    #[test]
    fn output_shape_is_preserved() -> CandleResult<()> {
        let device = Device::Cpu;
        for heads in [1usize, 2, 4] {
            let mha = MultiHeadAttention::new(16, heads, 0.0, DType::F32, &device).unwrap();
            let seq = Tensor::randn(0f32, 1.0, (2, 5, 16), &device)?;
            let out = mha.forward(&seq, &seq, &seq, None, false).unwrap();
            assert_eq!(out.dims(), &[2, 5, 16]);
        }
        Ok(())
    }

    #[test]
    fn indivisible_head_split_is_rejected() {
        let device = Device::Cpu;
        let err = MultiHeadAttention::new(10, 3, 0.0, DType::F32, &device).unwrap_err();
        assert!(matches!(err, AttentionError::HeadSplit { .. }));
    }

    #[test]
    fn single_head_matches_attention_layer() -> CandleResult<()> {
        // With one head, an identity output projection and shared q/k/v
        // weights, the multi-head layer reduces to plain attention.
        let device = Device::Cpu;
        let dim = 8;
        let q_proj = random_linear(dim, &device)?;
        let k_proj = random_linear(dim, &device)?;
        let v_proj = random_linear(dim, &device)?;

        let single = AttentionLayer::from_parts(
            dim,
            q_proj.clone(),
            k_proj.clone(),
            v_proj.clone(),
            0.0,
        )
        .unwrap();
        let multi = MultiHeadAttention::from_parts(
            dim,
            1,
            q_proj,
            k_proj,
            v_proj,
            identity_linear(dim, &device)?,
            0.0,
        )
        .unwrap();

        let seq = Tensor::randn(0f32, 1.0, (2, 4, dim), &device)?;
        let mask = build_causal_mask(&device, 4)?;
        let a = single.forward(&seq, &seq, &seq, Some(&mask), false).unwrap();
        let b = multi.forward(&seq, &seq, &seq, Some(&mask), false).unwrap();
        let max = a.sub(&b)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(max < 1e-5, "max diff {max}");
        Ok(())
    }

    #[test]
    fn batched_mask_gains_a_head_axis() -> CandleResult<()> {
        let device = Device::Cpu;
        let mha = MultiHeadAttention::new(8, 2, 0.0, DType::F32, &device).unwrap();
        let seq = Tensor::randn(0f32, 1.0, (3, 4, 8), &device)?;
        let mask = build_causal_mask(&device, 4)?
            .unsqueeze(0)?
            .broadcast_as((3, 4, 4))?
            .contiguous()?;
        let out = mha.forward(&seq, &seq, &seq, Some(&mask), false).unwrap();
        assert_eq!(out.dims(), &[3, 4, 8]);
        Ok(())
    }
}
