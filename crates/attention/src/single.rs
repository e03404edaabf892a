//! Single-head attention over projected query/key/value.

use candle_core::{DType, Device, Tensor, Var};
use layers::{Linear, LinearConfig, ParamInit};

use crate::core::{
    errors::{AttentionError, Result},
    scaled_dot_product,
};

/// Attention layer with bias-free `D -> D` projections for query, key and
/// value, scaling scores by `1/sqrt(D)`.
#[derive(Debug, Clone)]
pub struct AttentionLayer {
    embed_dim: usize,
    query_proj: Linear,
    key_proj: Linear,
    value_proj: Linear,
    dropout_p: f32,
}

impl AttentionLayer {
    /// Builds the layer with `N(0, 0.02)` projection weights.
    pub fn new(embed_dim: usize, dropout_p: f32, dtype: DType, device: &Device) -> Result<Self> {
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
        Ok(Self {
            embed_dim,
            query_proj: proj()?,
            key_proj: proj()?,
            value_proj: proj()?,
            dropout_p,
        })
    }

    /// Constructs the layer from pre-existing projections.
    pub fn from_parts(
        embed_dim: usize,
        query_proj: Linear,
        key_proj: Linear,
        value_proj: Linear,
        dropout_p: f32,
    ) -> Result<Self> {
        for (name, proj) in [
            ("query", &query_proj),
            ("key", &key_proj),
            ("value", &value_proj),
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
            query_proj,
            key_proj,
            value_proj,
            dropout_p,
        })
    }

    /// Returns the embedding dimension.
    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.query_proj.named_parameters(&format!("{scope}.query"));
        params.extend(self.key_proj.named_parameters(&format!("{scope}.key")));
        params.extend(self.value_proj.named_parameters(&format!("{scope}.value")));
        params
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

    /// Projects the inputs and runs scaled dot-product attention.
    ///
    /// `query` is `(N, S, D)`, `key` and `value` are `(N, T, D)`; the mask,
    /// when present, must broadcast against `(N, S, T)`. Output is `(N, S, D)`.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        self.validate(query, key, value)?;
        let q = self.query_proj.forward(query)?;
        let k = self.key_proj.forward(key)?;
        let v = self.value_proj.forward(value)?;
        scaled_dot_product(&q, &k, &v, mask, self.dropout_p, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::build_causal_mask;
    use candle_core::{DType, Device, Result as CandleResult, Tensor};

    #[test]
    fn output_preserves_query_shape() -> CandleResult<()> {
        let device = Device::Cpu;
        let layer = AttentionLayer::new(16, 0.0, DType::F32, &device).unwrap();
        let query = Tensor::randn(0f32, 1.0, (2, 3, 16), &device)?;
        let memory = Tensor::randn(0f32, 1.0, (2, 7, 16), &device)?;
        let out = layer
            .forward(&query, &memory, &memory, None, false)
            .unwrap();
        assert_eq!(out.dims(), &[2, 3, 16]);
        Ok(())
    }

    #[test]
    fn causal_mask_is_accepted() -> CandleResult<()> {
        let device = Device::Cpu;
        let layer = AttentionLayer::new(8, 0.0, DType::F32, &device).unwrap();
        let seq = Tensor::randn(0f32, 1.0, (1, 4, 8), &device)?;
        let mask = build_causal_mask(&device, 4)?;
        let out = layer.forward(&seq, &seq, &seq, Some(&mask), false).unwrap();
        assert_eq!(out.dims(), &[1, 4, 8]);
        Ok(())
    }

    #[test]
    fn key_value_mismatch_is_rejected() -> CandleResult<()> {
        let device = Device::Cpu;
        let layer = AttentionLayer::new(8, 0.0, DType::F32, &device).unwrap();
        let query = Tensor::randn(0f32, 1.0, (1, 4, 8), &device)?;
        let key = Tensor::randn(0f32, 1.0, (1, 5, 8), &device)?;
        let value = Tensor::randn(0f32, 1.0, (1, 4, 8), &device)?;
        let err = layer
            .forward(&query, &key, &value, None, false)
            .unwrap_err();
        assert!(matches!(err, AttentionError::ShapeMismatch { .. }));
        Ok(())
    }
}
