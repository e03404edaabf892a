//! Layer normalisation over the embedding axis.
//!
//! Inputs follow the `(batch, seq, hidden)` convention. Statistics are
//! computed along the last axis and the layout is preserved. The sublayer
//! blocks apply this after the residual addition (post-norm).

use candle_core::{Result, Tensor, Var, D};

use crate::{checks, init::ParamInit};

/// LayerNorm with learned scale and offset.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    hidden_size: usize,
    epsilon: f64,
    weight: Var,
    bias: Var,
}

impl LayerNorm {
    /// Builds a layer norm with scale one and offset zero.
    pub fn new(
        hidden_size: usize,
        dtype: candle_core::DType,
        device: &candle_core::Device,
    ) -> Result<Self> {
        Ok(Self {
            hidden_size,
            epsilon: 1e-5,
            weight: ParamInit::Ones.build(hidden_size, dtype, device)?,
            bias: ParamInit::Zeros.build(hidden_size, dtype, device)?,
        })
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![
            (format!("{scope}.weight"), self.weight.clone()),
            (format!("{scope}.bias"), self.bias.clone()),
        ]
    }

    /// Normalises `hidden` along the last axis.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("norm.input", hidden, self.hidden_size)?;

        let hidden_size = self.hidden_size as f64;
        let mean = (hidden.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = hidden.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.epsilon)?.sqrt()?;
        let normalized = centered.broadcast_div(&denom)?;

        normalized
            .broadcast_mul(self.weight.as_tensor())?
            .broadcast_add(self.bias.as_tensor())
    }
}
