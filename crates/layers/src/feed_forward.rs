//! Position-wise feed-forward network.
//!
//! Two dense projections expand the hidden dimension to the intermediate
//! width, apply a rectified-linear activation and dropout, then contract back
//! to the model hidden size. Input and output share the
//! `(batch, seq, hidden)` layout.

use candle_core::{DType, Device, Result, Tensor, Var};

use crate::{
    activations::ActivationKind,
    dropout::Dropout,
    init::ParamInit,
    linear::{Linear, LinearConfig},
};

/// Configuration for the transformer feed-forward network.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardConfig {
    /// Model hidden size.
    pub hidden_size: usize,
    /// Width of the activation space.
    pub intermediate_size: usize,
    /// Dropout probability applied between the projections.
    pub dropout_p: f32,
}

impl FeedForwardConfig {
    pub fn new(hidden_size: usize, intermediate_size: usize, dropout_p: f32) -> Self {
        Self {
            hidden_size,
            intermediate_size,
            dropout_p,
        }
    }
}

/// Two-projection MLP with an intermediate ReLU and dropout.
#[derive(Debug, Clone)]
pub struct FeedForward {
    config: FeedForwardConfig,
    expand: Linear,
    contract: Linear,
    activation: ActivationKind,
    dropout: Dropout,
}

impl FeedForward {
    /// Builds the MLP with `N(0, 0.02)` weights and zero biases.
    pub fn new(config: FeedForwardConfig, dtype: DType, device: &Device) -> Result<Self> {
        let expand = Linear::with_init(
            LinearConfig::new(config.hidden_size, config.intermediate_size),
            ParamInit::projection(),
            dtype,
            device,
        )?;
        let contract = Linear::with_init(
            LinearConfig::new(config.intermediate_size, config.hidden_size),
            ParamInit::projection(),
            dtype,
            device,
        )?;
        let dropout = Dropout::new(config.dropout_p)?;
        Ok(Self {
            config,
            expand,
            contract,
            activation: ActivationKind::Relu,
            dropout,
        })
    }

    /// Constructs the MLP from pre-existing projections.
    pub fn from_parts(
        config: FeedForwardConfig,
        expand: Linear,
        contract: Linear,
    ) -> Result<Self> {
        let dropout = Dropout::new(config.dropout_p)?;
        Ok(Self {
            config,
            expand,
            contract,
            activation: ActivationKind::Relu,
            dropout,
        })
    }

    /// Returns the configuration metadata used during block assembly.
    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.expand.named_parameters(&format!("{scope}.expand"));
        params.extend(self.contract.named_parameters(&format!("{scope}.contract")));
        params
    }

    /// Applies expand -> activation -> dropout -> contract.
    pub fn forward(&self, hidden: &Tensor, train: bool) -> Result<Tensor> {
        let expanded = self.expand.forward(hidden)?;
        let activated = self.activation.forward(&expanded)?;
        let dropped = self.dropout.forward(&activated, train)?;
        self.contract.forward(&dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};

    #[test]
    fn forward_preserves_layout() -> Result<()> {
        let device = Device::Cpu;
        let ff = FeedForward::new(FeedForwardConfig::new(8, 32, 0.0), DType::F32, &device)?;
        let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &device)?;
        let output = ff.forward(&input, false)?;
        assert_eq!(output.dims(), &[2, 5, 8]);
        Ok(())
    }

    #[test]
    fn zero_projections_give_zero_output() -> Result<()> {
        let device = Device::Cpu;
        let config = FeedForwardConfig::new(4, 8, 0.0);
        let expand = Linear::from_parameters(
            LinearConfig::new(4, 8),
            Tensor::zeros((8, 4), DType::F32, &device)?,
            Some(Tensor::zeros(8, DType::F32, &device)?),
        )?;
        let contract = Linear::from_parameters(
            LinearConfig::new(8, 4),
            Tensor::zeros((4, 8), DType::F32, &device)?,
            Some(Tensor::zeros(4, DType::F32, &device)?),
        )?;
        let ff = FeedForward::from_parts(config, expand, contract)?;
        let input = Tensor::randn(0f32, 1.0, (1, 3, 4), &device)?;
        let output = ff.forward(&input, false)?;
        let max = output.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(max, 0.0);
        Ok(())
    }
}
