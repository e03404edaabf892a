//! Dense affine projections.
//!
//! Linear layers expect inputs shaped `(batch, seq, in_dim)` or
//! `(rows, in_dim)` and return the same layout with the trailing dimension
//! replaced by `out_dim`. Weights are stored `(out_dim, in_dim)` and
//! transposed at matmul time.

use candle_core::{Error, Result, Tensor, Var};

use crate::{checks, init::ParamInit};

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Whether a learnable bias vector should be applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration with a bias term.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
        }
    }

    /// Creates a bias-free configuration (attention projections).
    pub fn without_bias(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: false,
        }
    }
}

/// Dense affine projection with optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Var,
    bias: Option<Var>,
}

impl Linear {
    /// Builds a linear layer, sampling the weight from `init` and zeroing the bias.
    pub fn with_init(
        config: LinearConfig,
        init: ParamInit,
        dtype: candle_core::DType,
        device: &candle_core::Device,
    ) -> Result<Self> {
        let weight = init.build((config.output_dim, config.input_dim), dtype, device)?;
        let bias = if config.bias {
            Some(ParamInit::Zeros.build(config.output_dim, dtype, device)?)
        } else {
            None
        };
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Constructs a linear layer from pre-existing parameter tensors.
    pub fn from_parameters(
        config: LinearConfig,
        weight: Tensor,
        bias: Option<Tensor>,
    ) -> Result<Self> {
        checks::expect_shape(
            "linear.weight",
            &weight,
            &[config.output_dim, config.input_dim],
        )?;
        match (config.bias, &bias) {
            (true, Some(b)) => checks::expect_shape("linear.bias", b, &[config.output_dim])?,
            (false, None) => {}
            (true, None) => return Err(Error::Msg("config expects a bias but none supplied".into())),
            (false, Some(_)) => {
                return Err(Error::Msg("bias provided but config disables bias".into()))
            }
        }
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
            bias: bias.map(|b| Var::from_tensor(&b)).transpose()?,
        })
    }

    /// Returns the static configuration used to validate inputs.
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Returns a clone of the underlying weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = vec![(format!("{scope}.weight"), self.weight.clone())];
        if let Some(bias) = &self.bias {
            params.push((format!("{scope}.bias"), bias.clone()));
        }
        params
    }

    /// Applies the projection to a rank-2 or rank-3 input.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let weight_t = self.weight.as_tensor().t()?;
        let mut output = match *input.dims() {
            [batch, seq, in_dim] => {
                if in_dim != self.config.input_dim {
                    return Err(Error::Msg(format!(
                        "linear.input: expected last dim {}, got {in_dim}",
                        self.config.input_dim
                    )));
                }
                let flat = input.reshape((batch * seq, in_dim))?;
                flat.matmul(&weight_t)?
                    .reshape((batch, seq, self.config.output_dim))?
            }
            [_, in_dim] => {
                if in_dim != self.config.input_dim {
                    return Err(Error::Msg(format!(
                        "linear.input: expected last dim {}, got {in_dim}",
                        self.config.input_dim
                    )));
                }
                input.matmul(&weight_t)?
            }
            _ => {
                return Err(Error::Msg(format!(
                    "linear.input: expected rank 2 or 3, got shape {:?}",
                    input.dims()
                )))
            }
        };
        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias.as_tensor())?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};

    fn reference(input: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<Tensor> {
        let mut out = input.broadcast_matmul(&weight.t()?)?;
        if let Some(bias) = bias {
            out = out.broadcast_add(bias)?;
        }
        Ok(out)
    }

    #[test]
    fn forward_matches_reference() -> Result<()> {
        let device = Device::Cpu;
        let weight = Tensor::randn(0f32, 0.05, (4, 8), &device)?;
        let bias = Tensor::randn(0f32, 0.02, 4, &device)?;
        let linear = Linear::from_parameters(
            LinearConfig::new(8, 4),
            weight.clone(),
            Some(bias.clone()),
        )?;

        let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &device)?;
        let output = linear.forward(&input)?;
        assert_eq!(output.dims(), &[2, 5, 4]);

        let expected = reference(&input, &weight, Some(&bias))?;
        let max = output.sub(&expected)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(max < 1e-5);
        Ok(())
    }

    #[test]
    fn rank_two_inputs_are_supported() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::with_init(
            LinearConfig::new(8, 16),
            ParamInit::projection(),
            DType::F32,
            &device,
        )?;
        let input = Tensor::randn(0f32, 1.0, (3, 8), &device)?;
        assert_eq!(linear.forward(&input)?.dims(), &[3, 16]);
        Ok(())
    }

    #[test]
    fn mismatched_input_dim_is_rejected() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::with_init(
            LinearConfig::without_bias(8, 8),
            ParamInit::projection(),
            DType::F32,
            &device,
        )?;
        let input = Tensor::randn(0f32, 1.0, (2, 5, 6), &device)?;
        assert!(linear.forward(&input).is_err());
        Ok(())
    }
}
