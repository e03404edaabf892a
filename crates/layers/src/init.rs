//! Parameter initialisation policies.
//!
//! Every learnable tensor in the workspace is created through one of these
//! variants, dispatched by the declared parameter role at construction time:
//! projection and embedding weights draw from `N(0, 0.02)`, biases and norm
//! offsets start at zero, norm scales at one, and the ViT class token keeps
//! its uniform `[0, 1)` initialisation.

use candle_core::{DType, Device, Result, Shape, Tensor, Var};

/// Tagged initialisation rule applied to a parameter at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamInit {
    /// Gaussian initialisation with the given mean and standard deviation.
    Normal { mean: f64, std: f64 },
    /// Uniform initialisation over `[lo, hi)`.
    Uniform { lo: f64, hi: f64 },
    /// All zeros (biases, norm offsets).
    Zeros,
    /// All ones (norm scales).
    Ones,
}

impl ParamInit {
    /// The rule used for projection and embedding weights.
    pub fn projection() -> Self {
        ParamInit::Normal {
            mean: 0.0,
            std: 0.02,
        }
    }

    /// Samples a trainable parameter with the given shape.
    pub fn build<S: Into<Shape>>(
        &self,
        shape: S,
        dtype: DType,
        device: &Device,
    ) -> Result<Var> {
        let shape = shape.into();
        let sampled = match self {
            ParamInit::Normal { mean, std } => {
                Tensor::randn(*mean as f32, *std as f32, shape, device)?
            }
            ParamInit::Uniform { lo, hi } => {
                Tensor::rand(*lo as f32, *hi as f32, shape, device)?
            }
            ParamInit::Zeros => Tensor::zeros(shape, DType::F32, device)?,
            ParamInit::Ones => Tensor::ones(shape, DType::F32, device)?,
        };
        let sampled = if sampled.dtype() == dtype {
            sampled
        } else {
            sampled.to_dtype(dtype)?
        };
        Var::from_tensor(&sampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn projection_init_has_expected_spread() -> Result<()> {
        let var = ParamInit::projection().build((64, 64), DType::F32, &Device::Cpu)?;
        let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let std = (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>()
            / values.len() as f32)
            .sqrt();
        assert!(mean.abs() < 5e-3);
        assert!((std - 0.02).abs() < 0.005);
        Ok(())
    }

    #[test]
    fn constant_inits_are_exact() -> Result<()> {
        let zeros = ParamInit::Zeros.build(8, DType::F32, &Device::Cpu)?;
        let ones = ParamInit::Ones.build(8, DType::F32, &Device::Cpu)?;
        assert_eq!(zeros.as_tensor().to_vec1::<f32>()?, vec![0.0; 8]);
        assert_eq!(ones.as_tensor().to_vec1::<f32>()?, vec![1.0; 8]);
        Ok(())
    }
}
