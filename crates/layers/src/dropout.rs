//! Dropout applied to sublayer branches and attention weights.
//!
//! Dropout is a train-only concern: when `train` is false or the probability
//! is zero the input passes through unchanged, keeping evaluation
//! deterministic.

use candle_core::{Error, Result, Tensor};

/// Dropout helper with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    /// Creates a dropout helper; the probability must lie in `[0, 1)`.
    pub fn new(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Self { p })
    }

    /// Returns the configured probability.
    pub fn p(&self) -> f32 {
        self.p
    }

    /// Applies dropout during training, identity otherwise.
    pub fn forward(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        if train && self.p > 0.0 {
            candle_nn::ops::dropout(input, self.p)
        } else {
            Ok(input.clone())
        }
    }
}
