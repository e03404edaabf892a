//! Activation functions for feed-forward stacks.
//!
//! Activations consume tensors shaped `(batch, seq, hidden)` and return
//! tensors with identical layout, evaluated through Candle kernels.

use candle_core::{Result, Tensor};

/// Identifies the non-linearity applied between feed-forward projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    /// Identity function, useful for wiring custom stacks in tests.
    Identity,
    /// Rectified linear unit.
    Relu,
}

impl ActivationKind {
    /// Applies the activation to `input`.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match self {
            ActivationKind::Identity => Ok(input.clone()),
            ActivationKind::Relu => input.relu(),
        }
    }
}
