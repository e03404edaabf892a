//! Learned absolute positional encoding.
//!
//! A `(max_len, hidden)` table of learned vectors indexed by position.
//! The forward pass adds the first `S` rows to a `(batch, S, hidden)`
//! sequence embedding (broadcast over the batch) and applies dropout.
//! Sequences longer than `max_len` are out of contract and rejected.

use candle_core::{bail, DType, Device, Result, Tensor, Var};
use layers::{checks, Dropout, ParamInit};

/// Configuration for the learned positional table.
#[derive(Debug, Clone)]
pub struct PositionalEncodingConfig {
    /// Maximum sequence length the table can serve.
    pub max_len: usize,
    /// Dimensionality of each positional vector.
    pub hidden_dim: usize,
    /// Dropout probability applied after the addition.
    pub dropout_p: f32,
    /// Storage dtype for the parameters.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Learned position-dependent signal added to sequence embeddings.
#[derive(Debug, Clone)]
pub struct PositionalEncoding {
    config: PositionalEncodingConfig,
    table: Var,
    dropout: Dropout,
}

impl PositionalEncoding {
    /// Builds the table with `N(0, 0.02)` rows.
    pub fn new(config: PositionalEncodingConfig) -> Result<Self> {
        if config.max_len == 0 {
            bail!("positional encoding requires max_len > 0");
        }
        if config.hidden_dim == 0 {
            bail!("positional encoding requires hidden_dim > 0");
        }
        let table = ParamInit::projection().build(
            (config.max_len, config.hidden_dim),
            config.dtype,
            &config.device,
        )?;
        let dropout = Dropout::new(config.dropout_p)?;
        Ok(Self {
            config,
            table,
            dropout,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PositionalEncodingConfig {
        &self.config
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![(format!("{scope}.table"), self.table.clone())]
    }

    /// Adds positions `0..S` to `x` and applies dropout.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("positional.input", x, self.config.hidden_dim)?;
        let seq_len = x.dims()[1];
        if seq_len > self.config.max_len {
            bail!(
                "sequence length {seq_len} exceeds positional table capacity {}",
                self.config.max_len
            );
        }
        let rows = self.table.as_tensor().narrow(0, 0, seq_len)?;
        let encoded = x.broadcast_add(&rows)?;
        self.dropout.forward(&encoded, train)
    }
}
