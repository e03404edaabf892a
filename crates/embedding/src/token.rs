//! Token embedding table with an optional padding index.

use candle_core::{bail, DType, Device, Error, Result, Tensor, Var};
use layers::ParamInit;

/// Configuration for building a token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector.
    pub hidden_dim: usize,
    /// Index whose embedding row is pinned to zero (padding token).
    pub padding_idx: Option<u32>,
    /// Storage dtype for the parameters and outputs.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Learnable token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
}

impl TokenEmbedding {
    /// Builds the table with `N(0, 0.02)` rows, zeroing the padding row.
    pub fn new(config: TokenEmbeddingConfig) -> Result<Self> {
        if config.vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if config.hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }
        if let Some(pad) = config.padding_idx {
            if pad as usize >= config.vocab_size {
                bail!(
                    "padding index {pad} is outside the vocabulary of size {}",
                    config.vocab_size
                );
            }
        }

        let shape = (config.vocab_size, config.hidden_dim);
        let mut initial =
            ParamInit::projection()
                .build(shape, config.dtype, &config.device)?
                .as_tensor()
                .clone();
        if let Some(pad) = config.padding_idx {
            let zero_row = Tensor::zeros((1, config.hidden_dim), config.dtype, &config.device)?;
            initial = initial.slice_assign(&[pad as usize..pad as usize + 1, 0..config.hidden_dim], &zero_row)?;
        }
        let weight = Var::from_tensor(&initial)?;

        Ok(Self { config, weight })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Returns a clone of the underlying weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![(format!("{scope}.weight"), self.weight.clone())]
    }

    /// Looks up embeddings for the provided token ids.
    ///
    /// Inputs must be shaped `(batch, seq)` with an integer dtype; outputs
    /// follow the `(batch, seq, hidden)` layout.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        let dims = token_ids.dims().to_vec();
        if dims.len() != 2 {
            return Err(Error::Msg(format!(
                "token_ids must be shaped (batch, seq), got {dims:?}"
            )));
        }
        if !token_ids.dtype().is_int() {
            return Err(Error::Msg(format!(
                "token_ids expected integer dtype, got {:?}",
                token_ids.dtype()
            )));
        }

        let flat = token_ids.to_dtype(DType::I64)?.flatten_all()?;
        self.ensure_id_range(&flat)?;

        let gathered = self.weight.as_tensor().index_select(&flat, 0)?;
        let mut output_dims = dims;
        output_dims.push(self.config.hidden_dim);
        gathered.reshape(output_dims)
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        if flat_ids.elem_count() == 0 {
            return Ok(());
        }
        let min_id = flat_ids.min(0)?.to_scalar::<i64>()?;
        if min_id < 0 {
            bail!("encountered negative token id {min_id}");
        }
        let max_id = flat_ids.max(0)?.to_scalar::<i64>()?;
        if max_id >= self.config.vocab_size as i64 {
            bail!(
                "token id {max_id} exceeds vocab size {}",
                self.config.vocab_size
            );
        }
        Ok(())
    }
}
