//! Configuration for the captioning decoder and the ViT classifier.

use candle_core::{DType, Device, Error, Result};

/// High-level configuration for assembling the captioning decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Width of the incoming image feature vectors.
    pub input_dim: usize,
    /// Embedding dimension of the transformer.
    pub embed_dim: usize,
    /// Number of attention heads; must divide `embed_dim`.
    pub num_heads: usize,
    /// Number of stacked decoder layers.
    pub num_layers: usize,
    /// Hidden width of the feed-forward sublayers.
    pub feed_forward_dim: usize,
    /// Dropout probability shared by every sublayer.
    pub dropout_p: f32,
    /// Maximum caption length the positional table can serve.
    pub max_length: usize,
    /// Storage dtype for all parameters.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

impl DecoderConfig {
    /// Creates a configuration with the stock geometry (4 heads, 2 layers,
    /// feed-forward width 2048, dropout 0.1, captions up to 50 tokens).
    pub fn new(input_dim: usize, embed_dim: usize) -> Self {
        Self {
            input_dim,
            embed_dim,
            num_heads: 4,
            num_layers: 2,
            feed_forward_dim: 2048,
            dropout_p: 0.1,
            max_length: 50,
            dtype: DType::F32,
            device: Device::Cpu,
        }
    }

    /// Validates structural invariants before any parameter is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::Msg("input_dim must be greater than zero".into()));
        }
        if self.embed_dim == 0 {
            return Err(Error::Msg("embed_dim must be greater than zero".into()));
        }
        if self.num_heads == 0 {
            return Err(Error::Msg("num_heads must be greater than zero".into()));
        }
        if self.embed_dim % self.num_heads != 0 {
            return Err(Error::Msg(format!(
                "embed_dim ({}) must be divisible by num_heads ({})",
                self.embed_dim, self.num_heads
            )));
        }
        if self.num_layers == 0 {
            return Err(Error::Msg("num_layers must be greater than zero".into()));
        }
        if self.feed_forward_dim == 0 {
            return Err(Error::Msg(
                "feed_forward_dim must be greater than zero".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_p) {
            return Err(Error::Msg("dropout_p must be in [0, 1)".into()));
        }
        if self.max_length == 0 {
            return Err(Error::Msg("max_length must be greater than zero".into()));
        }
        Ok(())
    }
}

/// High-level configuration for assembling the ViT classifier.
#[derive(Debug, Clone)]
pub struct VitConfig {
    /// Side length of each square image patch.
    pub patch_dim: usize,
    /// Width of the transformer stream.
    pub d_model: usize,
    /// Hidden width of the feed-forward sublayers.
    pub d_ff: usize,
    /// Number of attention heads; must divide `d_model`.
    pub num_heads: usize,
    /// Number of stacked encoder layers.
    pub num_layers: usize,
    /// Number of patches every input image must produce.
    pub num_patches: usize,
    /// Number of output classes.
    pub num_classes: usize,
    /// Dropout probability shared by every sublayer.
    pub dropout_p: f32,
    /// Storage dtype for all parameters.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

impl VitConfig {
    /// Validates structural invariants before any parameter is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.patch_dim == 0 {
            return Err(Error::Msg("patch_dim must be greater than zero".into()));
        }
        if self.d_model == 0 {
            return Err(Error::Msg("d_model must be greater than zero".into()));
        }
        if self.num_heads == 0 {
            return Err(Error::Msg("num_heads must be greater than zero".into()));
        }
        if self.d_model % self.num_heads != 0 {
            return Err(Error::Msg(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model, self.num_heads
            )));
        }
        if self.d_ff == 0 {
            return Err(Error::Msg("d_ff must be greater than zero".into()));
        }
        if self.num_layers == 0 {
            return Err(Error::Msg("num_layers must be greater than zero".into()));
        }
        if self.num_patches == 0 {
            return Err(Error::Msg("num_patches must be greater than zero".into()));
        }
        if self.num_classes == 0 {
            return Err(Error::Msg("num_classes must be greater than zero".into()));
        }
        if !(0.0..1.0).contains(&self.dropout_p) {
            return Err(Error::Msg("dropout_p must be in [0, 1)".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_decoder_config_is_valid() {
        assert!(DecoderConfig::new(128, 64).validate().is_ok());
    }

    #[test]
    fn indivisible_heads_are_rejected() {
        let mut config = DecoderConfig::new(128, 64);
        config.num_heads = 3;
        assert!(config.validate().is_err());

        let vit = VitConfig {
            patch_dim: 4,
            d_model: 10,
            d_ff: 32,
            num_heads: 4,
            num_layers: 1,
            num_patches: 16,
            num_classes: 10,
            dropout_p: 0.1,
            dtype: DType::F32,
            device: Device::Cpu,
        };
        assert!(vit.validate().is_err());
    }
}
