//! Image patch extraction and patch embedding.
//!
//! [`patchify`] partitions an `(N, 3, H, W)` image batch into non-overlapping
//! square patches of side `patch_dim`, flattening each patch channel-major
//! (channel, then row, then column) and ordering patches row-major over the
//! grid. [`PatchEmbedding`] projects the flattened patches into the model
//! width.

use candle_core::{bail, DType, Device, Result, Tensor, Var};
use layers::{Linear, LinearConfig, ParamInit};

/// Number of image channels expected by the patch extractor.
pub const IMAGE_CHANNELS: usize = 3;

/// Splits images into flattened non-overlapping patches.
///
/// Input is `(N, 3, H, W)` with `H` and `W` exact multiples of `patch_dim`;
/// output is `(N, (H/p)*(W/p), patch_dim * patch_dim * 3)`.
pub fn patchify(images: &Tensor, patch_dim: usize) -> Result<Tensor> {
    if patch_dim == 0 {
        bail!("patch_dim must be greater than zero");
    }
    let (batch, channels, height, width) = images.dims4()?;
    if channels != IMAGE_CHANNELS {
        bail!("patchify expects {IMAGE_CHANNELS} channels, got {channels}");
    }
    if height % patch_dim != 0 || width % patch_dim != 0 {
        bail!(
            "image dims ({height}, {width}) are not multiples of patch_dim {patch_dim}"
        );
    }
    let grid_h = height / patch_dim;
    let grid_w = width / patch_dim;

    let blocked = images.reshape((batch, channels, grid_h, patch_dim, grid_w, patch_dim))?;
    let ordered = blocked.permute((0, 2, 4, 1, 3, 5))?.contiguous()?;
    ordered.reshape((
        batch,
        grid_h * grid_w,
        channels * patch_dim * patch_dim,
    ))
}

/// Configuration for the patch embedding layer.
#[derive(Debug, Clone)]
pub struct PatchEmbeddingConfig {
    /// Side length of each square patch.
    pub patch_dim: usize,
    /// Number of patches the model was constructed for.
    pub num_patches: usize,
    /// Model width each patch is projected into.
    pub hidden_dim: usize,
    /// Storage dtype for the parameters.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Linear projection from flattened patches into the model width.
#[derive(Debug, Clone)]
pub struct PatchEmbedding {
    config: PatchEmbeddingConfig,
    proj: Linear,
}

impl PatchEmbedding {
    /// Builds the projection with `N(0, 0.02)` weight and zero bias.
    pub fn new(config: PatchEmbeddingConfig) -> Result<Self> {
        if config.patch_dim == 0 || config.num_patches == 0 || config.hidden_dim == 0 {
            bail!("patch embedding dimensions must be non-zero");
        }
        let patch_len = config.patch_dim * config.patch_dim * IMAGE_CHANNELS;
        let proj = Linear::with_init(
            LinearConfig::new(patch_len, config.hidden_dim),
            ParamInit::projection(),
            config.dtype,
            &config.device,
        )?;
        Ok(Self { config, proj })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PatchEmbeddingConfig {
        &self.config
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        self.proj.named_parameters(&format!("{scope}.proj"))
    }

    /// Patchifies `images` and projects each patch.
    ///
    /// The computed grid size must match the configured `num_patches`;
    /// anything else is a construction/runtime mismatch and is rejected.
    pub fn forward(&self, images: &Tensor) -> Result<Tensor> {
        let patches = patchify(images, self.config.patch_dim)?;
        let found = patches.dims()[1];
        if found != self.config.num_patches {
            bail!(
                "image yields {found} patches but the model was built for {}",
                self.config.num_patches
            );
        }
        self.proj.forward(&patches)
    }
}
