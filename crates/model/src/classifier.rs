//! Vision transformer for image classification.
//!
//! Images are split into flattened patches, embedded, prefixed with a learned
//! classification token, positionally encoded and routed through a stack of
//! encoder layers under a fully permissive mask. The classification token's
//! final representation is projected to class logits.

use std::sync::atomic::{AtomicBool, Ordering};

use attention::masks::build_full_mask;
use candle_core::{Result, Tensor, Var};
use embedding::{
    PatchEmbedding, PatchEmbeddingConfig, PositionalEncoding, PositionalEncodingConfig,
};
use layers::{Linear, LinearConfig, ParamInit};

use crate::{block::EncoderLayer, config::VitConfig};

/// ViT classifier over non-overlapping square image patches.
pub struct Vit {
    config: VitConfig,
    patch_embedding: PatchEmbedding,
    cls_token: Var,
    positional_encoding: PositionalEncoding,
    layers: Vec<EncoderLayer>,
    head: Linear,
    training: AtomicBool,
}

impl Vit {
    /// Builds the classifier and its encoder stack.
    pub fn new(config: VitConfig) -> Result<Self> {
        config.validate()?;

        let patch_embedding = PatchEmbedding::new(PatchEmbeddingConfig {
            patch_dim: config.patch_dim,
            num_patches: config.num_patches,
            hidden_dim: config.d_model,
            dtype: config.dtype,
            device: config.device.clone(),
        })?;
        // The class token keeps its uniform [0, 1) initialisation; the
        // N(0, 0.02) rule applies to projections and embeddings only.
        let cls_token = ParamInit::Uniform { lo: 0.0, hi: 1.0 }.build(
            (1, 1, config.d_model),
            config.dtype,
            &config.device,
        )?;
        let positional_encoding = PositionalEncoding::new(PositionalEncodingConfig {
            max_len: config.num_patches + 1,
            hidden_dim: config.d_model,
            dropout_p: config.dropout_p,
            dtype: config.dtype,
            device: config.device.clone(),
        })?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for _ in 0..config.num_layers {
            layers.push(EncoderLayer::new(
                config.d_model,
                config.num_heads,
                config.d_ff,
                config.dropout_p,
                config.dtype,
                &config.device,
            )?);
        }

        let head = Linear::with_init(
            LinearConfig::new(config.d_model, config.num_classes),
            ParamInit::projection(),
            config.dtype,
            &config.device,
        )?;

        log::info!(
            "vit init patches={} patch_dim={} d_model={} heads={} layers={} classes={}",
            config.num_patches,
            config.patch_dim,
            config.d_model,
            config.num_heads,
            config.num_layers,
            config.num_classes
        );

        Ok(Self {
            config,
            patch_embedding,
            cls_token,
            positional_encoding,
            layers,
            head,
            training: AtomicBool::new(true),
        })
    }

    /// Returns the model configuration.
    pub fn config(&self) -> &VitConfig {
        &self.config
    }

    /// Enables or disables dropout for subsequent forward calls.
    pub fn set_training(&self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    /// Returns every trainable parameter for the external optimizer.
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = self.patch_embedding.named_parameters("patch_embedding");
        params.push(("cls_token".to_string(), self.cls_token.clone()));
        params.extend(
            self.positional_encoding
                .named_parameters("positional_encoding"),
        );
        for (index, layer) in self.layers.iter().enumerate() {
            params.extend(layer.named_parameters(&format!("layers.{index}")));
        }
        params.extend(self.head.named_parameters("head"));
        params
    }

    /// Computes class logits for a batch of images.
    ///
    /// `images` is `(N, 3, H, W)` with `H` and `W` exact multiples of the
    /// patch side; the result is `(N, num_classes)`.
    pub fn forward(&self, images: &Tensor) -> Result<Tensor> {
        let train = self.training.load(Ordering::Relaxed);

        let patches = self.patch_embedding.forward(images)?;
        let batch = patches.dims()[0];

        let cls = self
            .cls_token
            .as_tensor()
            .broadcast_as((batch, 1, self.config.d_model))?
            .contiguous()?;
        let seq = Tensor::cat(&[&cls, &patches], 1)?;
        let mut output = self.positional_encoding.forward(&seq, train)?;

        let mask = build_full_mask(&self.config.device, self.config.num_patches + 1)?;
        for layer in &self.layers {
            output = layer.forward(&output, &mask, train)?;
        }

        let cls_out = output.narrow(1, 0, 1)?.squeeze(1)?;
        self.head.forward(&cls_out)
    }
}
