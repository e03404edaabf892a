//! Transformer decoder for image captioning.
//!
//! The decoder embeds image features into a length-one conditioning sequence,
//! embeds caption tokens with positional encoding, routes them through a
//! causally-masked stack of decoder layers, and projects the result to
//! per-timestep vocabulary scores. Greedy sampling re-runs the full prefix at
//! every step.

use std::sync::atomic::{AtomicBool, Ordering};

use attention::masks::build_causal_mask;
use candle_core::{bail, DType, Error, Result, Tensor, Var, D};
use embedding::{
    PositionalEncoding, PositionalEncodingConfig, TokenEmbedding, TokenEmbeddingConfig,
};
use layers::{Linear, LinearConfig, ParamInit};

use crate::{block::DecoderLayer, config::DecoderConfig, vocab::Vocabulary};

/// Decoder-only captioning model conditioned on image features.
pub struct TransformerDecoder {
    config: DecoderConfig,
    vocab: Vocabulary,
    layers: Vec<DecoderLayer>,
    caption_embedding: TokenEmbedding,
    positional_encoding: PositionalEncoding,
    feature_embedding: Linear,
    score_projection: Linear,
    training: AtomicBool,
}

impl TransformerDecoder {
    /// Builds the decoder and its component layers.
    pub fn new(config: DecoderConfig, vocab: Vocabulary) -> Result<Self> {
        config.validate()?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for _ in 0..config.num_layers {
            layers.push(DecoderLayer::new(
                config.embed_dim,
                config.num_heads,
                config.feed_forward_dim,
                config.dropout_p,
                config.dtype,
                &config.device,
            )?);
        }

        let caption_embedding = TokenEmbedding::new(TokenEmbeddingConfig {
            vocab_size: vocab.len(),
            hidden_dim: config.embed_dim,
            padding_idx: Some(vocab.null()),
            dtype: config.dtype,
            device: config.device.clone(),
        })?;
        let positional_encoding = PositionalEncoding::new(PositionalEncodingConfig {
            max_len: config.max_length,
            hidden_dim: config.embed_dim,
            dropout_p: config.dropout_p,
            dtype: config.dtype,
            device: config.device.clone(),
        })?;
        let feature_embedding = Linear::with_init(
            LinearConfig::new(config.input_dim, config.embed_dim),
            ParamInit::projection(),
            config.dtype,
            &config.device,
        )?;
        let score_projection = Linear::with_init(
            LinearConfig::new(config.embed_dim, vocab.len()),
            ParamInit::projection(),
            config.dtype,
            &config.device,
        )?;

        log::info!(
            "captioner init vocab={} embed_dim={} heads={} layers={} ff={} max_length={}",
            vocab.len(),
            config.embed_dim,
            config.num_heads,
            config.num_layers,
            config.feed_forward_dim,
            config.max_length
        );

        Ok(Self {
            config,
            vocab,
            layers,
            caption_embedding,
            positional_encoding,
            feature_embedding,
            score_projection,
            training: AtomicBool::new(true),
        })
    }

    /// Returns the model configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Returns the owned vocabulary.
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Enables or disables dropout for subsequent forward calls.
    pub fn set_training(&self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    /// Returns every trainable parameter for the external optimizer.
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = Vec::new();
        for (index, layer) in self.layers.iter().enumerate() {
            params.extend(layer.named_parameters(&format!("layers.{index}")));
        }
        params.extend(self.caption_embedding.named_parameters("caption_embedding"));
        params.extend(
            self.positional_encoding
                .named_parameters("positional_encoding"),
        );
        params.extend(self.feature_embedding.named_parameters("feature_embedding"));
        params.extend(self.score_projection.named_parameters("score_projection"));
        params
    }

    /// Embeds image features and caption tokens.
    ///
    /// Returns the feature embedding `(N, 1, D)`, unsqueezed so it can serve
    /// as the cross-attention conditioning sequence, and the caption
    /// embedding `(N, T, D)` with positional encoding applied.
    pub fn embed(&self, features: &Tensor, captions: &Tensor) -> Result<(Tensor, Tensor)> {
        self.embed_inner(features, captions, self.training.load(Ordering::Relaxed))
    }

    fn embed_inner(
        &self,
        features: &Tensor,
        captions: &Tensor,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let (_, feature_dim) = features.dims2().map_err(|_| {
            Error::Msg(format!(
                "features must be shaped (batch, {}), got {:?}",
                self.config.input_dim,
                features.dims()
            ))
        })?;
        if feature_dim != self.config.input_dim {
            bail!(
                "features must be shaped (batch, {}), got {:?}",
                self.config.input_dim,
                features.dims()
            );
        }
        let feature_embedding = self.feature_embedding.forward(features)?.unsqueeze(1)?;
        let caption_embedding = self
            .positional_encoding
            .forward(&self.caption_embedding.forward(captions)?, train)?;
        Ok((feature_embedding, caption_embedding))
    }

    /// Lower-triangular-inclusive causal mask sized to `len`.
    pub fn causal_mask(&self, len: usize) -> Result<Tensor> {
        build_causal_mask(&self.config.device, len)
    }

    /// Scores every vocabulary entry at every timestep.
    ///
    /// `features` is `(N, input_dim)`, `captions` is `(N, T)`; the result is
    /// `(N, T, V)`. Future timesteps are masked out, so the score at position
    /// `t` depends only on caption tokens at positions `<= t`.
    pub fn forward(&self, features: &Tensor, captions: &Tensor) -> Result<Tensor> {
        self.forward_inner(features, captions, self.training.load(Ordering::Relaxed))
    }

    fn forward_inner(&self, features: &Tensor, captions: &Tensor, train: bool) -> Result<Tensor> {
        let (feature_embedding, caption_embedding) =
            self.embed_inner(features, captions, train)?;
        let mask = self.causal_mask(caption_embedding.dims()[1])?;

        let mut output = caption_embedding;
        for layer in &self.layers {
            output = layer.forward(&output, &feature_embedding, &mask, train)?;
        }
        self.score_projection.forward(&output)
    }

    /// Greedy autoregressive decoding.
    ///
    /// Starting from `<START>`, runs exactly `max_length` steps; each step
    /// recomputes the full prefix, takes the last timestep's scores and
    /// appends the argmax token. There is no end-of-sequence short-circuit.
    /// The full-prefix recomputation makes this O(max_length^2) forward work,
    /// which is acceptable at caption lengths.
    ///
    /// Returns the sampled ids shaped `(N, max_length)`; fails when the
    /// vocabulary lacks `<START>` or `max_length` exceeds the positional
    /// table capacity.
    pub fn sample(&self, features: &Tensor, max_length: usize) -> Result<Tensor> {
        let start = self
            .vocab
            .start()
            .ok_or_else(|| Error::Msg("vocabulary does not define <START>".into()))?;
        if max_length > self.config.max_length {
            bail!(
                "sample length {max_length} exceeds the configured maximum {}",
                self.config.max_length
            );
        }
        let (batch, _) = features.dims2()?;

        let mut buffer = vec![self.vocab.null(); batch * max_length];
        let mut partial = Tensor::full(start, (batch, 1), &self.config.device)?;

        for step in 0..max_length {
            let scores = self.forward_inner(features, &partial, false)?.detach();
            let steps = scores.dims()[1];
            let last = scores.narrow(1, steps - 1, 1)?.squeeze(1)?;
            let words = last.argmax(D::Minus1)?.to_dtype(DType::U32)?;

            for (example, id) in words.to_vec1::<u32>()?.iter().enumerate() {
                buffer[example * max_length + step] = *id;
            }
            partial = Tensor::cat(&[&partial, &words.unsqueeze(1)?], 1)?;
        }

        Tensor::from_vec(buffer, (batch, max_length), &self.config.device)
    }
}
