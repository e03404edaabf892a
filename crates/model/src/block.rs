//! Sublayer blocks and the decoder/encoder layer composition.
//!
//! Every block follows the post-norm residual pattern
//! `LayerNorm(dropout(transform(x)) + x)`, with input and output both shaped
//! `(batch, seq, hidden)`.

use attention::MultiHeadAttention;
use candle_core::{DType, Device, Error, Result, Tensor, Var};
use layers::{Dropout, FeedForward, FeedForwardConfig, LayerNorm};

fn attention_err(e: attention::AttentionError) -> Error {
    Error::Msg(e.to_string())
}

/// Self-attention sublayer: multi-head attention with query = key = value.
#[derive(Debug, Clone)]
pub struct SelfAttentionBlock {
    attn: MultiHeadAttention,
    dropout: Dropout,
    norm: LayerNorm,
}

impl SelfAttentionBlock {
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let attn = MultiHeadAttention::new(embed_dim, num_heads, dropout_p, dtype, device)
            .map_err(attention_err)?;
        Ok(Self {
            attn,
            dropout: Dropout::new(dropout_p)?,
            norm: LayerNorm::new(embed_dim, dtype, device)?,
        })
    }

    /// Wraps an existing attention transform with the residual wiring.
    pub fn from_parts(attn: MultiHeadAttention, dropout_p: f32, norm: LayerNorm) -> Result<Self> {
        Ok(Self {
            attn,
            dropout: Dropout::new(dropout_p)?,
            norm,
        })
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.attn.named_parameters(&format!("{scope}.attn"));
        params.extend(self.norm.named_parameters(&format!("{scope}.norm")));
        params
    }

    /// Attends the sequence to itself under `mask`.
    pub fn forward(&self, seq: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let out = self
            .attn
            .forward(seq, seq, seq, Some(mask), train)
            .map_err(attention_err)?;
        let out = self.dropout.forward(&out, train)?;
        self.norm.forward(&out.add(seq)?)
    }
}

/// Cross-attention sublayer: query from the sequence, key/value from the
/// conditioning sequence. No mask.
#[derive(Debug, Clone)]
pub struct CrossAttentionBlock {
    attn: MultiHeadAttention,
    dropout: Dropout,
    norm: LayerNorm,
}

impl CrossAttentionBlock {
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let attn = MultiHeadAttention::new(embed_dim, num_heads, dropout_p, dtype, device)
            .map_err(attention_err)?;
        Ok(Self {
            attn,
            dropout: Dropout::new(dropout_p)?,
            norm: LayerNorm::new(embed_dim, dtype, device)?,
        })
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.attn.named_parameters(&format!("{scope}.attn"));
        params.extend(self.norm.named_parameters(&format!("{scope}.norm")));
        params
    }

    /// Attends the sequence to the conditioning memory.
    pub fn forward(&self, seq: &Tensor, cond: &Tensor, train: bool) -> Result<Tensor> {
        let out = self
            .attn
            .forward(seq, cond, cond, None, train)
            .map_err(attention_err)?;
        let out = self.dropout.forward(&out, train)?;
        self.norm.forward(&out.add(seq)?)
    }
}

/// Feed-forward sublayer.
#[derive(Debug, Clone)]
pub struct FeedForwardBlock {
    mlp: FeedForward,
    dropout: Dropout,
    norm: LayerNorm,
}

impl FeedForwardBlock {
    pub fn new(
        embed_dim: usize,
        feed_forward_dim: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let mlp = FeedForward::new(
            FeedForwardConfig::new(embed_dim, feed_forward_dim, dropout_p),
            dtype,
            device,
        )?;
        Ok(Self {
            mlp,
            dropout: Dropout::new(dropout_p)?,
            norm: LayerNorm::new(embed_dim, dtype, device)?,
        })
    }

    /// Wraps an existing MLP with the residual wiring.
    pub fn from_parts(mlp: FeedForward, dropout_p: f32, norm: LayerNorm) -> Result<Self> {
        Ok(Self {
            mlp,
            dropout: Dropout::new(dropout_p)?,
            norm,
        })
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.mlp.named_parameters(&format!("{scope}.mlp"));
        params.extend(self.norm.named_parameters(&format!("{scope}.norm")));
        params
    }

    pub fn forward(&self, seq: &Tensor, train: bool) -> Result<Tensor> {
        let out = self.mlp.forward(seq, train)?;
        let out = self.dropout.forward(&out, train)?;
        self.norm.forward(&out.add(seq)?)
    }
}

/// One decoder layer: self-attention, cross-attention, feed-forward.
#[derive(Debug, Clone)]
pub struct DecoderLayer {
    self_attn: SelfAttentionBlock,
    cross_attn: CrossAttentionBlock,
    feed_forward: FeedForwardBlock,
}

impl DecoderLayer {
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        feed_forward_dim: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        Ok(Self {
            self_attn: SelfAttentionBlock::new(embed_dim, num_heads, dropout_p, dtype, device)?,
            cross_attn: CrossAttentionBlock::new(embed_dim, num_heads, dropout_p, dtype, device)?,
            feed_forward: FeedForwardBlock::new(
                embed_dim,
                feed_forward_dim,
                dropout_p,
                dtype,
                device,
            )?,
        })
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self
            .self_attn
            .named_parameters(&format!("{scope}.self_attn"));
        params.extend(
            self.cross_attn
                .named_parameters(&format!("{scope}.cross_attn")),
        );
        params.extend(
            self.feed_forward
                .named_parameters(&format!("{scope}.feed_forward")),
        );
        params
    }

    /// Pure function of `(seq, cond, mask)` given the owned weights.
    pub fn forward(&self, seq: &Tensor, cond: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let out = self.self_attn.forward(seq, mask, train)?;
        let out = self.cross_attn.forward(&out, cond, train)?;
        self.feed_forward.forward(&out, train)
    }
}

/// One encoder layer: self-attention, feed-forward.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    self_attn: SelfAttentionBlock,
    feed_forward: FeedForwardBlock,
}

impl EncoderLayer {
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        feed_forward_dim: usize,
        dropout_p: f32,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        Ok(Self {
            self_attn: SelfAttentionBlock::new(embed_dim, num_heads, dropout_p, dtype, device)?,
            feed_forward: FeedForwardBlock::new(
                embed_dim,
                feed_forward_dim,
                dropout_p,
                dtype,
                device,
            )?,
        })
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self
            .self_attn
            .named_parameters(&format!("{scope}.self_attn"));
        params.extend(
            self.feed_forward
                .named_parameters(&format!("{scope}.feed_forward")),
        );
        params
    }

    pub fn forward(&self, seq: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let out = self.self_attn.forward(seq, mask, train)?;
        self.feed_forward.forward(&out, train)
    }
}
