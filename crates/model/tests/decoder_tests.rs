use std::collections::HashMap;

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::ops::softmax_last_dim;
use model::{DecoderConfig, TransformerDecoder, Vocabulary, NULL_TOKEN, START_TOKEN};

fn small_vocab() -> Result<Vocabulary> {
    let mapping: HashMap<String, u32> = [
        (NULL_TOKEN.to_string(), 0u32),
        (START_TOKEN.to_string(), 1),
        ("a".to_string(), 2),
        ("dog".to_string(), 3),
    ]
    .into_iter()
    .collect();
    Ok(Vocabulary::new(mapping)?)
}

fn small_config() -> DecoderConfig {
    DecoderConfig {
        input_dim: 8,
        embed_dim: 16,
        num_heads: 2,
        num_layers: 1,
        feed_forward_dim: 32,
        dropout_p: 0.0,
        max_length: 12,
        dtype: DType::F32,
        device: Device::Cpu,
    }
}

fn build_decoder() -> Result<TransformerDecoder> {
    Ok(TransformerDecoder::new(small_config(), small_vocab()?)?)
}

#[test]
fn forward_scores_every_timestep() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (2, 8), &Device::Cpu)?;
    let captions = Tensor::from_slice(&[1u32, 2, 3, 1, 3, 2], (2, 3), &Device::Cpu)?;

    let scores = decoder.forward(&features, &captions)?;
    assert_eq!(scores.dims(), &[2, 3, 4]);

    let probs = softmax_last_dim(&scores)?;
    let sums = probs.sum(candle_core::D::Minus1)?.flatten_all()?.to_vec1::<f32>()?;
    assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    Ok(())
}

#[test]
fn embed_shapes_match_contract() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (2, 8), &Device::Cpu)?;
    let captions = Tensor::from_slice(&[1u32, 2, 1, 3], (2, 2), &Device::Cpu)?;

    let (feature_embedding, caption_embedding) = decoder.embed(&features, &captions)?;
    assert_eq!(feature_embedding.dims(), &[2, 1, 16]);
    assert_eq!(caption_embedding.dims(), &[2, 2, 16]);
    Ok(())
}

#[test]
fn forward_is_deterministic_in_eval() -> Result<()> {
    let decoder = build_decoder()?;
    decoder.set_training(false);
    let features = Tensor::randn(0f32, 1.0, (1, 8), &Device::Cpu)?;
    let captions = Tensor::from_slice(&[1u32, 2, 3], (1, 3), &Device::Cpu)?;

    let first = decoder.forward(&features, &captions)?;
    let second = decoder.forward(&features, &captions)?;
    let max = first.sub(&second)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(max < 1e-7);
    Ok(())
}

#[test]
fn wrong_feature_width_is_rejected() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (2, 5), &Device::Cpu)?;
    let captions = Tensor::from_slice(&[1u32, 2], (2, 1), &Device::Cpu)?;
    assert!(decoder.forward(&features, &captions).is_err());
    Ok(())
}

#[test]
fn sample_returns_full_length_captions() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (2, 8), &Device::Cpu)?;

    let captions = decoder.sample(&features, 5)?;
    assert_eq!(captions.dims(), &[2, 5]);
    assert_eq!(captions.dtype(), DType::U32);

    let vocab_size = decoder.vocab().len() as u32;
    let ids = captions.flatten_all()?.to_vec1::<u32>()?;
    assert!(ids.iter().all(|id| *id < vocab_size));
    Ok(())
}

#[test]
fn sample_with_zero_length_is_empty() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (2, 8), &Device::Cpu)?;
    let captions = decoder.sample(&features, 0)?;
    assert_eq!(captions.dims(), &[2, 0]);
    Ok(())
}

#[test]
fn sample_without_start_token_fails() -> Result<()> {
    let mapping: HashMap<String, u32> = [
        (NULL_TOKEN.to_string(), 0u32),
        ("a".to_string(), 1),
    ]
    .into_iter()
    .collect();
    let decoder = TransformerDecoder::new(small_config(), Vocabulary::new(mapping)?)?;
    let features = Tensor::randn(0f32, 1.0, (1, 8), &Device::Cpu)?;
    assert!(decoder.sample(&features, 3).is_err());
    Ok(())
}

#[test]
fn sample_beyond_positional_capacity_fails() -> Result<()> {
    let decoder = build_decoder()?;
    let features = Tensor::randn(0f32, 1.0, (1, 8), &Device::Cpu)?;
    assert!(decoder.sample(&features, 13).is_err());
    Ok(())
}

#[test]
fn causal_mask_hides_future_tokens() -> Result<()> {
    // Scores at timestep t must not move when tokens after t change.
    let decoder = build_decoder()?;
    decoder.set_training(false);
    let features = Tensor::randn(0f32, 1.0, (1, 8), &Device::Cpu)?;

    let captions_a = Tensor::from_slice(&[1u32, 2, 2], (1, 3), &Device::Cpu)?;
    let captions_b = Tensor::from_slice(&[1u32, 2, 3], (1, 3), &Device::Cpu)?;

    let scores_a = decoder.forward(&features, &captions_a)?;
    let scores_b = decoder.forward(&features, &captions_b)?;

    let prefix_a = scores_a.narrow(1, 0, 2)?;
    let prefix_b = scores_b.narrow(1, 0, 2)?;
    let max = prefix_a.sub(&prefix_b)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(max < 1e-6, "future tokens leaked into earlier scores: {max}");
    Ok(())
}
