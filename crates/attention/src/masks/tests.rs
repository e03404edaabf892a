use super::*;
use candle_core::{Device, Result};

#[test]
fn causal_mask_is_lower_triangular_inclusive() -> Result<()> {
    let device = Device::Cpu;
    for len in [1usize, 4, 10] {
        let mask = build_causal_mask(&device, len)?;
        assert_eq!(mask.dims(), &[len, len]);
        let values = mask.flatten_all()?.to_vec1::<f32>()?;
        for i in 0..len {
            for j in 0..len {
                let expected = if j <= i { 1.0 } else { 0.0 };
                assert_eq!(
                    values[i * len + j],
                    expected,
                    "mask[{i}][{j}] wrong for len {len}"
                );
            }
        }
    }
    Ok(())
}

#[test]
fn full_mask_permits_everything() -> Result<()> {
    let device = Device::Cpu;
    let mask = build_full_mask(&device, 5)?;
    assert_eq!(mask.dims(), &[5, 5]);
    assert!(mask
        .flatten_all()?
        .to_vec1::<f32>()?
        .iter()
        .all(|v| *v == 1.0));
    Ok(())
}

#[test]
fn additive_conversion_maps_zero_to_neg_inf() -> Result<()> {
    let device = Device::Cpu;
    let mask = build_causal_mask(&device, 3)?;
    let additive = to_additive(&mask).unwrap();
    let values = additive.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(values[0], 0.0);
    assert_eq!(values[1], f32::NEG_INFINITY);
    assert_eq!(values[3], 0.0);
    assert_eq!(values[5], f32::NEG_INFINITY);
    assert_eq!(values[8], 0.0);
    Ok(())
}

#[test]
fn empty_row_is_rejected() -> Result<()> {
    let device = Device::Cpu;
    let mask = candle_core::Tensor::from_slice(&[1.0f32, 1.0, 0.0, 0.0], (2, 2), &device)?;
    let err = to_additive(&mask).unwrap_err();
    assert!(matches!(err, AttentionError::FullyMaskedRow));
    Ok(())
}
