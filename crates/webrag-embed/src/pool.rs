use candle_core::{Result, Tensor};

/// Mean of the unmasked token states, L2-normalized per row.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` with 1 for real
/// tokens; the result is `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask
        .to_device(hidden.device())?
        .to_dtype(hidden.dtype())?
        .unsqueeze(2)?; // [B, T, 1]
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?; // [B, H]
    let counts = mask.sum(1)?.affine(1.0, 1e-9)?; // [B, 1]
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.affine(1.0, 1e-12)?; // [B, 1]
    mean.broadcast_div(&norms)
}
