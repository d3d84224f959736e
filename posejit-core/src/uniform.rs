use candle_core::{DType, Result, Tensor, bail};

/// Draws an `[n, k]` batch where column `i` is uniform in `[lower[i], upper[i])`. `lower`
/// and `upper` are `[k]` tensors. Every cell is drawn independently; a zero width column
/// is exactly `lower[i]`.
pub fn sample_uniform(lower: &Tensor, upper: &Tensor, n: usize) -> Result<Tensor> {
    let k = lower.dims1()?;
    let k_upper = upper.dims1()?;
    if k != k_upper {
        bail!("lower bound has {k} columns but upper bound has {k_upper}")
    }
    let lower = lower.to_dtype(DType::F32)?;
    let upper = upper.to_dtype(DType::F32)?;
    if n == 0 || k == 0 {
        return Tensor::zeros((n, k), DType::F32, lower.device());
    }
    let width = upper.sub(&lower)?;
    Tensor::rand(0f32, 1f32, (n, k), lower.device())?
        .broadcast_mul(&width)?
        .broadcast_add(&lower)
}
