//! Random orientations within an angular bound of a reference orientation.
//!
//! Every sample builds a local deviation quaternion `(cos φ, sin φ · v)`, where `v` is a
//! uniformly distributed unit axis and `cos φ` is drawn uniformly from
//! `[cos(θ_max / 2), 1]`, and composes it onto the reference: `q = reference ⊗ local`.
//! The resulting rotation is at most `θ_max` away from the reference.
//!
//! Note that `cos φ` is uniform, not `φ` and not the solid angle of the cone, so the
//! deviation angles are skewed towards the bound for wide cones. Callers that need a
//! true uniform-in-volume law have to reweight.
use crate::math::{NORM_EPS, as_batch, quat_mul};
use candle_core::{DType, Result, Tensor, bail};
use tracing::trace;

fn check_bound(max_angle: f64) -> Result<()> {
    if !max_angle.is_finite() || max_angle < 0. {
        bail!("max angle must be a finite, non-negative number of radians, got {max_angle}")
    }
    Ok(())
}

/// Draws one local deviation quaternion per entry of `cos_half`, the `[n]` cosine of the
/// half-angle bound of each row.
fn sample_local_deviation(cos_half: &Tensor) -> Result<Tensor> {
    let n = cos_half.dim(0)?;
    let device = cos_half.device();
    let u = Tensor::rand(0f32, 1f32, n, device)?;
    // (1 - u) + u * cos_half, uniform in [cos_half, 1]
    let cos_phi = u
        .mul(&cos_half.affine(1., -1.)?)?
        .affine(1., 1.)?
        .clamp(-1f32, 1f32)?;
    let sin_phi = cos_phi.sqr()?.affine(-1., 1.)?.maximum(0f32)?.sqrt()?;
    let v = Tensor::randn(0f32, 1f32, (n, 3), device)?;
    let norm = v.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(NORM_EPS)?;
    let direction = v.broadcast_div(&norm)?;
    let xyz = direction.broadcast_mul(&sin_phi.unsqueeze(1)?)?;
    Tensor::cat(&[&cos_phi.unsqueeze(1)?, &xyz], 1)
}

fn compose(centers: &Tensor, cos_half: &Tensor) -> Result<Tensor> {
    let n = centers.dim(0)?;
    if n == 0 {
        return Tensor::zeros((0, 4), DType::F32, centers.device());
    }
    let local = sample_local_deviation(cos_half)?;
    quat_mul(centers, &local)
}

/// Samples `num_samples` orientations within `max_angle` radians of a single reference.
///
/// `center` is `[4]`, `[1, 4]` or already `[num_samples, 4]`. Returns
/// `[num_samples, 4]`, every row drawn independently.
pub fn sample_quat_within_rot_angle(
    center: &Tensor,
    max_angle: f64,
    num_samples: usize,
) -> Result<Tensor> {
    check_bound(max_angle)?;
    let center = as_batch(center)?;
    if num_samples == 0 {
        return Tensor::zeros((0, 4), DType::F32, center.device());
    }
    let rows = center.dim(0)?;
    if rows != 1 && rows != num_samples {
        bail!("cannot broadcast {rows} reference orientations to {num_samples} samples")
    }
    let centers = center.broadcast_as((num_samples, 4))?;
    trace!(num_samples, max_angle, "sampling around a shared reference");
    let cos_half = Tensor::full((max_angle / 2.).cos() as f32, num_samples, center.device())?;
    compose(&centers, &cos_half)
}

/// Samples one orientation within `max_angle` radians of every row of `centers`
/// (`[n, 4]`). Rows are independent.
pub fn sample_quat_within_angle(centers: &Tensor, max_angle: f64) -> Result<Tensor> {
    check_bound(max_angle)?;
    let centers = as_batch(centers)?;
    let n = centers.dim(0)?;
    trace!(n, max_angle, "sampling around batched references");
    let cos_half = Tensor::full((max_angle / 2.).cos() as f32, n, centers.device())?;
    compose(&centers, &cos_half)
}

/// Like [`sample_quat_within_angle`] with a bound per row, `max_angles` is `[n]`.
pub fn sample_quat_within_angles(centers: &Tensor, max_angles: &Tensor) -> Result<Tensor> {
    let centers = as_batch(centers)?;
    let n = centers.dim(0)?;
    let bounds = max_angles.dims1()?;
    if bounds != n {
        bail!("got {bounds} angular bounds for {n} reference orientations")
    }
    let max_angles = max_angles.to_dtype(DType::F32)?;
    for max_angle in max_angles.to_vec1::<f32>()? {
        check_bound(max_angle as f64)?;
    }
    let cos_half = max_angles.affine(0.5, 0.)?.cos()?;
    compose(&centers, &cos_half)
}
