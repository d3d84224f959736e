//! Batched quaternion helpers.
//!
//! Quaternions are stored as `[n, 4]` f32 tensors in (w, x, y, z) order, one row per
//! environment instance. A single quaternion may also be passed as a `[4]` tensor, it is
//! treated as a one row batch. Binary operations broadcast a one row batch against an `n`
//! row batch.
//!
//! Operations that the tensor backend has no kernel for (inverse trigonometry) are
//! evaluated row by row on the host and moved back to the input device.
use candle_core::{D, DType, Device, Result, Tensor, bail};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Lower bound used when dividing by a norm.
pub const NORM_EPS: f32 = 1e-9;

pub(crate) fn as_batch(q: &Tensor) -> Result<Tensor> {
    let q = match q.rank() {
        1 => q.unsqueeze(0)?,
        2 => q.clone(),
        rank => bail!("quaternions must be [4] or [n, 4], got rank {rank}"),
    };
    let cols = q.dim(D::Minus1)?;
    if cols != 4 {
        bail!("quaternions need 4 components, got {cols}")
    }
    q.to_dtype(DType::F32)
}

fn components(q: &Tensor) -> Result<[Tensor; 4]> {
    let q = as_batch(q)?;
    Ok([
        q.narrow(1, 0, 1)?,
        q.narrow(1, 1, 1)?,
        q.narrow(1, 2, 1)?,
        q.narrow(1, 3, 1)?,
    ])
}

fn prod(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    a.broadcast_mul(b)
}

/// Evaluates `f` on every row of a quaternion batch on the host.
fn map_rows<const K: usize>(q: &Tensor, f: impl Fn([f32; 4]) -> [f32; K]) -> Result<Tensor> {
    let q = as_batch(q)?;
    let device = q.device().clone();
    let rows = q.to_vec2::<f32>()?;
    let n = rows.len();
    let data: Vec<f32> = rows
        .into_iter()
        .flat_map(|row| f([row[0], row[1], row[2], row[3]]))
        .collect();
    Tensor::from_vec(data, (n, K), &Device::Cpu)?.to_device(&device)
}

/// `n` identity rotations.
pub fn quat_identity(n: usize, device: &Device) -> Result<Tensor> {
    let w = Tensor::ones((n, 1), DType::F32, device)?;
    let xyz = Tensor::zeros((n, 3), DType::F32, device)?;
    Tensor::cat(&[&w, &xyz], 1)
}

/// Hamilton product `q1 ⊗ q2`.
pub fn quat_mul(q1: &Tensor, q2: &Tensor) -> Result<Tensor> {
    let [w1, x1, y1, z1] = components(q1)?;
    let [w2, x2, y2, z2] = components(q2)?;
    let w = prod(&w1, &w2)?
        .sub(&prod(&x1, &x2)?)?
        .sub(&prod(&y1, &y2)?)?
        .sub(&prod(&z1, &z2)?)?;
    let x = prod(&w1, &x2)?
        .add(&prod(&x1, &w2)?)?
        .add(&prod(&y1, &z2)?)?
        .sub(&prod(&z1, &y2)?)?;
    let y = prod(&w1, &y2)?
        .sub(&prod(&x1, &z2)?)?
        .add(&prod(&y1, &w2)?)?
        .add(&prod(&z1, &x2)?)?;
    let z = prod(&w1, &z2)?
        .add(&prod(&x1, &y2)?)?
        .sub(&prod(&y1, &x2)?)?
        .add(&prod(&z1, &w2)?)?;
    Tensor::cat(&[&w, &x, &y, &z], 1)
}

pub fn quat_conjugate(q: &Tensor) -> Result<Tensor> {
    let q = as_batch(q)?;
    let w = q.narrow(1, 0, 1)?;
    let xyz = q.narrow(1, 1, 3)?.neg()?;
    Tensor::cat(&[&w, &xyz], 1)
}

pub fn quat_normalize(q: &Tensor) -> Result<Tensor> {
    let q = as_batch(q)?;
    let norm = q.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(NORM_EPS)?;
    q.broadcast_div(&norm)
}

/// Euclidean norm of every row, shape `[n]`.
pub fn quat_norm(q: &Tensor) -> Result<Tensor> {
    as_batch(q)?.sqr()?.sum(1)?.sqrt()
}

/// Builds quaternions from extrinsic x-y-z Euler angles, each given as an `[n]` tensor.
pub fn quat_from_euler_xyz(roll: &Tensor, pitch: &Tensor, yaw: &Tensor) -> Result<Tensor> {
    let half = |t: &Tensor| -> Result<(Tensor, Tensor)> {
        let t = t.affine(0.5, 0.0)?;
        Ok((t.cos()?, t.sin()?))
    };
    let (cr, sr) = half(roll)?;
    let (cp, sp) = half(pitch)?;
    let (cy, sy) = half(yaw)?;
    let qw = cy.mul(&cr)?.mul(&cp)?.add(&sy.mul(&sr)?.mul(&sp)?)?;
    let qx = cy.mul(&sr)?.mul(&cp)?.sub(&sy.mul(&cr)?.mul(&sp)?)?;
    let qy = cy.mul(&cr)?.mul(&sp)?.add(&sy.mul(&sr)?.mul(&cp)?)?;
    let qz = sy.mul(&cr)?.mul(&cp)?.sub(&cy.mul(&sr)?.mul(&sp)?)?;
    Tensor::stack(&[&qw, &qx, &qy, &qz], 1)
}

/// Inverse of [`quat_from_euler_xyz`]. Returns `[n, 3]` columns (roll, pitch, yaw), each
/// wrapped to `[0, 2π)`.
pub fn euler_xyz_from_quat(q: &Tensor) -> Result<Tensor> {
    map_rows(q, |[w, x, y, z]| {
        let roll = (2. * (w * x + y * z)).atan2(1. - 2. * (x * x + y * y));
        let sin_pitch = 2. * (w * y - z * x);
        let pitch = if sin_pitch.abs() >= 1. {
            FRAC_PI_2.copysign(sin_pitch)
        } else {
            sin_pitch.asin()
        };
        let yaw = (2. * (w * z + x * y)).atan2(1. - 2. * (y * y + z * z));
        [wrap_angle(roll), wrap_angle(pitch), wrap_angle(yaw)]
    })
}

/// Wraps to `[0, 2π)`. `rem_euclid` rounds tiny negative angles up to exactly `2π`.
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU { 0. } else { wrapped }
}

/// Rotation vectors (axis scaled by angle), shape `[n, 3]`. The angle is taken on the
/// short path, so `q` and `-q` map to the same vector.
pub fn axis_angle_from_quat(q: &Tensor) -> Result<Tensor> {
    const SMALL_ANGLE: f32 = 1e-6;
    map_rows(q, |[w, x, y, z]| {
        let sign = if w < 0. { -1. } else { 1. };
        let (w, x, y, z) = (w * sign, x * sign, y * sign, z * sign);
        let mag = (x * x + y * y + z * z).sqrt();
        let half_angle = mag.atan2(w);
        let angle = 2. * half_angle;
        // sin(a/2) / a, with its Taylor expansion close to zero
        let scale = if angle.abs() > SMALL_ANGLE {
            half_angle.sin() / angle
        } else {
            0.5 - angle * angle / 48.
        };
        [x / scale, y / scale, z / scale]
    })
}

/// Rotation angle between matching rows of two quaternion batches, `2 acos(|q1 · q2|)`,
/// shape `[n]`. Values lie in `[0, π]`.
pub fn quat_angular_distance(q1: &Tensor, q2: &Tensor) -> Result<Tensor> {
    let (q1, q2) = (as_batch(q1)?, as_batch(q2)?);
    let n = q1.dim(0)?.max(q2.dim(0)?);
    let q1 = q1.broadcast_as((n, 4))?;
    let q2 = q2.broadcast_as((n, 4))?;
    let both = Tensor::cat(&[&q1, &q2], 1)?;
    let device = both.device().clone();
    let rows = both.to_vec2::<f32>()?;
    let angles: Vec<f32> = rows
        .iter()
        .map(|r| {
            let dot = r[0] * r[4] + r[1] * r[5] + r[2] * r[6] + r[3] * r[7];
            2. * dot.abs().min(1.).acos()
        })
        .collect();
    Tensor::from_vec(angles, n, &Device::Cpu)?.to_device(&device)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn quat(rows: &[[f32; 4]]) -> Result<Tensor> {
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_vec(data, (rows.len(), 4), &Device::Cpu)
    }

    fn assert_rows_eq(a: &Tensor, b: &Tensor) -> Result<()> {
        let a = a.to_vec2::<f32>()?;
        let b = b.to_vec2::<f32>()?;
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(b.iter()) {
            for (va, vb) in ra.iter().zip(rb.iter()) {
                assert_abs_diff_eq!(*va, *vb, epsilon = 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn identity_is_neutral() -> Result<()> {
        let q = quat_normalize(&quat(&[[0.3, -0.2, 0.9, 0.1], [1., 2., 3., 4.]])?)?;
        let id = quat_identity(2, &Device::Cpu)?;
        assert_rows_eq(&quat_mul(&id, &q)?, &q)?;
        assert_rows_eq(&quat_mul(&q, &id)?, &q)?;
        Ok(())
    }

    #[test]
    fn hamilton_product_of_basis() -> Result<()> {
        // i * j = k
        let i = quat(&[[0., 1., 0., 0.]])?;
        let j = quat(&[[0., 0., 1., 0.]])?;
        assert_rows_eq(&quat_mul(&i, &j)?, &quat(&[[0., 0., 0., 1.]])?)?;
        // j * i = -k
        assert_rows_eq(&quat_mul(&j, &i)?, &quat(&[[0., 0., 0., -1.]])?)?;
        Ok(())
    }

    #[test]
    fn single_row_broadcasts() -> Result<()> {
        let single = Tensor::new(&[0f32, 0., 0., 1.], &Device::Cpu)?;
        let batch = quat_identity(3, &Device::Cpu)?;
        let out = quat_mul(&single, &batch)?;
        assert_eq!(out.dims2()?, (3, 4));
        assert_rows_eq(&out, &quat(&[[0., 0., 0., 1.]; 3])?)?;
        Ok(())
    }

    #[test]
    fn conjugate_inverts_unit_quaternions() -> Result<()> {
        let q = quat_normalize(&quat(&[[0.5, 0.5, -0.1, 0.7]])?)?;
        let prod = quat_mul(&q, &quat_conjugate(&q)?)?;
        assert_rows_eq(&prod, &quat_identity(1, &Device::Cpu)?)
    }

    #[test]
    fn euler_round_trip() -> Result<()> {
        let roll = Tensor::new(&[0.1f32, 1.2, 5.0], &Device::Cpu)?;
        let pitch = Tensor::new(&[0.2f32, 0.4, 0.3], &Device::Cpu)?;
        let yaw = Tensor::new(&[0.3f32, 2.5, 6.0], &Device::Cpu)?;
        let q = quat_from_euler_xyz(&roll, &pitch, &yaw)?;
        let norms = quat_norm(&q)?.to_vec1::<f32>()?;
        for n in norms {
            assert_abs_diff_eq!(n, 1., epsilon = 1e-5);
        }
        let euler = euler_xyz_from_quat(&q)?.to_vec2::<f32>()?;
        let expected: [[f32; 3]; 3] = [[0.1, 0.2, 0.3], [1.2, 0.4, 2.5], [5.0, 0.3, 6.0]];
        for (row, exp) in euler.iter().zip(expected.iter()) {
            for (v, e) in row.iter().zip(exp.iter()) {
                assert_abs_diff_eq!(*v, *e, epsilon = 1e-4);
            }
        }
        Ok(())
    }

    #[test]
    fn euler_angles_are_wrapped() -> Result<()> {
        let roll = Tensor::new(&[-0.5f32], &Device::Cpu)?;
        let zero = Tensor::new(&[0f32], &Device::Cpu)?;
        let q = quat_from_euler_xyz(&roll, &zero, &zero)?;
        let euler = euler_xyz_from_quat(&q)?.to_vec2::<f32>()?;
        assert_abs_diff_eq!(euler[0][0], TAU - 0.5, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn tiny_negative_angles_wrap_to_zero() {
        assert_eq!(wrap_angle(-1e-9), 0.);
        assert_eq!(wrap_angle(0.), 0.);
        assert!(wrap_angle(-1e-3) < TAU);
        assert_abs_diff_eq!(wrap_angle(TAU + 0.25), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn axis_angle_of_yaw_rotation() -> Result<()> {
        let half = PI / 4.;
        let q = quat(&[[half.cos(), 0., 0., half.sin()], [1., 0., 0., 0.]])?;
        let aa = axis_angle_from_quat(&q)?.to_vec2::<f32>()?;
        assert_abs_diff_eq!(aa[0][2], PI / 2., epsilon = 1e-5);
        assert_abs_diff_eq!(aa[0][0], 0., epsilon = 1e-6);
        assert_eq!(aa[1], vec![0., 0., 0.]);
        // the double cover maps to the same rotation vector
        let neg = quat(&[[-half.cos(), 0., 0., -half.sin()]])?;
        let aa_neg = axis_angle_from_quat(&neg)?.to_vec2::<f32>()?;
        assert_abs_diff_eq!(aa_neg[0][2], PI / 2., epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn angular_distance_ignores_sign() -> Result<()> {
        let half = PI / 12.;
        let a = quat(&[[1., 0., 0., 0.], [1., 0., 0., 0.]])?;
        let b = quat(&[[half.cos(), half.sin(), 0., 0.], [-1., 0., 0., 0.]])?;
        let d = quat_angular_distance(&a, &b)?.to_vec1::<f32>()?;
        assert_abs_diff_eq!(d[0], PI / 6., epsilon = 1e-4);
        assert_abs_diff_eq!(d[1], 0., epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn rejects_bad_shapes() -> Result<()> {
        let bad = Tensor::zeros((2, 3), DType::F32, &Device::Cpu)?;
        assert!(quat_normalize(&bad).is_err());
        let bad = Tensor::zeros((2, 2, 4), DType::F32, &Device::Cpu)?;
        assert!(quat_conjugate(&bad).is_err());
        Ok(())
    }
}
