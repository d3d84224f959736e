use crate::{
    math::{quat_from_euler_xyz, quat_mul},
    ranges::{PoseRange, PositionRange, RangeSet, VelocityRange},
    sampler::sample_quat_within_angle,
    scene::RootStateSink,
    tensors::{Orientations, Positions, RootPoses, Velocities},
};
use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_ASSET: &str = "robot";

fn default_asset() -> String {
    DEFAULT_ASSET.to_owned()
}

/// Resets root states to the defaults, jittering position and velocity uniformly and
/// rotating the orientation by at most `max_radian`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampedAngularDistanceReset {
    #[serde(default = "default_asset")]
    pub asset_name: String,
    #[serde(default)]
    pub position_range: PositionRange,
    #[serde(default)]
    pub velocity_range: VelocityRange,
    #[serde(default)]
    pub max_radian: f64,
}

impl Default for ClampedAngularDistanceReset {
    fn default() -> Self {
        Self {
            asset_name: default_asset(),
            position_range: PositionRange::default(),
            velocity_range: VelocityRange::default(),
            max_radian: 0.,
        }
    }
}

/// Resets root states to the defaults, jittering position, velocity and the Euler angles
/// of the orientation uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformReset {
    #[serde(default = "default_asset")]
    pub asset_name: String,
    #[serde(default)]
    pub pose_range: PoseRange,
    #[serde(default)]
    pub velocity_range: VelocityRange,
}

impl Default for UniformReset {
    fn default() -> Self {
        Self {
            asset_name: default_asset(),
            pose_range: PoseRange::default(),
            velocity_range: VelocityRange::default(),
        }
    }
}

pub fn reset_root_state_clamped_angular_distance(
    sink: &mut dyn RootStateSink,
    env_ids: &[u32],
    cfg: &ClampedAngularDistanceReset,
) -> Result<()> {
    if env_ids.is_empty() {
        return Ok(());
    }
    let n = env_ids.len();
    let device = sink.device().clone();
    debug!(
        asset = %cfg.asset_name,
        num_envs = n,
        max_radian = cfg.max_radian,
        "resetting root state within angular distance"
    );
    let root_states = sink.default_root_state(&cfg.asset_name, env_ids)?;
    let origins = sink.env_origins(env_ids)?;

    let positions = root_states
        .positions()?
        .add(&origins)?
        .add(&cfg.position_range.sample(n, &device)?)?;
    let orientations = sample_quat_within_angle(&root_states.orientations()?.0, cfg.max_radian)?;
    let poses = RootPoses::from_parts(&Positions(positions), &Orientations(orientations))?;
    let velocities = root_states
        .velocities()?
        .add(&cfg.velocity_range.sample(n, &device)?)?;

    // nothing is written until every column has been sampled
    sink.write_root_pose(&cfg.asset_name, &poses, env_ids)?;
    sink.write_root_velocity(&cfg.asset_name, &Velocities(velocities), env_ids)
}

fn column(t: &Tensor, idx: usize) -> Result<Tensor> {
    t.narrow(1, idx, 1)?.squeeze(1)
}

pub fn reset_root_state_uniform(
    sink: &mut dyn RootStateSink,
    env_ids: &[u32],
    cfg: &UniformReset,
) -> Result<()> {
    if env_ids.is_empty() {
        return Ok(());
    }
    let n = env_ids.len();
    let device = sink.device().clone();
    debug!(asset = %cfg.asset_name, num_envs = n, "resetting root state uniformly");
    let root_states = sink.default_root_state(&cfg.asset_name, env_ids)?;
    let origins = sink.env_origins(env_ids)?;
    let pose_samples = cfg.pose_range.sample(n, &device)?;

    let positions = root_states
        .positions()?
        .add(&origins)?
        .add(&pose_samples.narrow(1, 0, 3)?)?;
    let delta = quat_from_euler_xyz(
        &column(&pose_samples, 3)?,
        &column(&pose_samples, 4)?,
        &column(&pose_samples, 5)?,
    )?;
    let orientations = quat_mul(&root_states.orientations()?.0, &delta)?;
    let poses = RootPoses::from_parts(&Positions(positions), &Orientations(orientations))?;
    let velocities = root_states
        .velocities()?
        .add(&cfg.velocity_range.sample(n, &device)?)?;

    sink.write_root_pose(&cfg.asset_name, &poses, env_ids)?;
    sink.write_root_velocity(&cfg.asset_name, &Velocities(velocities), env_ids)
}
