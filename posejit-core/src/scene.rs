use crate::tensors::{RootPoses, RootStates, Velocities};
use candle_core::{Device, Result, Tensor};

/// The simulation side of a root state reset.
///
/// Implementors hold a batch of `num_envs` environment instances, each with one or more
/// named assets. Reads return rows in the order of `env_ids`, writes commit row `i` of
/// the batch to environment `env_ids[i]`.
pub trait RootStateSink {
    fn num_envs(&self) -> usize;

    fn device(&self) -> &Device;

    /// `[env_ids.len(), 13]` default root states of `asset`.
    fn default_root_state(&self, asset: &str, env_ids: &[u32]) -> Result<RootStates>;

    /// `[env_ids.len(), 3]` world frame origins of the environments.
    fn env_origins(&self, env_ids: &[u32]) -> Result<Tensor>;

    /// Commits `[env_ids.len(), 7]` root poses.
    fn write_root_pose(&mut self, asset: &str, poses: &RootPoses, env_ids: &[u32]) -> Result<()>;

    /// Commits `[env_ids.len(), 6]` root velocities.
    fn write_root_velocity(
        &mut self,
        asset: &str,
        velocities: &Velocities,
        env_ids: &[u32],
    ) -> Result<()>;
}
