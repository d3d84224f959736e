//! In-memory batched rigid body state.
//!
//! Holds the root state of every asset in every environment instance on the host and
//! accepts root state writes for a subset of environments, the way a physics backend
//! would. Useful as the collaborator of a reset in tests and offline tools.
use crate::error::SceneError;
use candle_core::{DType, Device, Error, Result, Tensor};
use posejit_core::{
    ROOT_POSE_DIM, ROOT_STATE_DIM, ROOT_VELOCITY_DIM,
    math::quat_identity,
    scene::RootStateSink,
    tensors::{RootPoses, RootStates, Velocities},
};
use std::collections::HashMap;
use tracing::{debug, warn};

type Row = [f32; ROOT_STATE_DIM];

/// Lays `num_envs` origins out on a square-ish grid in the xy plane, centered on zero.
pub fn grid_origins(num_envs: usize, env_spacing: f32, device: &Device) -> Result<Tensor> {
    if num_envs == 0 {
        return Tensor::zeros((0, 3), DType::F32, device);
    }
    let num_rows = num_envs.div_ceil((num_envs as f64).sqrt() as usize);
    let num_cols = num_envs.div_ceil(num_rows);
    let row_center = (num_rows as f32 - 1.) / 2.;
    let col_center = (num_cols as f32 - 1.) / 2.;
    let data: Vec<f32> = (0..num_envs)
        .flat_map(|k| {
            let (ii, jj) = ((k / num_cols) as f32, (k % num_cols) as f32);
            [
                -(ii - row_center) * env_spacing,
                (jj - col_center) * env_spacing,
                0.,
            ]
        })
        .collect();
    Tensor::from_vec(data, (num_envs, 3), device)
}

#[derive(Debug, Clone)]
pub struct RigidObject {
    name: String,
    default_root_state: Tensor,
    root_state: Vec<Row>,
}

impl RigidObject {
    /// `default_root_state` is `[num_envs, 13]`; the current state starts at the default.
    pub fn new(name: impl Into<String>, default_root_state: Tensor) -> Result<Self> {
        let default_root_state = RootStates::new(default_root_state.to_dtype(DType::F32)?)?;
        let root_state = default_root_state
            .to_vec2::<f32>()?
            .into_iter()
            .map(|row| {
                let mut out = [0.; ROOT_STATE_DIM];
                out.copy_from_slice(&row);
                out
            })
            .collect();
        Ok(Self {
            name: name.into(),
            default_root_state: default_root_state.0,
            root_state,
        })
    }

    /// Every environment starts at `position` (relative to its origin), upright and at
    /// rest.
    pub fn at_rest(
        name: impl Into<String>,
        num_envs: usize,
        position: [f32; 3],
        device: &Device,
    ) -> Result<Self> {
        let positions = Tensor::new(&position, device)?
            .unsqueeze(0)?
            .repeat((num_envs, 1))?;
        let orientations = quat_identity(num_envs, device)?;
        let velocities = Tensor::zeros((num_envs, ROOT_VELOCITY_DIM), DType::F32, device)?;
        let state = Tensor::cat(&[&positions, &orientations, &velocities], 1)?;
        Self::new(name, state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_envs(&self) -> usize {
        self.root_state.len()
    }

    pub fn default_root_state(&self) -> &Tensor {
        &self.default_root_state
    }

    /// Current `[num_envs, 13]` root state, on `device`.
    pub fn root_state(&self, device: &Device) -> Result<Tensor> {
        let data: Vec<f32> = self.root_state.iter().flatten().copied().collect();
        Tensor::from_vec(data, (self.num_envs(), ROOT_STATE_DIM), device)
    }

    fn write_columns(&mut self, offset: usize, rows: &[Vec<f32>], env_ids: &[u32]) {
        for (row, env_id) in rows.iter().zip(env_ids) {
            self.root_state[*env_id as usize][offset..offset + row.len()].copy_from_slice(row);
        }
    }
}

pub struct InteractiveScene {
    num_envs: usize,
    device: Device,
    env_origins: Tensor,
    assets: HashMap<String, RigidObject>,
}

impl InteractiveScene {
    /// A scene of `num_envs` environments on a grid with `env_spacing` meters between
    /// neighbours.
    pub fn new(num_envs: usize, env_spacing: f32, device: &Device) -> Result<Self> {
        let env_origins = grid_origins(num_envs, env_spacing, device)?;
        Ok(Self {
            num_envs,
            device: device.clone(),
            env_origins,
            assets: HashMap::new(),
        })
    }

    pub fn add_asset(&mut self, asset: RigidObject) -> Result<()> {
        if asset.num_envs() != self.num_envs {
            return Err(Error::wrap(SceneError::ShapeMismatch {
                rows: self.num_envs,
                cols: ROOT_STATE_DIM,
                got: vec![asset.num_envs(), ROOT_STATE_DIM],
            }));
        }
        if self.assets.contains_key(asset.name()) {
            return Err(Error::wrap(SceneError::DuplicateAsset(asset.name.clone())));
        }
        self.assets.insert(asset.name.clone(), asset);
        Ok(())
    }

    pub fn asset(&self, name: &str) -> Result<&RigidObject> {
        self.assets
            .get(name)
            .ok_or_else(|| Error::wrap(SceneError::UnknownAsset(name.to_owned())))
    }

    fn asset_mut(&mut self, name: &str) -> Result<&mut RigidObject> {
        self.assets
            .get_mut(name)
            .ok_or_else(|| Error::wrap(SceneError::UnknownAsset(name.to_owned())))
    }

    /// `[num_envs, 3]` origins of all environments.
    pub fn all_env_origins(&self) -> &Tensor {
        &self.env_origins
    }

    fn env_index(&self, env_ids: &[u32]) -> Result<Tensor> {
        if let Some(env_id) = env_ids.iter().find(|id| **id as usize >= self.num_envs) {
            warn!(env_id, num_envs = self.num_envs, "rejecting environment id");
            return Err(Error::wrap(SceneError::EnvIdOutOfRange {
                env_id: *env_id,
                num_envs: self.num_envs,
            }));
        }
        Tensor::from_slice(env_ids, env_ids.len(), &self.device)
    }

    fn rows_for(&self, batch: &Tensor, cols: usize, env_ids: &[u32]) -> Result<Vec<Vec<f32>>> {
        self.env_index(env_ids)?;
        if batch.dims() != [env_ids.len(), cols] {
            warn!(shape = ?batch.dims(), "rejecting root state write");
            return Err(Error::wrap(SceneError::ShapeMismatch {
                rows: env_ids.len(),
                cols,
                got: batch.dims().to_vec(),
            }));
        }
        batch.to_dtype(DType::F32)?.to_vec2::<f32>()
    }
}

impl RootStateSink for InteractiveScene {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn default_root_state(&self, asset: &str, env_ids: &[u32]) -> Result<RootStates> {
        let index = self.env_index(env_ids)?;
        let states = self.asset(asset)?.default_root_state.index_select(&index, 0)?;
        RootStates::new(states)
    }

    fn env_origins(&self, env_ids: &[u32]) -> Result<Tensor> {
        let index = self.env_index(env_ids)?;
        self.env_origins.index_select(&index, 0)
    }

    fn write_root_pose(&mut self, asset: &str, poses: &RootPoses, env_ids: &[u32]) -> Result<()> {
        let rows = self.rows_for(poses, ROOT_POSE_DIM, env_ids)?;
        debug!(asset, num_envs = env_ids.len(), "writing root pose");
        self.asset_mut(asset)?.write_columns(0, &rows, env_ids);
        Ok(())
    }

    fn write_root_velocity(
        &mut self,
        asset: &str,
        velocities: &Velocities,
        env_ids: &[u32],
    ) -> Result<()> {
        let rows = self.rows_for(velocities, ROOT_VELOCITY_DIM, env_ids)?;
        debug!(asset, num_envs = env_ids.len(), "writing root velocity");
        self.asset_mut(asset)?
            .write_columns(ROOT_POSE_DIM, &rows, env_ids);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scene(num_envs: usize) -> Result<InteractiveScene> {
        let mut scene = InteractiveScene::new(num_envs, 2., &Device::Cpu)?;
        scene.add_asset(RigidObject::at_rest("robot", num_envs, [0., 0., 0.5], &Device::Cpu)?)?;
        Ok(scene)
    }

    #[test]
    fn grid_is_centered() -> Result<()> {
        let origins = grid_origins(4, 2., &Device::Cpu)?.to_vec2::<f32>()?;
        assert_eq!(
            origins,
            vec![
                vec![1., -1., 0.],
                vec![1., 1., 0.],
                vec![-1., -1., 0.],
                vec![-1., 1., 0.]
            ]
        );
        let origins = grid_origins(7, 1., &Device::Cpu)?;
        assert_eq!(origins.dims2()?, (7, 3));
        let sum: f32 = origins.narrow(1, 2, 1)?.sum_all()?.to_scalar()?;
        assert_abs_diff_eq!(sum, 0.);
        Ok(())
    }

    #[test]
    fn defaults_follow_env_ids() -> Result<()> {
        let scene = scene(4)?;
        let states = scene.default_root_state("robot", &[3, 1])?;
        assert_eq!(states.dims2()?, (2, ROOT_STATE_DIM));
        let row = &states.to_vec2::<f32>()?[0];
        assert_eq!(&row[0..7], &[0., 0., 0.5, 1., 0., 0., 0.]);
        let origins = scene.env_origins(&[3, 1])?.to_vec2::<f32>()?;
        assert_eq!(origins[0], vec![-1., 1., 0.]);
        Ok(())
    }

    #[test]
    fn writes_touch_only_addressed_rows() -> Result<()> {
        let mut scene = scene(3)?;
        let pose = Tensor::new(&[[1f32, 2., 3., 0., 1., 0., 0.]], &Device::Cpu)?;
        scene.write_root_pose("robot", &RootPoses(pose), &[1])?;
        let vel = Tensor::new(&[[0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6]], &Device::Cpu)?;
        scene.write_root_velocity("robot", &Velocities(vel), &[1])?;

        let state = scene.asset("robot")?.root_state(&Device::Cpu)?.to_vec2::<f32>()?;
        assert_eq!(
            state[1],
            vec![1., 2., 3., 0., 1., 0., 0., 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]
        );
        assert_eq!(state[0], state[2]);
        assert_eq!(&state[0][0..7], &[0., 0., 0.5, 1., 0., 0., 0.]);
        Ok(())
    }

    #[test]
    fn rejects_invalid_writes() -> Result<()> {
        let mut scene = scene(2)?;
        assert!(scene.default_root_state("robot", &[2]).is_err());
        assert!(scene.default_root_state("cube", &[0]).is_err());
        let pose = Tensor::zeros((2, 7), DType::F32, &Device::Cpu)?;
        // two rows for a single id
        assert!(scene.write_root_pose("robot", &RootPoses(pose), &[0]).is_err());
        let vel = Tensor::zeros((1, 7), DType::F32, &Device::Cpu)?;
        assert!(scene.write_root_velocity("robot", &Velocities(vel), &[0]).is_err());
        let duplicate = RigidObject::at_rest("robot", 2, [0.; 3], &Device::Cpu)?;
        assert!(scene.add_asset(duplicate).is_err());
        let wrong_count = RigidObject::at_rest("cube", 5, [0.; 3], &Device::Cpu)?;
        assert!(scene.add_asset(wrong_count).is_err());
        Ok(())
    }
}
