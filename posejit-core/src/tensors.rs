// Column views over a batch of root states. Each newtype owns a `[n, k]` tensor.
use crate::{ROOT_POSE_DIM, ROOT_STATE_DIM, ROOT_VELOCITY_DIM};
use candle_core::{Result, Tensor, bail};
use derive_more::{Deref, DerefMut, Display};

#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct Positions(pub Tensor);

#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct Orientations(pub Tensor);

#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct Velocities(pub Tensor);

#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct RootPoses(pub Tensor);

/// A `[n, 13]` batch of root states.
#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct RootStates(pub Tensor);

impl RootStates {
    pub fn new(states: Tensor) -> Result<Self> {
        let (_, cols) = states.dims2()?;
        if cols != ROOT_STATE_DIM {
            bail!("root states need {ROOT_STATE_DIM} columns, got {cols}")
        }
        Ok(Self(states))
    }

    pub fn num_rows(&self) -> Result<usize> {
        self.0.dim(0)
    }

    pub fn positions(&self) -> Result<Positions> {
        Ok(Positions(self.0.narrow(1, 0, 3)?))
    }

    pub fn orientations(&self) -> Result<Orientations> {
        Ok(Orientations(self.0.narrow(1, 3, 4)?))
    }

    pub fn velocities(&self) -> Result<Velocities> {
        Ok(Velocities(self.0.narrow(1, ROOT_POSE_DIM, ROOT_VELOCITY_DIM)?))
    }
}

impl RootPoses {
    pub fn from_parts(positions: &Positions, orientations: &Orientations) -> Result<Self> {
        Ok(Self(Tensor::cat(&[&positions.0, &orientations.0], 1)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;

    #[test]
    fn root_state_column_views() -> Result<()> {
        let data: Vec<f32> = (0..26).map(|i| i as f32).collect();
        let states = RootStates::new(Tensor::from_vec(data, (2, 13), &Device::Cpu)?)?;
        assert_eq!(states.num_rows()?, 2);
        assert_eq!(
            states.positions()?.to_vec2::<f32>()?,
            vec![vec![0., 1., 2.], vec![13., 14., 15.]]
        );
        assert_eq!(
            states.orientations()?.to_vec2::<f32>()?[1],
            vec![16., 17., 18., 19.]
        );
        assert_eq!(
            states.velocities()?.to_vec2::<f32>()?[0],
            vec![7., 8., 9., 10., 11., 12.]
        );
        let poses = RootPoses::from_parts(&states.positions()?, &states.orientations()?)?;
        assert_eq!(poses.dims2()?, (2, 7));
        Ok(())
    }

    #[test]
    fn root_states_reject_wrong_width() -> Result<()> {
        let states = Tensor::zeros((3, 7), candle_core::DType::F32, &Device::Cpu)?;
        assert!(RootStates::new(states).is_err());
        let scalar = RootStates(Tensor::new(1f32, &Device::Cpu)?);
        assert!(scalar.num_rows().is_err());
        Ok(())
    }
}
