use crate::{
    reset::{
        ClampedAngularDistanceReset, UniformReset, reset_root_state_clamped_angular_distance,
        reset_root_state_uniform,
    },
    scene::RootStateSink,
};
use candle_core::Result;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// An event applied to a subset of environments when they are reset.
#[enum_dispatch]
pub trait ResetTerm {
    fn asset_name(&self) -> &str;

    fn apply(&self, sink: &mut dyn RootStateSink, env_ids: &[u32]) -> Result<()>;
}

impl ResetTerm for ClampedAngularDistanceReset {
    fn asset_name(&self) -> &str {
        &self.asset_name
    }

    fn apply(&self, sink: &mut dyn RootStateSink, env_ids: &[u32]) -> Result<()> {
        reset_root_state_clamped_angular_distance(sink, env_ids, self)
    }
}

impl ResetTerm for UniformReset {
    fn asset_name(&self) -> &str {
        &self.asset_name
    }

    fn apply(&self, sink: &mut dyn RootStateSink, env_ids: &[u32]) -> Result<()> {
        reset_root_state_uniform(sink, env_ids, self)
    }
}

#[enum_dispatch(ResetTerm)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResetEvent {
    ClampedAngularDistance(ClampedAngularDistanceReset),
    Uniform(UniformReset),
}

/// Applies `events` in order to the same set of environments.
pub fn apply_reset_events(
    events: &[ResetEvent],
    sink: &mut dyn RootStateSink,
    env_ids: &[u32],
) -> Result<()> {
    for event in events {
        event.apply(sink, env_ids)?;
    }
    Ok(())
}
