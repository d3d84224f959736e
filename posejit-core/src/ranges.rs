//! Named sampling ranges.
//!
//! Every range set is a fixed schema of optional intervals. A field that is left out of a
//! config defaults to the zero width interval `(0.0, 0.0)`, so its sampled column is
//! identically zero.
use crate::uniform::sample_uniform;
use candle_core::{Device, Result, Tensor};
use serde::{Deserialize, Serialize};

/// A closed interval `[low, high]`, serialized as a `[low, high]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Interval {
    pub low: f32,
    pub high: f32,
}

impl Interval {
    pub fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// `[-half_width, half_width]`
    pub fn symmetric(half_width: f32) -> Self {
        Self::new(-half_width, half_width)
    }

    pub fn contains(&self, value: f32) -> bool {
        let (lo, hi) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        (lo..=hi).contains(&value)
    }
}

impl From<(f32, f32)> for Interval {
    fn from((low, high): (f32, f32)) -> Self {
        Self { low, high }
    }
}

impl From<Interval> for (f32, f32) {
    fn from(interval: Interval) -> Self {
        (interval.low, interval.high)
    }
}

pub trait RangeSet {
    /// Column names, in sampling order.
    const KEYS: &'static [&'static str];

    /// Intervals in the order of [`RangeSet::KEYS`].
    fn intervals(&self) -> Vec<Interval>;

    fn get(&self, key: &str) -> Option<Interval> {
        let idx = Self::KEYS.iter().position(|k| *k == key)?;
        self.intervals().get(idx).copied()
    }

    /// Lower and upper bounds as `[k]` tensors.
    fn bounds(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let (low, high): (Vec<f32>, Vec<f32>) =
            self.intervals().into_iter().map(<(f32, f32)>::from).unzip();
        let k = low.len();
        Ok((
            Tensor::from_vec(low, k, device)?,
            Tensor::from_vec(high, k, device)?,
        ))
    }

    /// An `[n, k]` batch with one uniformly drawn column per key.
    fn sample(&self, n: usize, device: &Device) -> Result<Tensor> {
        let (low, high) = self.bounds(device)?;
        sample_uniform(&low, &high, n)
    }
}

macro_rules! range_set {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct $name {
            $(pub $field: Interval,)+
        }

        impl RangeSet for $name {
            const KEYS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn intervals(&self) -> Vec<Interval> {
                vec![$(self.$field),+]
            }
        }
    };
}

range_set!(
    /// Positional jitter in the environment frame.
    PositionRange { x, y, z }
);

range_set!(
    /// Linear (`x`, `y`, `z`) and angular (`roll`, `pitch`, `yaw`) velocity jitter.
    VelocityRange { x, y, z, roll, pitch, yaw }
);

range_set!(
    /// Position jitter plus Euler angle jitter, in radians.
    PoseRange { x, y, z, roll, pitch, yaw }
);
