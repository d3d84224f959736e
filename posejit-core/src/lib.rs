pub mod events;
pub mod math;
pub mod ranges;
pub mod reset;
pub mod sampler;
pub mod scene;
pub mod tensors;
pub mod uniform;

/// Number of columns of a root state row: position (3), orientation wxyz (4), linear
/// velocity (3) and angular velocity (3).
pub const ROOT_STATE_DIM: usize = 13;
/// Number of columns of a root pose row: position (3) and orientation wxyz (4).
pub const ROOT_POSE_DIM: usize = 7;
/// Number of columns of a root velocity row: linear (3) and angular (3).
pub const ROOT_VELOCITY_DIM: usize = 6;
