pub mod error;
pub mod scene;

pub use error::SceneError;
pub use scene::{InteractiveScene, RigidObject, grid_origins};
