use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown asset `{0}`")]
    UnknownAsset(String),
    #[error("asset `{0}` is already part of the scene")]
    DuplicateAsset(String),
    #[error("environment id {env_id} is out of range for {num_envs} environments")]
    EnvIdOutOfRange { env_id: u32, num_envs: usize },
    #[error("expected a [{rows}, {cols}] batch, got {got:?}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        got: Vec<usize>,
    },
}
