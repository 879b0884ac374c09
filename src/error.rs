use thiserror::Error;

use crate::outcome::Role;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("distribution '{0}' is not supported yet")]
    UnsupportedDistribution(String),

    #[error("uninitialized state: {0}")]
    UninitializedState(&'static str),

    #[error("expected 1 coordinator and {expected_foragers} forager outcomes, got {coordinators} and {foragers}")]
    OutcomeCountMismatch {
        expected_foragers: usize,
        coordinators: usize,
        foragers: usize,
    },

    #[error("generation {0} has already been closed")]
    DoubleClosure(u32),

    #[error("generation {requested} is not open (current generation is {open})")]
    GenerationNotOpen { requested: u32, open: u32 },

    #[error("role {0} already has an outcome in generation {1}")]
    RoleAlreadyRecorded(Role, u32),

    #[error("unknown forager {index} (chain has {num_foragers})")]
    UnknownForager { index: usize, num_foragers: usize },

    #[error("chain reached its maximum of {0} generations")]
    ChainTerminated(u32),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("render error: {0}")]
    Render(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, GameError>;
