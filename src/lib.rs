pub mod chain;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod players;
pub mod render;
pub mod rng;
pub mod scenario;
pub mod sliders;
pub mod snapshot;
pub mod wealth;
pub mod world;

pub use chain::{ChainConfig, ChainPropagator, ChainState, GenerationSeed, SharedChain};
pub use error::{GameError, Result};
pub use outcome::{Role, RoleOutcome, SliderProposal};
pub use sliders::SliderState;
pub use wealth::WealthTracker;
pub use world::{Distribution, World, WorldParams};
