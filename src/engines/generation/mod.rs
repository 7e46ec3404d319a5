pub mod checkpoint;
pub mod evolution_engine;
pub mod mutation;
pub mod pareto;
pub mod progress;
pub mod selection;

pub use checkpoint::{CheckpointRow, CheckpointWriter};
pub use evolution_engine::{PopulationController, RunOutcome, RunStatus};
pub use mutation::{LoopBoost, MutationChoice, MutationEngine, MutationSpace};
pub use pareto::{ObjectiveConfig, OptimizationDirection};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressCallback, ProgressMessage, ProgressSnapshot};
