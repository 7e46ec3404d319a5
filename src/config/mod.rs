pub mod evolution;
pub mod folding;
pub mod manager;
pub mod output;
pub mod scoring;
pub mod sequence;
pub mod traits;

pub use evolution::{ConservativeStart, EvolutionConfig, LoopBoostConfig};
pub use folding::{FoldingConfig, RemoteConfig};
pub use manager::{AppConfig, ConfigManager};
pub use output::OutputConfig;
pub use scoring::{PluginSettings, ScoringConfig};
pub use sequence::SequenceConfig;
pub use traits::ConfigSection;
