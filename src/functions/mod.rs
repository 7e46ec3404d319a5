pub mod plugins;
pub mod registry;
pub mod traits;

pub use registry::PluginRegistry;
pub use traits::{PluginCapabilities, PluginContext, PluginOutput, ScoringPlugin, SeriesMap};
