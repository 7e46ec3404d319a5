use super::plugins::{
    AverageUnpairedProbability, MinimumFreeEnergy, StartCodonStructure, UnpairedUridine,
    UridineContent,
};
use super::traits::{PluginContext, ScoringPlugin};
use crate::config::{PluginSettings, ScoringConfig};
use crate::error::{CodonOptError, Result};
use std::{collections::BTreeMap, sync::Arc};

pub type PluginFactory = fn(&PluginSettings, &PluginContext) -> anyhow::Result<Arc<dyn ScoringPlugin>>;

/// Named constructors for scoring plugins
pub struct PluginRegistry {
    factories: BTreeMap<&'static str, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register_builtins();
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: PluginFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Instantiate every registered plugin with its settings (defaults when
    /// absent from the config). Settings for unknown plugins are an error.
    pub fn build(&self, config: &ScoringConfig, ctx: &PluginContext) -> Result<Vec<Arc<dyn ScoringPlugin>>> {
        if let Some(unknown) = config.plugins.keys().find(|name| !self.factories.contains_key(name.as_str())) {
            return Err(CodonOptError::Configuration(format!(
                "Unknown scoring function: {} (available: {})",
                unknown,
                self.names().join(", ")
            )));
        }

        let defaults = PluginSettings::default();
        let mut plugins = Vec::with_capacity(self.factories.len());
        for (name, factory) in &self.factories {
            let settings = config.plugins.get(*name).unwrap_or(&defaults);
            let plugin = factory(settings, ctx).map_err(|e| {
                CodonOptError::Configuration(format!("Failed to set up {}: {:#}", name, e))
            })?;
            plugins.push(plugin);
        }
        plugins.sort_by_key(|p| p.priority());
        Ok(plugins)
    }

    fn register_builtins(&mut self) {
        self.register(MinimumFreeEnergy::NAME, |s, c| {
            Ok(Arc::new(MinimumFreeEnergy::from_settings(s, c)?))
        });
        self.register(StartCodonStructure::NAME, |s, c| {
            Ok(Arc::new(StartCodonStructure::from_settings(s, c)?))
        });
        self.register(AverageUnpairedProbability::NAME, |s, c| {
            Ok(Arc::new(AverageUnpairedProbability::from_settings(s, c)?))
        });
        self.register(UnpairedUridine::NAME, |s, c| {
            Ok(Arc::new(UnpairedUridine::from_settings(s, c)?))
        });
        self.register(UridineContent::NAME, |s, c| {
            Ok(Arc::new(UridineContent::from_settings(s, c)?))
        });
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
