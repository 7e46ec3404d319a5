use super::traits::ConfigSection;
use crate::error::{CodonOptError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for one scoring plugin; unknown keys land in `options`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub weight: Option<f64>,
    pub off: bool,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl PluginSettings {
    /// Effective weight; `off` forces zero
    pub fn weight_or(&self, default: f64) -> f64 {
        if self.off {
            0.0
        } else {
            self.weight.unwrap_or(default)
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> anyhow::Result<f64> {
        match self.options.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .with_context(|| format!("option {} must be a number, got {}", key, value)),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> anyhow::Result<usize> {
        match self.options.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|v| v as usize)
                .with_context(|| format!("option {} must be a non-negative integer, got {}", key, value)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Plugin name -> settings. Plugins not listed run with their defaults.
    #[serde(flatten)]
    pub plugins: BTreeMap<String, PluginSettings>,
}

impl ConfigSection for ScoringConfig {
    fn section_name() -> &'static str {
        "scoring"
    }

    fn validate(&self) -> Result<()> {
        for (name, settings) in &self.plugins {
            if settings.weight.map_or(false, |w| !w.is_finite()) {
                return Err(CodonOptError::Configuration(format!(
                    "Weight of {} must be a finite number",
                    name
                )));
            }
        }
        Ok(())
    }
}
