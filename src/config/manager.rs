use super::{
    evolution::EvolutionConfig, folding::FoldingConfig, output::OutputConfig, scoring::ScoringConfig,
    sequence::SequenceConfig, traits::ConfigSection,
};
use crate::error::{CodonOptError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

pub const ENV_PREFIX: &str = "CODONOPT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sequence: SequenceConfig,
    pub evolution: EvolutionConfig,
    pub folding: FoldingConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.sequence.validate()?;
        self.evolution.validate()?;
        self.folding.validate()?;
        self.scoring.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a TOML (or JSON) file, with `CODONOPT__SECTION__KEY` environment
    /// variables overriding file values
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CodonOptError::Configuration(format!(
                "Failed to read config: {} does not exist",
                path.display()
            )));
        }

        let config: AppConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CodonOptError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| CodonOptError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| CodonOptError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[sequence]
cds = ["AUGAAAUAA"]

[evolution]
iterations = 3
population = 6
seed = 7

[scoring.mfe]
weight = 2.0
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_fills_defaults() {
        let file = write_config(MINIMAL);
        let manager = ConfigManager::new();
        manager.load_from_file(file.path()).unwrap();

        let config = manager.get();
        assert_eq!(config.evolution.iterations, 3);
        assert_eq!(config.evolution.population, 6);
        assert_eq!(config.evolution.survivors, 2);
        assert_eq!(config.evolution.seed, 7);
        assert_eq!(config.folding.engine, "basepair");
        assert_eq!(config.scoring.plugins["mfe"].weight, Some(2.0));
        assert_eq!(config.output.checkpoint_file, "checkpoints.tsv");
    }

    #[test]
    fn test_invalid_file_rejected() {
        let file = write_config("[evolution]\npopulation = 0\n[sequence]\ncds = [\"AUGUAA\"]\n");
        let manager = ConfigManager::new();
        assert!(matches!(
            manager.load_from_file(file.path()),
            Err(CodonOptError::Configuration(_))
        ));
        assert_eq!(manager.get().evolution.population, 20);
    }

    #[test]
    fn test_save_and_reload() {
        let file = write_config(MINIMAL);
        let manager = ConfigManager::new();
        manager.load_from_file(file.path()).unwrap();

        let saved = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        manager.save_to_file(saved.path()).unwrap();

        let reloaded = ConfigManager::new();
        reloaded.load_from_file(saved.path()).unwrap();
        assert_eq!(reloaded.get().evolution.iterations, 3);
        assert_eq!(reloaded.get().sequence.cds, vec!["AUGAAAUAA".to_string()]);
    }

    #[test]
    fn test_update_validates() {
        let manager = ConfigManager::new();
        let result = manager.update(|c| c.evolution.survivors = 0);
        assert!(result.is_err());
        assert_eq!(manager.get().evolution.survivors, 2);
    }
}
