use super::traits::ConfigSection;
use crate::engines::generation::mutation::LoopBoost;
use crate::error::{CodonOptError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub iterations: usize,
    pub population: usize,
    pub survivors: usize,
    pub initial_mutation_rate: f64,
    pub winddown_trigger: usize,
    pub winddown_rate: f64,
    /// 0 disables periodic full scans
    pub full_scan_interval: usize,
    pub loop_boost: Option<LoopBoostConfig>,
    pub conservative_start: Option<ConservativeStart>,
    pub seed: u64,
    pub processes: usize,
    /// Rows in the per-iteration result table
    pub print_top: usize,
}

/// Favour mutations in unpaired codons from codon `start` onward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopBoostConfig {
    pub weight: f64,
    pub start: usize,
}

/// Restrict mutations to the first `width` codons for the first `iterations`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservativeStart {
    pub iterations: usize,
    pub width: usize,
}

impl std::str::FromStr for ConservativeStart {
    type Err = CodonOptError;

    /// Parses the `ITERATIONS:WIDTH` shorthand
    fn from_str(text: &str) -> Result<Self> {
        let invalid = || {
            CodonOptError::Configuration(format!(
                "Invalid conservative start '{}', expected ITERATIONS:WIDTH",
                text
            ))
        };
        let (iterations, width) = text.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            iterations: iterations.trim().parse().map_err(|_| invalid())?,
            width: width.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            population: 20,
            survivors: 2,
            initial_mutation_rate: 0.1,
            winddown_trigger: 15,
            winddown_rate: 0.9,
            full_scan_interval: 300,
            loop_boost: Some(LoopBoostConfig {
                weight: 1.5,
                start: 15,
            }),
            conservative_start: None,
            seed: 922,
            processes: 4,
            print_top: 10,
        }
    }
}

impl EvolutionConfig {
    pub fn loop_boost(&self) -> Option<LoopBoost> {
        self.loop_boost.map(|b| LoopBoost {
            weight: b.weight,
            start: b.start,
        })
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<()> {
        if self.population == 0 {
            return Err(CodonOptError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.survivors == 0 || self.survivors > self.population {
            return Err(CodonOptError::Configuration(format!(
                "Survivors must be between 1 and the population size ({})",
                self.population
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_mutation_rate) {
            return Err(CodonOptError::Configuration(
                "Mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if !(self.winddown_rate > 0.0 && self.winddown_rate <= 1.0) {
            return Err(CodonOptError::Configuration(
                "Winddown rate must be in (0, 1]".to_string(),
            ));
        }
        if self.winddown_trigger == 0 {
            return Err(CodonOptError::Configuration(
                "Winddown trigger must be at least 1".to_string(),
            ));
        }
        if self.loop_boost.map_or(false, |b| b.weight < 0.0) {
            return Err(CodonOptError::Configuration(
                "Loop boost weight cannot be negative".to_string(),
            ));
        }
        if self.processes == 0 {
            return Err(CodonOptError::Configuration(
                "At least one worker process is required".to_string(),
            ));
        }
        Ok(())
    }
}
