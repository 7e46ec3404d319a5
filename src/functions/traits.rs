use crate::types::FoldingResult;
use anyhow::Result;
use std::collections::BTreeMap;

/// Metric name -> one value per input sequence, in input order
pub type SeriesMap = BTreeMap<String, Vec<f64>>;

/// Output of one plugin over one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginOutput {
    /// Weighted contributions to fitness
    pub scores: SeriesMap,
    /// Raw values for reporting
    pub metrics: SeriesMap,
}

impl PluginOutput {
    /// Single-metric output where `score = weight * metric`
    pub fn weighted(name: &str, metrics: Vec<f64>, weight: f64) -> Self {
        let scores = metrics.iter().map(|m| m * weight).collect();
        Self {
            scores: BTreeMap::from([(name.to_string(), scores)]),
            metrics: BTreeMap::from([(name.to_string(), metrics)]),
        }
    }
}

/// What a plugin needs and offers, resolved once at registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginCapabilities {
    pub uses_folding: bool,
    pub uses_base_pairing_probability: bool,
    pub has_annotate: bool,
    pub has_local_eval: bool,
}

impl PluginCapabilities {
    pub fn needs_structure(&self) -> bool {
        self.uses_folding || self.uses_base_pairing_probability
    }
}

/// Facts about the optimized sequence that plugins may need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginContext {
    pub utr5_length: usize,
    pub cds_length: usize,
}

/// Fitness criterion evaluated over a batch of sequences
pub trait ScoringPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Display order in reports, lower first
    fn priority(&self) -> i32;

    fn weight(&self) -> f64;

    fn capabilities(&self) -> PluginCapabilities;

    /// Keep the plugin for annotation even when its weight is zero
    fn annotate_on_zero_weight(&self) -> bool {
        false
    }

    /// Short marker shown in progress logs next to this plugin's metric
    fn penalty_flag(&self) -> Option<&'static str> {
        None
    }

    /// Score a batch. `foldings` is aligned with `seqs` and present for
    /// structure-dependent plugins.
    fn score(&self, seqs: &[String], foldings: Option<&[FoldingResult]>) -> Result<PluginOutput>;

    fn annotate_sequence(&self, _seq: &str, _folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        Ok(BTreeMap::new())
    }

    /// Per-position tracks for single-sequence reports
    fn evaluate_local(&self, _seq: &str, _folding: Option<&FoldingResult>) -> Result<BTreeMap<String, Vec<f64>>> {
        Ok(BTreeMap::new())
    }
}
