use crate::config::PluginSettings;
use crate::functions::traits::{PluginCapabilities, PluginContext, PluginOutput, ScoringPlugin};
use crate::types::FoldingResult;
use anyhow::Result;
use std::collections::BTreeMap;

// --- U count (uridine fraction of the whole mRNA) ---
pub struct UridineContent {
    weight: f64,
}

impl UridineContent {
    pub const NAME: &'static str = "ucount";

    pub fn from_settings(settings: &PluginSettings, _ctx: &PluginContext) -> Result<Self> {
        Ok(Self {
            weight: settings.weight_or(-3.0),
        })
    }

    fn uridine_fraction(seq: &str) -> f64 {
        if seq.is_empty() {
            return 0.0;
        }
        seq.bytes().filter(|&b| b == b'U').count() as f64 / seq.len() as f64
    }
}

impl ScoringPlugin for UridineContent {
    fn name(&self) -> &'static str { Self::NAME }
    fn description(&self) -> &'static str { "Uridine content" }
    fn priority(&self) -> i32 { 10 }
    fn weight(&self) -> f64 { self.weight }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            has_annotate: true,
            ..PluginCapabilities::default()
        }
    }

    fn score(&self, seqs: &[String], _foldings: Option<&[FoldingResult]>) -> Result<PluginOutput> {
        let fractions = seqs.iter().map(|s| Self::uridine_fraction(s)).collect();
        Ok(PluginOutput::weighted(Self::NAME, fractions, self.weight))
    }

    fn annotate_sequence(&self, seq: &str, _folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        Ok(BTreeMap::from([(Self::NAME.to_string(), Self::uridine_fraction(seq))]))
    }
}
