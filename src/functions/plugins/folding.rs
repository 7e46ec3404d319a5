use super::require_foldings;
use crate::config::PluginSettings;
use crate::functions::traits::{PluginCapabilities, PluginContext, PluginOutput, ScoringPlugin};
use crate::types::FoldingResult;
use anyhow::{bail, Result};
use std::collections::BTreeMap;

// --- MFE (minimum free energy per CDS nucleotide) ---
pub struct MinimumFreeEnergy {
    weight: f64,
    cds_length: usize,
}

impl MinimumFreeEnergy {
    pub const NAME: &'static str = "mfe";

    pub fn from_settings(settings: &PluginSettings, ctx: &PluginContext) -> Result<Self> {
        if ctx.cds_length == 0 {
            bail!("mfe: CDS length must be positive");
        }
        Ok(Self {
            weight: settings.weight_or(3.0),
            cds_length: ctx.cds_length,
        })
    }

    /// More stable structures score higher
    fn scaled(&self) -> f64 {
        -self.weight / self.cds_length as f64
    }
}

impl ScoringPlugin for MinimumFreeEnergy {
    fn name(&self) -> &'static str { Self::NAME }
    fn description(&self) -> &'static str { "Minimum free energy" }
    fn priority(&self) -> i32 { 41 }
    fn weight(&self) -> f64 { self.weight }
    fn annotate_on_zero_weight(&self) -> bool { true }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            uses_folding: true,
            uses_base_pairing_probability: false,
            has_annotate: true,
            has_local_eval: false,
        }
    }

    fn score(&self, seqs: &[String], foldings: Option<&[FoldingResult]>) -> Result<PluginOutput> {
        let foldings = require_foldings(Self::NAME, foldings, seqs.len())?;
        let energies = foldings.iter().map(|f| f.free_energy).collect();
        Ok(PluginOutput::weighted(Self::NAME, energies, self.scaled()))
    }

    fn annotate_sequence(&self, _seq: &str, folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        let Some(folding) = folding else {
            bail!("mfe: no folding available");
        };
        Ok(BTreeMap::from([(Self::NAME.to_string(), folding.free_energy)]))
    }
}

// --- Start codon structure (paired bases right after the 5' UTR) ---
pub struct StartCodonStructure {
    weight: f64,
    width: usize,
    start_at: usize,
}

impl StartCodonStructure {
    pub const NAME: &'static str = "start_str";

    pub fn from_settings(settings: &PluginSettings, ctx: &PluginContext) -> Result<Self> {
        Ok(Self {
            weight: settings.weight_or(1.0),
            width: settings.usize_or("width", 15)?,
            start_at: ctx.utr5_length,
        })
    }

    fn folded_bases(&self, folding: &FoldingResult) -> f64 {
        folding
            .structure
            .bytes()
            .skip(self.start_at)
            .take(self.width)
            .filter(|&b| b == b'(' || b == b')')
            .count() as f64
    }
}

impl ScoringPlugin for StartCodonStructure {
    fn name(&self) -> &'static str { Self::NAME }
    fn description(&self) -> &'static str { "RNA folding near the start codon" }
    fn priority(&self) -> i32 { 42 }
    fn weight(&self) -> f64 { self.weight }

    fn penalty_flag(&self) -> Option<&'static str> {
        if self.weight != 0.0 { Some("s") } else { None }
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            uses_folding: true,
            uses_base_pairing_probability: true,
            has_annotate: true,
            has_local_eval: false,
        }
    }

    fn score(&self, seqs: &[String], foldings: Option<&[FoldingResult]>) -> Result<PluginOutput> {
        let foldings = require_foldings(Self::NAME, foldings, seqs.len())?;
        let folded = foldings.iter().map(|f| self.folded_bases(f)).collect();
        Ok(PluginOutput::weighted(Self::NAME, folded, -self.weight))
    }

    fn annotate_sequence(&self, _seq: &str, folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        let Some(folding) = folding else {
            bail!("start_str: no folding available");
        };
        Ok(BTreeMap::from([(Self::NAME.to_string(), self.folded_bases(folding))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folding(structure: &str, free_energy: f64) -> FoldingResult {
        FoldingResult {
            structure: structure.to_string(),
            free_energy,
            stems: Vec::new(),
            loops: BTreeMap::new(),
            pairing: None,
            region_penalty: None,
        }
    }

    fn ctx(utr5_length: usize, cds_length: usize) -> PluginContext {
        PluginContext { utr5_length, cds_length }
    }

    #[test]
    fn test_mfe_score_scales_by_cds_length() {
        let plugin = MinimumFreeEnergy::from_settings(&PluginSettings::default(), &ctx(0, 30)).unwrap();
        let seqs = vec!["A".repeat(30), "C".repeat(30)];
        let foldings = vec![folding("", -15.0), folding("", 0.0)];

        let out = plugin.score(&seqs, Some(foldings.as_slice())).unwrap();
        assert_eq!(out.metrics["mfe"], vec![-15.0, 0.0]);
        assert!((out.scores["mfe"][0] - 1.5).abs() < 1e-12);
        assert_eq!(out.scores["mfe"][1], 0.0);
    }

    #[test]
    fn test_mfe_requires_foldings() {
        let plugin = MinimumFreeEnergy::from_settings(&PluginSettings::default(), &ctx(0, 3)).unwrap();
        assert!(plugin.score(&["AUG".to_string()], None).is_err());
    }

    #[test]
    fn test_start_structure_counts_after_utr5() {
        let mut settings = PluginSettings::default();
        settings.weight = Some(2.0);
        settings.options.insert("width".to_string(), serde_json::json!(4));
        let plugin = StartCodonStructure::from_settings(&settings, &ctx(2, 9)).unwrap();

        // Window covers positions 2..6: "((.." has two folded bases
        let foldings = vec![folding("((((...))))", -1.0)];
        let out = plugin.score(&["GGAUGAAAUAA".to_string()], Some(foldings.as_slice())).unwrap();
        assert_eq!(out.metrics["start_str"], vec![2.0]);
        assert_eq!(out.scores["start_str"], vec![-4.0]);
        assert_eq!(plugin.penalty_flag(), Some("s"));
    }
}
