use super::{require_foldings, require_pairing};
use crate::config::PluginSettings;
use crate::functions::traits::{PluginCapabilities, PluginContext, PluginOutput, ScoringPlugin};
use crate::types::{FoldingResult, PairingProbabilities};
use anyhow::Result;
use std::collections::BTreeMap;

const PAIRING_CAPABILITIES: PluginCapabilities = PluginCapabilities {
    uses_folding: false,
    uses_base_pairing_probability: true,
    has_annotate: true,
    has_local_eval: false,
};

// --- AUP (average unpaired probability, A and U weighted up) ---
pub struct AverageUnpairedProbability {
    weight: f64,
    a_weight: f64,
    u_weight: f64,
}

impl AverageUnpairedProbability {
    pub const NAME: &'static str = "aup";

    pub fn from_settings(settings: &PluginSettings, _ctx: &PluginContext) -> Result<Self> {
        Ok(Self {
            weight: settings.weight_or(-5.0),
            a_weight: settings.f64_or("a_weight", 1.5)?,
            u_weight: settings.f64_or("u_weight", 3.0)?,
        })
    }

    fn base_weight(&self, base: u8) -> f64 {
        match base {
            b'A' => self.a_weight,
            b'U' => self.u_weight,
            _ => 1.0,
        }
    }

    fn weighted_aup(&self, seq: &str, pairing: &PairingProbabilities) -> f64 {
        let (numerator, denominator) = seq
            .bytes()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, base)| {
                let w = self.base_weight(base);
                (num + w * pairing.unpaired(i), den + w)
            });
        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }
}

impl ScoringPlugin for AverageUnpairedProbability {
    fn name(&self) -> &'static str { Self::NAME }
    fn description(&self) -> &'static str { "Average unpaired probability" }
    fn priority(&self) -> i32 { 101 }
    fn weight(&self) -> f64 { self.weight }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            has_local_eval: true,
            ..PAIRING_CAPABILITIES
        }
    }

    fn score(&self, seqs: &[String], foldings: Option<&[FoldingResult]>) -> Result<PluginOutput> {
        let foldings = require_foldings(Self::NAME, foldings, seqs.len())?;
        let values = seqs
            .iter()
            .zip(foldings)
            .map(|(seq, folding)| Ok(self.weighted_aup(seq, require_pairing(Self::NAME, Some(folding))?)))
            .collect::<Result<Vec<f64>>>()?;
        Ok(PluginOutput::weighted(Self::NAME, values, self.weight))
    }

    fn annotate_sequence(&self, seq: &str, folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        let pairing = require_pairing(Self::NAME, folding)?;
        Ok(BTreeMap::from([(Self::NAME.to_string(), self.weighted_aup(seq, pairing))]))
    }

    fn evaluate_local(&self, seq: &str, folding: Option<&FoldingResult>) -> Result<BTreeMap<String, Vec<f64>>> {
        let pairing = require_pairing(Self::NAME, folding)?;
        let track = (0..seq.len()).map(|i| pairing.unpaired(i)).collect();
        Ok(BTreeMap::from([("unpaired".to_string(), track)]))
    }
}

// --- Unpaired uridines (expected number of unpaired U) ---
pub struct UnpairedUridine {
    weight: f64,
}

impl UnpairedUridine {
    pub const NAME: &'static str = "unpaired_u";

    pub fn from_settings(settings: &PluginSettings, _ctx: &PluginContext) -> Result<Self> {
        Ok(Self {
            weight: settings.weight_or(-3.0),
        })
    }

    fn unpaired_uridines(seq: &str, pairing: &PairingProbabilities) -> f64 {
        seq.bytes()
            .enumerate()
            .filter(|&(_, base)| base == b'U')
            .map(|(i, _)| pairing.unpaired(i))
            .sum()
    }
}

impl ScoringPlugin for UnpairedUridine {
    fn name(&self) -> &'static str { Self::NAME }
    fn description(&self) -> &'static str { "Unpaired uridine count" }
    fn priority(&self) -> i32 { 102 }
    fn weight(&self) -> f64 { self.weight }
    fn capabilities(&self) -> PluginCapabilities { PAIRING_CAPABILITIES }

    fn score(&self, seqs: &[String], foldings: Option<&[FoldingResult]>) -> Result<PluginOutput> {
        let foldings = require_foldings(Self::NAME, foldings, seqs.len())?;
        let values = seqs
            .iter()
            .zip(foldings)
            .map(|(seq, folding)| {
                Ok(Self::unpaired_uridines(seq, require_pairing(Self::NAME, Some(folding))?))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(PluginOutput::weighted(Self::NAME, values, self.weight))
    }

    fn annotate_sequence(&self, seq: &str, folding: Option<&FoldingResult>) -> Result<BTreeMap<String, f64>> {
        let pairing = require_pairing(Self::NAME, folding)?;
        Ok(BTreeMap::from([(Self::NAME.to_string(), Self::unpaired_uridines(seq, pairing))]))
    }
}
