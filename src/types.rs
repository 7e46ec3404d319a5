use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base pair with its ensemble probability. Positions are 0-based, `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePairProbability {
    pub i: usize,
    pub j: usize,
    pub probability: f64,
}

/// Folding engine output before post-processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFolding {
    pub structure: String,
    pub free_energy: f64,
    pub base_pairs: Option<Vec<BasePairProbability>>, // present for partition results
}

/// Contiguous run of nested base pairs.
///
/// `five_prime[k]` pairs with `three_prime[k]`; the first entry is the
/// innermost pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stem {
    pub five_prime: Vec<usize>,
    pub three_prime: Vec<usize>,
}

impl Stem {
    pub fn len(&self) -> usize {
        self.five_prime.len()
    }

    pub fn is_empty(&self) -> bool {
        self.five_prime.is_empty()
    }
}

/// Base-pairing probabilities of one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingProbabilities {
    pub pairs: Vec<BasePairProbability>,
    /// Probability that each position is paired with anything
    pub paired: Vec<f64>,
}

impl PairingProbabilities {
    pub fn from_pairs(pairs: Vec<BasePairProbability>, length: usize) -> Self {
        let mut paired = vec![0.0; length];
        for bp in &pairs {
            if bp.i < length {
                paired[bp.i] += bp.probability;
            }
            if bp.j < length {
                paired[bp.j] += bp.probability;
            }
        }
        Self { pairs, paired }
    }

    pub fn unpaired(&self, position: usize) -> f64 {
        1.0 - self.paired.get(position).copied().unwrap_or(0.0)
    }
}

/// Post-processed folding of one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldingResult {
    /// Dot-bracket structure with lone pairs opened
    pub structure: String,
    pub free_energy: f64,
    pub stems: Vec<Stem>,
    /// Unpaired run length -> number of runs
    pub loops: BTreeMap<usize, usize>,
    pub pairing: Option<PairingProbabilities>,
    pub region_penalty: Option<f64>,
}

impl FoldingResult {
    /// Merge an MFE result with a partition result of the same sequence.
    /// MFE fields win; the partition result fills whatever the MFE result lacks.
    pub fn merge(mfe: Option<&FoldingResult>, partition: &FoldingResult) -> FoldingResult {
        match mfe {
            None => partition.clone(),
            Some(mfe) => {
                let mut merged = mfe.clone();
                if merged.pairing.is_none() {
                    merged.pairing = partition.pairing.clone();
                }
                if merged.region_penalty.is_none() {
                    merged.region_penalty = partition.region_penalty;
                }
                merged
            }
        }
    }

    pub fn is_unpaired(&self, position: usize) -> bool {
        self.structure.as_bytes().get(position) == Some(&b'.')
    }
}

/// Per-sequence outcome of one evaluation round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Weighted contributions that make up the fitness
    pub scores: BTreeMap<String, f64>,
    /// Raw values, informational only
    pub metrics: BTreeMap<String, f64>,
    pub region_penalty: f64,
}

impl ScoreRecord {
    pub fn total(&self) -> f64 {
        self.scores.values().sum::<f64>() - self.region_penalty
    }
}
