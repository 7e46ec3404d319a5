use crate::error::{CodonOptError, Result};
use crate::types::{FoldingResult, PairingProbabilities, RawFolding, Stem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protected window `[start, end]` (0-based, inclusive, over the full mRNA)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionPenalty {
    pub start: usize,
    pub end: usize,
    pub weight: f64,
}

impl RegionPenalty {
    fn contains(&self, position: usize) -> bool {
        position >= self.start && position <= self.end
    }

    /// `weight * Σ` over pairs of +1 when one end lies inside, -1 when both do
    pub fn evaluate<I>(&self, pairs: I) -> f64
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let balance: i64 = pairs
            .into_iter()
            .map(|(i, j)| match (self.contains(i), self.contains(j)) {
                (true, true) => -1,
                (true, false) | (false, true) => 1,
                (false, false) => 0,
            })
            .sum();
        self.weight * balance as f64
    }
}

/// Group the pairs of a dot-bracket string into stems of stacked pairs
pub fn find_stems(structure: &str) -> Result<Vec<Stem>> {
    let mut stack = Vec::new();
    let mut stems: Vec<Stem> = Vec::new();

    for (i, symbol) in structure.bytes().enumerate() {
        match symbol {
            b'(' => stack.push(i),
            b')' => {
                let peer = stack.pop().ok_or_else(|| {
                    CodonOptError::Folding(format!("Unbalanced structure at position {}", i))
                })?;
                let extends = stems.last().map_or(false, |stem| {
                    stem.five_prime.last() == Some(&(peer + 1))
                        && stem.three_prime.last().map(|&p| p + 1) == Some(i)
                });
                match stems.last_mut() {
                    Some(stem) if extends => {
                        stem.five_prime.push(peer);
                        stem.three_prime.push(i);
                    }
                    _ => stems.push(Stem {
                        five_prime: vec![peer],
                        three_prime: vec![i],
                    }),
                }
            }
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(CodonOptError::Folding(format!(
            "Unbalanced structure: position {} is never closed",
            open
        )));
    }
    Ok(stems)
}

/// Open every single-pair stem
pub fn unfold_lone_pairs(structure: &str, stems: Vec<Stem>) -> (String, Vec<Stem>) {
    let (lone, kept): (Vec<Stem>, Vec<Stem>) = stems.into_iter().partition(|s| s.len() == 1);
    if lone.is_empty() {
        return (structure.to_string(), kept);
    }

    let mut bytes = structure.as_bytes().to_vec();
    for stem in &lone {
        bytes[stem.five_prime[0]] = b'.';
        bytes[stem.three_prime[0]] = b'.';
    }
    (String::from_utf8_lossy(&bytes).into_owned(), kept)
}

/// Histogram of unpaired runs at least two nucleotides long
pub fn loop_histogram(structure: &str) -> BTreeMap<usize, usize> {
    let mut loops = BTreeMap::new();
    for run in structure.split(|c| c != '.') {
        if run.len() >= 2 {
            *loops.entry(run.len()).or_insert(0) += 1;
        }
    }
    loops
}

/// Turns raw engine output into a `FoldingResult`
#[derive(Debug, Clone, Default)]
pub struct StructureProcessor {
    penalty: Option<RegionPenalty>,
}

impl StructureProcessor {
    pub fn new(penalty: Option<RegionPenalty>) -> Self {
        Self { penalty }
    }

    pub fn process(&self, raw: RawFolding) -> Result<FoldingResult> {
        let stems = find_stems(&raw.structure)?;
        let (structure, stems) = unfold_lone_pairs(&raw.structure, stems);
        let loops = loop_histogram(&structure);

        let region_penalty = self.penalty.map(|region| {
            region.evaluate(stems.iter().flat_map(|stem| {
                stem.five_prime
                    .iter()
                    .copied()
                    .zip(stem.three_prime.iter().copied())
            }))
        });
        let pairing = raw
            .base_pairs
            .map(|pairs| PairingProbabilities::from_pairs(pairs, structure.len()));

        Ok(FoldingResult {
            structure,
            free_energy: raw.free_energy,
            stems,
            loops,
            pairing,
            region_penalty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasePairProbability;

    fn raw(structure: &str) -> RawFolding {
        RawFolding {
            structure: structure.to_string(),
            free_energy: -4.2,
            base_pairs: None,
        }
    }

    #[test]
    fn test_find_stems_groups_stacked_pairs() {
        let stems = find_stems("((...))..(...)").unwrap();
        assert_eq!(stems.len(), 2);
        assert_eq!(stems[0].five_prime, vec![1, 0]);
        assert_eq!(stems[0].three_prime, vec![5, 6]);
        assert_eq!(stems[1].five_prime, vec![9]);
        assert_eq!(stems[1].three_prime, vec![13]);
    }

    #[test]
    fn test_find_stems_rejects_unbalanced() {
        assert!(find_stems("(()").is_err());
        assert!(find_stems("())").is_err());
    }

    #[test]
    fn test_lone_pairs_are_opened() {
        let processor = StructureProcessor::default();
        let result = processor.process(raw("((...))..(...)")).unwrap();
        assert_eq!(result.structure, "((...)).......");
        assert_eq!(result.stems.len(), 1);
        assert_eq!(result.free_energy, -4.2);
        assert!(result.pairing.is_none());
    }

    #[test]
    fn test_loop_histogram_skips_single_gaps() {
        let loops = loop_histogram("..((.((...))..))....");
        assert_eq!(loops.get(&2), Some(&2));
        assert_eq!(loops.get(&3), Some(&1));
        assert_eq!(loops.get(&4), Some(&1));
        assert_eq!(loops.get(&1), None);
    }

    #[test]
    fn test_region_penalty_signs() {
        let region = RegionPenalty { start: 0, end: 4, weight: 2.0 };
        assert_eq!(region.evaluate([(1, 3)]), -2.0);
        assert_eq!(region.evaluate([(2, 10)]), 2.0);
        assert_eq!(region.evaluate([(6, 10)]), 0.0);
        assert_eq!(region.evaluate([(1, 3), (2, 10), (6, 10)]), 0.0);
    }

    #[test]
    fn test_processor_applies_penalty_and_pairing() {
        let processor = StructureProcessor::new(Some(RegionPenalty {
            start: 0,
            end: 2,
            weight: 1.5,
        }));
        let mut folding = raw("((...))");
        folding.base_pairs = Some(vec![BasePairProbability { i: 0, j: 6, probability: 0.8 }]);

        let result = processor.process(folding).unwrap();
        // Both pairs have exactly one end inside [0, 2]
        assert_eq!(result.region_penalty, Some(3.0));
        let pairing = result.pairing.unwrap();
        assert!((pairing.unpaired(0) - 0.2).abs() < 1e-12);
        assert_eq!(pairing.unpaired(3), 1.0);
    }
}
