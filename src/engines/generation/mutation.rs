use crate::sequence::{Codon, CodonTable, Sequence};
use crate::types::FoldingResult;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use rand_distr::{Binomial, Distribution};

/// Replace the codon at `position` with its `alternative`-th synonym.
///
/// Synonym lists have the same length for every codon of an amino acid, so the
/// index stays valid after earlier substitutions at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationChoice {
    pub position: usize,
    pub alternative: usize,
}

/// Weight mutations in unpaired codons from `start` onward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopBoost {
    pub weight: f64,
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationSpace {
    pub singles: usize,
    pub total: String,
}

pub struct MutationEngine {
    table: CodonTable,
    choices: Vec<MutationChoice>,
    alternatives_per_position: Vec<usize>,
    preserve_stop: bool,
    loop_boost: Option<LoopBoost>,
}

impl MutationEngine {
    pub fn new(
        founder: &Sequence,
        table: CodonTable,
        preserve_stop: bool,
        loop_boost: Option<LoopBoost>,
    ) -> Self {
        let mut choices = Vec::new();
        let mut alternatives_per_position = Vec::with_capacity(founder.codon_count());

        for (position, &codon) in founder.codons().iter().enumerate() {
            let alternatives = if preserve_stop && table.is_stop(codon) {
                0
            } else {
                table.synonyms(codon).len()
            };
            choices.extend((0..alternatives).map(|alternative| MutationChoice {
                position,
                alternative,
            }));
            alternatives_per_position.push(alternatives);
        }

        Self {
            table,
            choices,
            alternatives_per_position,
            preserve_stop,
            loop_boost: loop_boost.filter(|b| b.weight != 0.0),
        }
    }

    pub fn table(&self) -> &CodonTable {
        &self.table
    }

    pub fn choices(&self) -> &[MutationChoice] {
        &self.choices
    }

    /// Choices restricted to codon positions `[0, width)`
    pub fn choices_within(&self, width: usize) -> Vec<MutationChoice> {
        self.choices
            .iter()
            .copied()
            .filter(|c| c.position < width)
            .collect()
    }

    /// Draw a child with `clamp(Binomial(|choices|, rate), 1, |choices|)` distinct
    /// substitutions. With a parent folding and loop boosting enabled, choices in
    /// unpaired codons are drawn `weight` times more often.
    pub fn generate_mutant<R: Rng>(
        &self,
        parent: &Sequence,
        mutation_rate: f64,
        subset: Option<&[MutationChoice]>,
        folding: Option<&FoldingResult>,
        rng: &mut R,
    ) -> Sequence {
        let choices = subset.unwrap_or(&self.choices);
        if choices.is_empty() {
            return parent.clone();
        }

        let drawn = Binomial::new(choices.len() as u64, mutation_rate.clamp(0.0, 1.0))
            .map(|b| b.sample(rng) as usize)
            .unwrap_or(0);
        let n_mutations = drawn.clamp(1, choices.len());

        let picked: Vec<usize> = match (self.loop_boost, folding) {
            (Some(boost), Some(folding)) => {
                let unpaired = self.unpaired_codons(parent, Some(folding));
                let weights: Vec<f64> = choices
                    .iter()
                    .map(|c| {
                        if unpaired[c.position] && c.position >= boost.start {
                            boost.weight
                        } else {
                            1.0
                        }
                    })
                    .collect();
                match index::sample_weighted(rng, choices.len(), |i| weights[i], n_mutations) {
                    Ok(sampled) => sampled.into_vec(),
                    Err(_) => index::sample(rng, choices.len(), n_mutations).into_vec(),
                }
            }
            _ => index::sample(rng, choices.len(), n_mutations).into_vec(),
        };

        self.apply(parent, picked.into_iter().map(|i| choices[i]))
    }

    /// Every single substitution at a currently unpaired codon, one child each.
    /// Without a folding every codon counts as unpaired. Call again to restart.
    pub fn traverse_all_single_mutations<'a>(
        &'a self,
        parent: &'a Sequence,
        folding: Option<&FoldingResult>,
    ) -> impl Iterator<Item = Sequence> + 'a {
        let unpaired = self.unpaired_codons(parent, folding);
        self.choices
            .iter()
            .filter(move |c| unpaired[c.position])
            .map(move |&c| self.apply(parent, std::iter::once(c)))
    }

    pub fn compute_expected_mutations(&self, mutation_rate: f64) -> f64 {
        self.choices.len() as f64 * mutation_rate
    }

    /// Number of single substitutions and of reachable sequences, the latter
    /// summed in log10 space and rendered as `m.mm x 10^e`
    pub fn compute_mutation_space(&self) -> MutationSpace {
        let log10_total: f64 = self
            .alternatives_per_position
            .iter()
            .map(|&alts| ((alts + 1) as f64).log10())
            .sum();
        let exponent = log10_total.floor();
        let mantissa = 10f64.powf(log10_total - exponent);

        MutationSpace {
            singles: self.choices.len(),
            total: format!("{:.2} x 10^{}", mantissa, exponent as i64),
        }
    }

    /// Replace every codon with a uniform draw from its synonymous family
    pub fn randomize<R: Rng>(&self, seq: &Sequence, rng: &mut R) -> Sequence {
        let edits: Vec<(usize, Codon)> = seq
            .codons()
            .iter()
            .enumerate()
            .filter(|(_, &codon)| !(self.preserve_stop && self.table.is_stop(codon)))
            .filter_map(|(position, &codon)| {
                let mut family = vec![codon];
                family.extend_from_slice(self.table.synonyms(codon));
                family.choose(rng).map(|&picked| (position, picked))
            })
            .collect();
        seq.with_substitutions(edits)
    }

    fn apply<I>(&self, parent: &Sequence, choices: I) -> Sequence
    where
        I: IntoIterator<Item = MutationChoice>,
    {
        let mut codons = parent.codons().to_vec();
        for choice in choices {
            let current = codons[choice.position];
            if let Some(&alt) = self.table.synonyms(current).get(choice.alternative) {
                codons[choice.position] = alt;
            }
        }
        parent.with_substitutions(codons.into_iter().enumerate())
    }

    /// A codon is unpaired when any of its nucleotides is unpaired
    fn unpaired_codons(&self, parent: &Sequence, folding: Option<&FoldingResult>) -> Vec<bool> {
        (0..parent.codon_count())
            .map(|position| match folding {
                None => true,
                Some(folding) => {
                    let offset = parent.codon_offset(position);
                    (offset..offset + 3).any(|i| folding.is_unpaired(i))
                }
            })
            .collect()
    }
}
