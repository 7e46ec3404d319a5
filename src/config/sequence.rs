use super::traits::ConfigSection;
use crate::error::{CodonOptError, Result};
use crate::sequence::{ensure_same_protein, CodonTable, Sequence};
use serde::{Deserialize, Serialize};

/// Input sequence(s) to optimize.
///
/// Exactly one of `cds`, `mrna` or `protein` must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub name: String,
    pub utr5: String,
    pub utr3: String,
    /// One or more founder CDSs encoding the same protein
    pub cds: Vec<String>,
    pub mrna: Option<String>,
    pub protein: Option<String>,
    pub codon_table: String,
    pub preserve_stop: bool,
    pub random_initialization: bool,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            name: "sequence".to_string(),
            utr5: String::new(),
            utr3: String::new(),
            cds: Vec::new(),
            mrna: None,
            protein: None,
            codon_table: "standard".to_string(),
            preserve_stop: false,
            random_initialization: false,
        }
    }
}

impl SequenceConfig {
    pub fn codon_table(&self) -> Result<CodonTable> {
        CodonTable::by_name(&self.codon_table)
    }

    /// Build the founders and check that they share one protein
    pub fn founders(&self, table: &CodonTable) -> Result<Vec<Sequence>> {
        let founders = if let Some(protein) = &self.protein {
            vec![Sequence::from_protein(protein, &self.utr5, &self.utr3, table)?]
        } else if let Some(mrna) = &self.mrna {
            vec![Sequence::from_mrna(mrna, self.preserve_stop)?]
        } else {
            self.cds
                .iter()
                .map(|cds| Sequence::new(&self.utr5, cds, &self.utr3))
                .collect::<Result<Vec<_>>>()?
        };
        ensure_same_protein(&founders, table)?;
        Ok(founders)
    }
}

impl ConfigSection for SequenceConfig {
    fn section_name() -> &'static str {
        "sequence"
    }

    fn validate(&self) -> Result<()> {
        let given = [!self.cds.is_empty(), self.mrna.is_some(), self.protein.is_some()]
            .iter()
            .filter(|&&g| g)
            .count();
        if given != 1 {
            return Err(CodonOptError::Configuration(
                "Exactly one of sequence.cds, sequence.mrna or sequence.protein must be set".to_string(),
            ));
        }
        if self.mrna.is_some() && !(self.utr5.is_empty() && self.utr3.is_empty()) {
            return Err(CodonOptError::Configuration(
                "sequence.utr5/utr3 cannot be combined with sequence.mrna".to_string(),
            ));
        }
        self.codon_table().map(|_| ())
    }
}
