use crate::error::{CodonOptError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const STOP: u8 = b'*';
pub const RNA_ALPHABET: &[u8] = b"ACGU";
pub const PROTEIN_ALPHABET: &[u8] = b"ACDEFGHIKLMNPQRSTVWY*";

const BASE_ORDER: &[u8; 4] = b"UCAG";

// NCBI translation tables, codons enumerated in UCAG order
const STANDARD_AAS: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const VERTEBRATE_MITO_AAS: &[u8; 64] =
    b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG";

/// An RNA triplet. Ordering is alphabetical (A < C < G < U).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Codon(pub [u8; 3]);

impl Codon {
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| RNA_ALPHABET.contains(b)) {
            return Err(CodonOptError::Validation(format!("Invalid codon: {:?}", text)));
        }
        Ok(Codon([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from validated ASCII
        std::str::from_utf8(&self.0).unwrap_or("NNN")
    }
}

impl fmt::Display for Codon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Genetic code with synonymous-codon lookups
#[derive(Debug, Clone)]
pub struct CodonTable {
    name: String,
    codon_to_aa: HashMap<Codon, u8>,
    aa_to_codons: BTreeMap<u8, Vec<Codon>>,
    synonyms: HashMap<Codon, Vec<Codon>>,
}

impl CodonTable {
    pub fn by_name(name: &str) -> Result<Self> {
        let aas = match name {
            "standard" => STANDARD_AAS,
            "vertebrate_mitochondrial" => VERTEBRATE_MITO_AAS,
            other => {
                return Err(CodonOptError::Validation(format!(
                    "Invalid codon table name: {}",
                    other
                )))
            }
        };
        Ok(Self::from_amino_acids(name, aas))
    }

    pub fn standard() -> Self {
        Self::from_amino_acids("standard", STANDARD_AAS)
    }

    fn from_amino_acids(name: &str, aas: &[u8; 64]) -> Self {
        let mut codon_to_aa = HashMap::with_capacity(64);
        let mut aa_to_codons: BTreeMap<u8, Vec<Codon>> = BTreeMap::new();

        for (index, &aa) in aas.iter().enumerate() {
            let codon = Codon([
                BASE_ORDER[index / 16],
                BASE_ORDER[(index / 4) % 4],
                BASE_ORDER[index % 4],
            ]);
            codon_to_aa.insert(codon, aa);
            aa_to_codons.entry(aa).or_default().push(codon);
        }

        let mut synonyms = HashMap::with_capacity(64);
        for codons in aa_to_codons.values_mut() {
            codons.sort();
            for &codon in codons.iter() {
                let alternatives: Vec<Codon> =
                    codons.iter().copied().filter(|&c| c != codon).collect();
                synonyms.insert(codon, alternatives);
            }
        }

        Self {
            name: name.to_string(),
            codon_to_aa,
            aa_to_codons,
            synonyms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amino_acid(&self, codon: Codon) -> Option<u8> {
        self.codon_to_aa.get(&codon).copied()
    }

    pub fn is_stop(&self, codon: Codon) -> bool {
        self.amino_acid(codon) == Some(STOP)
    }

    /// Alphabetically ordered synonymous alternatives, excluding `codon` itself
    pub fn synonyms(&self, codon: Codon) -> &[Codon] {
        self.synonyms.get(&codon).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All codons encoding `aa`, alphabetically ordered
    pub fn codons_for(&self, aa: u8) -> Option<&[Codon]> {
        self.aa_to_codons.get(&aa).map(Vec::as_slice)
    }

    pub fn translate(&self, codons: &[Codon]) -> String {
        codons
            .iter()
            .map(|&c| self.amino_acid(c).unwrap_or(b'X') as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codon(s: &str) -> Codon {
        Codon::parse(s).unwrap()
    }

    #[test]
    fn test_standard_table_lookup() {
        let table = CodonTable::standard();
        assert_eq!(table.amino_acid(codon("AUG")), Some(b'M'));
        assert_eq!(table.amino_acid(codon("UGG")), Some(b'W'));
        assert!(table.is_stop(codon("UGA")));
        assert_eq!(table.translate(&[codon("AUG"), codon("AAA"), codon("UAA")]), "MK*");
    }

    #[test]
    fn test_synonyms_sorted_and_exclusive() {
        let table = CodonTable::standard();
        assert!(table.synonyms(codon("AUG")).is_empty());
        assert_eq!(table.synonyms(codon("AAA")), &[codon("AAG")]);
        assert_eq!(table.synonyms(codon("UAA")), &[codon("UAG"), codon("UGA")]);

        let leucine = table.synonyms(codon("CUG"));
        assert_eq!(leucine.len(), 5);
        assert!(leucine.windows(2).all(|w| w[0] < w[1]));
        assert!(!leucine.contains(&codon("CUG")));
    }

    #[test]
    fn test_mitochondrial_differences() {
        let table = CodonTable::by_name("vertebrate_mitochondrial").unwrap();
        assert_eq!(table.amino_acid(codon("UGA")), Some(b'W'));
        assert_eq!(table.amino_acid(codon("AUA")), Some(b'M'));
        assert!(table.is_stop(codon("AGA")));
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(matches!(
            CodonTable::by_name("martian"),
            Err(CodonOptError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_codon_rejected() {
        assert!(Codon::parse("AUX").is_err());
        assert!(Codon::parse("AU").is_err());
    }
}
