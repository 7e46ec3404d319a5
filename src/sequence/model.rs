use super::codon_table::{Codon, CodonTable, PROTEIN_ALPHABET, RNA_ALPHABET, STOP};
use crate::error::{CodonOptError, Result};

const STOP_CODONS: [&str; 3] = ["UAA", "UAG", "UGA"];
const POLY_A_SIGNAL: &str = "AAAAAAAA";

/// Uppercase, convert T to U and reject anything outside ACGU
pub fn normalize_rna(text: &str) -> Result<String> {
    let normalized: String = text
        .trim()
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'T' => 'U',
            other => other,
        })
        .collect();

    let mut invalid: Vec<char> = normalized
        .bytes()
        .filter(|b| !RNA_ALPHABET.contains(b))
        .map(|b| b as char)
        .collect();
    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        return Err(CodonOptError::Validation(format!(
            "Invalid RNA sequence: {}",
            invalid.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
        )));
    }
    Ok(normalized)
}

/// UTR5 + codon-aligned CDS + UTR3.
///
/// Never modified after construction; `with_substitutions` returns a fresh copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    utr5: String,
    codons: Vec<Codon>,
    utr3: String,
}

impl Sequence {
    pub fn new(utr5: &str, cds: &str, utr3: &str) -> Result<Self> {
        let utr5 = normalize_rna(utr5)?;
        let cds = normalize_rna(cds)?;
        let utr3 = normalize_rna(utr3)?;

        if cds.is_empty() || cds.len() % 3 != 0 {
            return Err(CodonOptError::Validation(format!(
                "Invalid CDS sequence length: {} is not a positive multiple of 3",
                cds.len()
            )));
        }

        let codons = cds
            .as_bytes()
            .chunks(3)
            .map(|chunk| Codon([chunk[0], chunk[1], chunk[2]]))
            .collect();

        Ok(Self { utr5, codons, utr3 })
    }

    /// Locate the CDS inside a full mRNA.
    ///
    /// The start is the first AUG with a purine at -3, falling back to the first
    /// AUG. The frame runs to the first in-frame stop, which stays in the CDS
    /// unless `preserve_stop` is set (then it moves into the 3' UTR).
    pub fn from_mrna(raw: &str, preserve_stop: bool) -> Result<Self> {
        let raw = normalize_rna(raw)?;
        let first = raw
            .find("AUG")
            .ok_or_else(|| CodonOptError::Validation("CDS start not found in sequence".to_string()))?;

        let bytes = raw.as_bytes();
        let mut start = first;
        loop {
            if start >= 3 && matches!(bytes[start - 3], b'A' | b'G') {
                break;
            }
            match raw[start + 1..].find("AUG") {
                Some(offset) => start = start + 1 + offset,
                None => {
                    start = first;
                    break;
                }
            }
        }

        let frame: Vec<&str> = (start..raw.len().saturating_sub(2))
            .step_by(3)
            .map(|i| &raw[i..i + 3])
            .collect();
        let stop_index = frame.iter().position(|codon| STOP_CODONS.contains(codon));

        let n_codons = match stop_index {
            Some(idx) if preserve_stop => idx,
            Some(idx) => idx + 1,
            None => frame.len(),
        };

        let cds_end = start + 3 * n_codons;
        Self::new(&raw[..start], &raw[start..cds_end], &raw[cds_end..])
    }

    /// Back-translate a protein using the alphabetically first codon of each
    /// residue. A trailing stop is appended when missing.
    pub fn from_protein(protein: &str, utr5: &str, utr3: &str, table: &CodonTable) -> Result<Self> {
        let mut protein = protein.trim().to_ascii_uppercase();
        let mut invalid: Vec<char> = protein
            .bytes()
            .filter(|b| !PROTEIN_ALPHABET.contains(b))
            .map(|b| b as char)
            .collect();
        if !invalid.is_empty() {
            invalid.sort_unstable();
            invalid.dedup();
            return Err(CodonOptError::Validation(format!(
                "Invalid protein sequence: {}",
                invalid.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
            )));
        }
        if !protein.ends_with(STOP as char) {
            protein.push(STOP as char);
        }

        let mut cds = String::with_capacity(protein.len() * 3);
        for aa in protein.bytes() {
            let codon = table
                .codons_for(aa)
                .and_then(|codons| codons.first())
                .ok_or_else(|| {
                    CodonOptError::Validation(format!(
                        "Amino acid {} has no codon in table {}",
                        aa as char,
                        table.name()
                    ))
                })?;
            cds.push_str(codon.as_str());
        }

        Self::new(utr5, &cds, utr3)
    }

    pub fn utr5(&self) -> &str {
        &self.utr5
    }

    pub fn utr3(&self) -> &str {
        &self.utr3
    }

    pub fn codons(&self) -> &[Codon] {
        &self.codons
    }

    pub fn codon_count(&self) -> usize {
        self.codons.len()
    }

    pub fn cds_len(&self) -> usize {
        self.codons.len() * 3
    }

    pub fn len(&self) -> usize {
        self.utr5.len() + self.cds_len() + self.utr3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cds(&self) -> String {
        self.codons.iter().map(Codon::as_str).collect()
    }

    /// Flattened nucleotide string, the folding and scoring input
    pub fn to_rna(&self) -> String {
        let mut out = String::with_capacity(self.len());
        out.push_str(&self.utr5);
        for codon in &self.codons {
            out.push_str(codon.as_str());
        }
        out.push_str(&self.utr3);
        out
    }

    /// Nucleotide offset of codon `position` in the flattened sequence
    pub fn codon_offset(&self, position: usize) -> usize {
        self.utr5.len() + position * 3
    }

    pub fn translate(&self, table: &CodonTable) -> String {
        table.translate(&self.codons)
    }

    /// Copy with codon replacements applied
    pub fn with_substitutions<I>(&self, edits: I) -> Sequence
    where
        I: IntoIterator<Item = (usize, Codon)>,
    {
        let mut child = self.clone();
        for (position, codon) in edits {
            child.codons[position] = codon;
        }
        child
    }

    /// Length of the 3' UTR tail starting at the first poly(A) run, or 0
    pub fn poly_a_tail_len(&self) -> usize {
        match self.utr3.find(POLY_A_SIGNAL) {
            Some(idx) => self.utr3.len() - idx,
            None => 0,
        }
    }
}

/// Check that every founder encodes the same protein
pub fn ensure_same_protein(founders: &[Sequence], table: &CodonTable) -> Result<String> {
    let first = founders
        .first()
        .ok_or_else(|| CodonOptError::Validation("No input sequence given".to_string()))?;
    let protein = first.translate(table);

    for seq in &founders[1..] {
        let other = seq.translate(table);
        if other != protein {
            return Err(CodonOptError::Validation(format!(
                "The sequences must have the same protein sequence: {} vs {}",
                protein, other
            )));
        }
    }
    Ok(protein)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_dna() {
        let seq = Sequence::new("gcc", "atgaaataa", "AAA").unwrap();
        assert_eq!(seq.utr5(), "GCC");
        assert_eq!(seq.cds(), "AUGAAAUAA");
        assert_eq!(seq.to_rna(), "GCCAUGAAAUAAAAA");
        assert_eq!(seq.codon_count(), 3);
        assert_eq!(seq.codon_offset(1), 6);
    }

    #[test]
    fn test_new_rejects_bad_cds() {
        assert!(matches!(
            Sequence::new("", "AUGAA", ""),
            Err(CodonOptError::Validation(_))
        ));
        assert!(matches!(
            Sequence::new("", "AUGNNN", ""),
            Err(CodonOptError::Validation(_))
        ));
    }

    #[test]
    fn test_from_mrna_finds_kozak_start() {
        // First AUG (index 1) lacks a purine at -3; the one at index 9 has G at 6
        let seq = Sequence::from_mrna("CAUGCCGCCAUGAAAUAAGCAAAA", false).unwrap();
        assert_eq!(seq.utr5(), "CAUGCCGCC");
        assert_eq!(seq.cds(), "AUGAAAUAA");
        assert_eq!(seq.utr3(), "GCAAAA");

        let kept = Sequence::from_mrna("CAUGCCGCCAUGAAAUAAGCAAAA", true).unwrap();
        assert_eq!(kept.cds(), "AUGAAA");
        assert_eq!(kept.utr3(), "UAAGCAAAA");
    }

    #[test]
    fn test_from_protein_appends_stop() {
        let table = CodonTable::standard();
        let seq = Sequence::from_protein("MK", "", "", &table).unwrap();
        assert_eq!(seq.translate(&table), "MK*");
        assert_eq!(seq.cds(), "AUGAAAUAA");
        assert!(Sequence::from_protein("MKB", "", "", &table).is_err());
    }

    #[test]
    fn test_with_substitutions_leaves_parent() {
        let parent = Sequence::new("", "AUGAAAUAA", "").unwrap();
        let child = parent.with_substitutions([(1, Codon::parse("AAG").unwrap())]);
        assert_eq!(parent.cds(), "AUGAAAUAA");
        assert_eq!(child.cds(), "AUGAAGUAA");
    }

    #[test]
    fn test_poly_a_tail() {
        let seq = Sequence::new("", "AUG", "GCAAAAAAAAAA").unwrap();
        assert_eq!(seq.poly_a_tail_len(), 10);
        let none = Sequence::new("", "AUG", "GC").unwrap();
        assert_eq!(none.poly_a_tail_len(), 0);
    }

    #[test]
    fn test_protein_mismatch_detected() {
        let table = CodonTable::standard();
        let a = Sequence::new("", "AUGAAAUAA", "").unwrap();
        let b = Sequence::new("", "AUGAAGUAG", "").unwrap();
        let c = Sequence::new("", "AUGGGGUAA", "").unwrap();
        assert_eq!(ensure_same_protein(&[a.clone(), b], &table).unwrap(), "MK*");
        assert!(ensure_same_protein(&[a, c], &table).is_err());
    }
}
