pub mod composition;
pub mod folding;
pub mod pairing;

pub use composition::UridineContent;
pub use folding::{MinimumFreeEnergy, StartCodonStructure};
pub use pairing::{AverageUnpairedProbability, UnpairedUridine};

use crate::types::{FoldingResult, PairingProbabilities};
use anyhow::{bail, Result};

/// Foldings aligned with a batch of `expected` sequences
fn require_foldings<'a>(
    plugin: &str,
    foldings: Option<&'a [FoldingResult]>,
    expected: usize,
) -> Result<&'a [FoldingResult]> {
    match foldings {
        Some(foldings) if foldings.len() == expected => Ok(foldings),
        Some(foldings) => bail!(
            "{}: got {} foldings for {} sequences",
            plugin,
            foldings.len(),
            expected
        ),
        None => bail!("{}: no folding or pairing probability data is provided", plugin),
    }
}

fn require_pairing<'a>(plugin: &str, folding: Option<&'a FoldingResult>) -> Result<&'a PairingProbabilities> {
    match folding.and_then(|f| f.pairing.as_ref()) {
        Some(pairing) => Ok(pairing),
        None => bail!("{}: base pairing probabilities are missing", plugin),
    }
}
