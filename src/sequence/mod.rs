pub mod codon_table;
pub mod model;

pub use codon_table::{Codon, CodonTable};
pub use model::{ensure_same_protein, normalize_rna, Sequence};
