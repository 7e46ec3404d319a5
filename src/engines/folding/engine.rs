use crate::error::{CodonOptError, Result};
use crate::types::{BasePairProbability, RawFolding};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Single-sequence structure predictor run inside a worker
pub trait FoldingEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum free energy structure
    fn fold(&self, seq: &str) -> Result<RawFolding>;

    /// Ensemble free energy, expected-accuracy structure and pair probabilities
    fn partition(&self, seq: &str) -> Result<RawFolding>;
}

pub fn create_engine(name: &str) -> Result<Arc<dyn FoldingEngine>> {
    match name {
        "basepair" => Ok(Arc::new(BasePairModel::default())),
        "rnafold" | "viennarna" => Ok(Arc::new(ExternalFoldingEngine::rnafold())),
        "linearfold" => Ok(Arc::new(ExternalFoldingEngine::linearfold())),
        other => Err(CodonOptError::Configuration(format!(
            "Unsupported RNA folding engine: {}",
            other
        ))),
    }
}

pub fn create_partition_engine(name: &str) -> Result<Arc<dyn FoldingEngine>> {
    match name {
        "basepair" => Ok(Arc::new(BasePairModel::default())),
        other => Err(CodonOptError::Configuration(format!(
            "Unsupported RNA partition engine: {}",
            other
        ))),
    }
}

const MIN_HAIRPIN: usize = 3;
const KT_37C: f64 = 0.61632; // kcal/mol
const PROBABILITY_FLOOR: f64 = 1e-5;

fn pair_energy(a: u8, b: u8) -> Option<f64> {
    match (a, b) {
        (b'G', b'C') | (b'C', b'G') => Some(-3.0),
        (b'A', b'U') | (b'U', b'A') => Some(-2.0),
        (b'G', b'U') | (b'U', b'G') => Some(-1.0),
        _ => None,
    }
}

/// Square table over 1-based positions with room for empty intervals `(i, i-1)`
struct Matrix<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T: Copy> Matrix<T> {
    fn new(n: usize, fill: T) -> Self {
        let size = n + 2;
        Self {
            size,
            cells: vec![fill; size * size],
        }
    }

    fn get(&self, i: usize, j: usize) -> T {
        self.cells[i * self.size + j]
    }

    fn set(&mut self, i: usize, j: usize, value: T) {
        self.cells[i * self.size + j] = value;
    }
}

/// Nearest-pair energy model: every canonical or wobble pair contributes a
/// fixed energy, hairpins need at least three unpaired bases.
#[derive(Debug, Clone)]
pub struct BasePairModel {
    kt: f64,
}

impl Default for BasePairModel {
    fn default() -> Self {
        Self { kt: KT_37C }
    }
}

impl BasePairModel {
    fn energy(seq: &[u8], i: usize, k: usize) -> Option<f64> {
        if k < i + MIN_HAIRPIN + 1 {
            return None;
        }
        pair_energy(seq[i - 1], seq[k - 1])
    }

    /// Returns the MFE and the partner table (0 = unpaired) over 1-based positions
    fn minimum_free_energy(seq: &[u8]) -> (f64, Vec<usize>) {
        let n = seq.len();
        let mut energy = Matrix::new(n, 0.0f64);
        let mut trace = Matrix::new(n, 0usize);

        for span in 1..=n {
            for i in 1..=n + 1 - span {
                let j = i + span - 1;
                let mut best = energy.get(i + 1, j);
                let mut choice = 0;
                for k in i + MIN_HAIRPIN + 1..=j {
                    if let Some(e) = Self::energy(seq, i, k) {
                        let candidate = e + energy.get(i + 1, k - 1) + energy.get(k + 1, j);
                        if candidate < best {
                            best = candidate;
                            choice = k;
                        }
                    }
                }
                energy.set(i, j, best);
                trace.set(i, j, choice);
            }
        }

        let mut partner = vec![0usize; n + 1];
        let mut stack = vec![(1usize, n)];
        while let Some((i, j)) = stack.pop() {
            if i >= j {
                continue;
            }
            match trace.get(i, j) {
                0 => stack.push((i + 1, j)),
                k => {
                    partner[i] = k;
                    partner[k] = i;
                    stack.push((i + 1, k - 1));
                    stack.push((k + 1, j));
                }
            }
        }

        (energy.get(1, n), partner)
    }

    /// Scaled McCaskill inside/outside. Returns the ensemble free energy and the
    /// pair probabilities above the floor as 1-based `(i, j, p)` triples.
    fn ensemble(&self, seq: &[u8], mfe: f64) -> (f64, Vec<(usize, usize, f64)>) {
        let n = seq.len();
        let boltzmann = |e: f64| (-e / self.kt).exp();
        // Per-nucleotide scale keeps the MFE contribution near 1
        let scale = (-mfe / (n as f64 * self.kt)).exp();
        let inv_s = 1.0 / scale;
        let inv_s2 = inv_s * inv_s;

        let mut q = Matrix::new(n, 1.0f64);
        let mut qb = Matrix::new(n, 0.0f64);
        for span in 1..=n {
            for i in 1..=n + 1 - span {
                let j = i + span - 1;
                let mut total = q.get(i + 1, j) * inv_s;
                for k in i + MIN_HAIRPIN + 1..=j {
                    if let Some(e) = Self::energy(seq, i, k) {
                        let closed = boltzmann(e) * q.get(i + 1, k - 1) * inv_s2;
                        qb.set(i, k, closed);
                        total += closed * q.get(k + 1, j);
                    }
                }
                q.set(i, j, total);
            }
        }

        let mut outside = Matrix::new(n, 0.0f64);
        let mut outside_b = Matrix::new(n, 0.0f64);
        outside.set(1, n, 1.0);
        for span in (1..=n).rev() {
            for i in 1..=n + 1 - span {
                let j = i + span - 1;
                if (i, j) != (1, n) {
                    let mut o = 0.0;
                    if i > 1 {
                        o += outside.get(i - 1, j) * inv_s;
                        for left in 1..i {
                            let closed = qb.get(left, i - 1);
                            if closed > 0.0 {
                                o += outside.get(left, j) * closed;
                            }
                        }
                        if j < n {
                            if let Some(e) = Self::energy(seq, i - 1, j + 1) {
                                o += outside_b.get(i - 1, j + 1) * boltzmann(e) * inv_s2;
                            }
                        }
                    }
                    outside.set(i, j, o);
                }
                if qb.get(i, j) > 0.0 {
                    let ob: f64 = (j..=n).map(|right| outside.get(i, right) * q.get(j + 1, right)).sum();
                    outside_b.set(i, j, ob);
                }
            }
        }

        let total = q.get(1, n);
        let mut pairs = Vec::new();
        for i in 1..=n {
            for j in i + MIN_HAIRPIN + 1..=n {
                let closed = qb.get(i, j);
                if closed > 0.0 {
                    let p = closed * outside_b.get(i, j) / total;
                    if p > PROBABILITY_FLOOR {
                        pairs.push((i, j, p.min(1.0)));
                    }
                }
            }
        }

        let free_energy = -self.kt * (total.ln() + n as f64 * scale.ln());
        (free_energy, pairs)
    }

    /// Maximum expected accuracy structure over the given pair probabilities
    fn expected_accuracy_structure(n: usize, pairs: &[(usize, usize, f64)]) -> Vec<usize> {
        let mut unpaired = vec![1.0f64; n + 1];
        let mut candidates: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n + 1];
        for &(i, j, p) in pairs {
            unpaired[i] -= p;
            unpaired[j] -= p;
            candidates[i].push((j, p));
        }

        let mut accuracy = Matrix::new(n, 0.0f64);
        let mut trace = Matrix::new(n, 0usize);
        for span in 1..=n {
            for i in 1..=n + 1 - span {
                let j = i + span - 1;
                let mut best = accuracy.get(i + 1, j) + unpaired[i];
                let mut choice = 0;
                for &(k, p) in candidates[i].iter().filter(|(k, _)| *k <= j) {
                    let candidate = accuracy.get(i + 1, k - 1) + 2.0 * p + accuracy.get(k + 1, j);
                    if candidate > best {
                        best = candidate;
                        choice = k;
                    }
                }
                accuracy.set(i, j, best);
                trace.set(i, j, choice);
            }
        }

        let mut partner = vec![0usize; n + 1];
        let mut stack = vec![(1usize, n)];
        while let Some((i, j)) = stack.pop() {
            if i >= j {
                continue;
            }
            match trace.get(i, j) {
                0 => stack.push((i + 1, j)),
                k => {
                    partner[i] = k;
                    partner[k] = i;
                    stack.push((i + 1, k - 1));
                    stack.push((k + 1, j));
                }
            }
        }
        partner
    }
}

fn dot_bracket(partner: &[usize]) -> String {
    partner
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, &p)| match p {
            0 => '.',
            p if p > i => '(',
            _ => ')',
        })
        .collect()
}

impl FoldingEngine for BasePairModel {
    fn name(&self) -> &str {
        "basepair"
    }

    fn fold(&self, seq: &str) -> Result<RawFolding> {
        let (free_energy, partner) = Self::minimum_free_energy(seq.as_bytes());
        Ok(RawFolding {
            structure: dot_bracket(&partner),
            free_energy,
            base_pairs: None,
        })
    }

    fn partition(&self, seq: &str) -> Result<RawFolding> {
        let bytes = seq.as_bytes();
        if bytes.is_empty() {
            return Ok(RawFolding {
                structure: String::new(),
                free_energy: 0.0,
                base_pairs: Some(Vec::new()),
            });
        }

        let (mfe, _) = Self::minimum_free_energy(bytes);
        let (free_energy, pairs) = self.ensemble(bytes, mfe);
        let partner = Self::expected_accuracy_structure(bytes.len(), &pairs);

        Ok(RawFolding {
            structure: dot_bracket(&partner),
            free_energy,
            base_pairs: Some(
                pairs
                    .into_iter()
                    .map(|(i, j, probability)| BasePairProbability {
                        i: i - 1,
                        j: j - 1,
                        probability,
                    })
                    .collect(),
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExternalTool {
    RnaFold,
    LinearFold,
}

/// MFE folding through an installed binary reading the sequence on stdin
#[derive(Debug, Clone)]
pub struct ExternalFoldingEngine {
    tool: ExternalTool,
    program: String,
}

impl ExternalFoldingEngine {
    pub fn rnafold() -> Self {
        Self {
            tool: ExternalTool::RnaFold,
            program: "RNAfold".to_string(),
        }
    }

    pub fn linearfold() -> Self {
        Self {
            tool: ExternalTool::LinearFold,
            program: "linearfold".to_string(),
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self.tool {
            ExternalTool::RnaFold => &["--noPS"],
            ExternalTool::LinearFold => &[],
        }
    }
}

/// Parse the last `structure (energy)` line printed by RNAfold or LinearFold
pub fn parse_fold_output(text: &str) -> Result<RawFolding> {
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| CodonOptError::Folding("Empty output from folding program".to_string()))?;

    let (structure, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| CodonOptError::Folding(format!("Missing energy in folding output: {}", line)))?;
    let energy = rest.trim().trim_start_matches('(').trim_end_matches(')').trim();
    let free_energy = energy
        .parse::<f64>()
        .map_err(|e| CodonOptError::Folding(format!("Bad free energy {:?}: {}", energy, e)))?;

    Ok(RawFolding {
        structure: structure.to_string(),
        free_energy,
        base_pairs: None,
    })
}

impl FoldingEngine for ExternalFoldingEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn fold(&self, seq: &str) -> Result<RawFolding> {
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CodonOptError::Folding(format!("Failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{}", seq)?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(CodonOptError::Folding(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_fold_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn partition(&self, _seq: &str) -> Result<RawFolding> {
        Err(CodonOptError::Configuration(format!(
            "{} does not provide a partition function",
            self.program
        )))
    }
}
