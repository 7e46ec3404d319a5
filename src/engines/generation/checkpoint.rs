use crate::error::Result;
use crate::types::ScoreRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Best survivor of one iteration
pub struct CheckpointRow<'a> {
    pub iteration: usize,
    pub mutation_rate: f64,
    pub record: &'a ScoreRecord,
    pub sequence: &'a str,
    pub structure: &'a str,
}

/// Append-only TSV log: header from the first row, then one row per call.
/// Every row is flushed as soon as it is written.
pub struct CheckpointWriter<W: Write> {
    out: W,
    header_written: bool,
}

impl CheckpointWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CheckpointWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn write(&mut self, row: &CheckpointRow<'_>) -> Result<()> {
        // BTreeMaps keep metric and score columns sorted
        if !self.header_written {
            let mut header = vec!["iter_no".to_string(), "mutation_rate".to_string(), "fitness".to_string()];
            header.extend(row.record.metrics.keys().map(|k| format!("metric:{}", k)));
            header.extend(row.record.scores.keys().map(|k| format!("score:{}", k)));
            header.push("seq".to_string());
            header.push("structure".to_string());
            writeln!(self.out, "{}", header.join("\t"))?;
            self.header_written = true;
        }

        let mut fields = vec![
            row.iteration.to_string(),
            row.mutation_rate.to_string(),
            row.record.total().to_string(),
        ];
        fields.extend(row.record.metrics.values().map(f64::to_string));
        fields.extend(row.record.scores.values().map(f64::to_string));
        fields.push(row.sequence.to_string());
        fields.push(row.structure.to_string());
        writeln!(self.out, "{}", fields.join("\t"))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
