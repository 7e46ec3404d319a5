use crate::config::{AppConfig, EvolutionConfig, OutputConfig};
use crate::data::cache::FoldingCache;
use crate::engines::evaluation::{BatchEvaluation, FitnessEvaluationPipeline, SequenceReport};
use crate::engines::folding::{select_backend, StructureProcessor};
use crate::engines::generation::checkpoint::{CheckpointRow, CheckpointWriter};
use crate::engines::generation::mutation::{MutationChoice, MutationEngine};
use crate::engines::generation::progress::{ProgressCallback, ProgressSnapshot};
use crate::engines::generation::selection::{prioritized_by_parent, rank_by_score};
use crate::engines::worker_pool::WorkerPool;
use crate::error::Result;
use crate::functions::{PluginContext, PluginRegistry};
use crate::sequence::Sequence;
use crate::types::FoldingResult;
use chrono::{DateTime, Local, Utc};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

/// Below this many expected mutations per child the search is considered done
pub const STOP_THRESHOLD: f64 = 0.2;
/// Population members whose neighbourhoods a full scan enumerates
pub const FULL_SCAN_PARENTS: usize = 10;
const TABLE_HEADER_LENGTH: usize = 6;

const HBAR: &str = "----------------------------------------------------------------------";
const HBAR_DOUBLE: &str = "======================================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Ran every configured iteration
    Completed,
    /// Stopped early: expected mutations fell below the threshold
    Converged,
    /// A batch failed
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub iterations: usize,
    pub best_scores: Vec<f64>,
    pub mutation_rate: f64,
    pub population: Vec<Sequence>,
}

enum Expansion {
    Expanded,
    Stop,
}

/// Drives the mutate / evaluate / select loop over a population of synonymous
/// sequences
pub struct PopulationController {
    config: EvolutionConfig,
    name: String,
    mutation: MutationEngine,
    pipeline: FitnessEvaluationPipeline,
    rng: StdRng,
    population: Vec<Sequence>,
    foldings: Vec<Option<FoldingResult>>,
    sources: Vec<usize>,
    mutation_rate: f64,
    in_final_full_scan: bool,
    conservative: Option<(usize, Vec<MutationChoice>)>,
    best_scores: Vec<f64>,
    last_winddown: usize,
    elapsed: Vec<f64>,
    checkpoint: Option<CheckpointWriter<BufWriter<File>>>,
    initial_report: Option<SequenceReport>,
}

impl PopulationController {
    pub fn new(
        config: EvolutionConfig,
        founders: Vec<Sequence>,
        mutation: MutationEngine,
        pipeline: FitnessEvaluationPipeline,
    ) -> Self {
        let conservative = config
            .conservative_start
            .map(|cs| (cs.iterations, mutation.choices_within(cs.width)));
        let foldings = vec![None; founders.len()];
        let sources = (0..founders.len()).collect();

        Self {
            rng: StdRng::seed_from_u64(config.seed),
            mutation_rate: config.initial_mutation_rate,
            config,
            name: "sequence".to_string(),
            mutation,
            pipeline,
            population: founders,
            foldings,
            sources,
            in_final_full_scan: false,
            conservative,
            best_scores: Vec::new(),
            last_winddown: 0,
            elapsed: Vec::new(),
            checkpoint: None,
            initial_report: None,
        }
    }

    /// Assemble the whole run from a validated configuration
    pub fn from_config(app: &AppConfig) -> Result<Self> {
        let table = app.sequence.codon_table()?;
        let mut founders = app.sequence.founders(&table)?;
        let mutation = MutationEngine::new(
            &founders[0],
            table,
            app.sequence.preserve_stop,
            app.evolution.loop_boost(),
        );

        let mut rng = StdRng::seed_from_u64(app.evolution.seed);
        if app.sequence.random_initialization || app.sequence.protein.is_some() {
            founders = founders.iter().map(|f| mutation.randomize(f, &mut rng)).collect();
        }

        let pool = Arc::new(WorkerPool::new(app.evolution.processes)?);
        let backend = select_backend(&app.folding, Arc::clone(&pool))?;
        let ctx = PluginContext {
            utr5_length: founders[0].utr5().len(),
            cds_length: founders[0].cds_len(),
        };
        let plugins = PluginRegistry::new().build(&app.scoring, &ctx)?;
        let pipeline = FitnessEvaluationPipeline::new(
            plugins,
            backend,
            pool,
            FoldingCache::new(app.folding.cache_size),
            StructureProcessor::new(app.folding.region_penalty),
        );

        std::fs::create_dir_all(&app.output.directory)?;
        let checkpoint = CheckpointWriter::create(app.output.checkpoint_path())?;

        let mut controller = Self::new(app.evolution.clone(), founders, mutation, pipeline);
        controller.rng = rng;
        controller.name = app.sequence.name.clone();
        controller.checkpoint = Some(checkpoint);
        Ok(controller)
    }

    pub fn with_checkpoint(mut self, writer: CheckpointWriter<BufWriter<File>>) -> Self {
        self.checkpoint = Some(writer);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn population(&self) -> &[Sequence] {
        &self.population
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn pipeline(&self) -> &FitnessEvaluationPipeline {
        &self.pipeline
    }

    pub fn show_configuration(&self) {
        let space = self.mutation.compute_mutation_space();
        info!("codonopt {}", env!("CARGO_PKG_VERSION"));
        info!("{}", HBAR_DOUBLE);
        info!(" * Name: {}", self.name);
        info!(" * CDS length: {} nt", self.population[0].cds_len());
        info!(" * Possible single mutations: {}", space.singles);
        info!(" * Possible sequences: {}", space.total);
        info!("");
    }

    /// Run until the iterations are spent, the search converges or a batch
    /// fails. `callback` sees one snapshot per iteration and a final one with
    /// iteration -1.
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<RunOutcome> {
        self.show_configuration();

        let mut timestamps: Vec<DateTime<Utc>> = vec![Utc::now()];
        let mut status = RunStatus::Completed;
        let mut iterations_done = 0;

        match self.pipeline.report_blocking(&self.population[0].to_rna()) {
            Ok(report) => self.initial_report = Some(report),
            Err(_) => status = RunStatus::Failed,
        }

        if status != RunStatus::Failed && self.config.iterations == 0 {
            // Only the founders are evaluated
            let seqs = self.flattened();
            match self.pipeline.evaluate_blocking(&seqs) {
                Ok(batch) => {
                    self.write_checkpoint(0, 0, &batch, &seqs)?;
                    timestamps.push(Utc::now());
                }
                Err(_) => status = RunStatus::Failed,
            }
        }

        let iterations = if status == RunStatus::Failed { 0 } else { self.config.iterations };
        for i in 0..iterations {
            callback.on_iteration_start(i);
            let iter_no = i + 1;
            let n_parents = self.population.len();

            if let Expansion::Stop = self.next_generation(i) {
                status = RunStatus::Converged;
                break;
            }

            let seqs = self.flattened();
            let batch = match self.pipeline.evaluate_blocking(&seqs) {
                Ok(batch) => batch,
                Err(_) => {
                    status = RunStatus::Failed;
                    break;
                }
            };
            let totals = batch.totals();

            let order = if self.population.len() > self.config.population {
                // Best mutant of each parent keeps lineages apart
                prioritized_by_parent(&totals, &self.sources)
            } else {
                rank_by_score(&totals)
            };
            let survivors: Vec<usize> = order.iter().take(self.config.survivors).copied().collect();
            self.best_scores.push(totals[order[0]]);

            if i == 0 {
                self.write_checkpoint(0, 0, &batch, &seqs)?;
            }
            self.print_eval_results(&totals, &batch, &order, n_parents);
            self.write_checkpoint(iter_no, survivors[0], &batch, &seqs)?;

            self.population = survivors.iter().map(|&k| self.population[k].clone()).collect();
            self.foldings = survivors.iter().map(|&k| batch.foldings[k].clone()).collect();
            self.sources = (0..self.population.len()).collect();

            let recent = self.best_scores.len().saturating_sub(5);
            info!(
                " # Last best scores: {}",
                self.best_scores[recent..]
                    .iter()
                    .map(|s| format!("{:.3}", s))
                    .collect::<Vec<_>>()
                    .join(" ")
            );

            self.wind_down(iter_no);

            timestamps.push(Utc::now());
            iterations_done = iter_no;
            self.print_time_estimation(&timestamps, iter_no);
            info!("");

            callback.on_progress(&ProgressSnapshot {
                iteration: iter_no as i64,
                error: false,
                timestamps: timestamps.clone(),
            });
        }

        callback.on_progress(&ProgressSnapshot {
            iteration: -1,
            error: status == RunStatus::Failed,
            timestamps,
        });

        Ok(RunOutcome {
            status,
            iterations: iterations_done,
            best_scores: self.best_scores.clone(),
            mutation_rate: self.mutation_rate,
            population: self.population.clone(),
        })
    }

    fn flattened(&self) -> Vec<String> {
        self.population.iter().map(Sequence::to_rna).collect()
    }

    fn next_generation(&mut self, iteration: usize) -> Expansion {
        let interval = self.config.full_scan_interval;
        if interval > 0 && (iteration + 1) % interval == 0 {
            self.prepare_full_scan(iteration);
            return Expansion::Expanded;
        }

        let expected = self.mutation.compute_expected_mutations(self.mutation_rate);
        if expected < STOP_THRESHOLD {
            if !self.in_final_full_scan {
                info!("{}", HBAR);
                info!("==> Trying final full scan");
                self.in_final_full_scan = true;
                self.prepare_full_scan(iteration);
                return Expansion::Expanded;
            }
            warn!("==> Stopping: expected mutation reaches the minimum");
            return Expansion::Stop;
        }

        self.in_final_full_scan = false;
        info!("{}", HBAR);
        info!(
            "Iteration {}/{}  --  mut_rate: {:.5} -- E(muts): {:.1}",
            iteration + 1,
            self.config.iterations,
            self.mutation_rate,
            expected
        );

        let choices = match &self.conservative {
            Some((end, choices)) if iteration < *end => Some(choices.as_slice()),
            _ => None,
        };

        let n_parents = self.population.len();
        let n_children = self.config.population.saturating_sub(n_parents);
        self.sources = (0..n_parents).collect();
        for slot in 0..n_children {
            let parent = slot % n_parents;
            let child = self.mutation.generate_mutant(
                &self.population[parent],
                self.mutation_rate,
                choices,
                self.foldings[parent].as_ref(),
                &mut self.rng,
            );
            self.population.push(child);
            self.sources.push(parent);
        }
        Expansion::Expanded
    }

    fn prepare_full_scan(&mut self, iteration: usize) {
        info!("{}", HBAR);
        info!("Iteration {}/{}  -- FULL SCAN", iteration + 1, self.config.iterations);

        let n_parents = self.population.len();
        self.sources = (0..n_parents).collect();

        let mut children = Vec::new();
        for (index, (seed, folding)) in self
            .population
            .iter()
            .zip(&self.foldings)
            .take(FULL_SCAN_PARENTS)
            .enumerate()
        {
            for child in self.mutation.traverse_all_single_mutations(seed, folding.as_ref()) {
                children.push((index, child));
            }
        }
        for (index, child) in children {
            self.population.push(child);
            self.sources.push(index);
        }
    }

    fn wind_down(&mut self, iter_no: usize) {
        let trigger = self.config.winddown_trigger;
        let history = self.best_scores.len();
        if history < trigger || iter_no - self.last_winddown < trigger {
            return;
        }
        if self.best_scores[history - 1] <= self.best_scores[history - trigger] {
            self.mutation_rate *= self.config.winddown_rate;
            info!("==> Winddown triggered: mutation rate = {:.5}", self.mutation_rate);
            self.last_winddown = iter_no;
        }
    }

    fn write_checkpoint(&mut self, iteration: usize, index: usize, batch: &BatchEvaluation, seqs: &[String]) -> Result<()> {
        let mutation_rate = self.mutation_rate;
        let Some(writer) = self.checkpoint.as_mut() else {
            return Ok(());
        };
        let structure = batch.foldings[index].as_ref().map_or("", |f| f.structure.as_str());
        writer.write(&CheckpointRow {
            iteration,
            mutation_rate,
            record: &batch.records[index],
            sequence: &seqs[index],
            structure,
        })
    }

    fn print_eval_results(&self, totals: &[f64], batch: &BatchEvaluation, order: &[usize], n_parents: usize) {
        let rows = &order[..order.len().min(self.config.print_top)];
        let Some(&first) = rows.first() else {
            return;
        };

        let flags = self.pipeline.penalty_flags();
        let metric_names: Vec<&String> = batch.records[first]
            .metrics
            .keys()
            .filter(|k| !flags.contains_key(k.as_str()))
            .collect();

        let width = (self.config.survivors as f64).log10() as usize + 1;
        let mut header = vec!["flags".to_string(), "score".to_string()];
        header.extend(metric_names.iter().map(|k| k.chars().take(TABLE_HEADER_LENGTH).collect::<String>()));

        let table: Vec<Vec<String>> = rows
            .iter()
            .enumerate()
            .map(|(rank, &i)| {
                let mut flag = if i < n_parents {
                    "-".repeat(width)
                } else {
                    format!("{:>width$}", self.sources[i] + 1, width = width).replace(' ', "-")
                };
                flag.push_str(if rank < self.config.survivors { "S " } else { "- " });
                for (name, symbol) in &flags {
                    let value = batch.records[i].metrics.get(*name).copied().unwrap_or(0.0);
                    flag.push_str(if value != 0.0 { *symbol } else { "-" });
                }

                let mut row = vec![flag, format!("{:.2}", totals[i])];
                row.extend(metric_names.iter().map(|k| format!("{:.2}", batch.records[i].metrics[*k])));
                row
            })
            .collect();

        for line in format_table(&header, &table) {
            info!("{}", line);
        }
        info!("");
    }

    fn print_time_estimation(&mut self, timestamps: &[DateTime<Utc>], iter_no: usize) {
        let [.., start, end] = timestamps else {
            return;
        };
        let elapsed = (*end - *start).num_milliseconds() as f64 / 1000.0;
        self.elapsed.push(elapsed);

        let recent = &self.elapsed[self.elapsed.len().saturating_sub(5)..];
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let remaining = self.config.iterations.saturating_sub(iter_no) as f64 * mean;
        let expected_end = Local::now() + chrono::Duration::milliseconds((remaining * 1000.0) as i64);

        let secs = elapsed.round() as i64;
        let elapsed_str = if secs >= 3600 {
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        } else {
            format!("{:02}:{:02}", secs / 60, secs % 60)
        };
        info!(
            " # {}s/it  --  Expected finish: {}",
            elapsed_str,
            expected_end.format("%a %b %e %H:%M:%S %Y")
        );
    }

    /// Final population as FASTA, the effective parameters, and the
    /// before/after report of the best sequence
    pub fn save_results(&self, output: &OutputConfig, parameters: &AppConfig) -> Result<()> {
        std::fs::create_dir_all(&output.directory)?;

        let mut fasta = BufWriter::new(File::create(output.fasta_path())?);
        for (i, seq) in self.population.iter().enumerate() {
            if i == 0 {
                writeln!(fasta, ">(best variant)_{}", self.name)?;
            } else {
                writeln!(fasta, ">(mutant {})_{}", i, self.name)?;
            }
            let rna = seq.to_rna();
            for line in rna.as_bytes().chunks(output.fasta_line_width) {
                writeln!(fasta, "{}", String::from_utf8_lossy(line))?;
            }
        }
        fasta.flush()?;

        std::fs::write(output.parameters_path(), serde_json::to_string_pretty(parameters)?)?;

        let optimized = self.pipeline.report_blocking(&self.population[0].to_rna())?;
        let report = BTreeMap::from([("initial", self.initial_report.as_ref()), ("optimized", Some(&optimized))]);
        std::fs::write(output.report_path(), serde_json::to_string_pretty(&report)?)?;
        info!("Results written to {}", output.directory.display());
        Ok(())
    }
}

/// Left-aligned plain-text table
fn format_table(header: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render(header));
    lines.push(widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>().join("  "));
    lines.extend(rows.iter().map(|row| render(row)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConservativeStart, PluginSettings, ScoringConfig};
    use crate::engines::folding::{BasePairModel, LocalFoldingBackend};
    use crate::sequence::CodonTable;

    struct Recorder {
        snapshots: Vec<ProgressSnapshot>,
        starts: Vec<usize>,
    }

    impl ProgressCallback for Recorder {
        fn on_iteration_start(&mut self, iteration: usize) {
            self.starts.push(iteration);
        }

        fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
            self.snapshots.push(snapshot.clone());
        }
    }

    fn recorder() -> Recorder {
        Recorder {
            snapshots: Vec::new(),
            starts: Vec::new(),
        }
    }

    /// U content only, so no folding is needed
    fn ucount_only(founder: &Sequence) -> FitnessEvaluationPipeline {
        let mut scoring = ScoringConfig::default();
        for name in ["mfe", "start_str", "aup", "unpaired_u"] {
            scoring.plugins.insert(
                name.to_string(),
                PluginSettings {
                    off: true,
                    ..Default::default()
                },
            );
        }
        let ctx = PluginContext {
            utr5_length: 0,
            cds_length: founder.cds_len(),
        };
        let plugins = PluginRegistry::new().build(&scoring, &ctx).unwrap();
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let engine = Arc::new(BasePairModel::default());
        let backend = Arc::new(LocalFoldingBackend::new(Arc::clone(&pool), engine.clone(), engine));
        FitnessEvaluationPipeline::new(plugins, backend, pool, FoldingCache::new(128), StructureProcessor::default())
    }

    fn controller(cds: &str, config: EvolutionConfig) -> PopulationController {
        let founder = Sequence::new("", cds, "").unwrap();
        let mutation = MutationEngine::new(&founder, CodonTable::standard(), false, None);
        let pipeline = ucount_only(&founder);
        PopulationController::new(config, vec![founder], mutation, pipeline)
    }

    #[test]
    fn test_population_shrinks_to_survivors() {
        let config = EvolutionConfig {
            iterations: 3,
            population: 8,
            survivors: 3,
            initial_mutation_rate: 0.5,
            ..Default::default()
        };
        let mut ctl = controller("AUGCUGCUGCUGUAA", config);
        let mut progress = recorder();
        let outcome = ctl.run(&mut progress).unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.population.len(), 3);
        assert_eq!(progress.starts, vec![0, 1, 2]);

        let iterations: Vec<i64> = progress.snapshots.iter().map(|s| s.iteration).collect();
        assert_eq!(iterations, vec![1, 2, 3, -1]);
        assert_eq!(progress.snapshots[3].timestamps.len(), 4);
        assert!(!progress.snapshots[3].error);
    }

    #[test]
    fn test_best_score_never_regresses() {
        // Survivors are carried over, so the best fitness can only improve
        let config = EvolutionConfig {
            iterations: 5,
            population: 10,
            survivors: 2,
            initial_mutation_rate: 0.3,
            ..Default::default()
        };
        let mut ctl = controller("AUGCUGCUGGGGUCUUAA", config);
        let outcome = ctl.run(&mut recorder()).unwrap();
        assert!(outcome.best_scores.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_low_rate_converges_after_final_full_scan() {
        // 3 choices * 0.05 = 0.15 expected mutations, below the stop threshold
        let config = EvolutionConfig {
            iterations: 10,
            population: 4,
            survivors: 2,
            initial_mutation_rate: 0.05,
            ..Default::default()
        };
        let mut ctl = controller("AUGUGUUAA", config);
        let outcome = ctl.run(&mut recorder()).unwrap();

        assert_eq!(outcome.status, RunStatus::Converged);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_interval_full_scan_expands_first_ten_members() {
        let config = EvolutionConfig {
            iterations: 3,
            population: 12,
            survivors: 12,
            full_scan_interval: 2,
            ..Default::default()
        };
        let founder = Sequence::new("", "AUGCUGUAA", "").unwrap();
        let mutation = MutationEngine::new(&founder, CodonTable::standard(), false, None);
        let singles = mutation.choices().len();
        let pipeline = ucount_only(&founder);
        let mut ctl = PopulationController::new(config, vec![founder; 12], mutation, pipeline);

        // Iteration 0 mutates, and the population is already full
        assert!(matches!(ctl.next_generation(0), Expansion::Expanded));
        assert_eq!(ctl.population.len(), 12);

        // Iteration 1 hits the interval; no foldings yet, so every choice is scanned
        assert!(matches!(ctl.next_generation(1), Expansion::Expanded));
        assert_eq!(ctl.population.len(), 12 + FULL_SCAN_PARENTS * singles);

        let mut expected: Vec<usize> = (0..12).collect();
        for parent in 0..FULL_SCAN_PARENTS {
            expected.extend(std::iter::repeat(parent).take(singles));
        }
        assert_eq!(ctl.sources, expected);

        for (child, &source) in ctl.population.iter().zip(&ctl.sources).skip(12) {
            let changed = child
                .codons()
                .iter()
                .zip(ctl.population[source].codons())
                .filter(|(a, b)| a != b)
                .count();
            assert_eq!(changed, 1);
        }
    }

    #[test]
    fn test_every_iteration_full_scan_keeps_one_per_lineage() {
        let config = EvolutionConfig {
            iterations: 2,
            population: 12,
            survivors: 12,
            full_scan_interval: 1,
            ..Default::default()
        };
        let founder = Sequence::new("", "AUGCUGUAA", "").unwrap();
        let mutation = MutationEngine::new(&founder, CodonTable::standard(), false, None);
        let pipeline = ucount_only(&founder);
        let mut ctl = PopulationController::new(config, vec![founder; 12], mutation, pipeline);

        let mut progress = recorder();
        let outcome = ctl.run(&mut progress).unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.population.len(), 12);
        let table = CodonTable::standard();
        assert!(outcome.population.iter().all(|m| m.translate(&table) == "ML*"));
    }

    #[test]
    fn test_winddown_cools_stalled_search() {
        // Only the stop codon has synonyms and none changes the U count
        let config = EvolutionConfig {
            iterations: 4,
            population: 4,
            survivors: 2,
            initial_mutation_rate: 0.5,
            winddown_trigger: 2,
            winddown_rate: 0.5,
            full_scan_interval: 0,
            ..Default::default()
        };
        let mut ctl = controller("AUGUGGUAA", config);
        let outcome = ctl.run(&mut recorder()).unwrap();

        // Cooled at iterations 2 and 4
        assert_eq!(outcome.status, RunStatus::Completed);
        assert!((outcome.mutation_rate - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_conservative_start_limits_positions() {
        let config = EvolutionConfig {
            iterations: 1,
            population: 6,
            survivors: 6,
            initial_mutation_rate: 1.0,
            conservative_start: Some(ConservativeStart { iterations: 1, width: 2 }),
            ..Default::default()
        };
        let mut ctl = controller("AUGCUGCUGUAA", config);
        let founder = ctl.population()[0].clone();
        ctl.run(&mut recorder()).unwrap();

        for member in ctl.population() {
            assert_eq!(member.codons()[2..], founder.codons()[2..]);
        }
    }

    #[test]
    fn test_failed_batch_reports_error() {
        struct Broken;
        impl crate::functions::ScoringPlugin for Broken {
            fn name(&self) -> &'static str { "broken" }
            fn description(&self) -> &'static str { "always fails" }
            fn priority(&self) -> i32 { 0 }
            fn weight(&self) -> f64 { 1.0 }
            fn capabilities(&self) -> crate::functions::PluginCapabilities {
                crate::functions::PluginCapabilities::default()
            }
            fn score(
                &self,
                _seqs: &[String],
                _foldings: Option<&[FoldingResult]>,
            ) -> anyhow::Result<crate::functions::PluginOutput> {
                anyhow::bail!("no score today")
            }
        }

        let founder = Sequence::new("", "AUGCUGUAA", "").unwrap();
        let mutation = MutationEngine::new(&founder, CodonTable::standard(), false, None);
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let engine = Arc::new(BasePairModel::default());
        let backend = Arc::new(LocalFoldingBackend::new(Arc::clone(&pool), engine.clone(), engine));
        let pipeline = FitnessEvaluationPipeline::new(
            vec![Arc::new(Broken)],
            backend,
            pool,
            FoldingCache::new(8),
            StructureProcessor::default(),
        );

        let mut ctl = PopulationController::new(EvolutionConfig::default(), vec![founder], mutation, pipeline);
        let mut progress = recorder();
        let outcome = ctl.run(&mut progress).unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        let last = progress.snapshots.last().unwrap();
        assert!(last.is_final());
        assert!(last.error);
    }

    #[test]
    fn test_format_table_aligns_columns() {
        let header = vec!["flags".to_string(), "score".to_string()];
        let rows = vec![vec!["-S ".to_string(), "12.50".to_string()]];
        let lines = format_table(&header, &rows);
        assert_eq!(lines[0], "flags  score");
        assert_eq!(lines[1], "-----  -----");
        assert_eq!(lines[2], "-S     12.50");
    }
}
