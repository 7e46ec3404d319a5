use crate::data::cache::{CachedFolding, FoldingCache};
use crate::engines::folding::{FoldingBackend, StructureProcessor};
use crate::engines::worker_pool::WorkerPool;
use crate::error::{CodonOptError, Result};
use crate::functions::traits::{PluginOutput, ScoringPlugin};
use crate::types::{FoldingResult, ScoreRecord};
use log::{debug, error, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type PluginOutcome = std::result::Result<PluginOutput, String>;

/// Scores and foldings of one batch, aligned with the input sequences
#[derive(Debug, Clone, Default)]
pub struct BatchEvaluation {
    pub records: Vec<ScoreRecord>,
    /// `None` when no active plugin needs structure data
    pub foldings: Vec<Option<FoldingResult>>,
}

impl BatchEvaluation {
    pub fn totals(&self) -> Vec<f64> {
        self.records.iter().map(ScoreRecord::total).collect()
    }
}

/// Single-sequence annotation used for the start/end reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceReport {
    pub sequence: String,
    pub structure: Option<String>,
    pub free_energy: Option<f64>,
    pub metrics: BTreeMap<String, f64>,
    pub local: BTreeMap<String, Vec<f64>>,
}

/// Runs every active scoring plugin over a batch of sequences.
///
/// Plugins are bucketed once: no-structure plugins run alongside the folding
/// round, structure plugins run after it. MFE folding is only requested when
/// an active plugin depends on MFE alone.
pub struct FitnessEvaluationPipeline {
    no_structure: Vec<Arc<dyn ScoringPlugin>>,
    folding: Vec<Arc<dyn ScoringPlugin>>,
    pairing: Vec<Arc<dyn ScoringPlugin>>,
    annotators: Vec<Arc<dyn ScoringPlugin>>,
    use_mfe: bool,
    backend: Arc<dyn FoldingBackend>,
    pool: Arc<WorkerPool>,
    cache: FoldingCache,
    processor: StructureProcessor,
}

impl FitnessEvaluationPipeline {
    pub fn new(
        plugins: Vec<Arc<dyn ScoringPlugin>>,
        backend: Arc<dyn FoldingBackend>,
        pool: Arc<WorkerPool>,
        cache: FoldingCache,
        processor: StructureProcessor,
    ) -> Self {
        let annotators: Vec<_> = plugins
            .iter()
            .filter(|p| p.weight() != 0.0 || p.annotate_on_zero_weight())
            .cloned()
            .collect();
        let active: Vec<_> = plugins.into_iter().filter(|p| p.weight() != 0.0).collect();

        let use_mfe = active.iter().any(|p| {
            let caps = p.capabilities();
            caps.uses_folding && !caps.uses_base_pairing_probability
        });

        let mut no_structure = Vec::new();
        let mut folding = Vec::new();
        let mut pairing = Vec::new();
        for plugin in active {
            let caps = plugin.capabilities();
            if caps.uses_folding && use_mfe {
                folding.push(plugin);
            } else if caps.needs_structure() {
                pairing.push(plugin);
            } else {
                no_structure.push(plugin);
            }
        }

        info!(
            "Scoring: {} no-structure, {} folding, {} pairing plugin(s); MFE folding {}",
            no_structure.len(),
            folding.len(),
            pairing.len(),
            if use_mfe { "on" } else { "off" }
        );

        Self {
            no_structure,
            folding,
            pairing,
            annotators,
            use_mfe,
            backend,
            pool,
            cache,
            processor,
        }
    }

    pub fn uses_mfe(&self) -> bool {
        self.use_mfe
    }

    pub fn needs_structure(&self) -> bool {
        !self.folding.is_empty() || !self.pairing.is_empty()
    }

    pub fn cache(&self) -> &FoldingCache {
        &self.cache
    }

    /// Active plugins in priority order
    pub fn active_plugins(&self) -> Vec<Arc<dyn ScoringPlugin>> {
        let mut plugins: Vec<_> = self
            .no_structure
            .iter()
            .chain(&self.folding)
            .chain(&self.pairing)
            .cloned()
            .collect();
        plugins.sort_by_key(|p| p.priority());
        plugins
    }

    /// Metric name -> one-letter flag for metrics shown as flags in progress tables
    pub fn penalty_flags(&self) -> BTreeMap<&'static str, &'static str> {
        self.active_plugins()
            .iter()
            .filter_map(|p| p.penalty_flag().map(|flag| (p.name(), flag)))
            .collect()
    }

    pub async fn evaluate(&self, seqs: &[String]) -> Result<BatchEvaluation> {
        let shared = Arc::new(seqs.to_vec());
        let halted = AtomicBool::new(false);

        let (plain, structured) = tokio::join!(
            async {
                let outcomes = self.run_plugins(&self.no_structure, &shared, None).await;
                if outcomes.iter().any(std::result::Result::is_err) {
                    halted.store(true, Ordering::SeqCst);
                }
                outcomes
            },
            self.score_structures(&shared, &halted)
        );

        let (foldings, structured) = match structured {
            Ok(Some((foldings, outcomes))) => (Some(foldings), outcomes),
            Ok(None) => (None, Vec::new()),
            Err(e) => {
                let mut failures: Vec<String> = plain.into_iter().filter_map(std::result::Result::err).collect();
                failures.push(format!("folding: {}", e));
                Self::report_failure(&failures);
                return Err(e);
            }
        };

        let mut outputs: Vec<PluginOutput> = Vec::new();
        let mut failures = Vec::new();
        for outcome in plain.into_iter().chain(structured) {
            match outcome {
                Ok(output) => outputs.push(output),
                Err(msg) => failures.push(msg),
            }
        }
        if !failures.is_empty() {
            Self::report_failure(&failures);
            return Err(CodonOptError::Plugin(failures));
        }

        let mut records = vec![ScoreRecord::default(); seqs.len()];
        for output in outputs {
            for (name, values) in output.scores {
                for (record, value) in records.iter_mut().zip(values) {
                    record.scores.insert(name.clone(), value);
                }
            }
            for (name, values) in output.metrics {
                for (record, value) in records.iter_mut().zip(values) {
                    record.metrics.insert(name.clone(), value);
                }
            }
        }

        let foldings: Vec<Option<FoldingResult>> = match foldings {
            Some(foldings) => foldings.into_iter().map(Some).collect(),
            None => vec![None; seqs.len()],
        };
        for (record, folding) in records.iter_mut().zip(&foldings) {
            record.region_penalty = folding.as_ref().and_then(|f| f.region_penalty).unwrap_or(0.0);
        }

        Ok(BatchEvaluation { records, foldings })
    }

    /// Fold the batch, then run the structure plugins over the merged foldings.
    /// Nothing is dispatched once `halted` reports a failed sibling plugin.
    async fn score_structures(
        &self,
        seqs: &Arc<Vec<String>>,
        halted: &AtomicBool,
    ) -> Result<Option<(Vec<FoldingResult>, Vec<PluginOutcome>)>> {
        if !self.needs_structure() {
            return Ok(None);
        }
        let foldings = self.fold_batch(seqs, self.use_mfe).await?;
        if halted.load(Ordering::SeqCst) {
            return Ok(Some((foldings, Vec::new())));
        }

        let shared_foldings = Arc::new(foldings);
        let structure_plugins: Vec<_> = self.folding.iter().chain(&self.pairing).cloned().collect();
        let outcomes = self
            .run_plugins(&structure_plugins, seqs, Some(&shared_foldings))
            .await;
        let foldings = Arc::try_unwrap(shared_foldings).unwrap_or_else(|shared| shared.as_ref().clone());
        Ok(Some((foldings, outcomes)))
    }

    /// Evaluate on a scheduler that lives for this batch only
    pub fn evaluate_blocking(&self, seqs: &[String]) -> Result<BatchEvaluation> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(self.evaluate(seqs))
    }

    /// Annotations and per-position tracks of one sequence from every
    /// annotating plugin, zero-weight ones included
    pub async fn report(&self, seq: &str) -> Result<SequenceReport> {
        let needs_structure = self.annotators.iter().any(|p| p.capabilities().needs_structure());
        let wants_mfe = self.annotators.iter().any(|p| p.capabilities().uses_folding);

        let folding = if needs_structure {
            let mut foldings = self.fold_batch(&[seq.to_string()], wants_mfe).await?;
            foldings.pop()
        } else {
            None
        };

        let mut report = SequenceReport {
            sequence: seq.to_string(),
            structure: folding.as_ref().map(|f| f.structure.clone()),
            free_energy: folding.as_ref().map(|f| f.free_energy),
            ..Default::default()
        };

        let mut failures = Vec::new();
        for plugin in &self.annotators {
            let caps = plugin.capabilities();
            let folding = if caps.needs_structure() { folding.as_ref() } else { None };
            if caps.has_annotate {
                match plugin.annotate_sequence(seq, folding) {
                    Ok(values) => report.metrics.extend(values),
                    Err(e) => failures.push(format!("{}: {:#}", plugin.name(), e)),
                }
            }
            if caps.has_local_eval {
                match plugin.evaluate_local(seq, folding) {
                    Ok(tracks) => report.local.extend(tracks),
                    Err(e) => failures.push(format!("{}: {:#}", plugin.name(), e)),
                }
            }
        }
        if !failures.is_empty() {
            Self::report_failure(&failures);
            return Err(CodonOptError::Plugin(failures));
        }
        Ok(report)
    }

    pub fn report_blocking(&self, seq: &str) -> Result<SequenceReport> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(self.report(seq))
    }

    /// Merged foldings for `seqs`, dispatching only sequences the cache lacks
    async fn fold_batch(&self, seqs: &[String], with_mfe: bool) -> Result<Vec<FoldingResult>> {
        // Hits are copied out up front: inserting this batch's results may
        // evict them from the cache before the batch is assembled
        let mut seen = HashSet::new();
        let mut batch: HashMap<String, CachedFolding> = HashMap::with_capacity(seqs.len());
        let mut missing: Vec<String> = Vec::new();
        for seq in seqs {
            if !seen.insert(seq.as_str()) {
                continue;
            }
            match self.cache.get(seq) {
                Some(cached) if !(with_mfe && cached.mfe.is_none()) => {
                    batch.insert(seq.clone(), cached);
                }
                _ => missing.push(seq.clone()),
            }
        }
        debug!(
            "Folding {} of {} sequence(s), {} cache hit(s)",
            missing.len(),
            seqs.len(),
            batch.len()
        );

        if !missing.is_empty() {
            let (partition, mfe) = tokio::join!(self.backend.partition(&missing), async {
                if with_mfe {
                    self.backend.fold(&missing).await.map(Some)
                } else {
                    Ok(None)
                }
            });
            let partition = partition?;
            let mfe = mfe?;

            if partition.len() != missing.len() || mfe.as_ref().map_or(false, |m| m.len() != missing.len()) {
                return Err(CodonOptError::Folding(format!(
                    "backend returned an incomplete batch for {} sequence(s)",
                    missing.len()
                )));
            }

            let mut mfe = mfe.map(Vec::into_iter);
            for (seq, raw_partition) in missing.into_iter().zip(partition) {
                let partition = self.processor.process(raw_partition)?;
                let mfe = match mfe.as_mut().and_then(Iterator::next) {
                    Some(raw) => Some(self.processor.process(raw)?),
                    None => None,
                };
                let entry = CachedFolding { mfe, partition };
                self.cache.insert(seq.clone(), entry.clone());
                batch.insert(seq, entry);
            }
        }

        seqs.iter()
            .map(|seq| {
                batch
                    .get(seq)
                    .map(CachedFolding::merged)
                    .ok_or_else(|| CodonOptError::Folding(format!("no folding produced for {}", seq)))
            })
            .collect()
    }

    async fn run_plugins(
        &self,
        plugins: &[Arc<dyn ScoringPlugin>],
        seqs: &Arc<Vec<String>>,
        foldings: Option<&Arc<Vec<FoldingResult>>>,
    ) -> Vec<PluginOutcome> {
        let handles: Vec<_> = plugins
            .iter()
            .map(|plugin| {
                let name = plugin.name();
                let plugin = Arc::clone(plugin);
                let seqs = Arc::clone(seqs);
                let foldings = foldings.cloned();
                let handle = self
                    .pool
                    .spawn(move || plugin.score(&seqs, foldings.as_deref().map(Vec::as_slice)));
                (name, handle)
            })
            .collect();

        // Every task is queued before the first join, so a failure never
        // leaves siblings undispatched
        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.join().await {
                Ok(Ok(output)) => Self::check_lengths(name, output, seqs.len()),
                Ok(Err(e)) => Err(format!("{}: {:#}", name, e)),
                Err(panic) => Err(format!("{}: {}", name, panic)),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn check_lengths(name: &str, output: PluginOutput, expected: usize) -> PluginOutcome {
        let short = output
            .scores
            .iter()
            .chain(&output.metrics)
            .find(|(_, values)| values.len() != expected);
        match short {
            Some((metric, values)) => Err(format!(
                "{}: {} has {} value(s) for {} sequence(s)",
                name,
                metric,
                values.len(),
                expected
            )),
            None => Ok(output),
        }
    }

    fn report_failure(messages: &[String]) {
        let stars = "*".repeat(70);
        error!("{}", stars);
        error!("Error occurred in a scoring function:");
        for msg in messages {
            error!("{}", msg);
        }
        error!("{}", stars);
        error!("Termination in progress. Waiting for running tasks to finish before closing the program.");
    }
}
