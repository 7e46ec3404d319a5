use super::engine::FoldingEngine;
use super::FoldingBackend;
use crate::engines::worker_pool::{TaskHandle, WorkerPool};
use crate::error::{CodonOptError, Result};
use crate::types::RawFolding;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one folding task per sequence on the shared worker pool
pub struct LocalFoldingBackend {
    pool: Arc<WorkerPool>,
    fold_engine: Arc<dyn FoldingEngine>,
    partition_engine: Arc<dyn FoldingEngine>,
}

impl LocalFoldingBackend {
    pub fn new(
        pool: Arc<WorkerPool>,
        fold_engine: Arc<dyn FoldingEngine>,
        partition_engine: Arc<dyn FoldingEngine>,
    ) -> Self {
        Self {
            pool,
            fold_engine,
            partition_engine,
        }
    }

    async fn run_batch<F>(&self, seqs: &[String], engine: &Arc<dyn FoldingEngine>, task: F) -> Result<Vec<RawFolding>>
    where
        F: Fn(&dyn FoldingEngine, &str) -> Result<RawFolding> + Copy + Send + 'static,
    {
        let handles: Vec<TaskHandle<Result<RawFolding>>> = seqs
            .iter()
            .map(|seq| {
                let engine = Arc::clone(engine);
                let seq = seq.clone();
                self.pool.spawn(move || task(engine.as_ref(), &seq))
            })
            .collect();

        // Every task is already queued; collect in submission order
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let folding = handle.join().await.map_err(CodonOptError::Folding)??;
            results.push(folding);
        }
        Ok(results)
    }
}

#[async_trait]
impl FoldingBackend for LocalFoldingBackend {
    fn name(&self) -> String {
        format!(
            "local ({} / {}, {} workers)",
            self.fold_engine.name(),
            self.partition_engine.name(),
            self.pool.threads()
        )
    }

    async fn fold(&self, seqs: &[String]) -> Result<Vec<RawFolding>> {
        self.run_batch(seqs, &self.fold_engine, |engine, seq| engine.fold(seq))
            .await
    }

    async fn partition(&self, seqs: &[String]) -> Result<Vec<RawFolding>> {
        self.run_batch(seqs, &self.partition_engine, |engine, seq| engine.partition(seq))
            .await
    }
}
