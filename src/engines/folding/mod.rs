pub mod engine;
pub mod local;
pub mod protocol;
pub mod remote;
pub mod structure;

pub use engine::{create_engine, create_partition_engine, BasePairModel, ExternalFoldingEngine, FoldingEngine};
pub use local::LocalFoldingBackend;
pub use remote::{RemoteEndpoint, RemoteFoldingClient, RpcCorrelator};
pub use structure::{RegionPenalty, StructureProcessor};

use crate::config::FoldingConfig;
use crate::engines::worker_pool::WorkerPool;
use crate::error::Result;
use crate::types::RawFolding;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

/// Batch structure prediction. Results are in input order.
#[async_trait]
pub trait FoldingBackend: Send + Sync {
    fn name(&self) -> String;

    async fn fold(&self, seqs: &[String]) -> Result<Vec<RawFolding>>;

    async fn partition(&self, seqs: &[String]) -> Result<Vec<RawFolding>>;
}

/// Pick the backend for the whole run.
///
/// The remote service is tried when configured or named by the environment;
/// any failure to reach it downgrades to the local pool. Unknown local engine
/// names are configuration errors.
pub fn select_backend(config: &FoldingConfig, pool: Arc<WorkerPool>) -> Result<Arc<dyn FoldingBackend>> {
    let local = LocalFoldingBackend::new(
        pool,
        create_engine(&config.engine)?,
        create_partition_engine(&config.partition_engine)?,
    );

    let remote = config.remote_with(|key| std::env::var(key).ok());
    let Some(remote) = remote else {
        info!("Folding backend: {}", local.name());
        return Ok(Arc::new(local));
    };

    match remote.endpoint_with(|key| std::env::var(key).ok()).and_then(RemoteFoldingClient::connect_blocking) {
        Ok(client) => {
            info!("Folding backend: {}", client.name());
            Ok(Arc::new(client))
        }
        Err(e) => {
            warn!("Remote folding unavailable ({}); using {} instead", e, local.name());
            Ok(Arc::new(local))
        }
    }
}
