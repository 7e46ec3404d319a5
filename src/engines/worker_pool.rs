use crate::error::{CodonOptError, Result};
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::oneshot;

/// Fixed-size pool for CPU-bound folding and scoring work, created once per run
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

/// Result slot of one submitted job
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<std::thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the job. A panic inside the job comes back as its message.
    pub async fn join(self) -> std::result::Result<T, String> {
        match self.receiver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(panic_message(payload.as_ref())),
            Err(_) => Err("worker dropped the task before finishing".to_string()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("codonopt-worker-{}", i))
            .build()
            .map_err(|e| {
                CodonOptError::Configuration(format!("Failed to configure worker pool: {}", e))
            })?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue `job` on the pool; the handle resolves when it finishes
    pub fn spawn<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver is gone when the batch was abandoned
            let _ = sender.send(outcome);
        });
        TaskHandle { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_results_come_back_in_submission_order() {
        let pool = WorkerPool::new(3).unwrap();
        let handles: Vec<_> = (0..20u64)
            .map(|i| {
                pool.spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(20 - i));
                    i * i
                })
            })
            .collect();

        let results = block_on(async {
            let mut out = Vec::new();
            for handle in handles {
                out.push(handle.join().await.unwrap());
            }
            out
        });
        assert_eq!(results, (0..20u64).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_is_reported_not_propagated() {
        let pool = WorkerPool::new(1).unwrap();
        let handle = pool.spawn(|| -> u32 { panic!("boom") });
        let err = block_on(handle.join()).unwrap_err();
        assert!(err.contains("boom"));

        // Pool keeps working afterwards
        assert_eq!(block_on(pool.spawn(|| 5).join()).unwrap(), 5);
    }

    #[test]
    fn test_zero_threads_means_one() {
        assert_eq!(WorkerPool::new(0).unwrap().threads(), 1);
    }
}
