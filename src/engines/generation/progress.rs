use chrono::{DateTime, Utc};
use log::info;

/// Emitted after every iteration, then once more with `iteration == -1`
/// when the run stops
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub iteration: i64,
    /// Set once any batch has failed
    pub error: bool,
    /// Run start followed by one timestamp per finished iteration
    pub timestamps: Vec<DateTime<Utc>>,
}

impl ProgressSnapshot {
    pub fn is_final(&self) -> bool {
        self.iteration < 0
    }
}

pub trait ProgressCallback: Send {
    fn on_iteration_start(&mut self, iteration: usize);
    fn on_progress(&mut self, snapshot: &ProgressSnapshot);
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_iteration_start(&mut self, _iteration: usize) {}

    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        if snapshot.is_final() {
            let elapsed = match (snapshot.timestamps.first(), snapshot.timestamps.last()) {
                (Some(first), Some(last)) => (*last - *first).num_milliseconds() as f64 / 1000.0,
                _ => 0.0,
            };
            info!(
                "Optimization finished after {} iteration(s) in {:.1}s{}",
                snapshot.timestamps.len().saturating_sub(1),
                elapsed,
                if snapshot.error { " with errors" } else { "" }
            );
        }
    }
}

// For consumers on another thread
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    IterationStart(usize),
    Progress(ProgressSnapshot),
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_iteration_start(&mut self, iteration: usize) {
        let _ = self.sender.send(ProgressMessage::IterationStart(iteration));
    }

    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        let _ = self.sender.send(ProgressMessage::Progress(snapshot.clone()));
    }
}
