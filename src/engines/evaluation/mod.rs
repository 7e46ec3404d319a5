pub mod pipeline;

pub use pipeline::{BatchEvaluation, FitnessEvaluationPipeline, SequenceReport};
