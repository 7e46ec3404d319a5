pub mod evaluation;
pub mod folding;
pub mod generation;
pub mod worker_pool;
