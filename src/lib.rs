pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod functions;
pub mod sequence;
pub mod types;

pub use error::{CodonOptError, Result};
