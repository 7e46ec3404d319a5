pub mod cache;

pub use cache::{CachedFolding, FoldingCache};
