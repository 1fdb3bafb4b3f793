//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruReplacer`] - Least recently used, restricted to evictable pages

mod lru;

pub use lru::LruReplacer;
