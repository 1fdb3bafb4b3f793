//! Storage layer - table files and the page format they share.
//!
//! This module handles persistent storage:
//! - [`StorageBackend`] - What the page store needs from a table file
//! - [`Catalog`] - Routes table ids to their backends
//! - [`HeapFile`] - File-backed table of fixed-width tuples
//! - [`page`] - The raw page container

mod backend;
mod catalog;
mod heap_file;
pub mod page;

pub use backend::{RecordId, StorageBackend, Tuple};
pub use catalog::Catalog;
pub use heap_file::HeapFile;
