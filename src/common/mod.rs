//! Common types and utilities shared across StrictDB.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`PageStoreConfig`]
//! - Error types
//! - Identifiers ([`PageIdentity`], [`TransactionId`]) and [`AccessMode`]

pub mod config;
pub mod error;
mod page_id;
mod transaction_id;

pub use config::PageStoreConfig;
pub use error::{Error, Result};
pub use page_id::{PageIdentity, TableId};
pub use transaction_id::{AccessMode, TransactionId};
