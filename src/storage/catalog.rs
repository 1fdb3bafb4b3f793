//! Catalog - maps table ids to storage backends.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result, TableId};
use crate::storage::StorageBackend;

/// Registry of the tables the page store can reach.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn StorageBackend>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` under its own table id, replacing any previous one.
    pub fn add_table(&self, backend: Arc<dyn StorageBackend>) {
        let table_id = backend.id();
        self.tables.write().insert(table_id, backend);
        tracing::debug!(table_id, "table registered");
    }

    /// The backend storing `table_id`.
    ///
    /// # Errors
    /// - `Error::NoSuchTable` if nothing is registered under `table_id`
    pub fn backend_for(&self, table_id: TableId) -> Result<Arc<dyn StorageBackend>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::NoSuchTable(table_id))
    }

    /// Ids of every registered table, ascending.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
