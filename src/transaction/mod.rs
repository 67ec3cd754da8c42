use std::sync::Arc;

use tracing::error;

use crate::core::Result;
use crate::storage::Store;

/// Wraps storage tasks in a transaction boundary.
///
/// Commit on normal return, roll back and re-raise on error. A task that is
/// already running inside an open transaction (the scheduler's re-entrant
/// inline path) is flattened into the outer transaction, since the store
/// does not support nested independent transactions.
pub struct TransactionRunner {
    store: Arc<Store>,
}

impl TransactionRunner {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn run_in_transaction<T, F>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.store.in_transaction() {
            return task();
        }

        self.store.begin()?;
        match task() {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback() {
                    error!("rollback failed after task error: {rb}");
                }
                Err(e)
            }
        }
    }
}
